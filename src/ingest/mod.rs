pub mod period;
pub mod record;
pub mod urls;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use csv::ReaderBuilder;
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::store::{self, registry, Db};

/// Outcome of ingesting one monthly file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileSummary {
    pub rows_seen: u64,
    pub orgs_inserted: u64,
    pub metrics_inserted: u64,
    pub duplicates_skipped: u64,
    pub malformed: u64,
}

/// Parse one monthly CSV and apply it to the store inside a single
/// transaction. Aggregate rows are skipped, duplicates are counted but
/// not re-inserted, and malformed rows are logged without aborting the
/// file.
pub async fn ingest_csv(db: &Db, source_file: &str, bytes: &[u8]) -> Result<FileSummary> {
    let mut summary = FileSummary::default();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let mut tx = db
        .pool
        .begin()
        .await
        .with_context(|| format!("starting transaction for {source_file}"))?;

    let mut raw = csv::ByteRecord::new();
    while reader
        .read_byte_record(&mut raw)
        .with_context(|| format!("reading {source_file}"))?
    {
        let row = raw.position().map(|p| p.line()).unwrap_or_default();
        let parsed = match record::parse_row(source_file, row, &raw) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => continue,
            Err(err @ IngestError::MalformedRecord { .. }) => {
                warn!(%err, "skipping malformed row");
                summary.malformed += 1;
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        summary.rows_seen += 1;

        if store::insert_organisation(&mut *tx, &parsed.organisation).await? {
            summary.orgs_inserted += 1;
        }
        if store::insert_metrics(&mut *tx, &parsed).await? {
            summary.metrics_inserted += 1;
        } else {
            summary.duplicates_skipped += 1;
        }
    }

    tx.commit()
        .await
        .with_context(|| format!("committing {source_file}"))?;

    info!(
        file = source_file,
        rows = summary.rows_seen,
        orgs = summary.orgs_inserted,
        metrics = summary.metrics_inserted,
        duplicates = summary.duplicates_skipped,
        malformed = summary.malformed,
        "ingested monthly file"
    );
    Ok(summary)
}

/// Drives the monthly catch-up: walks every expected month, fetches the
/// ones the publisher has released, and refreshes the registry snapshot
/// after each successful file.
pub struct Engine {
    db: Db,
    client: reqwest::Client,
    base_url: String,
    export_path: PathBuf,
}

impl Engine {
    pub fn new(db: Db, base_url: String, export_path: PathBuf) -> Self {
        Self {
            db,
            client: reqwest::Client::new(),
            base_url,
            export_path,
        }
    }

    /// Fetch one monthly CSV. Missing files and transport failures both
    /// surface as `ResourceUnavailable` so the caller can skip the month.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, IngestError> {
        let response = self.client.get(url).send().await.map_err(|err| {
            debug!(%err, url, "request failed");
            IngestError::ResourceUnavailable {
                url: url.to_string(),
                status: None,
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::ResourceUnavailable {
                url: url.to_string(),
                status: Some(status.as_u16()),
            });
        }
        let body = response.bytes().await.map_err(|err| {
            debug!(%err, url, "body read failed");
            IngestError::ResourceUnavailable {
                url: url.to_string(),
                status: Some(status.as_u16()),
            }
        })?;
        Ok(body.to_vec())
    }

    /// Walk all months from the start of the archive to last month. Every
    /// month is attempted on every run; already-stored rows fall out as
    /// duplicates, so re-running after a partial failure fills the gaps.
    pub async fn run(&self) -> Result<()> {
        let today = Utc::now().date_naive();
        let months = period::month_range(today);
        info!(months = months.len(), "starting monthly catch-up");

        let mut fetched = 0usize;
        let mut skipped = 0usize;
        for (year, month) in months {
            let file = urls::source_file_name(year, month);
            let url = urls::monthly_csv_url(&self.base_url, year, month);
            let bytes = match self.fetch(&url).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(%err, "skipping month");
                    skipped += 1;
                    continue;
                }
            };
            ingest_csv(&self.db, &file, &bytes).await?;
            registry::export_registry(&self.db, &self.export_path).await?;
            fetched += 1;
        }

        info!(fetched, skipped, "monthly catch-up finished");
        Ok(())
    }
}
