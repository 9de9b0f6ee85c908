use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{Db, Organisation};

/// Write the full organisation registry to `path` as CSV, replacing any
/// previous snapshot. Column order matches the on-disk header
/// `OrgCode,ParentOrg,OrgName`.
pub async fn export_registry(db: &Db, path: &Path) -> Result<usize> {
    let orgs: Vec<Organisation> = sqlx::query_as::<_, Organisation>(
        "SELECT OrgCode, ParentOrg, OrgName FROM Organisation ORDER BY OrgCode",
    )
    .fetch_all(&db.pool)
    .await
    .context("reading organisation registry")?;

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("opening registry snapshot {}", path.display()))?;
    for org in &orgs {
        writer.serialize(org)?;
    }
    writer.flush()?;
    info!(path = %path.display(), organisations = orgs.len(), "exported registry snapshot");
    Ok(orgs.len())
}
