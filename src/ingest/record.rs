use atoi::atoi;
use csv::ByteRecord;

use super::period::{canonical_period, month_from_name};
use crate::error::IngestError;
use crate::store::Organisation;

/// Marker in the period column of publisher-computed aggregate rows.
const TOTAL_MARKER: &[u8] = b"TOTAL";

/// The eighteen count columns of a monthly row, in publication order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricCounts {
    pub att_type1: i64,
    pub att_type2: i64,
    pub att_other: i64,
    pub att_booked_type1: i64,
    pub att_booked_type2: i64,
    pub att_booked_other: i64,
    pub att_over4_type1: i64,
    pub att_over4_type2: i64,
    pub att_over4_other: i64,
    pub att_over4_booked_type1: i64,
    pub att_over4_booked_type2: i64,
    pub att_over4_booked_other: i64,
    pub four_to_twelve: i64,
    pub twelve_plus: i64,
    pub emergency_type1: i64,
    pub emergency_type2: i64,
    pub emergency_other: i64,
    pub other: i64,
}

impl MetricCounts {
    pub fn from_columns(c: [i64; 18]) -> Self {
        Self {
            att_type1: c[0],
            att_type2: c[1],
            att_other: c[2],
            att_booked_type1: c[3],
            att_booked_type2: c[4],
            att_booked_other: c[5],
            att_over4_type1: c[6],
            att_over4_type2: c[7],
            att_over4_other: c[8],
            att_over4_booked_type1: c[9],
            att_over4_booked_type2: c[10],
            att_over4_booked_other: c[11],
            four_to_twelve: c[12],
            twelve_plus: c[13],
            emergency_type1: c[14],
            emergency_type2: c[15],
            emergency_other: c[16],
            other: c[17],
        }
    }

    pub fn to_columns(self) -> [i64; 18] {
        [
            self.att_type1,
            self.att_type2,
            self.att_other,
            self.att_booked_type1,
            self.att_booked_type2,
            self.att_booked_other,
            self.att_over4_type1,
            self.att_over4_type2,
            self.att_over4_other,
            self.att_over4_booked_type1,
            self.att_over4_booked_type2,
            self.att_over4_booked_other,
            self.four_to_twelve,
            self.twelve_plus,
            self.emergency_type1,
            self.emergency_type2,
            self.emergency_other,
            self.other,
        ]
    }
}

/// One parsed data row: the organisation it belongs to plus its counts
/// for a single canonical period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsRecord {
    pub period: String,
    pub organisation: Organisation,
    pub counts: MetricCounts,
}

/// Parse one CSV data row. Returns `Ok(None)` for publisher aggregate
/// rows (period column reads `TOTAL`), which carry no organisation.
///
/// Layout: col 0 period tag (`MSitAE-AUGUST-2020`), col 1 org code,
/// col 2 parent org, col 3 org name, cols 4..22 integer counts. Empty
/// count cells read as zero; anything else non-numeric is malformed.
pub fn parse_row(
    source_file: &str,
    row: u64,
    record: &ByteRecord,
) -> Result<Option<MetricsRecord>, IngestError> {
    let field = |i: usize| record.get(i).unwrap_or_default();

    if field(0).trim_ascii() == TOTAL_MARKER {
        return Ok(None);
    }
    if record.len() < 22 {
        return Err(IngestError::malformed(
            source_file,
            row,
            format!("expected 22 columns, found {}", record.len()),
        ));
    }

    let period = parse_period_tag(source_file, row, field(0))?;

    let org_code = String::from_utf8_lossy(field(1)).trim().to_string();
    if org_code.is_empty() {
        return Err(IngestError::malformed(source_file, row, "empty org code"));
    }
    let parent_org = {
        let p = String::from_utf8_lossy(field(2)).trim().to_string();
        (!p.is_empty()).then_some(p)
    };
    let org_name = String::from_utf8_lossy(field(3)).trim().to_string();

    let mut columns = [0i64; 18];
    for (offset, slot) in columns.iter_mut().enumerate() {
        let cell = field(4 + offset).trim_ascii();
        if cell.is_empty() {
            continue;
        }
        *slot = atoi::<i64>(cell).ok_or_else(|| {
            IngestError::malformed(
                source_file,
                row,
                format!(
                    "non-numeric count in column {}: {:?}",
                    4 + offset,
                    String::from_utf8_lossy(cell)
                ),
            )
        })?;
    }

    Ok(Some(MetricsRecord {
        period,
        organisation: Organisation {
            org_code,
            parent_org,
            org_name,
        },
        counts: MetricCounts::from_columns(columns),
    }))
}

/// Normalise a period tag like `MSitAE-AUGUST-2020` to `2020-08`.
fn parse_period_tag(
    source_file: &str,
    row: u64,
    tag: &[u8],
) -> Result<String, IngestError> {
    let tag = String::from_utf8_lossy(tag);
    let mut parts = tag.trim().split('-');
    let _prefix = parts.next();
    let month_name = parts.next().unwrap_or_default();
    let year_part = parts.next().unwrap_or_default();

    let month = month_from_name(month_name).ok_or_else(|| {
        IngestError::malformed(
            source_file,
            row,
            format!("unrecognised month in period tag {:?}", tag.trim()),
        )
    })?;
    let year: i32 = year_part.parse().map_err(|_| {
        IngestError::malformed(
            source_file,
            row,
            format!("unrecognised year in period tag {:?}", tag.trim()),
        )
    })?;
    Ok(canonical_period(year, month))
}
