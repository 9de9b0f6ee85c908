pub mod registry;

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

/// One reporting unit from the organisation registry.
///
/// Field renames keep the serialized form in step with the registry
/// snapshot header (`OrgCode,ParentOrg,OrgName`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organisation {
    #[serde(rename = "OrgCode")]
    #[sqlx(rename = "OrgCode")]
    pub org_code: String,
    #[serde(rename = "ParentOrg")]
    #[sqlx(rename = "ParentOrg")]
    pub parent_org: Option<String>,
    #[serde(rename = "OrgName")]
    #[sqlx(rename = "OrgName")]
    pub org_name: String,
}

/// Handle over the two-table SQLite store.
#[derive(Clone)]
pub struct Db {
    pub pool: SqlitePool,
}

impl Db {
    /// Open (or create) the store at `path` and make sure the schema is in
    /// place. A pre-existing store is accepted as-is: `CREATE TABLE IF NOT
    /// EXISTS` only fills in missing tables and performs no shape check.
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("opening sqlite store at {}", path.display()))?;
        init_schema(&pool).await?;
        info!(path = %path.display(), "connected to store");
        Ok(Self { pool })
    }

    /// In-memory store for tests.
    pub async fn connect_in_memory() -> Result<Self> {
        // One connection only: each sqlite :memory: connection is its own db.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("opening in-memory sqlite store")?;
        init_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn organisation_exists(&self, org_code: &str) -> Result<bool> {
        let n: i64 =
            sqlx::query_scalar("SELECT count(*) FROM Organisation WHERE OrgCode = ?")
                .bind(org_code)
                .fetch_one(&self.pool)
                .await?;
        Ok(n > 0)
    }

    pub async fn organisation_count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT count(*) FROM Organisation")
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn metrics_count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT count(*) FROM MonthlyMetrics")
            .fetch_one(&self.pool)
            .await?)
    }
}

async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS Organisation (
            OrgCode   TEXT PRIMARY KEY,
            ParentOrg TEXT,
            OrgName   TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("creating Organisation table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS MonthlyMetrics (
            Period  TEXT NOT NULL,
            OrgCode TEXT NOT NULL REFERENCES Organisation (OrgCode),
            AttType1 INTEGER NOT NULL,
            AttType2 INTEGER NOT NULL,
            AttOther INTEGER NOT NULL,
            AttBookedType1 INTEGER NOT NULL,
            AttBookedType2 INTEGER NOT NULL,
            AttBookedOther INTEGER NOT NULL,
            AttOver4Type1 INTEGER NOT NULL,
            AttOver4Type2 INTEGER NOT NULL,
            AttOver4Other INTEGER NOT NULL,
            AttOver4BookedType1 INTEGER NOT NULL,
            AttOver4BookedType2 INTEGER NOT NULL,
            AttOver4BookedOther INTEGER NOT NULL,
            FourToTwelve INTEGER NOT NULL,
            TwelvePlus INTEGER NOT NULL,
            EmergencyType1 INTEGER NOT NULL,
            EmergencyType2 INTEGER NOT NULL,
            EmergencyOther INTEGER NOT NULL,
            Other INTEGER NOT NULL,
            PRIMARY KEY (Period, OrgCode)
        )",
    )
    .execute(pool)
    .await
    .context("creating MonthlyMetrics table")?;
    Ok(())
}

/// Insert an organisation unless its code is already registered.
/// First-seen name/parent wins; returns whether a row was written.
pub async fn insert_organisation(
    conn: &mut SqliteConnection,
    org: &Organisation,
) -> Result<bool> {
    let done = sqlx::query(
        "INSERT INTO Organisation (OrgCode, ParentOrg, OrgName)
         VALUES (?, ?, ?)
         ON CONFLICT (OrgCode) DO NOTHING",
    )
    .bind(&org.org_code)
    .bind(&org.parent_org)
    .bind(&org.org_name)
    .execute(&mut *conn)
    .await?;
    Ok(done.rows_affected() > 0)
}

/// Insert a monthly metrics row unless its (Period, OrgCode) pair exists.
/// Returns whether a row was written; false means a duplicate was skipped.
pub async fn insert_metrics(
    conn: &mut SqliteConnection,
    record: &crate::ingest::record::MetricsRecord,
) -> Result<bool> {
    let c = record.counts.to_columns();
    let mut q = sqlx::query(
        "INSERT INTO MonthlyMetrics (
            Period, OrgCode,
            AttType1, AttType2, AttOther,
            AttBookedType1, AttBookedType2, AttBookedOther,
            AttOver4Type1, AttOver4Type2, AttOver4Other,
            AttOver4BookedType1, AttOver4BookedType2, AttOver4BookedOther,
            FourToTwelve, TwelvePlus,
            EmergencyType1, EmergencyType2, EmergencyOther,
            Other
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (Period, OrgCode) DO NOTHING",
    )
    .bind(&record.period)
    .bind(&record.organisation.org_code);
    for value in c {
        q = q.bind(value);
    }
    let done = q.execute(&mut *conn).await?;
    Ok(done.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::record::{MetricCounts, MetricsRecord};

    fn org(code: &str, name: &str) -> Organisation {
        Organisation {
            org_code: code.to_string(),
            parent_org: Some("PARENT".to_string()),
            org_name: name.to_string(),
        }
    }

    fn metrics(period: &str, code: &str) -> MetricsRecord {
        MetricsRecord {
            period: period.to_string(),
            organisation: org(code, "Test Hospital"),
            counts: MetricCounts::from_columns([1; 18]),
        }
    }

    #[tokio::test]
    async fn schema_init_is_idempotent_on_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let db = Db::connect(&path).await.unwrap();
            let mut conn = db.pool.acquire().await.unwrap();
            assert!(insert_organisation(&mut conn, &org("ABC", "First"))
                .await
                .unwrap());
        }
        // Re-opening must leave the existing contents untouched.
        let db = Db::connect(&path).await.unwrap();
        assert_eq!(db.organisation_count().await.unwrap(), 1);
        assert!(db.organisation_exists("ABC").await.unwrap());
    }

    #[tokio::test]
    async fn first_seen_organisation_wins() {
        let db = Db::connect_in_memory().await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        assert!(insert_organisation(&mut conn, &org("ABC", "First Hospital"))
            .await
            .unwrap());
        assert!(
            !insert_organisation(&mut conn, &org("ABC", "Renamed Hospital"))
                .await
                .unwrap()
        );
        drop(conn);

        let name: String = sqlx::query_scalar("SELECT OrgName FROM Organisation WHERE OrgCode = ?")
            .bind("ABC")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(name, "First Hospital");
    }

    #[tokio::test]
    async fn duplicate_period_org_pair_is_skipped() {
        let db = Db::connect_in_memory().await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        let rec = metrics("2020-08", "ABC");
        insert_organisation(&mut conn, &rec.organisation).await.unwrap();
        assert!(insert_metrics(&mut conn, &rec).await.unwrap());
        assert!(!insert_metrics(&mut conn, &rec).await.unwrap());
        drop(conn);
        assert_eq!(db.metrics_count().await.unwrap(), 1);
    }
}
