use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::chart;
use crate::store::Db;

/// One (period, value) sample of a metric for a single organisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendPoint {
    pub period: String,
    pub value: i64,
}

/// A metric's trend for one organisation across its stored periods,
/// oldest period first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgSeries {
    pub org_code: String,
    pub org_name: String,
    pub points: Vec<TrendPoint>,
}

/// How to score a series when ranking organisations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBy {
    Total,
    Peak,
}

impl RankBy {
    fn score(self, series: &OrgSeries) -> i64 {
        match self {
            RankBy::Total => series.points.iter().map(|p| p.value).sum(),
            RankBy::Peak => series.points.iter().map(|p| p.value).max().unwrap_or(0),
        }
    }
}

const EMERGENCY_VALUE: &str = "m.EmergencyType1 + m.EmergencyType2 + m.EmergencyOther";
const TWELVE_PLUS_VALUE: &str = "m.TwelvePlus";

/// Emergency admission totals for every organisation with a complete
/// series, i.e. a row for every period the store knows about.
pub async fn emergency_trend(db: &Db) -> Result<Vec<OrgSeries>> {
    // Only organisations present in every stored period qualify; a partial
    // series would distort a ranking over the whole window.
    let qualifier = "SELECT OrgCode FROM MonthlyMetrics
         GROUP BY OrgCode
         HAVING count(*) = (SELECT count(DISTINCT Period) FROM MonthlyMetrics)";
    filtered_series(db, EMERGENCY_VALUE, qualifier).await
}

/// Twelve-hour-plus wait counts, restricted to organisations reporting a
/// positive count in every period where any organisation did.
pub async fn twelve_plus_trend(db: &Db) -> Result<Vec<OrgSeries>> {
    let qualifier = "SELECT OrgCode FROM MonthlyMetrics
         WHERE TwelvePlus > 0
         GROUP BY OrgCode
         HAVING count(*) = (
             SELECT count(DISTINCT Period) FROM MonthlyMetrics WHERE TwelvePlus > 0
         )";
    filtered_series(db, TWELVE_PLUS_VALUE, qualifier).await
}

/// Emergency admission trend for one organisation. Empty when the code
/// is unknown or has no stored rows.
pub async fn emergency_series_for(db: &Db, org_code: &str) -> Result<Option<OrgSeries>> {
    single_series(db, EMERGENCY_VALUE, org_code).await
}

/// Twelve-hour-plus wait trend for one organisation.
pub async fn twelve_plus_series_for(db: &Db, org_code: &str) -> Result<Option<OrgSeries>> {
    single_series(db, TWELVE_PLUS_VALUE, org_code).await
}

async fn filtered_series(
    db: &Db,
    value_expr: &str,
    qualifier: &str,
) -> Result<Vec<OrgSeries>> {
    let sql = format!(
        "SELECT m.OrgCode, o.OrgName, m.Period, ({value_expr}) AS Value
         FROM MonthlyMetrics m
         JOIN Organisation o ON o.OrgCode = m.OrgCode
         WHERE m.OrgCode IN ({qualifier})
         ORDER BY m.OrgCode, m.Period"
    );
    let rows: Vec<(String, String, String, i64)> = sqlx::query_as(&sql)
        .fetch_all(&db.pool)
        .await
        .context("querying trend series")?;
    Ok(group_rows(rows))
}

async fn single_series(
    db: &Db,
    value_expr: &str,
    org_code: &str,
) -> Result<Option<OrgSeries>> {
    let sql = format!(
        "SELECT m.OrgCode, o.OrgName, m.Period, ({value_expr}) AS Value
         FROM MonthlyMetrics m
         JOIN Organisation o ON o.OrgCode = m.OrgCode
         WHERE m.OrgCode = ?
         ORDER BY m.Period"
    );
    let rows: Vec<(String, String, String, i64)> = sqlx::query_as(&sql)
        .bind(org_code)
        .fetch_all(&db.pool)
        .await
        .with_context(|| format!("querying trend for {org_code}"))?;
    Ok(group_rows(rows).into_iter().next())
}

fn group_rows(rows: Vec<(String, String, String, i64)>) -> Vec<OrgSeries> {
    let mut grouped: BTreeMap<String, OrgSeries> = BTreeMap::new();
    for (org_code, org_name, period, value) in rows {
        grouped
            .entry(org_code.clone())
            .or_insert_with(|| OrgSeries {
                org_code,
                org_name,
                points: Vec::new(),
            })
            .points
            .push(TrendPoint { period, value });
    }
    grouped.into_values().collect()
}

/// The `n` highest-scoring series. Ties break on ascending org code so
/// the same store always yields the same ranking.
pub fn top_n(mut series: Vec<OrgSeries>, n: usize, rank_by: RankBy) -> Vec<OrgSeries> {
    series.sort_by(|a, b| {
        rank_by
            .score(b)
            .cmp(&rank_by.score(a))
            .then_with(|| a.org_code.cmp(&b.org_code))
    });
    series.truncate(n);
    series
}

/// The four chart reports the operator can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportKind {
    TwelvePlusTop5,
    EmergencyTop5,
    TwelvePlusOrg(String),
    EmergencyOrg(String),
}

/// Render one report to a PNG under `out_dir` and return its path.
pub async fn run_report(db: &Db, out_dir: &Path, kind: ReportKind) -> Result<PathBuf> {
    let (path, title, y_label, series) = match &kind {
        ReportKind::EmergencyTop5 => {
            let all = emergency_trend(db).await?;
            (
                out_dir.join("Total_Emergency_Trend.png"),
                "Top 5 organisations by emergency admissions".to_string(),
                "Emergency admissions",
                top_n(all, 5, RankBy::Total),
            )
        }
        ReportKind::TwelvePlusTop5 => {
            let all = twelve_plus_trend(db).await?;
            (
                out_dir.join("12hr+_Trend.png"),
                "Top 5 organisations by 12hr+ waits".to_string(),
                "Patients waiting 12hr+",
                // Ranked by worst single month, not by total.
                top_n(all, 5, RankBy::Peak),
            )
        }
        ReportKind::EmergencyOrg(code) => {
            let series = emergency_series_for(db, code).await?;
            (
                out_dir.join(format!("{code}_emergency.png")),
                format!("Emergency admissions for {code}"),
                "Emergency admissions",
                series.into_iter().collect(),
            )
        }
        ReportKind::TwelvePlusOrg(code) => {
            let series = twelve_plus_series_for(db, code).await?;
            (
                out_dir.join(format!("{code}_12hr+.png")),
                format!("12hr+ waits for {code}"),
                "Patients waiting 12hr+",
                series.into_iter().collect(),
            )
        }
    };

    chart::render_trend(&path, &title, y_label, &series)?;
    info!(path = %path.display(), "wrote report chart");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::record::{MetricCounts, MetricsRecord};
    use crate::store::{insert_metrics, insert_organisation, Organisation};

    async fn seed(db: &Db, code: &str, name: &str, points: &[(&str, i64)]) {
        let mut conn = db.pool.acquire().await.unwrap();
        insert_organisation(
            &mut conn,
            &Organisation {
                org_code: code.to_string(),
                parent_org: None,
                org_name: name.to_string(),
            },
        )
        .await
        .unwrap();
        for (period, value) in points {
            let mut columns = [0i64; 18];
            columns[13] = *value; // TwelvePlus
            columns[14] = *value; // EmergencyType1
            let rec = MetricsRecord {
                period: period.to_string(),
                organisation: Organisation {
                    org_code: code.to_string(),
                    parent_org: None,
                    org_name: name.to_string(),
                },
                counts: MetricCounts::from_columns(columns),
            };
            insert_metrics(&mut conn, &rec).await.unwrap();
        }
    }

    #[tokio::test]
    async fn incomplete_series_are_excluded_from_ranking() {
        let db = Db::connect_in_memory().await.unwrap();
        seed(&db, "AAA", "Alpha", &[("2020-08", 25), ("2020-09", 25)]).await;
        seed(&db, "BBB", "Beta", &[("2020-08", 5), ("2020-09", 5)]).await;
        seed(&db, "CCC", "Gamma", &[("2020-08", 15), ("2020-09", 15)]).await;
        seed(&db, "DDD", "Delta", &[("2020-08", 10), ("2020-09", 10)]).await;
        // Missing 2020-09, so it must not appear even with huge values.
        seed(&db, "EEE", "Epsilon", &[("2020-08", 999)]).await;

        let ranked = top_n(twelve_plus_trend(&db).await.unwrap(), 5, RankBy::Total);
        let codes: Vec<&str> = ranked.iter().map(|s| s.org_code.as_str()).collect();
        assert_eq!(codes, vec!["AAA", "CCC", "DDD", "BBB"]);
        assert_eq!(ranked[0].points.len(), 2);
    }

    #[tokio::test]
    async fn tied_scores_rank_by_org_code() {
        let db = Db::connect_in_memory().await.unwrap();
        seed(&db, "ZZZ", "Zed", &[("2020-08", 10)]).await;
        seed(&db, "MMM", "Em", &[("2020-08", 10)]).await;
        seed(&db, "AAA", "Ay", &[("2020-08", 10)]).await;

        let ranked = top_n(emergency_trend(&db).await.unwrap(), 2, RankBy::Total);
        let codes: Vec<&str> = ranked.iter().map(|s| s.org_code.as_str()).collect();
        assert_eq!(codes, vec!["AAA", "MMM"]);
    }

    #[tokio::test]
    async fn zero_wait_month_drops_org_from_twelve_plus_trend() {
        let db = Db::connect_in_memory().await.unwrap();
        seed(&db, "AAA", "Alpha", &[("2020-08", 5), ("2020-09", 5)]).await;
        seed(&db, "BBB", "Beta", &[("2020-08", 5), ("2020-09", 0)]).await;

        let twelve = twelve_plus_trend(&db).await.unwrap();
        let codes: Vec<&str> = twelve.iter().map(|s| s.org_code.as_str()).collect();
        assert_eq!(codes, vec!["AAA"]);

        // Presence, not positivity, is what the emergency filter asks for.
        let emergency = emergency_trend(&db).await.unwrap();
        let codes: Vec<&str> = emergency.iter().map(|s| s.org_code.as_str()).collect();
        assert_eq!(codes, vec!["AAA", "BBB"]);
    }

    #[tokio::test]
    async fn unknown_org_yields_no_series() {
        let db = Db::connect_in_memory().await.unwrap();
        seed(&db, "AAA", "Alpha", &[("2020-08", 1)]).await;
        assert_eq!(emergency_series_for(&db, "NOPE").await.unwrap(), None);
    }

    #[tokio::test]
    async fn single_org_series_is_ordered_by_period() {
        let db = Db::connect_in_memory().await.unwrap();
        seed(
            &db,
            "AAA",
            "Alpha",
            &[("2020-10", 3), ("2020-08", 1), ("2020-09", 2)],
        )
        .await;

        let series = twelve_plus_series_for(&db, "AAA").await.unwrap().unwrap();
        let periods: Vec<&str> = series.points.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(periods, vec!["2020-08", "2020-09", "2020-10"]);
        assert_eq!(series.org_name, "Alpha");
    }

    #[test]
    fn peak_ranking_uses_the_maximum_point() {
        let steady = OrgSeries {
            org_code: "AAA".to_string(),
            org_name: "Steady".to_string(),
            points: vec![
                TrendPoint { period: "2020-08".to_string(), value: 10 },
                TrendPoint { period: "2020-09".to_string(), value: 10 },
            ],
        };
        let spiky = OrgSeries {
            org_code: "BBB".to_string(),
            org_name: "Spiky".to_string(),
            points: vec![
                TrendPoint { period: "2020-08".to_string(), value: 1 },
                TrendPoint { period: "2020-09".to_string(), value: 15 },
            ],
        };
        let ranked = top_n(vec![steady, spiky], 1, RankBy::Peak);
        assert_eq!(ranked[0].org_code, "BBB");
    }
}
