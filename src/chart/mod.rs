use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{anyhow, Result};
use plotters::prelude::*;

use crate::report::OrgSeries;

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 800;

/// Render one line per organisation over the union of their periods.
/// An empty series list still produces a chart with empty axes.
pub fn render_trend(
    path: &Path,
    title: &str,
    y_label: &str,
    series: &[OrgSeries],
) -> Result<()> {
    let periods: Vec<String> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.period.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let max_value = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.value))
        .max()
        .unwrap_or(0);
    let x_max = periods.len().saturating_sub(1).max(1);

    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| anyhow!("filling chart background: {e}"))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(0..x_max, 0..(max_value + 1).max(10))
        .map_err(|e| anyhow!("building chart axes: {e}"))?;

    chart
        .configure_mesh()
        .x_labels(periods.len().min(24).max(2))
        .x_label_formatter(&|idx: &usize| {
            periods.get(*idx).cloned().unwrap_or_default()
        })
        .y_desc(y_label)
        .draw()
        .map_err(|e| anyhow!("drawing chart mesh: {e}"))?;

    for (i, org) in series.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let points: Vec<(usize, i64)> = org
            .points
            .iter()
            .filter_map(|p| {
                periods
                    .iter()
                    .position(|period| *period == p.period)
                    .map(|idx| (idx, p.value))
            })
            .collect();
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))
            .map_err(|e| anyhow!("drawing series for {}: {e}", org.org_code))?
            .label(format!("{} ({})", org.org_name, org.org_code))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
    }

    if !series.is_empty() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| anyhow!("drawing chart legend: {e}"))?;
    }

    root.present()
        .map_err(|e| anyhow!("writing chart to {}: {e}", path.display()))?;
    Ok(())
}
