use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use time::Date;
use tracing::{info, warn};

use crate::clean::{self, Indexer};
use crate::config;
use crate::error::{Error, Result};
use crate::files::ensure_folder_exists;
use crate::table::Table;

pub type RateSeries = Vec<(Date, f64)>;

/// Mean `Taxa Indicativa` per date for each indexer, in chronological order. Rows with an
/// unreadable date, rate or indexer are ignored.
pub fn average_rate_by_indexer(df: &Table) -> Result<BTreeMap<Indexer, RateSeries>> {
    let date = df.require_column(config::DATE)?;
    let rate = df.require_column(config::INDICATIVE_RATE)?;
    let indexer = df.require_column(config::INDEXER)?;

    let mut sums: BTreeMap<(Indexer, Date), (f64, u32)> = BTreeMap::new();
    for row in df.rows() {
        let parsed = (
            row[indexer].as_deref().and_then(Indexer::from_label),
            row[date].as_deref().and_then(clean::parse_dataset_date),
            row[rate].as_deref().and_then(clean::parse_number),
        );
        let (Some(indexer), Some(date), Some(rate)) = parsed else {
            continue;
        };
        let entry = sums.entry((indexer, date)).or_default();
        entry.0 += rate;
        entry.1 += 1;
    }

    let mut series: BTreeMap<Indexer, RateSeries> = BTreeMap::new();
    for ((indexer, date), (sum, count)) in sums {
        series
            .entry(indexer)
            .or_default()
            .push((date, sum / f64::from(count)));
    }
    Ok(series)
}

pub trait ReportRenderer {
    /// Renders one indexer's series and returns the path written.
    fn render(&self, indexer: Indexer, series: &[(Date, f64)]) -> Result<PathBuf>;
}

/// Writes each series as `indicative_rate_{indexer}.csv` with `data` and
/// `Taxa Indicativa Média` columns.
pub struct CsvSeriesRenderer {
    folder: PathBuf,
}

impl CsvSeriesRenderer {
    pub fn new<P: Into<PathBuf>>(folder: P) -> Self {
        Self {
            folder: folder.into(),
        }
    }
}

impl ReportRenderer for CsvSeriesRenderer {
    fn render(&self, indexer: Indexer, series: &[(Date, f64)]) -> Result<PathBuf> {
        ensure_folder_exists(&self.folder)?;
        let mut table = Table::new(&[config::DATE, "Taxa Indicativa Média"]);
        for (date, rate) in series {
            table.push_row(vec![
                Some(date_label(date)),
                Some(clean::round2(*rate).to_string()),
            ]);
        }
        let output_file = self
            .folder
            .join(format!("indicative_rate_{}.csv", indexer.label()));
        table.write_csv(&output_file)?;
        Ok(output_file)
    }
}

/// Draws each series as a line chart, `indicative_rate_{indexer}.png`. Captions and axis
/// labels are only rasterized when the `chart-text` feature provides fonts.
pub struct PngChartRenderer {
    folder: PathBuf,
    size: (u32, u32),
}

impl PngChartRenderer {
    pub fn new<P: Into<PathBuf>>(folder: P) -> Self {
        Self {
            folder: folder.into(),
            size: (1000, 600),
        }
    }
}

impl ReportRenderer for PngChartRenderer {
    fn render(&self, indexer: Indexer, series: &[(Date, f64)]) -> Result<PathBuf> {
        ensure_folder_exists(&self.folder)?;
        let output_file = self
            .folder
            .join(format!("indicative_rate_{}.png", indexer.label()));
        let render_error = |reason: String| Error::Render {
            path: output_file.clone(),
            reason,
        };
        if series.is_empty() {
            return Err(render_error("empty series".to_string()));
        }
        draw_rate_chart(&output_file, self.size, indexer, series)
            .map_err(|e| render_error(e.to_string()))?;
        Ok(output_file)
    }
}

fn date_label(date: &Date) -> String {
    date.format(clean::DISPLAY_DATE_FMT)
        .unwrap_or_else(|_| date.to_string())
}

/// Label of the x tick closest to `x`; points sit on whole numbers.
fn label_at(labels: &[String], x: f64) -> String {
    let index = x.round();
    if index < 0.0 || (x - index).abs() > 1e-6 {
        return String::new();
    }
    labels.get(index as usize).cloned().unwrap_or_default()
}

fn draw_rate_chart(
    path: &Path,
    size: (u32, u32),
    indexer: Indexer,
    series: &[(Date, f64)],
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<String> = series.iter().map(|(date, _)| date_label(date)).collect();
    let points: Vec<(f64, f64)> = series
        .iter()
        .enumerate()
        .map(|(i, (_, rate))| (i as f64, *rate))
        .collect();
    let (low, high) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), (_, y)| {
            (low.min(*y), high.max(*y))
        });
    let pad = if high > low { (high - low) * 0.1 } else { 1.0 };

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Average Indicative Rate by Date - {indexer}"),
            ("sans-serif", 24),
        )
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5..(points.len() as f64 - 0.5), (low - pad)..(high + pad))?;
    chart
        .configure_mesh()
        .x_labels(labels.len())
        .x_label_formatter(&|x| label_at(&labels, *x))
        .x_desc("Date (DD-MM-YYYY)")
        .y_desc("Average Indicative Rate (%)")
        .draw()?;
    chart.draw_series(LineSeries::new(points.iter().copied(), &BLUE))?;
    chart.draw_series(points.iter().map(|p| Circle::new(*p, 4, BLUE.filled())))?;
    root.present()?;
    Ok(())
}

/// Loads the cleaned dataset and renders one report per indexer. A failing indexer is
/// logged and does not stop the others.
pub fn plot_indicative_rate_by_indexer<P: AsRef<Path>, R: ReportRenderer + ?Sized>(
    cleaned_file: P,
    renderer: &R,
) -> Result<Vec<PathBuf>> {
    let df = Table::read_csv(cleaned_file)?;
    let mut written = Vec::new();
    for (indexer, series) in average_rate_by_indexer(&df)? {
        match renderer.render(indexer, &series) {
            Ok(path) => {
                info!(%indexer, path = %path.display(), "report saved");
                written.push(path);
            }
            Err(e) => warn!(%indexer, "error rendering report: {e}"),
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn cleaned(rows: &[[&str; 3]]) -> Table {
        let mut table = Table::new(&["data", "Taxa Indicativa", "Indexer"]);
        for row in rows {
            table.push_row(row.iter().map(|v| Some(v.to_string())).collect());
        }
        table
    }

    #[test]
    fn averages_per_date_in_calendar_order() {
        let df = cleaned(&[
            ["02/10/2024", "7", "IPCA +"],
            ["30/09/2024", "6", "IPCA +"],
            ["30/09/2024", "8", "IPCA +"],
            ["30/09/2024", "1.5", "DI +"],
        ]);
        let series = average_rate_by_indexer(&df).unwrap();

        assert_eq!(
            series[&Indexer::IpcaSpread],
            [(date!(2024 - 09 - 30), 7.0), (date!(2024 - 10 - 02), 7.0)]
        );
        assert_eq!(series[&Indexer::DiSpread], [(date!(2024 - 09 - 30), 1.5)]);
        assert!(!series.contains_key(&Indexer::DiPercentual));
    }

    #[test]
    fn png_renderer_draws_one_chart_per_indexer() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("cleaned.csv");
        cleaned(&[
            ["30/09/2024", "6", "IPCA +"],
            ["01/10/2024", "6.4", "IPCA +"],
            ["30/09/2024", "108", "% do DI"],
        ])
        .write_csv(&source)
        .unwrap();

        let renderer = PngChartRenderer::new(dir.path().join("Plots"));
        let written = plot_indicative_rate_by_indexer(&source, &renderer).unwrap();

        assert_eq!(written.len(), 2);
        for indexer in ["IPCA +", "% do DI"] {
            let path = dir
                .path()
                .join(format!("Plots/indicative_rate_{indexer}.png"));
            let bytes = std::fs::read(&path).unwrap();
            assert!(bytes.starts_with(b"\x89PNG"), "{} is not a PNG", path.display());
        }
    }

    #[test]
    fn png_renderer_rejects_empty_series() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PngChartRenderer::new(dir.path());
        let err = renderer.render(Indexer::DiSpread, &[]).unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
    }

    #[test]
    fn tick_labels_only_on_whole_positions() {
        let labels = vec!["30/09/2024".to_string(), "01/10/2024".to_string()];
        assert_eq!(label_at(&labels, 1.0), "01/10/2024");
        assert_eq!(label_at(&labels, 0.5), "");
        assert_eq!(label_at(&labels, 2.0), "");
        assert_eq!(label_at(&labels, -1.0), "");
    }

    #[test]
    fn csv_renderer_writes_one_file_per_indexer() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("cleaned.csv");
        cleaned(&[["30/09/2024", "6", "% do DI"], ["30/09/2024", "8", "DI +"]])
            .write_csv(&source)
            .unwrap();

        let renderer = CsvSeriesRenderer::new(dir.path().join("Plots"));
        let written = plot_indicative_rate_by_indexer(&source, &renderer).unwrap();

        assert_eq!(written.len(), 2);
        let rendered =
            Table::read_csv(dir.path().join("Plots/indicative_rate_% do DI.csv")).unwrap();
        assert_eq!(
            rendered.rows()[0],
            [Some("30/09/2024".to_string()), Some("6".to_string())]
        );
    }
}
