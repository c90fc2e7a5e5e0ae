use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::business_days::BusinessDay;
use crate::clean::clean_dataset;
use crate::combine::combine_and_save_csvs;
use crate::config::Config;
use crate::error::Error;
use crate::extract::{process_sheets, save_sheets, PositionalLayout, SheetLayout};
use crate::fetch::{build_url, download_file, RetryPolicy, Transport};
use crate::files::ensure_folder_exists;
use crate::report::{
    plot_indicative_rate_by_indexer, CsvSeriesRenderer, PngChartRenderer, ReportRenderer,
};
use crate::table::Table;
use crate::validate::validate_dataset;

/// What a stage left behind: data, nothing (with the reason), or an error.
#[derive(Debug)]
pub enum StageOutcome<T> {
    Produced(T),
    Empty(String),
    Failed(Error),
}

impl<T> StageOutcome<T> {
    pub fn is_produced(&self) -> bool {
        matches!(self, StageOutcome::Produced(_))
    }

    pub fn produced(&self) -> Option<&T> {
        match self {
            StageOutcome::Produced(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> fmt::Display for StageOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Produced(_) => f.write_str("ok"),
            StageOutcome::Empty(reason) => write!(f, "empty ({reason})"),
            StageOutcome::Failed(e) => write!(f, "failed ({e})"),
        }
    }
}

#[derive(Debug)]
pub struct PipelineReport {
    pub downloads: Vec<(BusinessDay, StageOutcome<Vec<PathBuf>>)>,
    pub combined: StageOutcome<Table>,
    pub cleaned: StageOutcome<Table>,
    pub validation: StageOutcome<()>,
    pub reports: StageOutcome<Vec<PathBuf>>,
}

impl PipelineReport {
    /// The run counts as successful when a non-empty cleaned dataset passed validation.
    pub fn succeeded(&self) -> bool {
        self.cleaned.is_produced() && self.validation.is_produced()
    }
}

/// Downloads, extracts and saves the sheets of each business day into the source folder.
/// Every day is independent: a failure is recorded and the next day is processed.
pub fn download_and_save_files<T, L, S>(
    config: &Config,
    transport: &T,
    layout: &L,
    business_days: &[BusinessDay],
    mut sleep: S,
) -> Vec<(BusinessDay, StageOutcome<Vec<PathBuf>>)>
where
    T: Transport + ?Sized,
    L: SheetLayout + ?Sized,
    S: FnMut(Duration),
{
    let destination_folder = config.source_dir();
    if let Err(e) = ensure_folder_exists(&destination_folder) {
        error!("cannot prepare source folder: {e}");
        return business_days
            .iter()
            .map(|day| {
                let reason = std::io::Error::other(e.to_string());
                (*day, StageOutcome::Failed(Error::io(&destination_folder, reason)))
            })
            .collect();
    }

    let policy = RetryPolicy::from(config);
    business_days
        .iter()
        .map(|day| {
            let outcome = match build_url(&config.base_url, day.date()) {
                Err(e) => {
                    error!(%day, "{e}");
                    StageOutcome::Failed(e)
                }
                Ok(url) => match download_file(transport, &url, policy, &mut sleep) {
                    None => {
                        warn!(%day, "failed to download the file");
                        StageOutcome::Empty(format!("no data from {url}"))
                    }
                    Some(file_data) => {
                        let sheets = process_sheets(&file_data, day, layout);
                        match save_sheets(&destination_folder, day, &sheets) {
                            Ok(paths) if paths.is_empty() => {
                                StageOutcome::Empty("no usable sheets".to_string())
                            }
                            Ok(paths) => StageOutcome::Produced(paths),
                            Err(e) => {
                                error!(%day, "error saving sheets: {e}");
                                StageOutcome::Failed(e)
                            }
                        }
                    }
                },
            };
            (*day, outcome)
        })
        .collect()
}

/// Cleans the combined dataset, saves it and validates it.
pub fn prepare_and_clean_dataset(
    config: &Config,
    raw: &Table,
) -> (StageOutcome<Table>, StageOutcome<()>) {
    let cleaned = clean_dataset(raw).and_then(|cleaned| {
        let output_file_path = config.cleaned_data_path();
        cleaned.write_csv(&output_file_path)?;
        info!(
            path = %output_file_path.display(),
            rows = cleaned.len(),
            "cleaned dataset saved"
        );
        Ok(cleaned)
    });
    let cleaned = match cleaned {
        Ok(cleaned) => cleaned,
        Err(e) => {
            error!("error in preparing or cleaning the dataset: {e}");
            return (
                StageOutcome::Failed(e),
                StageOutcome::Empty("nothing to validate".to_string()),
            );
        }
    };
    if cleaned.is_empty() {
        warn!("cleaned dataset is empty");
        return (
            StageOutcome::Empty("no rows survived cleaning".to_string()),
            StageOutcome::Empty("nothing to validate".to_string()),
        );
    }

    let validation = match validate_dataset(&cleaned) {
        Ok(()) => StageOutcome::Produced(()),
        Err(violation) => {
            error!("dataset validation failed: {violation}");
            StageOutcome::Failed(Error::from(violation))
        }
    };
    (StageOutcome::Produced(cleaned), validation)
}

/// Deletes the raw and cleaned datasets of an earlier run so they cannot pass for this one.
fn remove_stale_datasets(config: &Config) {
    for path in [config.raw_data_path(), config.cleaned_data_path()] {
        if !path.is_file() {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => info!(path = %path.display(), "stale dataset removed"),
            Err(e) => warn!(path = %path.display(), "cannot remove stale dataset: {e}"),
        }
    }
}

/// Renders the cleaned dataset with every renderer. A failing renderer does not stop the
/// others; the stage fails only when none of them produced anything.
fn render_reports(
    config: &Config,
    renderers: &[&dyn ReportRenderer],
) -> StageOutcome<Vec<PathBuf>> {
    let mut written = Vec::new();
    let mut last_error = None;
    for renderer in renderers {
        match plot_indicative_rate_by_indexer(config.cleaned_data_path(), *renderer) {
            Ok(paths) => written.extend(paths),
            Err(e) => {
                error!("error rendering reports: {e}");
                last_error = Some(e);
            }
        }
    }
    match last_error {
        Some(e) if written.is_empty() => StageOutcome::Failed(e),
        _ => StageOutcome::Produced(written),
    }
}

/// Runs every stage for `business_days`, sleeping on the calling thread between retries.
pub fn run<T: Transport + ?Sized>(
    config: &Config,
    transport: &T,
    business_days: &[BusinessDay],
) -> PipelineReport {
    info!(
        days = ?business_days.iter().map(BusinessDay::id).collect::<Vec<_>>(),
        "step 1: business days"
    );

    info!("step 2: downloading and saving files");
    let downloads = download_and_save_files(
        config,
        transport,
        &PositionalLayout::default(),
        business_days,
        std::thread::sleep,
    );

    info!("step 3: combining CSV files");
    let combined =
        match combine_and_save_csvs(config.source_dir(), business_days, config.dataset_dir()) {
            Ok(table) if table.is_empty() => StageOutcome::Empty("no files matched".to_string()),
            Ok(table) => StageOutcome::Produced(table),
            Err(e) => {
                error!("error combining files: {e}");
                StageOutcome::Failed(e)
            }
        };

    info!("step 4: cleaning and validating the dataset");
    let (cleaned, validation) = match combined.produced() {
        Some(raw) => prepare_and_clean_dataset(config, raw),
        None => {
            remove_stale_datasets(config);
            (
                StageOutcome::Empty("nothing was combined".to_string()),
                StageOutcome::Empty("nothing to validate".to_string()),
            )
        }
    };

    info!("step 5: rendering indicative rate reports");
    let reports = if cleaned.is_produced() {
        let charts = PngChartRenderer::new(config.plot_dir());
        let series = CsvSeriesRenderer::new(config.plot_dir());
        let renderers: [&dyn ReportRenderer; 2] = [&charts, &series];
        render_reports(config, &renderers)
    } else {
        StageOutcome::Empty("no cleaned dataset".to_string())
    };

    PipelineReport {
        downloads,
        combined,
        cleaned,
        validation,
        reports,
    }
}
