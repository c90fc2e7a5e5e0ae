use std::path::Path;

use tracing::{info, warn};

use crate::business_days::BusinessDay;
use crate::config;
use crate::error::{Error, Result};
use crate::files::ensure_folder_exists;
use crate::table::Table;

/// Category of a `{day}-{category}.csv` file name: the text between the first and second
/// `-`, cut at the first `.`. `20240919-IGP-M.csv` is category `IGP`.
pub fn sheet_name_from_file(file_name: &str) -> Option<&str> {
    let field = file_name.split('-').nth(1)?;
    field.split('.').next()
}

/// Loads every per-day file of `business_days` from `source_folder`, tags the rows with
/// `sheet_name` and `data`, and saves the concatenation to the raw dataset file in
/// `output_folder`. Days are visited in the given order, files in name order.
pub fn combine_and_save_csvs<P: AsRef<Path>, Q: AsRef<Path>>(
    source_folder: P,
    business_days: &[BusinessDay],
    output_folder: Q,
) -> Result<Table> {
    let source_folder = source_folder.as_ref();
    ensure_folder_exists(&output_folder)?;

    let mut file_names: Vec<String> = std::fs::read_dir(source_folder)
        .map_err(|e| Error::io(source_folder, e))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".csv"))
        .collect();
    file_names.sort();

    let mut combined_data = Vec::new();
    for day in business_days {
        let day_id = day.id();
        for file_name in file_names.iter().filter(|n| n.contains(&day_id)) {
            let file_path = source_folder.join(file_name);
            let Some(sheet_name) = sheet_name_from_file(file_name) else {
                warn!(path = %file_path.display(), "file name has no category, skipping");
                continue;
            };
            match Table::read_csv(&file_path) {
                Ok(mut table) => {
                    table.set_constant_column(config::SHEET_NAME, sheet_name);
                    table.set_constant_column(config::DATE, &day_id);
                    combined_data.push(table);
                }
                Err(e) => warn!("error reading {}: {e}", file_path.display()),
            }
        }
    }

    if combined_data.is_empty() {
        warn!("no CSV files were combined");
        return Ok(Table::default());
    }

    let combined = Table::concat(combined_data);
    let combined_file_path = output_folder.as_ref().join(config::RAW_DATA_FILE);
    combined.write_csv(&combined_file_path)?;
    info!(
        path = %combined_file_path.display(),
        rows = combined.len(),
        "combined CSV saved"
    );
    Ok(combined)
}
