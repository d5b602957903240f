use std::path::Path;

use colored::Colorize;

use crate::db::get_connection;
use crate::error::{MandataError, Result};
use crate::ingest::{ingest_csv_pair, ingest_workbook};
use crate::settings::{get_data_dir, load_settings};

pub fn run(file: &str, values: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let mut conn = get_connection(&get_data_dir().join("mandata.db"))?;
    let opts = settings.ingest_options();

    let path = Path::new(file);
    let report = match values {
        Some(values_file) => ingest_csv_pair(&mut conn, path, Path::new(values_file), &opts)?,
        None => {
            let is_workbook = path
                .extension()
                .map_or(false, |e| e.eq_ignore_ascii_case("xlsx") || e.eq_ignore_ascii_case("xls"));
            if !is_workbook {
                return Err(MandataError::UnknownFormat(format!(
                    "{file} (expected .xlsx, or pass --values for CSV mode)"
                )));
            }
            ingest_workbook(&mut conn, path, &opts)?
        }
    };

    println!("{}", report.message);
    println!(
        "Mandates: {} created, {} updated. Day values: {} created, {} skipped.",
        report.stats.mandates_created,
        report.stats.mandates_updated,
        report.stats.values_created,
        report.stats.values_skipped,
    );
    if report.stats.errors.is_empty() {
        println!("{}", "No row errors.".green());
    } else {
        println!("{}", format!("{} row errors:", report.stats.errors.len()).yellow());
        for error in &report.stats.errors {
            println!("  - {error}");
        }
    }
    Ok(())
}
