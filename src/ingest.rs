use std::collections::BTreeSet;
use std::path::Path;

use calamine::{Data, Reader};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::error::{MandataError, Result};
use crate::models::{
    ChunkRequest, ChunkResponse, FinalStats, IngestReport, IngestStats, Progress, RawMandateRow,
    RawValueRow, ReportStats,
};
use crate::reconciler;
use crate::session::{ImportSession, SessionStatus, SessionStore};
use crate::stats::{self, StatsOptions};
use crate::writer::{self, WriterOptions};

pub const MANDATES_SHEET: &str = "Mandants";
pub const VALUES_SHEET: &str = "DayValues";

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub batch_size: usize,
    pub batch_pause_ms: u64,
    pub stats_batch_size: usize,
    pub stats_pause_ms: u64,
    /// Day/month convention for ambiguous slash dates. Day-first by default.
    pub month_first: bool,
    /// Mandate quota; zero means unlimited.
    pub max_mandates: usize,
    /// Ceiling for the strict date parser. The single-shot path defaults
    /// this to tomorrow when unset; the chunked path leaves it off.
    pub max_date: Option<NaiveDate>,
    pub session_grace_secs: i64,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: 40,
            batch_pause_ms: 50,
            stats_batch_size: 10,
            stats_pause_ms: 25,
            month_first: false,
            max_mandates: 0,
            max_date: None,
            session_grace_secs: 300,
        }
    }
}

impl IngestOptions {
    fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            batch_size: self.batch_size,
            batch_pause_ms: self.batch_pause_ms,
            month_first: self.month_first,
            max_date: self.max_date,
            ..WriterOptions::default()
        }
    }

    fn stats_options(&self) -> StatsOptions {
        StatsOptions { sub_batch_size: self.stats_batch_size, pause_ms: self.stats_pause_ms }
    }
}

// ---------------------------------------------------------------------------
// Single-shot ingestion
// ---------------------------------------------------------------------------

/// Reconcile mandates, write day values, recompute rollups. The call only
/// fails on structural problems; data problems land in `stats.errors`.
pub fn ingest_rows(
    conn: &mut Connection,
    mandates: &[RawMandateRow],
    values: &[RawValueRow],
    opts: &IngestOptions,
) -> Result<IngestReport> {
    let mut stats = IngestStats::default();
    stats.processed_rows = mandates.len() + values.len();

    let recon = reconciler::reconcile_mandates(conn, mandates, opts.max_mandates);
    stats.mandates_created = recon.created;
    stats.mandates_updated = recon.updated;
    stats.errors.extend(recon.errors);

    let written = writer::write_day_values(conn, &recon.mapping, values, &opts.writer_options());
    stats.values_created = written.created;
    stats.values_updated = written.updated;
    stats.errors.extend(written.errors);

    let touched: Vec<i64> = recon
        .mapping
        .values()
        .copied()
        .collect::<BTreeSet<i64>>()
        .into_iter()
        .collect();
    let finalized = stats::finalize_mandate_stats(conn, &touched, &opts.stats_options());
    stats.errors.extend(finalized.errors);

    let message = format!(
        "Processed {} mandates ({} new, {} updated) and {} day values ({} new); {} errors",
        mandates.len(),
        stats.mandates_created,
        stats.mandates_updated,
        values.len(),
        stats.values_created,
        stats.errors.len(),
    );
    Ok(IngestReport { success: true, message, stats: ReportStats::from(&stats) })
}

/// Ingest a whole XLSX export. Both named sheets must be present; their
/// absence rejects the file before any row is processed.
pub fn ingest_workbook(conn: &mut Connection, path: &Path, opts: &IngestOptions) -> Result<IngestReport> {
    let checksum = compute_checksum(&[path])?;
    if import_seen(conn, &checksum)? {
        return Ok(duplicate_report());
    }
    let (mandates, values) = decode_workbook(path)?;
    let report = ingest_rows(&mut *conn, &mandates, &values, &strict(opts))?;
    record_import(conn, path, &checksum, mandates.len(), values.len())?;
    Ok(report)
}

/// CSV fallback for exports delivered as two flat files instead of a
/// two-sheet workbook.
pub fn ingest_csv_pair(
    conn: &mut Connection,
    mandates_path: &Path,
    values_path: &Path,
    opts: &IngestOptions,
) -> Result<IngestReport> {
    let checksum = compute_checksum(&[mandates_path, values_path])?;
    if import_seen(conn, &checksum)? {
        return Ok(duplicate_report());
    }
    let mandates = decode_mandates_csv(mandates_path)?;
    let values = decode_values_csv(values_path)?;
    let report = ingest_rows(&mut *conn, &mandates, &values, &strict(opts))?;
    record_import(conn, mandates_path, &checksum, mandates.len(), values.len())?;
    Ok(report)
}

/// Single-shot calls get the strict date parser: a ceiling of tomorrow
/// catches day/month swaps that produce plausible future dates.
fn strict(opts: &IngestOptions) -> IngestOptions {
    let mut opts = opts.clone();
    if opts.max_date.is_none() {
        opts.max_date = Some(Utc::now().date_naive() + chrono::Duration::days(1));
    }
    opts
}

fn duplicate_report() -> IngestReport {
    IngestReport {
        success: true,
        message: "File already imported (duplicate checksum)".to_string(),
        stats: ReportStats {
            mandates_created: 0,
            mandates_updated: 0,
            values_created: 0,
            values_skipped: 0,
            errors: Vec::new(),
        },
    }
}

fn import_seen(conn: &Connection, checksum: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM imports WHERE checksum = ?1")?;
    Ok(stmt.exists([checksum])?)
}

fn record_import(
    conn: &Connection,
    path: &Path,
    checksum: &str,
    mandate_count: usize,
    value_count: usize,
) -> Result<()> {
    conn.execute(
        "INSERT INTO imports (filename, checksum, mandate_count, value_count) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            checksum,
            mandate_count as i64,
            value_count as i64,
        ],
    )?;
    Ok(())
}

fn compute_checksum(paths: &[&Path]) -> Result<String> {
    let mut hasher = Sha256::new();
    for path in paths {
        hasher.update(std::fs::read(path)?);
    }
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Spreadsheet decoding
// ---------------------------------------------------------------------------

fn decode_workbook(path: &Path) -> Result<(Vec<RawMandateRow>, Vec<RawValueRow>)> {
    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| MandataError::Other(format!("Failed to open workbook: {e}")))?;

    for sheet in [MANDATES_SHEET, VALUES_SHEET] {
        if !workbook.sheet_names().iter().any(|name| name == sheet) {
            return Err(MandataError::SheetMissing(sheet.to_string()));
        }
    }

    let mut mandates = Vec::new();
    let range = workbook
        .worksheet_range(MANDATES_SHEET)
        .map_err(|e| MandataError::Other(format!("Failed to read sheet '{MANDATES_SHEET}': {e}")))?;
    for (i, row) in range.rows().enumerate() {
        if row.len() < 3 || (i == 0 && is_header(row)) {
            continue;
        }
        let id = cell_text(&row[0]);
        let name = cell_text(&row[1]);
        if id.is_empty() && name.is_empty() {
            continue;
        }
        mandates.push(RawMandateRow {
            id,
            name,
            category: cell_text(&row[2]),
            currency: row.get(3).map(cell_text).filter(|s| !s.is_empty()),
        });
    }

    let mut values = Vec::new();
    let range = workbook
        .worksheet_range(VALUES_SHEET)
        .map_err(|e| MandataError::Other(format!("Failed to read sheet '{VALUES_SHEET}': {e}")))?;
    for (i, row) in range.rows().enumerate() {
        if row.len() < 3 || (i == 0 && is_header(row)) {
            continue;
        }
        let date = date_cell_text(&row[0]);
        let mandant_id = cell_text(&row[2]);
        if date.is_empty() && mandant_id.is_empty() {
            continue;
        }
        values.push(RawValueRow {
            date,
            value: cell_text(&row[1]),
            mandant_id,
            name: row.get(3).map(cell_text).filter(|s| !s.is_empty()),
        });
    }

    Ok((mandates, values))
}

fn is_header(row: &[Data]) -> bool {
    let first = cell_text(&row[0]).to_lowercase();
    matches!(first.as_str(), "id" | "date" | "externalid" | "mandantid")
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::DateTime(dt) => crate::parse::excel_serial_to_date(dt.as_f64())
            .format("%Y-%m-%d")
            .to_string(),
        _ => String::new(),
    }
}

/// Date column: numeric cells are Excel serial dates, already typed, and
/// pass through without the locale heuristics.
fn date_cell_text(cell: &Data) -> String {
    match cell {
        Data::Float(f) => crate::parse::excel_serial_to_date(*f).format("%Y-%m-%d").to_string(),
        Data::Int(i) => crate::parse::excel_serial_to_date(*i as f64).format("%Y-%m-%d").to_string(),
        _ => cell_text(cell),
    }
}

fn decode_mandates_csv(path: &Path) -> Result<Vec<RawMandateRow>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in rdr.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

fn decode_values_csv(path: &Path) -> Result<Vec<RawValueRow>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in rdr.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Chunked ingestion
// ---------------------------------------------------------------------------

/// Process one chunk of a multi-request upload.
///
/// Chunks of one session must be sent one at a time; concurrent calls for
/// the same session id are not serialized here. Different sessions are
/// independent.
pub fn ingest_chunk(
    conn: &mut Connection,
    store: &dyn SessionStore,
    req: &ChunkRequest,
    opts: &IngestOptions,
) -> Result<ChunkResponse> {
    if req.session_id.trim().is_empty() {
        return Err(MandataError::BadRequest("sessionId is required".to_string()));
    }
    if req.total_chunks == 0 {
        return Err(MandataError::BadRequest("totalChunks must be positive".to_string()));
    }

    // Sweep expired sessions on every call; cleanup stays observable
    // instead of relying on a background timer.
    store.expire(Utc::now(), chrono::Duration::seconds(opts.session_grace_secs))?;

    let mut session = match store.get(&req.session_id)? {
        Some(session) => session,
        None if req.is_first_chunk => {
            let mut session = ImportSession::new(&req.session_id);
            session.owner = req.owner.clone();
            session
        }
        None => return Err(MandataError::SessionNotFound(req.session_id.clone())),
    };

    if req.chunk_index >= req.total_chunks {
        session.status = SessionStatus::Error;
        session.completed_at = Some(Utc::now());
        store.put(&session)?;
        return Err(MandataError::BadRequest(format!(
            "chunkIndex {} out of range for {} chunks",
            req.chunk_index, req.total_chunks
        )));
    }

    session.status = SessionStatus::Processing;
    let mut chunk_errors = Vec::new();

    let recon = reconciler::reconcile_mandates(conn, &req.mandates, opts.max_mandates);
    session.stats.mandates_created += recon.created;
    session.stats.mandates_updated += recon.updated;
    chunk_errors.extend(recon.errors);
    session.mapping.extend(recon.mapping);

    // Values resolve against everything the session has mapped so far,
    // not just this chunk's mandates.
    let written =
        writer::write_day_values(conn, &session.mapping, &req.day_values, &opts.writer_options());
    session.stats.values_created += written.created;
    session.stats.values_updated += written.updated;
    session.touched.extend(written.touched);
    chunk_errors.extend(written.errors);

    session.stats.processed_rows += req.mandates.len() + req.day_values.len();

    let mut final_stats = None;
    if req.is_last_chunk {
        let ids: Vec<i64> = session
            .mapping
            .values()
            .copied()
            .chain(session.touched.iter().copied())
            .collect::<BTreeSet<i64>>()
            .into_iter()
            .collect();
        let finalized = stats::finalize_mandate_stats(conn, &ids, &opts.stats_options());
        chunk_errors.extend(finalized.errors);
        session.status = SessionStatus::Completed;
        session.completed_at = Some(Utc::now());
        session.stats.errors.extend(chunk_errors.iter().cloned());
        final_stats = Some(FinalStats {
            stats: session.stats.clone(),
            mandates_finalized: finalized.finalized,
        });
    } else {
        session.stats.errors.extend(chunk_errors.iter().cloned());
    }

    store.put(&session)?;

    let percentage = f64::from(req.chunk_index + 1) / f64::from(req.total_chunks) * 100.0;
    Ok(ChunkResponse {
        success: true,
        progress: Progress {
            chunk_index: req.chunk_index,
            total_chunks: req.total_chunks,
            processed_rows: session.stats.processed_rows,
            percentage,
        },
        stats: session.stats.clone(),
        errors: chunk_errors,
        is_complete: req.is_last_chunk,
        final_stats,
    })
}
