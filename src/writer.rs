use std::collections::HashSet;
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::error::Result;
use crate::models::RawValueRow;
use crate::parse;
use crate::reconciler::MandateMapping;

#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub batch_size: usize,
    pub batch_pause_ms: u64,
    pub month_first: bool,
    /// When set, dates beyond this ceiling are rejected (single-shot path).
    pub max_date: Option<NaiveDate>,
    #[cfg(test)]
    pub fail_batch_txn: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            batch_size: 40,
            batch_pause_ms: 50,
            month_first: false,
            max_date: None,
            #[cfg(test)]
            fail_batch_txn: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct WriteOutcome {
    pub created: usize,
    pub updated: usize,
    /// Internal ids of every mandate that received at least one value.
    pub touched: HashSet<i64>,
    pub errors: Vec<String>,
}

impl WriteOutcome {
    fn record(&mut self, row: RowOutcome) {
        self.touched.insert(row.mandate_id);
        if row.created {
            self.created += 1;
        } else {
            self.updated += 1;
        }
    }

    fn absorb(&mut self, other: WriteOutcome) {
        self.created += other.created;
        self.updated += other.updated;
        self.touched.extend(other.touched);
        self.errors.extend(other.errors);
    }
}

struct RowOutcome {
    mandate_id: i64,
    created: bool,
}

/// Upsert day values in fixed-size transactional batches.
///
/// A failed batch transaction is not retried as a unit: its rows are
/// replayed individually so a systemic failure degrades to row-level
/// granularity. Per-row failures only ever populate `errors`.
pub fn write_day_values(
    conn: &mut Connection,
    mapping: &MandateMapping,
    rows: &[RawValueRow],
    opts: &WriterOptions,
) -> WriteOutcome {
    let mut out = WriteOutcome::default();
    let batches: Vec<&[RawValueRow]> = rows.chunks(opts.batch_size.max(1)).collect();
    let batch_count = batches.len();

    for (i, batch) in batches.into_iter().enumerate() {
        match write_batch(conn, mapping, batch, opts) {
            Ok(delta) => out.absorb(delta),
            Err(_) => {
                for row in batch {
                    match upsert_row(conn, mapping, row, opts) {
                        Ok(row_outcome) => out.record(row_outcome),
                        Err(e) => out.errors.push(e),
                    }
                }
            }
        }
        if opts.batch_pause_ms > 0 && i + 1 < batch_count {
            std::thread::sleep(Duration::from_millis(opts.batch_pause_ms));
        }
    }
    out
}

fn write_batch(
    conn: &mut Connection,
    mapping: &MandateMapping,
    batch: &[RawValueRow],
    opts: &WriterOptions,
) -> Result<WriteOutcome> {
    #[cfg(test)]
    if opts.fail_batch_txn {
        return Err(crate::error::MandataError::Other("injected batch failure".to_string()));
    }

    let tx = conn.transaction()?;
    let mut delta = WriteOutcome::default();
    for row in batch {
        match upsert_row(&tx, mapping, row, opts) {
            Ok(row_outcome) => delta.record(row_outcome),
            Err(e) => delta.errors.push(e),
        }
    }
    tx.commit()?;
    Ok(delta)
}

fn upsert_row(
    conn: &Connection,
    mapping: &MandateMapping,
    row: &RawValueRow,
    opts: &WriterOptions,
) -> std::result::Result<RowOutcome, String> {
    let label = row.name.as_deref().unwrap_or(&row.mandant_id);
    if row.mandant_id.trim().is_empty() || row.date.trim().is_empty() || row.value.trim().is_empty()
    {
        return Err(format!("Value row missing required fields (mandate '{label}')"));
    }

    let mandate_id = *mapping
        .get(row.mandant_id.trim())
        .ok_or_else(|| format!("No mandate mapped for reference '{}'", row.mandant_id))?;

    let date = match opts.max_date {
        Some(max) => parse::parse_date_strict(&row.date, opts.month_first, max),
        None => parse::parse_date(&row.date, opts.month_first),
    }
    .map_err(|e| format!("{e} (mandate '{label}')"))?;
    let value =
        parse::parse_value(&row.value).map_err(|e| format!("{e} (mandate '{label}')"))?;

    let iso = date.format("%Y-%m-%d").to_string();
    let exists = conn
        .prepare_cached("SELECT 1 FROM day_values WHERE mandate_id = ?1 AND date = ?2")
        .and_then(|mut stmt| stmt.exists(rusqlite::params![mandate_id, iso]))
        .map_err(|e| format!("Failed to check day value for '{label}' on {iso}: {e}"))?;

    conn.execute(
        "INSERT INTO day_values (mandate_id, date, value) VALUES (?1, ?2, ?3) \
         ON CONFLICT(mandate_id, date) DO UPDATE SET \
            value = excluded.value, \
            updated_at = datetime('now')",
        rusqlite::params![mandate_id, iso, value],
    )
    .map_err(|e| format!("Failed to write day value for '{label}' on {iso}: {e}"))?;

    Ok(RowOutcome { mandate_id, created: !exists })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn add_mandate(conn: &Connection, name: &str) -> i64 {
        conn.execute(
            "INSERT INTO mandates (name, mandate_group) VALUES (?1, 'lodging')",
            [name],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn value_row(date: &str, value: &str, mandant_id: &str) -> RawValueRow {
        RawValueRow {
            date: date.to_string(),
            value: value.to_string(),
            mandant_id: mandant_id.to_string(),
            name: None,
        }
    }

    fn quiet() -> WriterOptions {
        WriterOptions { batch_pause_ms: 0, ..WriterOptions::default() }
    }

    #[test]
    fn test_upsert_is_idempotent_and_keeps_latest_value() {
        let (_dir, mut conn) = test_db();
        let id = add_mandate(&conn, "Hotel A");
        let mapping: MandateMapping = [("M1".to_string(), id)].into();

        let first = write_day_values(
            &mut conn,
            &mapping,
            &[value_row("05/03/24", "100.00", "M1")],
            &quiet(),
        );
        assert_eq!(first.created, 1);
        let second = write_day_values(
            &mut conn,
            &mapping,
            &[value_row("05/03/24", "250.00", "M1")],
            &quiet(),
        );
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 1);

        let (count, value): (i64, f64) = conn
            .query_row("SELECT count(*), max(value) FROM day_values", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(value, 250.0);
    }

    #[test]
    fn test_bad_rows_become_errors_not_aborts() {
        let (_dir, mut conn) = test_db();
        let id = add_mandate(&conn, "Hotel A");
        let mapping: MandateMapping = [("M1".to_string(), id)].into();

        let rows = vec![
            value_row("13/13/24", "100", "M1"),
            value_row("05/03/24", "garbage", "M1"),
            value_row("05/03/24", "100", "M9"),
            value_row("06/03/24", "850,25", "M1"),
        ];
        let out = write_day_values(&mut conn, &mapping, &rows, &quiet());
        assert_eq!(out.created, 1);
        assert_eq!(out.errors.len(), 3);
        assert!(out.errors[2].contains("No mandate mapped for reference 'M9'"));
    }

    #[test]
    fn test_batch_failure_degrades_to_row_level() {
        let (_dir, mut conn) = test_db();
        let id = add_mandate(&conn, "Hotel A");
        let mapping: MandateMapping = [("M1".to_string(), id)].into();

        let rows = vec![
            value_row("05/03/24", "100", "M1"),
            value_row("06/03/24", "bad", "M1"),
            value_row("07/03/24", "300", "M1"),
        ];
        let opts = WriterOptions { fail_batch_txn: true, ..quiet() };
        let out = write_day_values(&mut conn, &mapping, &rows, &opts);

        // Each individually-valid row still lands; only the bad row errors.
        assert_eq!(out.created, 2);
        assert_eq!(out.errors.len(), 1);
        let count: i64 = conn
            .query_row("SELECT count(*) FROM day_values", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_rows_split_into_batches() {
        let (_dir, mut conn) = test_db();
        let id = add_mandate(&conn, "Hotel A");
        let mapping: MandateMapping = [("M1".to_string(), id)].into();

        let rows: Vec<RawValueRow> = (1..=10)
            .map(|d| value_row(&format!("{d:02}/03/24"), "50", "M1"))
            .collect();
        let opts = WriterOptions { batch_size: 3, ..quiet() };
        let out = write_day_values(&mut conn, &mapping, &rows, &opts);
        assert_eq!(out.created, 10);
        assert_eq!(out.touched.len(), 1);
    }

    #[test]
    fn test_strict_ceiling_flags_future_dates() {
        let (_dir, mut conn) = test_db();
        let id = add_mandate(&conn, "Hotel A");
        let mapping: MandateMapping = [("M1".to_string(), id)].into();

        let opts = WriterOptions {
            max_date: chrono::NaiveDate::from_ymd_opt(2024, 12, 31),
            ..quiet()
        };
        let out = write_day_values(
            &mut conn,
            &mapping,
            &[value_row("2031-01-01", "100", "M1")],
            &opts,
        );
        assert_eq!(out.created, 0);
        assert!(out.errors[0].contains("Future date"));
    }
}
