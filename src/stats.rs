use std::time::Duration;

use rusqlite::Connection;

#[derive(Debug, Clone)]
pub struct StatsOptions {
    pub sub_batch_size: usize,
    pub pause_ms: u64,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self { sub_batch_size: 10, pause_ms: 25 }
    }
}

#[derive(Debug, Default)]
pub struct FinalizeOutcome {
    pub finalized: usize,
    pub errors: Vec<String>,
}

/// Recompute each touched mandate's rollup (total revenue, most recent
/// entry date) from its day values. A failure on one mandate never stops
/// the rest.
pub fn finalize_mandate_stats(
    conn: &Connection,
    mandate_ids: &[i64],
    opts: &StatsOptions,
) -> FinalizeOutcome {
    let mut out = FinalizeOutcome::default();
    let sub_batches: Vec<&[i64]> = mandate_ids.chunks(opts.sub_batch_size.max(1)).collect();
    let count = sub_batches.len();

    for (i, sub_batch) in sub_batches.into_iter().enumerate() {
        for &id in sub_batch {
            match recompute_one(conn, id) {
                Ok(()) => out.finalized += 1,
                Err(e) => out.errors.push(e),
            }
        }
        if opts.pause_ms > 0 && i + 1 < count {
            std::thread::sleep(Duration::from_millis(opts.pause_ms));
        }
    }
    out
}

fn recompute_one(conn: &Connection, mandate_id: i64) -> std::result::Result<(), String> {
    let (total, last): (f64, Option<String>) = conn
        .query_row(
            "SELECT COALESCE(SUM(value), 0), MAX(date) FROM day_values WHERE mandate_id = ?1",
            [mandate_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .map_err(|e| format!("Failed to read day values for mandate {mandate_id}: {e}"))?;
    let changed = conn
        .execute(
            "UPDATE mandates SET total_revenue = ?1, last_entry = ?2, updated_at = datetime('now') \
             WHERE id = ?3",
            rusqlite::params![total, last, mandate_id],
        )
        .map_err(|e| format!("Failed to update rollup for mandate {mandate_id}: {e}"))?;
    if changed == 0 {
        return Err(format!("Mandate {mandate_id} vanished before stats finalization"));
    }
    Ok(())
}
