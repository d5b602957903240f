use chrono::{Duration, Utc};
use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::session::{SessionStatus, SessionStore, SqliteSessionStore};
use crate::settings::{get_data_dir, load_settings};

pub fn run(purge: bool) -> Result<()> {
    let settings = load_settings();
    let conn = get_connection(&get_data_dir().join("mandata.db"))?;
    let store = SqliteSessionStore::new(&conn);

    if purge {
        let removed =
            store.expire(Utc::now(), Duration::seconds(settings.session_grace_secs))?;
        println!("Purged {removed} expired session(s).");
    }

    let sessions = store.list()?;
    if sessions.is_empty() {
        println!("No import sessions.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Session", "Owner", "Status", "Rows", "Mandates", "Values", "Errors", "Started"]);
    for s in sessions {
        let status = match s.status {
            SessionStatus::Pending => "pending",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        };
        table.add_row(vec![
            Cell::new(&s.session_id),
            Cell::new(s.owner.as_deref().unwrap_or("")),
            Cell::new(status),
            Cell::new(s.stats.processed_rows),
            Cell::new(s.stats.mandates_created + s.stats.mandates_updated),
            Cell::new(s.stats.values_created + s.stats.values_updated),
            Cell::new(s.stats.errors.len()),
            Cell::new(s.created_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    println!("Import sessions\n{table}");
    Ok(())
}
