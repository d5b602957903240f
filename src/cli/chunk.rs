use std::io::Read;

use crate::db::get_connection;
use crate::error::Result;
use crate::ingest::ingest_chunk;
use crate::models::ChunkRequest;
use crate::session::{new_session_id, SqliteSessionStore};
use crate::settings::{get_data_dir, load_settings};

pub fn run(payload: &str) -> Result<()> {
    let raw = if payload == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(payload)?
    };
    let mut request: ChunkRequest = serde_json::from_str(&raw)?;
    // A first chunk may omit the session id; later chunks must echo the one
    // printed in the first response.
    if request.session_id.trim().is_empty() && request.is_first_chunk {
        request.session_id = new_session_id();
    }

    let settings = load_settings();
    let db_path = get_data_dir().join("mandata.db");
    let mut conn = get_connection(&db_path)?;
    // The session store gets its own handle; the writer path needs the
    // data connection mutably for its transactions.
    let session_conn = get_connection(&db_path)?;
    let store = SqliteSessionStore::new(&session_conn);
    let response = ingest_chunk(&mut conn, &store, &request, &settings.ingest_options())?;

    // Keep stdout pure JSON; the session id goes to stderr so scripted
    // callers can pipe the response.
    eprintln!("Session: {}", request.session_id);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
