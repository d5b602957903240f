use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::{amount, format_bytes};
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join("mandata.db");

    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());
    println!("Dates:      {}", if settings.month_first { "month-first" } else { "day-first" });

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:    {}", format_bytes(size));

        let conn = get_connection(&db_path)?;
        let mandates: i64 = conn.query_row("SELECT count(*) FROM mandates", [], |r| r.get(0))?;
        let values: i64 = conn.query_row("SELECT count(*) FROM day_values", [], |r| r.get(0))?;
        let imports: i64 = conn.query_row("SELECT count(*) FROM imports", [], |r| r.get(0))?;
        let sessions: i64 =
            conn.query_row("SELECT count(*) FROM import_sessions", [], |r| r.get(0))?;
        let revenue: f64 = conn.query_row(
            "SELECT COALESCE(SUM(total_revenue), 0) FROM mandates",
            [],
            |r| r.get(0),
        )?;

        println!();
        println!("Mandates:       {mandates}");
        println!("Day values:     {values}");
        println!("Imports:        {imports}");
        println!("Sessions:       {sessions}");
        println!("Total revenue:  {}", amount(revenue));
    } else {
        println!();
        println!("Database not found. Run `mandata init` to set up.");
    }

    Ok(())
}
