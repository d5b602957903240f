use comfy_table::{Cell, Table};

use crate::db::{get_connection, list_mandates};
use crate::error::Result;
use crate::fmt::amount;
use crate::settings::get_data_dir;

pub fn run() -> Result<()> {
    let conn = get_connection(&get_data_dir().join("mandata.db"))?;
    let mandates = list_mandates(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Group", "Currency", "Active", "Total Revenue", "Last Entry"]);
    for m in mandates {
        table.add_row(vec![
            Cell::new(m.id),
            Cell::new(m.name),
            Cell::new(m.group),
            Cell::new(m.currency.unwrap_or_default()),
            Cell::new(if m.is_active { "yes" } else { "no" }),
            Cell::new(amount(m.total_revenue)),
            Cell::new(m.last_entry.unwrap_or_default()),
        ]);
    }
    println!("Mandates\n{table}");
    Ok(())
}
