use comfy_table::{Cell, Table};

use crate::db::{find_account, get_connection};
use crate::error::Result;
use crate::exclusions::list_exclusions;
use crate::settings::get_data_dir;

pub fn list(account: &str) -> Result<()> {
    let conn = get_connection(&get_data_dir().join("reckon.db"))?;
    let account = find_account(&conn, account)?;
    let rows = list_exclusions(&conn, account.id)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Created", "Overridden", "Members", "Note"]);
    for e in rows {
        table.add_row(vec![
            Cell::new(e.id),
            Cell::new(e.created_at),
            Cell::new(format!("{:.0}%", e.overridden_confidence * 100.0)),
            Cell::new(e.id_set.join(", ")),
            Cell::new(e.note.unwrap_or_default()),
        ]);
    }
    println!("Exclusions for {}\n{table}", account.name);
    Ok(())
}
