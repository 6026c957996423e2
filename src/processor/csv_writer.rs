use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::processor::{DashboardError, table::Table};

/// Writes a table as CSV with a header line. Nulls become empty fields;
/// fields containing commas, quotes or line breaks are quoted.
pub fn write_csv_table(table: &Table, path: &Path) -> Result<(), DashboardError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_csv(table, &mut writer)?;
    writer.flush()?;
    Ok(())
}

pub fn write_csv<W: Write>(table: &Table, out: &mut W) -> Result<(), DashboardError> {
    let header: Vec<String> = table.headers().iter().map(|h| quote(h)).collect();
    writeln!(out, "{}", header.join(","))?;

    let columns: Vec<_> = table.columns().map(|(_, c)| c).collect();
    let mut line = String::new();
    for row in 0..table.row_count() {
        line.clear();
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            if let Some(text) = column.text_at(row) {
                line.push_str(&quote(&text));
            }
        }
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
