use anyhow::Context;
use chrono::Local;
use rust_xlsxwriter::{Format, Workbook};

use crate::config;
use crate::intake::types::ExtractedRecord;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

/// Fixed-column projection of a record selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTable {
    pub headers: [&'static str; 9],
    pub rows: Vec<Vec<Cell>>,
}

/// One row per record, in the given order.
pub fn project(records: &[ExtractedRecord]) -> ExportTable {
    let rows = records
        .iter()
        .map(|r| {
            vec![
                Cell::Text(r.id.clone()),
                Cell::Text(r.doc_type.to_string()),
                Cell::Text(r.sender_name.clone()),
                Cell::Text(r.sender_email.clone()),
                Cell::Text(r.file_name.clone()),
                Cell::Number(r.amount),
                Cell::Text(r.currency.clone()),
                Cell::Text(r.summary.clone()),
                Cell::Text(
                    r.processed_at
                        .with_timezone(&Local)
                        .format(config::export::DATE_FORMAT)
                        .to_string(),
                ),
            ]
        })
        .collect();

    ExportTable { headers: config::export::HEADERS, rows }
}

/// Render as a single-sheet `.xlsx` workbook.
pub fn render_xlsx(table: &ExportTable) -> anyhow::Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet
        .set_name(config::export::SHEET_NAME)
        .context("failed naming export sheet")?;

    for (col, (header, width)) in table
        .headers
        .iter()
        .zip(config::export::COLUMN_WIDTHS)
        .enumerate()
    {
        let col = col as u16;
        sheet.write_string_with_format(0, col, *header, &header_format)?;
        sheet.set_column_width(col, width)?;
    }

    for (i, row) in table.rows.iter().enumerate() {
        let row_idx = (i + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(s) => sheet.write_string(row_idx, col, s.as_str())?,
                Cell::Number(n) => sheet.write_number(row_idx, col, *n)?,
            };
        }
    }

    let bytes = workbook.save_to_buffer().context("failed rendering export workbook")?;
    Ok(bytes)
}
