use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};
use tracing::warn;

use crate::reconcile::error::Result;
use crate::reconcile::model::{Cell, CellValue, Sheet};

const DATE_FORMAT: &str = "dd.mm.yyyy hh:mm";
const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// Writes the sheet as a single-worksheet workbook at the given path.
pub fn write_sheet(path: &Path, sheet: &Sheet) -> Result<()> {
    let mut workbook = build_workbook(sheet)?;
    workbook.save(path)?;
    Ok(())
}

/// Serialises the sheet into `.xlsx` bytes.
pub fn sheet_to_buffer(sheet: &Sheet) -> Result<Vec<u8>> {
    let mut workbook = build_workbook(sheet)?;
    Ok(workbook.save_to_buffer()?)
}

fn build_workbook(sheet: &Sheet) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format(DATE_FORMAT);

    let worksheet = workbook.add_worksheet();
    let name = if sheet.name.trim().is_empty() {
        DEFAULT_SHEET_NAME
    } else {
        sheet.name.as_str()
    };
    worksheet.set_name(name)?;

    for ((row, column), cell) in sheet.cells() {
        // Sheet coordinates are 1-based, the writer's are 0-based.
        let (row, column) = (row - 1, (column - 1) as u16);
        write_cell(worksheet, row, column, cell, &date_format)?;
    }

    Ok(workbook)
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    column: u16,
    cell: &Cell,
    date_format: &Format,
) -> Result<()> {
    if let Some(target) = &cell.hyperlink {
        let text = cell.value.to_string();
        let link = target
            .strip_prefix('#')
            .map(|location| format!("internal:{location}"))
            .unwrap_or_else(|| target.clone());
        match worksheet.write_url_with_text(row, column, link.as_str(), text.as_str()) {
            Ok(_) => return Ok(()),
            Err(error) => {
                warn!(row, column, target = %target, %error, "hyperlink dropped, writing value only");
            }
        }
    }

    match &cell.value {
        CellValue::Empty => {}
        CellValue::Text(text) => {
            worksheet.write_string(row, column, text)?;
        }
        CellValue::Number(value) => {
            worksheet.write_number(row, column, *value)?;
        }
        CellValue::Bool(value) => {
            worksheet.write_boolean(row, column, *value)?;
        }
        CellValue::DateTime(serial) => {
            worksheet.write_number_with_format(row, column, *serial, date_format)?;
        }
    }
    Ok(())
}
