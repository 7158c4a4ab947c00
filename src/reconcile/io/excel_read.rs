use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{DataType, Reader, Xlsx};
use tracing::debug;

use crate::reconcile::error::{ReconcileError, Result};
use crate::reconcile::io::hyperlinks::read_active_sheet;
use crate::reconcile::model::{CellValue, Sheet};

/// Reads the active worksheet of an `.xlsx`/`.xlsm` file, values and
/// hyperlinks included.
pub fn load_sheet(path: &Path) -> Result<Sheet> {
    if !path.exists() {
        return Err(ReconcileError::MissingInput(path.to_path_buf()));
    }
    let bytes = fs::read(path)?;
    load_sheet_from_bytes(&bytes)
}

/// Same as [`load_sheet`] for a workbook already held in memory.
pub fn load_sheet_from_bytes(bytes: &[u8]) -> Result<Sheet> {
    let active = read_active_sheet(bytes)?;
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let names = workbook.sheet_names().to_vec();
    let name = names
        .get(active.index)
        .or_else(|| names.first())
        .cloned()
        .ok_or_else(|| ReconcileError::InvalidWorkbook("workbook has no worksheets".into()))?;

    let range = read_required_sheet(&mut workbook, &name)?;
    let mut sheet = Sheet::new(name);

    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    for (row_idx, row) in range.rows().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            let value = cell_to_value(cell);
            if value == CellValue::Empty {
                continue;
            }
            sheet.set_value(
                first_row + row_idx as u32 + 1,
                first_col + col_idx as u32 + 1,
                value,
            );
        }
    }

    // Range links only cover cells inside the populated area.
    let (max_row, max_column) = (sheet.last_row(), sheet.last_column());
    let mut hyperlinks = 0;
    for link in &active.hyperlinks {
        for (row, column) in link.positions(max_row, max_column) {
            sheet.set_hyperlink(row, column, link.target.clone());
            hyperlinks += 1;
        }
    }

    debug!(
        sheet = %sheet.name,
        last_row = sheet.last_row(),
        last_column = sheet.last_column(),
        hyperlinks,
        "worksheet loaded"
    );
    Ok(sheet)
}

fn read_required_sheet<R: Read + Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<calamine::Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ReconcileError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(ReconcileError::from)?;
    Ok(range)
}

fn cell_to_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Float(value) => CellValue::Number(*value),
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Bool(value) => CellValue::Bool(*value),
        DataType::DateTime(serial) => CellValue::DateTime(*serial),
        DataType::Empty => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}
