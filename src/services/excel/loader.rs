use std::io::Cursor;

use bytes::Bytes;
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};

use super::types::{CellValue, Sheet, Workbook, WorksheetEntry};
use crate::error::AppError;

pub fn load_workbook_from_bytes(file_data: Bytes) -> Result<Workbook, AppError> {
    let start = std::time::Instant::now();
    tracing::info!("Opening workbook ({}KB)", file_data.len() / 1024);

    let cursor = Cursor::new(file_data);
    let mut workbook = open_workbook_auto_from_rs(cursor).map_err(|e| {
        tracing::error!("Failed to open workbook: {}", e);
        AppError::UnreadableWorkbook(e.to_string())
    })?;

    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        tracing::error!("Workbook contains no sheets");
        return Err(AppError::UnreadableWorkbook("workbook contains no sheets".to_string()));
    }
    tracing::info!("Found {} sheets: {:?}", sheet_names.len(), sheet_names);

    let entries = sheet_names
        .into_iter()
        .map(|name| {
            let sheet = match workbook.worksheet_range(&name) {
                Ok(range) => Ok(sheet_from_range(&name, &range)),
                Err(e) => {
                    tracing::warn!("Failed to read worksheet {}: {}", name, e);
                    Err(e.to_string())
                }
            };
            WorksheetEntry { name, sheet }
        })
        .collect();

    tracing::info!("Workbook decoded in {:?}", start.elapsed());
    Ok(Workbook { entries })
}

/// Keeps only the used range. calamine ranges begin at the first used cell,
/// which becomes the sheet origin.
pub fn sheet_from_range(name: &str, range: &Range<Data>) -> Sheet {
    let Some((start_row, start_col)) = range.start() else {
        return Sheet::new(name, Vec::new());
    };
    let rows: Vec<Vec<CellValue>> = range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect();

    Sheet::with_origin(name, (start_row as usize, start_col as usize), rows)
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::DateTime(d) => CellValue::Number(d.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}
