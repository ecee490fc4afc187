use std::collections::BTreeMap;

use super::types::{CellValue, Sheet};
use super::utils::{leading_digit_run, parse_locale_number};
use crate::models::{CampaignOutcome, CampaignRequest, CampaignSummary, MeasurementRow, TrialStatistic};

/// Header block plus the two statistic rows need this many rows.
pub const MIN_CAMPAIGN_ROWS: usize = 10;
/// Row 10 in the workbook, first row of the measurement table.
pub const MEASUREMENT_START_ROW: usize = 9;

const NAME_CELL: (usize, usize) = (6, 1);
const CONCENTRATION_CELL: (usize, usize) = (0, 3);
const ETA_ROW: usize = 2;
const TAU_ROW: usize = 3;
const MEASUREMENT_COLUMNS: usize = 4;

/// Raw values of a fixed set of cell references; `None` when the cell is empty.
pub type CellSnapshot = BTreeMap<String, Option<CellValue>>;

pub fn extract_sheet_snapshot(sheet: &Sheet, cell_refs: &[&str]) -> CellSnapshot {
    cell_refs
        .iter()
        .map(|reference| {
            let value = sheet.cell_by_ref(reference);
            let value = (!value.is_empty()).then(|| value.clone());
            (reference.to_string(), value)
        })
        .collect()
}

/// Snapshot with every reference absent, for sheets that could not be read.
pub fn empty_snapshot(cell_refs: &[&str]) -> CellSnapshot {
    cell_refs.iter().map(|r| (r.to_string(), None)).collect()
}

pub fn extract_campaign(
    sheet: &Sheet,
    sheet_name: &str,
    sheet_index: usize,
    timestamp_seed: i64,
) -> CampaignOutcome {
    if sheet.row_count() < MIN_CAMPAIGN_ROWS {
        return CampaignOutcome::skipped(format!(
            "sheet has {} rows, at least {} are required",
            sheet.row_count(),
            MIN_CAMPAIGN_ROWS
        ));
    }

    let name_cell = sheet.cell(NAME_CELL.0, NAME_CELL.1);
    let display_name = if name_cell.is_truthy() {
        name_cell.display()
    } else {
        format!("Untitled campaign ({})", sheet_name)
    };

    let concentration_cell = sheet.cell(CONCENTRATION_CELL.0, CONCENTRATION_CELL.1);
    let concentration_percent = if concentration_cell.is_truthy() {
        leading_digit_run(&concentration_cell.display())
    } else {
        None
    };

    let summary = CampaignSummary {
        campaign_id: timestamp_seed + sheet_index as i64,
        display_name,
        concentration_percent,
        eta: extract_statistic(sheet, ETA_ROW),
        tau: extract_statistic(sheet, TAU_ROW),
    };

    CampaignOutcome::Created(CampaignRequest {
        sheet_index,
        sheet_name: sheet_name.to_string(),
        summary,
        measurements: extract_measurements(sheet),
    })
}

/// Columns B..D hold the three trials, column E their average.
fn extract_statistic(sheet: &Sheet, row: usize) -> TrialStatistic {
    let value = |col| parse_locale_number(sheet.cell(row, col)).unwrap_or(0.0);
    TrialStatistic {
        trials: [value(1), value(2), value(3)],
        average: value(4),
    }
}

/// Reads the measurement table until the first row without a shear rate.
/// Rows too narrow to hold a measurement are passed over.
fn extract_measurements(sheet: &Sheet) -> Vec<MeasurementRow> {
    let mut measurements = Vec::new();

    for row in MEASUREMENT_START_ROW..sheet.row_count() {
        if sheet.row_width(row) < MEASUREMENT_COLUMNS {
            continue;
        }

        let Some(shear_rate) = parse_locale_number(sheet.cell(row, 1)) else {
            break;
        };

        measurements.push(MeasurementRow {
            shear_rate,
            shear_stress: parse_locale_number(sheet.cell(row, 2)).unwrap_or(0.0),
            viscosity: parse_locale_number(sheet.cell(row, 3)).unwrap_or(0.0),
        });
    }

    measurements
}
