use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::models::{CampaignOutcome, CampaignRequest};
use crate::services::campaign_store::CampaignStore;
use crate::services::excel::extractor::{empty_snapshot, extract_campaign, extract_sheet_snapshot, CellSnapshot};
use crate::services::excel::types::{Sheet, Workbook};
use crate::services::excel::utils::SNAPSHOT_CELL_REFS;

/// Outcome of extracting one sheet, before anything is written.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetExtraction {
    pub index: usize,
    pub name: String,
    pub outcome: CampaignOutcome,
}

#[derive(Debug, Clone)]
pub struct WorkbookExtraction {
    pub sheets: Vec<SheetExtraction>,
    pub snapshots: BTreeMap<String, CellSnapshot>,
    pub sheet_names: Vec<String>,
    pub sheet_data: BTreeMap<String, Sheet>,
}

impl WorkbookExtraction {
    pub fn created(&self) -> impl Iterator<Item = &CampaignRequest> {
        self.sheets.iter().filter_map(|s| match &s.outcome {
            CampaignOutcome::Created(request) => Some(request),
            CampaignOutcome::Skipped { .. } => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetStatus {
    Created,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetReport {
    pub index: usize,
    pub name: String,
    pub status: SheetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_summary_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau_summary_id: Option<i64>,
    pub measurement_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SheetReport {
    fn new(index: usize, name: &str, status: SheetStatus) -> Self {
        Self {
            index,
            name: name.to_string(),
            status,
            campaign_id: None,
            display_name: None,
            eta_summary_id: None,
            tau_summary_id: None,
            measurement_count: 0,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub total_sheets: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub sheet_names: Vec<String>,
    pub sheets: Vec<SheetReport>,
    pub cell_snapshots: BTreeMap<String, CellSnapshot>,
    pub sheet_data: BTreeMap<String, Sheet>,
}

/// Extracts a campaign and a cell snapshot from every sheet. Never fails:
/// unreadable or undersized sheets come back as skipped entries. The decoded
/// sheets move into the extraction for the report.
pub fn process_workbook(workbook: Workbook, timestamp_seed: i64) -> WorkbookExtraction {
    let start = std::time::Instant::now();
    tracing::info!("Processing {} sheets", workbook.entries.len());

    let results: Vec<(SheetExtraction, CellSnapshot)> = workbook
        .entries
        .par_iter()
        .enumerate()
        .map(|(index, entry)| match &entry.sheet {
            Ok(sheet) => {
                let outcome = extract_campaign(sheet, &entry.name, index, timestamp_seed);
                if let CampaignOutcome::Skipped { reason } = &outcome {
                    tracing::warn!("Skipping sheet {} ({}): {}", index, entry.name, reason);
                }
                let snapshot = extract_sheet_snapshot(sheet, &SNAPSHOT_CELL_REFS);
                (
                    SheetExtraction {
                        index,
                        name: entry.name.clone(),
                        outcome,
                    },
                    snapshot,
                )
            }
            Err(e) => {
                tracing::error!("Sheet {} ({}) could not be read: {}", index, entry.name, e);
                (
                    SheetExtraction {
                        index,
                        name: entry.name.clone(),
                        outcome: CampaignOutcome::skipped(format!("sheet could not be read: {}", e)),
                    },
                    empty_snapshot(&SNAPSHOT_CELL_REFS),
                )
            }
        })
        .collect();

    let mut sheets = Vec::with_capacity(results.len());
    let mut snapshots = BTreeMap::new();
    for (extraction, snapshot) in results {
        snapshots.insert(extraction.name.clone(), snapshot);
        sheets.push(extraction);
    }

    let sheet_names = workbook.sheet_names();
    let sheet_data = workbook
        .entries
        .into_iter()
        .filter_map(|e| e.sheet.ok().map(|sheet| (e.name, sheet)))
        .collect();

    tracing::info!("Workbook extracted in {:?}", start.elapsed());
    WorkbookExtraction {
        sheets,
        snapshots,
        sheet_names,
        sheet_data,
    }
}

/// Saves each extracted campaign in sheet order. A sheet whose write fails is
/// reported as failed; campaigns already written stay committed.
pub fn persist_campaigns(store: &CampaignStore, extraction: WorkbookExtraction) -> UploadReport {
    let mut reports = Vec::with_capacity(extraction.sheets.len());

    for sheet in &extraction.sheets {
        let report = match &sheet.outcome {
            CampaignOutcome::Skipped { reason } => SheetReport {
                reason: Some(reason.clone()),
                ..SheetReport::new(sheet.index, &sheet.name, SheetStatus::Skipped)
            },
            CampaignOutcome::Created(request) => {
                let base = SheetReport {
                    campaign_id: Some(request.summary.campaign_id),
                    display_name: Some(request.summary.display_name.clone()),
                    ..SheetReport::new(sheet.index, &sheet.name, SheetStatus::Created)
                };
                match store.save_campaign(request) {
                    Ok(saved) => {
                        tracing::info!(
                            "Campaign \"{}\" saved with {} measurements",
                            request.summary.display_name,
                            saved.measurement_count
                        );
                        SheetReport {
                            eta_summary_id: Some(saved.eta_summary_id),
                            tau_summary_id: Some(saved.tau_summary_id),
                            measurement_count: saved.measurement_count,
                            ..base
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to save campaign for sheet {}: {}", sheet.name, e);
                        SheetReport {
                            status: SheetStatus::Failed,
                            reason: Some(e.to_string()),
                            ..base
                        }
                    }
                }
            }
        };
        reports.push(report);
    }

    let count = |status| reports.iter().filter(|r| r.status == status).count();
    let (created, skipped, failed) = (
        count(SheetStatus::Created),
        count(SheetStatus::Skipped),
        count(SheetStatus::Failed),
    );
    tracing::info!(
        "Upload processed: {} sheets, {} created, {} skipped, {} failed",
        reports.len(),
        created,
        skipped,
        failed
    );

    UploadReport {
        total_sheets: reports.len(),
        created,
        skipped,
        failed,
        sheet_names: extraction.sheet_names,
        sheets: reports,
        cell_snapshots: extraction.snapshots,
        sheet_data: extraction.sheet_data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::excel::types::{CellValue, WorksheetEntry};

    fn campaign_sheet(name: &str, rates: &[f64]) -> Sheet {
        let mut rows = vec![vec![CellValue::Empty; 5]; 9];
        rows[6][1] = CellValue::Text(format!("Muestra {}", name));
        for &rate in rates {
            rows.push(vec![CellValue::Empty, rate.into(), 1.0.into(), 1.0.into()]);
        }
        Sheet::new(name, rows)
    }

    fn three_sheet_workbook() -> Workbook {
        Workbook {
            entries: vec![
                WorksheetEntry {
                    name: "ProjA".to_string(),
                    sheet: Ok(campaign_sheet("ProjA", &[1.0, 2.0])),
                },
                WorksheetEntry {
                    name: "Broken".to_string(),
                    sheet: Err("corrupt sheet xml".to_string()),
                },
                WorksheetEntry {
                    name: "ProjC".to_string(),
                    sheet: Ok(campaign_sheet("ProjC", &[5.0])),
                },
            ],
        }
    }

    #[test]
    fn test_failed_sheet_does_not_stop_the_batch() {
        let extraction = process_workbook(three_sheet_workbook(), 1000);

        assert_eq!(extraction.sheet_names, vec!["ProjA", "Broken", "ProjC"]);
        assert_eq!(extraction.sheets.len(), 3);
        assert!(matches!(extraction.sheets[0].outcome, CampaignOutcome::Created(_)));
        match &extraction.sheets[1].outcome {
            CampaignOutcome::Skipped { reason } => assert!(reason.contains("corrupt sheet xml")),
            other => panic!("expected skip, got {:?}", other),
        }
        assert!(matches!(extraction.sheets[2].outcome, CampaignOutcome::Created(_)));

        let ids: Vec<i64> = extraction.created().map(|r| r.summary.campaign_id).collect();
        assert_eq!(ids, vec![1000, 1002]);
    }

    #[test]
    fn test_every_sheet_gets_a_snapshot() {
        let extraction = process_workbook(three_sheet_workbook(), 0);

        assert_eq!(extraction.snapshots.len(), 3);
        assert!(extraction.snapshots.values().all(|s| s.len() == 12));
        assert_eq!(
            extraction.snapshots["ProjA"]["B7"],
            Some(CellValue::Text("Muestra ProjA".to_string()))
        );
        assert!(extraction.snapshots["Broken"].values().all(Option::is_none));
        assert!(!extraction.sheet_data.contains_key("Broken"));
    }

    #[test]
    fn test_duplicate_names_get_distinct_ids() {
        let sheets: Vec<Sheet> = ["Hoja1", "Hoja2"]
            .iter()
            .map(|name| {
                let mut sheet = campaign_sheet(name, &[1.0]);
                sheet.rows[6][1] = CellValue::Text("Planta A".to_string());
                sheet
            })
            .collect();
        let extraction = process_workbook(Workbook::from_sheets(sheets), 50);
        let names: Vec<&str> = extraction.created().map(|r| r.summary.display_name.as_str()).collect();
        let ids: Vec<i64> = extraction.created().map(|r| r.summary.campaign_id).collect();

        assert_eq!(names, vec!["Planta A", "Planta A"]);
        assert_eq!(ids, vec![50, 51]);
    }

    #[test]
    fn test_persist_reports_each_sheet() {
        let store = CampaignStore::open_in_memory().unwrap();
        let extraction = process_workbook(three_sheet_workbook(), 1000);
        let report = persist_campaigns(&store, extraction);

        assert_eq!(report.total_sheets, 3);
        assert_eq!((report.created, report.skipped, report.failed), (2, 1, 0));
        assert_eq!(report.sheets[0].measurement_count, 2);
        assert_eq!(report.sheets[1].status, SheetStatus::Skipped);
        assert_eq!(report.sheets[2].campaign_id, Some(1002));

        assert_eq!(store.list_campaigns().unwrap().len(), 2);
    }

    #[test]
    fn test_write_failure_is_reported_per_sheet() {
        let store = CampaignStore::open_in_memory().unwrap();
        let workbook = Workbook::from_sheets(vec![
            campaign_sheet("First", &[1.0]),
            campaign_sheet("Second", &[1.0]),
        ]);
        let first = process_workbook(Workbook::from_sheets(vec![campaign_sheet("Early", &[1.0])]), 1);
        assert_eq!(persist_campaigns(&store, first).created, 1);
        store.execute_batch("DROP TABLE measurement_details;").unwrap();

        let report = persist_campaigns(&store, process_workbook(workbook, 10));
        assert_eq!(report.failed, 2);
        assert!(report.sheets.iter().all(|s| s.reason.is_some()));
        assert_eq!(store.list_campaigns().unwrap().len(), 1);
    }
}
