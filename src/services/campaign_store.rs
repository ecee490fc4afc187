use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::AppError;
use crate::models::{CampaignRequest, StatisticKind};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS sample_summaries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    campaign_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    concentration REAL NOT NULL DEFAULT 0,
    m1 REAL NOT NULL DEFAULT 0,
    m2 REAL NOT NULL DEFAULT 0,
    m3 REAL NOT NULL DEFAULT 0,
    eta_average REAL NOT NULL DEFAULT 0,
    tau_average REAL NOT NULL DEFAULT 0,
    average REAL NOT NULL DEFAULT 0,
    kind TEXT NOT NULL CHECK (kind IN ('Eta', 'Tau')),
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sample_summaries_campaign ON sample_summaries (campaign_id);
CREATE TABLE IF NOT EXISTS measurement_details (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    summary_id INTEGER NOT NULL REFERENCES sample_summaries (id),
    shear_rate REAL NOT NULL,
    shear_stress REAL NOT NULL DEFAULT 0,
    viscosity REAL NOT NULL DEFAULT 0,
    campaign_name TEXT NOT NULL,
    campaign_id INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_measurement_details_campaign ON measurement_details (campaign_id);
";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SavedCampaign {
    pub eta_summary_id: i64,
    pub tau_summary_id: i64,
    pub measurement_count: usize,
}

/// One row per campaign, Eta and Tau summaries folded together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignOverview {
    pub campaign_id: i64,
    pub name: String,
    pub concentration: f64,
    pub eta_id: Option<i64>,
    pub tau_id: Option<i64>,
    pub eta_average: Option<f64>,
    pub tau_average: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRecord {
    pub id: i64,
    pub campaign_id: i64,
    pub name: String,
    pub concentration: f64,
    pub m1: f64,
    pub m2: f64,
    pub m3: f64,
    pub eta_average: f64,
    pub tau_average: f64,
    pub average: f64,
    pub kind: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRecord {
    pub id: i64,
    pub summary_id: i64,
    pub shear_rate: f64,
    pub shear_stress: f64,
    pub viscosity: f64,
    pub campaign_name: String,
    pub campaign_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignDetail {
    pub summaries: Vec<SummaryRecord>,
    pub measurements: Vec<MeasurementRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStatus {
    pub current_time: String,
    pub version: String,
}

/// SQLite-backed storage for extracted campaigns. Shared through `AppState`.
pub struct CampaignStore {
    conn: Mutex<Connection>,
}

impl CampaignStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        info!("Opening campaign database at {}", path.display());
        let conn = Connection::open(path).map_err(|e| {
            error!("Failed to open database {}: {}", path.display(), e);
            AppError::DatabaseError(e.to_string())
        })?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        debug!("Opening in-memory campaign database");
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, AppError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL).map_err(|e| {
            error!("Failed to create schema: {}", e);
            AppError::DatabaseError(e.to_string())
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Writes both summary rows and every measurement of one campaign in a
    /// single transaction. Measurements point at the Eta summary.
    pub fn save_campaign(&self, request: &CampaignRequest) -> Result<SavedCampaign, AppError> {
        let summary = &request.summary;
        info!(
            "Saving campaign {} ({}) with {} measurements",
            summary.campaign_id,
            summary.display_name,
            request.measurements.len()
        );

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let created_at = chrono::Utc::now().to_rfc3339();
        let concentration = summary.concentration_percent.unwrap_or(0.0);

        let mut summary_ids = [0i64; 2];
        for (slot, kind) in [StatisticKind::Eta, StatisticKind::Tau].into_iter().enumerate() {
            let stat = summary.statistic(kind);
            let (eta_average, tau_average) = match kind {
                StatisticKind::Eta => (stat.average, 0.0),
                StatisticKind::Tau => (0.0, stat.average),
            };
            tx.execute(
                "INSERT INTO sample_summaries \
                 (campaign_id, name, concentration, m1, m2, m3, eta_average, tau_average, average, kind, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    summary.campaign_id,
                    summary.display_name,
                    concentration,
                    stat.trials[0],
                    stat.trials[1],
                    stat.trials[2],
                    eta_average,
                    tau_average,
                    stat.average,
                    kind.as_str(),
                    created_at,
                ],
            )?;
            summary_ids[slot] = tx.last_insert_rowid();
        }
        let [eta_summary_id, tau_summary_id] = summary_ids;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO measurement_details \
                 (summary_id, shear_rate, shear_stress, viscosity, campaign_name, campaign_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (idx, m) in request.measurements.iter().enumerate() {
                if idx % 100 == 0 {
                    debug!("Inserting measurement {}/{}", idx, request.measurements.len());
                }
                stmt.execute(params![
                    eta_summary_id,
                    m.shear_rate,
                    m.shear_stress,
                    m.viscosity,
                    summary.display_name,
                    summary.campaign_id,
                ])?;
            }
        }

        tx.commit().map_err(|e| {
            error!("Failed to commit campaign {}: {}", summary.campaign_id, e);
            AppError::DatabaseError(e.to_string())
        })?;

        Ok(SavedCampaign {
            eta_summary_id,
            tau_summary_id,
            measurement_count: request.measurements.len(),
        })
    }

    pub fn list_campaigns(&self) -> Result<Vec<CampaignOverview>, AppError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT
                campaign_id,
                name,
                concentration,
                MAX(CASE WHEN kind = 'Eta' THEN id END),
                MAX(CASE WHEN kind = 'Tau' THEN id END),
                MAX(CASE WHEN kind = 'Eta' THEN average END),
                MAX(CASE WHEN kind = 'Tau' THEN average END),
                MIN(created_at)
             FROM sample_summaries
             GROUP BY campaign_id, name, concentration
             ORDER BY campaign_id DESC",
        )?;

        let campaigns = stmt
            .query_map([], |row| {
                Ok(CampaignOverview {
                    campaign_id: row.get(0)?,
                    name: row.get(1)?,
                    concentration: row.get(2)?,
                    eta_id: row.get(3)?,
                    tau_id: row.get(4)?,
                    eta_average: row.get(5)?,
                    tau_average: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Listed {} campaigns", campaigns.len());
        Ok(campaigns)
    }

    /// `None` when no summary carries this campaign id.
    pub fn campaign_detail(&self, campaign_id: i64) -> Result<Option<CampaignDetail>, AppError> {
        let conn = self.conn.lock();

        let summaries = conn
            .prepare(
                "SELECT id, campaign_id, name, concentration, m1, m2, m3, eta_average, tau_average, average, kind, created_at
                 FROM sample_summaries WHERE campaign_id = ?1 ORDER BY kind",
            )?
            .query_map([campaign_id], summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        if summaries.is_empty() {
            return Ok(None);
        }

        let measurements = conn
            .prepare(
                "SELECT id, summary_id, shear_rate, shear_stress, viscosity, campaign_name, campaign_id
                 FROM measurement_details WHERE campaign_id = ?1 ORDER BY id",
            )?
            .query_map([campaign_id], measurement_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(CampaignDetail {
            summaries,
            measurements,
        }))
    }

    pub fn status(&self) -> Result<StoreStatus, AppError> {
        let conn = self.conn.lock();
        let status = conn
            .query_row("SELECT datetime('now'), sqlite_version()", [], |row| {
                Ok(StoreStatus {
                    current_time: row.get(0)?,
                    version: row.get(1)?,
                })
            })
            .optional()?
            .ok_or_else(|| AppError::DatabaseError("status query returned no row".to_string()))?;
        Ok(status)
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<(), AppError> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<SummaryRecord> {
    Ok(SummaryRecord {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        name: row.get(2)?,
        concentration: row.get(3)?,
        m1: row.get(4)?,
        m2: row.get(5)?,
        m3: row.get(6)?,
        eta_average: row.get(7)?,
        tau_average: row.get(8)?,
        average: row.get(9)?,
        kind: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn measurement_from_row(row: &Row<'_>) -> rusqlite::Result<MeasurementRecord> {
    Ok(MeasurementRecord {
        id: row.get(0)?,
        summary_id: row.get(1)?,
        shear_rate: row.get(2)?,
        shear_stress: row.get(3)?,
        viscosity: row.get(4)?,
        campaign_name: row.get(5)?,
        campaign_id: row.get(6)?,
    })
}
