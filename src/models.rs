use serde::Serialize;

/// Which rheological model a summary row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatisticKind {
    Eta,
    Tau,
}

impl StatisticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticKind::Eta => "Eta",
            StatisticKind::Tau => "Tau",
        }
    }
}

/// Three repeated trials (M1/M2/M3) and their recorded average.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TrialStatistic {
    pub trials: [f64; 3],
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignSummary {
    pub campaign_id: i64,
    pub display_name: String,
    pub concentration_percent: Option<f64>,
    pub eta: TrialStatistic,
    pub tau: TrialStatistic,
}

impl CampaignSummary {
    pub fn statistic(&self, kind: StatisticKind) -> &TrialStatistic {
        match kind {
            StatisticKind::Eta => &self.eta,
            StatisticKind::Tau => &self.tau,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeasurementRow {
    pub shear_rate: f64,
    pub shear_stress: f64,
    pub viscosity: f64,
}

/// Everything needed to persist one sheet's campaign.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignRequest {
    pub sheet_index: usize,
    pub sheet_name: String,
    pub summary: CampaignSummary,
    pub measurements: Vec<MeasurementRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CampaignOutcome {
    Created(CampaignRequest),
    Skipped { reason: String },
}

impl CampaignOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        CampaignOutcome::Skipped {
            reason: reason.into(),
        }
    }
}
