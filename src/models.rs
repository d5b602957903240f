use serde::{Deserialize, Serialize};

/// One mandate row as delivered in a spreadsheet or chunk payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMandateRow {
    /// External reference id, as used by `RawValueRow::mandant_id`.
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub currency: Option<String>,
}

/// One day-value row as delivered in a spreadsheet or chunk payload.
/// Date and value stay raw strings until the locale parsers run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawValueRow {
    pub date: String,
    pub value: String,
    pub mandant_id: String,
    /// Display name, only used to label per-row errors.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Mandate {
    pub id: i64,
    pub external_ref: Option<String>,
    pub name: String,
    pub group: String,
    pub currency: Option<String>,
    pub is_active: bool,
    pub total_revenue: f64,
    pub last_entry: Option<String>,
}

/// Counters accumulated across one ingestion call, or cumulatively across
/// all chunks of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    pub processed_rows: usize,
    pub mandates_created: usize,
    pub mandates_updated: usize,
    pub values_created: usize,
    pub values_updated: usize,
    pub errors: Vec<String>,
}

/// Stats block of the single-shot report. `values_skipped` counts value rows
/// that overwrote an existing (date, mandate) pair instead of creating one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStats {
    pub mandates_created: usize,
    pub mandates_updated: usize,
    pub values_created: usize,
    pub values_skipped: usize,
    pub errors: Vec<String>,
}

impl From<&IngestStats> for ReportStats {
    fn from(stats: &IngestStats) -> Self {
        Self {
            mandates_created: stats.mandates_created,
            mandates_updated: stats.mandates_updated,
            values_created: stats.values_created,
            values_skipped: stats.values_updated,
            errors: stats.errors.clone(),
        }
    }
}

/// Response of the single-shot entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub success: bool,
    pub message: String,
    pub stats: ReportStats,
}

/// Request payload of the chunked entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRequest {
    #[serde(default)]
    pub session_id: String,
    /// Uploading user, resolved by the caller; opaque here.
    #[serde(default)]
    pub owner: Option<String>,
    pub chunk_index: u32,
    pub total_chunks: u32,
    #[serde(default)]
    pub mandates: Vec<RawMandateRow>,
    #[serde(default)]
    pub day_values: Vec<RawValueRow>,
    #[serde(default)]
    pub is_first_chunk: bool,
    #[serde(default)]
    pub is_last_chunk: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub processed_rows: usize,
    pub percentage: f64,
}

/// Attached to the last chunk's response once stats finalization has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalStats {
    pub stats: IngestStats,
    pub mandates_finalized: usize,
}

/// Response of the chunked entry point. `stats` is cumulative for the whole
/// session; `errors` carries this chunk's errors only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResponse {
    pub success: bool,
    pub progress: Progress,
    pub stats: IngestStats,
    pub errors: Vec<String>,
    pub is_complete: bool,
    pub final_stats: Option<FinalStats>,
}
