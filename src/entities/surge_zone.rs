use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A read-only pricing snapshot for one zone. Consumed at bid creation and
/// returned verbatim by the surge check endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SurgeZone {
    pub zone_id: String,
    pub multiplier: f64,
    pub reasons: Vec<String>,
    pub computed_at: DateTime<Utc>,
}
