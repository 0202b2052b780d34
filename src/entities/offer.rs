use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub bid_id: Uuid,
    pub driver_id: Uuid,
    pub driver_rating: f64,
    pub counter_price: i64,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    pub fn new(
        bid_id: Uuid,
        driver_id: Uuid,
        driver_rating: f64,
        counter_price: i64,
        message: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bid_id,
            driver_id,
            driver_rating,
            counter_price,
            message,
            created_at: Utc::now(),
        }
    }
}
