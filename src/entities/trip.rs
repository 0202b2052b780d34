use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Bid, Offer};

/// The record handed back by the trip factory. The engine never mutates a
/// trip; it only guarantees at most one exists per bid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub bid_id: Uuid,
    pub offer_id: Uuid,
    pub rider_id: Uuid,
    pub driver_id: Uuid,
    pub fare: i64,
    pub created_at: DateTime<Utc>,
}

impl Trip {
    pub fn new(bid: &Bid, offer: &Offer) -> Self {
        Self {
            id: Uuid::new_v4(),
            bid_id: bid.id.clone(),
            offer_id: offer.id.clone(),
            rider_id: bid.rider_id.clone(),
            driver_id: offer.driver_id.clone(),
            fare: offer.counter_price,
            created_at: Utc::now(),
        }
    }
}
