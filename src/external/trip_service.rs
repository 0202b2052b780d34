use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::TripFactory,
    entities::{Bid, Offer, Trip},
    error::{upstream_error, Error},
};

/// HTTP client for the trip service that owns trip records. The engine only
/// holds it to the `create_trip` contract; failures here surface as
/// dependency errors and trigger the match rollback.
#[derive(Clone, Debug)]
pub struct TripServiceClient {
    base_url: String,
    client: reqwest::Client,
}

impl TripServiceClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct CreateTripRequest {
    bid_id: Uuid,
    offer_id: Uuid,
    rider_id: Uuid,
    driver_id: Uuid,
    fare: i64,
}

#[derive(Deserialize)]
struct CreateTripResponse {
    trip: Option<Trip>,
}

#[async_trait]
impl TripFactory for TripServiceClient {
    #[tracing::instrument(skip(self, bid, offer))]
    async fn create_trip(&self, bid: &Bid, offer: &Offer) -> Result<Trip, Error> {
        let url = format!("{}/trips", self.base_url);

        let body = CreateTripRequest {
            bid_id: bid.id.clone(),
            offer_id: offer.id.clone(),
            rider_id: bid.rider_id.clone(),
            driver_id: offer.driver_id.clone(),
            fare: offer.counter_price,
        };

        let res = self.client.post(url).json(&body).send().await?;

        if res.status().as_u16() != 200 {
            return Err(upstream_error());
        }

        let data: CreateTripResponse = res.json().await?;

        Ok(data.trip.ok_or_else(|| upstream_error())?)
    }
}
