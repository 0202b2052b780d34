use axum::extract::{Extension, Json, Path, Query};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::api::{BidAPI, BidEvent, DynAPI, MatchAPI, OpenBidQuery};
use crate::auth::User;
use crate::entities::{Bid, BidSummary, BoundingBox, Place, RideType, Trip};
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    rider_id: Uuid,
    pickup: Place,
    dropoff: Place,
    ride_type: RideType,
    offered_price: i64,
}

#[derive(Serialize, Deserialize)]
pub struct ListParams {
    zone: Option<String>,
    min_lat: Option<f64>,
    min_lng: Option<f64>,
    max_lat: Option<f64>,
    max_lng: Option<f64>,
    /// long-poll: block up to this many seconds for an open bid to appear
    wait_secs: Option<u64>,
}

#[derive(Serialize, Deserialize)]
pub struct AcceptParams {
    rider_id: Uuid,
    offer_id: Uuid,
}

#[derive(Serialize, Deserialize)]
pub struct CancelParams {
    rider_id: Uuid,
}

impl ListParams {
    fn to_query(&self) -> OpenBidQuery {
        let bounds = match (self.min_lat, self.min_lng, self.max_lat, self.max_lng) {
            (Some(min_lat), Some(min_lng), Some(max_lat), Some(max_lng)) => Some(BoundingBox {
                min_lat,
                min_lng,
                max_lat,
                max_lng,
            }),
            _ => None,
        };

        OpenBidQuery {
            zone: self.zone.clone(),
            bounds,
        }
    }
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    Json(params): Json<CreateParams>,
) -> Result<Json<Bid>, Error> {
    let bid = api
        .create_bid(
            User::new(params.rider_id),
            params.pickup,
            params.dropoff,
            params.ride_type,
            params.offered_price,
        )
        .await?;

    Ok(bid.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Bid>, Error> {
    let bid = api.find_bid(id).await?;

    Ok(bid.into())
}

pub async fn list_open(
    Extension(api): Extension<DynAPI>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<BidSummary>>, Error> {
    let query = params.to_query();

    let mut summaries = api.list_open_bids(query.clone()).await?;

    // push-capable listing: wait for a bid to open instead of hammering the
    // endpoint on an interval
    if summaries.is_empty() {
        if let Some(wait_secs) = params.wait_secs {
            let deadline =
                tokio::time::Instant::now() + Duration::from_secs(wait_secs.min(30));
            let mut events = api.subscribe();

            loop {
                match tokio::time::timeout_at(deadline, events.recv()).await {
                    Ok(Ok(BidEvent::Opened { bid_id: _ })) => {
                        summaries = api.list_open_bids(query.clone()).await?;

                        if !summaries.is_empty() {
                            break;
                        }
                    }
                    Ok(Ok(_)) => continue,
                    Ok(Err(RecvError::Lagged(_))) => continue,
                    Ok(Err(RecvError::Closed)) => break,
                    Err(_) => break,
                }
            }
        }
    }

    Ok(summaries.into())
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<AcceptParams>,
) -> Result<Json<Trip>, Error> {
    let trip = api
        .accept_offer(User::new(params.rider_id), id, params.offer_id)
        .await?;

    Ok(trip.into())
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<CancelParams>,
) -> Result<Json<Bid>, Error> {
    let bid = api.cancel_bid(User::new(params.rider_id), id).await?;

    Ok(bid.into())
}
