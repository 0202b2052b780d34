use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{
    Bid, BidSummary, BoundingBox, Coordinates, Offer, Place, RideType, ScheduledRide, SurgeZone,
    Trip,
};
use crate::error::Error;

/// Published on every bid state change. Collaborators subscribe instead of
/// polling; a plain re-query remains a valid (if wasteful) strategy.
#[derive(Clone, Debug)]
pub enum BidEvent {
    Opened { bid_id: Uuid },
    OfferSubmitted { bid_id: Uuid, offer_id: Uuid },
    Closed { bid_id: Uuid, status: String },
}

#[derive(Clone, Debug, Default)]
pub struct OpenBidQuery {
    pub zone: Option<String>,
    pub bounds: Option<BoundingBox>,
}

#[derive(Clone, Debug)]
pub enum SurgeTarget {
    Zone(String),
    Point(Coordinates),
}

#[async_trait]
pub trait BidAPI {
    async fn create_bid(
        &self,
        user: User,
        pickup: Place,
        dropoff: Place,
        ride_type: RideType,
        offered_price: i64,
    ) -> Result<Bid, Error>;

    async fn find_bid(&self, id: Uuid) -> Result<Bid, Error>;

    async fn list_open_bids(&self, query: OpenBidQuery) -> Result<Vec<BidSummary>, Error>;

    async fn cancel_bid(&self, user: User, id: Uuid) -> Result<Bid, Error>;

    fn subscribe(&self) -> broadcast::Receiver<BidEvent>;
}

#[async_trait]
pub trait OfferAPI {
    async fn submit_offer(
        &self,
        bid_id: Uuid,
        driver_id: Uuid,
        driver_rating: f64,
        counter_price: i64,
        message: Option<String>,
    ) -> Result<Offer, Error>;

    async fn list_offers(&self, bid_id: Uuid, include_superseded: bool)
        -> Result<Vec<Offer>, Error>;
}

#[async_trait]
pub trait MatchAPI {
    async fn accept_offer(&self, user: User, bid_id: Uuid, offer_id: Uuid) -> Result<Trip, Error>;
}

#[async_trait]
pub trait SurgeAPI {
    async fn check_surge(&self, target: SurgeTarget) -> Result<SurgeZone, Error>;
}

#[async_trait]
pub trait ScheduleAPI {
    async fn schedule_ride(
        &self,
        user: User,
        pickup: Place,
        dropoff: Place,
        ride_type: RideType,
        scheduled_time: DateTime<Utc>,
    ) -> Result<ScheduledRide, Error>;

    async fn list_scheduled_rides(&self, user: User) -> Result<Vec<ScheduledRide>, Error>;

    async fn cancel_scheduled_ride(&self, user: User, id: Uuid) -> Result<ScheduledRide, Error>;
}

/// The one contract the engine calls out to. Exactly one trip is created
/// per matched bid; a failure here rolls the match back.
#[async_trait]
pub trait TripFactory: Send + Sync {
    async fn create_trip(&self, bid: &Bid, offer: &Offer) -> Result<Trip, Error>;
}

pub trait API: BidAPI + OfferAPI + MatchAPI + SurgeAPI + ScheduleAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
