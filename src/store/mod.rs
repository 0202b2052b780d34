mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{Bid, BoundingBox, Offer, ScheduledRide};
use crate::error::Error;

/// Durable record of bids, offers and scheduled rides.
///
/// Every state-changing bid operation is a single atomic conditional update
/// keyed on the bid's current status: a per-bid lock in memory, a row lock
/// plus conditional write in Postgres. Nothing here ever locks across two
/// bids, and nothing holds a bid's lock across a network call.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_bid(&self, bid: &Bid) -> Result<(), Error>;
    async fn find_bid(&self, id: Uuid) -> Result<Bid, Error>;
    async fn list_open_bids(
        &self,
        bounds: Option<BoundingBox>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Bid>, Error>;
    async fn open_bids_due(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, Error>;

    /// Compare-and-set open -> matched. Fails with `BidExpired` when the
    /// deadline has passed (flipping the bid to expired as a side effect)
    /// and `BidAlreadyClosed` when another transition won.
    async fn mark_matched(&self, id: Uuid, offer_id: Uuid, now: DateTime<Utc>)
        -> Result<Bid, Error>;

    /// Compensating compare-and-set matched -> open, used when trip
    /// creation fails after a successful match.
    async fn revert_matched(&self, id: Uuid) -> Result<Bid, Error>;

    /// Compare-and-set open -> cancelled.
    async fn mark_cancelled(&self, id: Uuid, now: DateTime<Utc>) -> Result<Bid, Error>;

    /// Compare-and-set open -> expired. Returns false when the bid already
    /// reached a terminal state, so sweeps are idempotent.
    async fn mark_expired(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, Error>;

    /// Appends an offer, re-checking the bid's status and deadline at write
    /// time under the same lock that guards status transitions.
    async fn insert_offer(&self, offer: &Offer, now: DateTime<Utc>) -> Result<(), Error>;
    async fn list_offers(&self, bid_id: Uuid) -> Result<Vec<Offer>, Error>;

    async fn insert_scheduled_ride(&self, ride: &ScheduledRide) -> Result<(), Error>;
    async fn find_scheduled_ride(&self, id: Uuid) -> Result<ScheduledRide, Error>;
    async fn list_upcoming_rides(&self, rider_id: Uuid) -> Result<Vec<ScheduledRide>, Error>;
    async fn cancel_scheduled_ride(&self, id: Uuid) -> Result<ScheduledRide, Error>;
}
