use chrono::{DateTime, Duration, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Place;
use crate::error::{
    bid_already_cancelled_error, bid_already_closed_error, invalid_transition_error, Error,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideType {
    Standard,
    Premium,
    Xl,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bid {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub pickup: Place,
    pub dropoff: Place,
    pub ride_type: RideType,
    pub rider_offered_price: i64,
    pub surge_multiplier: f64,
    pub surge_unknown: bool,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// The accepted offer id lives inside the `Matched` variant, so a bid can
/// never carry one in any other state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Status {
    Open,
    Matched { accepted_offer_id: Uuid },
    Expired,
    Cancelled,
}

impl Status {
    pub fn name(&self) -> String {
        match self {
            Self::Open => "open".into(),
            Self::Matched {
                accepted_offer_id: _,
            } => "matched".into(),
            Self::Expired => "expired".into(),
            Self::Cancelled => "cancelled".into(),
        }
    }
}

impl Bid {
    pub fn new(
        rider_id: Uuid,
        pickup: Place,
        dropoff: Place,
        ride_type: RideType,
        rider_offered_price: i64,
        surge_multiplier: f64,
        surge_unknown: bool,
        ttl: Duration,
    ) -> Self {
        let created_at = Utc::now();

        Self {
            id: Uuid::new_v4(),
            rider_id,
            pickup,
            dropoff,
            ride_type,
            rider_offered_price,
            surge_multiplier,
            surge_unknown,
            status: Status::Open,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_open(&self) -> bool {
        match &self.status {
            Status::Open => true,
            _ => false,
        }
    }

    pub fn accepted_offer_id(&self) -> Option<Uuid> {
        match &self.status {
            Status::Matched { accepted_offer_id } => Some(accepted_offer_id.clone()),
            _ => None,
        }
    }

    /// Lazily expires an open bid whose deadline has passed. Returns true
    /// when the status flipped, so the caller knows to persist the change.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_open() && now >= self.expires_at {
            self.status = Status::Expired;
            return true;
        }

        false
    }

    pub fn accept(&mut self, offer_id: Uuid) -> Result<(), Error> {
        match &self.status {
            Status::Open => {
                self.status = Status::Matched {
                    accepted_offer_id: offer_id,
                };

                Ok(())
            }
            _ => Err(bid_already_closed_error()),
        }
    }

    pub fn cancel(&mut self) -> Result<(), Error> {
        match &self.status {
            Status::Open => {
                self.status = Status::Cancelled;
                Ok(())
            }
            Status::Cancelled => Err(bid_already_cancelled_error()),
            _ => Err(bid_already_closed_error()),
        }
    }

    /// Compensating transition used only when trip creation fails after a
    /// successful match. Any other use is an invalid transition.
    pub fn reopen(&mut self) -> Result<(), Error> {
        match &self.status {
            Status::Matched {
                accepted_offer_id: _,
            } => {
                self.status = Status::Open;
                Ok(())
            }
            _ => Err(invalid_transition_error()),
        }
    }
}

impl PolarClass for Bid {
    fn get_polar_class_builder() -> oso::ClassBuilder<Bid> {
        oso::Class::builder()
            .name("Bid")
            .add_attribute_getter("id", |recv: &Bid| recv.id.clone())
            .add_attribute_getter("rider_id", |recv: &Bid| recv.rider_id.clone())
            .add_attribute_getter("status", |recv: &Bid| recv.status.name())
    }

    fn get_polar_class() -> oso::Class {
        let builder = Bid::get_polar_class_builder();
        builder.build()
    }
}

/// What drivers see when browsing open bids.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BidSummary {
    pub id: Uuid,
    pub rider_offered_price: i64,
    pub surge_multiplier: f64,
    pub ride_type: RideType,
    pub pickup: Place,
    pub dropoff: Place,
    pub age_secs: i64,
    pub expires_at: DateTime<Utc>,
}

impl BidSummary {
    pub fn from_bid(bid: &Bid, now: DateTime<Utc>) -> Self {
        Self {
            id: bid.id.clone(),
            rider_offered_price: bid.rider_offered_price,
            surge_multiplier: bid.surge_multiplier,
            ride_type: bid.ride_type,
            pickup: bid.pickup.clone(),
            dropoff: bid.dropoff.clone(),
            age_secs: (now - bid.created_at).num_seconds(),
            expires_at: bid.expires_at,
        }
    }
}

#[cfg(test)]
fn test_bid() -> Bid {
    use crate::entities::Coordinates;

    let pickup = Place::new(Coordinates { lat: 9.93, lng: 76.26 }, "pickup".into());
    let dropoff = Place::new(Coordinates { lat: 9.97, lng: 76.28 }, "dropoff".into());

    Bid::new(
        Uuid::new_v4(),
        pickup,
        dropoff,
        RideType::Standard,
        1500,
        1.0,
        false,
        Duration::seconds(180),
    )
}

#[test]
fn accept_only_from_open_test() {
    let mut bid = test_bid();
    let offer_id = Uuid::new_v4();

    bid.accept(offer_id.clone()).unwrap();
    assert_eq!(bid.status.name(), "matched");
    assert_eq!(bid.accepted_offer_id(), Some(offer_id));

    assert_eq!(bid.accept(Uuid::new_v4()).unwrap_err().code, 112);
    assert_eq!(bid.cancel().unwrap_err().code, 112);
}

#[test]
fn cancel_transitions_test() {
    let mut bid = test_bid();

    bid.cancel().unwrap();
    assert_eq!(bid.status.name(), "cancelled");
    assert_eq!(bid.accepted_offer_id(), None);

    assert_eq!(bid.cancel().unwrap_err().code, 113);
    assert_eq!(bid.accept(Uuid::new_v4()).unwrap_err().code, 112);
}

#[test]
fn expire_if_due_test() {
    let mut bid = test_bid();

    assert!(!bid.expire_if_due(Utc::now()));
    assert!(bid.is_open());

    assert!(bid.expire_if_due(Utc::now() + Duration::seconds(181)));
    assert_eq!(bid.status.name(), "expired");

    // idempotent on an already-expired bid
    assert!(!bid.expire_if_due(Utc::now() + Duration::seconds(240)));
}

#[test]
fn reopen_only_from_matched_test() {
    let mut bid = test_bid();

    assert_eq!(bid.reopen().unwrap_err().code, 100);

    bid.accept(Uuid::new_v4()).unwrap();
    bid.reopen().unwrap();

    assert!(bid.is_open());
    assert_eq!(bid.accepted_offer_id(), None);

    // a reopened bid can be matched again
    bid.accept(Uuid::new_v4()).unwrap();
}
