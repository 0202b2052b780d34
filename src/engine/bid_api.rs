use super::Engine;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    api::{BidAPI, BidEvent, OpenBidQuery},
    auth::User,
    entities::{Bid, BidSummary, Place, RideType},
    error::{invalid_request_error, Error},
    surge,
};

#[async_trait]
impl BidAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_bid(
        &self,
        user: User,
        pickup: Place,
        dropoff: Place,
        ride_type: RideType,
        offered_price: i64,
    ) -> Result<Bid, Error> {
        if offered_price <= 0 {
            return Err(invalid_request_error());
        }

        if !pickup.coordinates.is_valid() || !dropoff.coordinates.is_valid() {
            return Err(invalid_request_error());
        }

        if pickup.coordinates == dropoff.coordinates {
            return Err(invalid_request_error());
        }

        // the multiplier is frozen into the bid here; recomputations later
        // never touch an open negotiation
        let zone_id = surge::zone_for(&pickup.coordinates);
        let reading = self.surge.compute(&zone_id).await;

        let bid = Bid::new(
            user.id,
            pickup,
            dropoff,
            ride_type,
            offered_price,
            reading.zone.multiplier,
            reading.signal_unavailable,
            self.config.bid_ttl,
        );

        self.store.insert_bid(&bid).await?;

        self.publish(BidEvent::Opened {
            bid_id: bid.id.clone(),
        });

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn find_bid(&self, id: Uuid) -> Result<Bid, Error> {
        self.store.find_bid(id).await
    }

    #[tracing::instrument(skip(self))]
    async fn list_open_bids(&self, query: OpenBidQuery) -> Result<Vec<BidSummary>, Error> {
        let bounds = match (query.bounds, query.zone) {
            (Some(bounds), _) => Some(bounds),
            (None, Some(zone_id)) => {
                Some(surge::zone_bounds(&zone_id).ok_or_else(|| invalid_request_error())?)
            }
            (None, None) => None,
        };

        let now = Utc::now();
        let bids = self.store.list_open_bids(bounds, now).await?;

        Ok(bids
            .iter()
            .map(|bid| BidSummary::from_bid(bid, now))
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_bid(&self, user: User, id: Uuid) -> Result<Bid, Error> {
        let bid = self.store.find_bid(id.clone()).await?;

        self.authorize(user, "cancel", bid)?;

        let bid = self.store.mark_cancelled(id, Utc::now()).await?;

        self.publish(BidEvent::Closed {
            bid_id: bid.id.clone(),
            status: bid.status.name(),
        });

        Ok(bid)
    }

    fn subscribe(&self) -> broadcast::Receiver<BidEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{engine, place};

    #[tokio::test]
    async fn create_bid_freezes_surge_multiplier() {
        let (engine, _, signal) = engine();

        let pickup = place(9.93, 76.26);
        let zone_id = surge::zone_for(&pickup.coordinates);
        signal.set(&zone_id, 12, 6).await;

        let rider = User::new(Uuid::new_v4());
        let bid = engine
            .create_bid(
                rider,
                pickup,
                place(9.97, 76.28),
                RideType::Standard,
                1500,
            )
            .await
            .unwrap();

        assert_eq!(bid.surge_multiplier, 1.5);
        assert!(!bid.surge_unknown);

        // the zone heats up after creation; the stored bid must not move
        signal.set(&zone_id, 100, 1).await;

        let stored = engine.find_bid(bid.id).await.unwrap();
        assert_eq!(stored.surge_multiplier, 1.5);
    }

    #[tokio::test]
    async fn create_bid_validates_input() {
        let (engine, _, _) = engine();
        let rider = User::new(Uuid::new_v4());

        let err = engine
            .create_bid(
                rider.clone(),
                place(9.93, 76.26),
                place(9.97, 76.28),
                RideType::Standard,
                0,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, 101);

        let err = engine
            .create_bid(
                rider.clone(),
                place(9.93, 76.26),
                place(9.93, 76.26),
                RideType::Standard,
                1500,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, 101);

        let err = engine
            .create_bid(
                rider,
                place(f64::NAN, 76.26),
                place(9.97, 76.28),
                RideType::Standard,
                1500,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, 101);
    }

    #[tokio::test]
    async fn list_open_filters_by_area_and_status() {
        let (engine, _, _) = engine();
        let rider = User::new(Uuid::new_v4());

        let near = engine
            .create_bid(
                rider.clone(),
                place(9.93, 76.26),
                place(9.97, 76.28),
                RideType::Standard,
                1500,
            )
            .await
            .unwrap();

        let far = engine
            .create_bid(
                rider.clone(),
                place(52.52, 13.40),
                place(52.55, 13.45),
                RideType::Standard,
                2000,
            )
            .await
            .unwrap();

        let cancelled = engine
            .create_bid(
                rider.clone(),
                place(9.94, 76.27),
                place(9.96, 76.29),
                RideType::Standard,
                1200,
            )
            .await
            .unwrap();
        engine.cancel_bid(rider, cancelled.id).await.unwrap();

        let all = engine.list_open_bids(OpenBidQuery::default()).await.unwrap();
        let ids: Vec<Uuid> = all.iter().map(|summary| summary.id.clone()).collect();
        assert!(ids.contains(&near.id));
        assert!(ids.contains(&far.id));
        assert!(!ids.contains(&cancelled.id));

        let query = OpenBidQuery {
            zone: Some(surge::zone_for(&near.pickup.coordinates)),
            bounds: None,
        };
        let zoned = engine.list_open_bids(query).await.unwrap();
        assert_eq!(zoned.len(), 1);
        assert_eq!(zoned[0].id, near.id);

        let err = engine
            .list_open_bids(OpenBidQuery {
                zone: Some("garbage".into()),
                bounds: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, 101);
    }

    #[tokio::test]
    async fn cancel_requires_ownership() {
        let (engine, _, _) = engine();
        let rider = User::new(Uuid::new_v4());

        let bid = engine
            .create_bid(
                rider.clone(),
                place(9.93, 76.26),
                place(9.97, 76.28),
                RideType::Standard,
                1500,
            )
            .await
            .unwrap();

        let stranger = User::new(Uuid::new_v4());
        let err = engine
            .cancel_bid(stranger, bid.id.clone())
            .await
            .unwrap_err();
        assert_eq!(err.code, 120);

        let cancelled = engine.cancel_bid(rider.clone(), bid.id.clone()).await.unwrap();
        assert_eq!(cancelled.status.name(), "cancelled");

        let err = engine.cancel_bid(rider, bid.id).await.unwrap_err();
        assert_eq!(err.code, 113);
    }
}
