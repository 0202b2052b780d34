use super::Engine;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    api::{BidEvent, MatchAPI},
    auth::User,
    entities::{Offer, Trip},
    error::{offer_not_found_error, upstream_error, Error},
};

/// The target must be its driver's newest offer on the bid. Offers are
/// sorted by created_at, so the driver's last entry decides.
fn is_superseded(offers: &[Offer], target: &Offer) -> bool {
    offers
        .iter()
        .filter(|offer| offer.driver_id == target.driver_id)
        .last()
        .map(|offer| offer.id != target.id)
        .unwrap_or(false)
}

#[async_trait]
impl MatchAPI for Engine {
    /// The single place a trip is created from a bid. The open -> matched
    /// compare-and-set decides every race (competing acceptances,
    /// cancellation, expiry); losers get `BidAlreadyClosed` and no trip.
    #[tracing::instrument(skip(self))]
    async fn accept_offer(&self, user: User, bid_id: Uuid, offer_id: Uuid) -> Result<Trip, Error> {
        let bid = self.store.find_bid(bid_id.clone()).await?;

        self.authorize(user, "accept", bid)?;

        let offers = self.store.list_offers(bid_id.clone()).await?;
        let offer = offers
            .iter()
            .find(|offer| offer.id == offer_id)
            .cloned()
            .ok_or_else(|| offer_not_found_error())?;

        if is_superseded(&offers, &offer) {
            return Err(offer_not_found_error());
        }

        let matched = self
            .store
            .mark_matched(bid_id.clone(), offer_id, Utc::now())
            .await?;

        // the one potentially slow step; on timeout or failure the match is
        // rolled back so the bid never stays matched without a trip
        let created = tokio::time::timeout(
            self.config.trip_timeout,
            self.trips.create_trip(&matched, &offer),
        )
        .await;

        let trip = match created {
            Ok(Ok(trip)) => trip,
            Ok(Err(err)) => return Err(self.rollback_match(bid_id, err).await),
            Err(_) => {
                tracing::warn!(%bid_id, "trip creation timed out");
                return Err(self.rollback_match(bid_id, upstream_error()).await);
            }
        };

        self.publish(BidEvent::Closed {
            bid_id,
            status: matched.status.name(),
        });

        Ok(trip)
    }
}

impl Engine {
    async fn rollback_match(&self, bid_id: Uuid, cause: Error) -> Error {
        tracing::warn!(%bid_id, code = cause.code, "trip creation failed, reopening bid");

        if let Err(err) = self.store.revert_matched(bid_id.clone()).await {
            // nothing sane left to do; surface the original cause
            tracing::error!(%bid_id, code = err.code, "failed to reopen bid after trip failure");
        }

        cause
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BidAPI, OfferAPI};
    use crate::config::Config;
    use crate::engine::testing::{engine, engine_with, place};
    use crate::entities::RideType;
    use std::sync::atomic::Ordering;

    async fn bid_with_rider(
        engine: &crate::engine::Engine,
    ) -> (crate::entities::Bid, User) {
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

        (bid, rider)
    }

    #[tokio::test]
    async fn accept_cheapest_offer_scenario() {
        let (engine, trips, _) = engine();
        let (bid, rider) = bid_with_rider(&engine).await;

        let offer_a = engine
            .submit_offer(bid.id.clone(), Uuid::new_v4(), 4.9, 1600, None)
            .await
            .unwrap();
        let offer_b = engine
            .submit_offer(bid.id.clone(), Uuid::new_v4(), 4.6, 1400, None)
            .await
            .unwrap();

        let trip = engine
            .accept_offer(rider.clone(), bid.id.clone(), offer_b.id.clone())
            .await
            .unwrap();

        assert_eq!(trip.fare, 1400);
        assert_eq!(trip.offer_id, offer_b.id);
        assert_eq!(trip.bid_id, bid.id);

        let stored = engine.find_bid(bid.id.clone()).await.unwrap();
        assert_eq!(stored.status.name(), "matched");
        assert_eq!(stored.accepted_offer_id(), Some(offer_b.id));

        let err = engine
            .accept_offer(rider, bid.id, offer_a.id)
            .await
            .unwrap_err();
        assert_eq!(err.code, 112);

        assert_eq!(trips.created_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_accepts_create_exactly_one_trip() {
        let (engine, trips, _) = engine();
        let (bid, rider) = bid_with_rider(&engine).await;

        let mut offer_ids = vec![];
        for _ in 0..8 {
            let offer = engine
                .submit_offer(bid.id.clone(), Uuid::new_v4(), 4.5, 1450, None)
                .await
                .unwrap();
            offer_ids.push(offer.id);
        }

        let mut handles = vec![];
        for offer_id in offer_ids {
            let engine = engine.clone();
            let rider = rider.clone();
            let bid_id = bid.id.clone();

            handles.push(tokio::spawn(async move {
                engine.accept_offer(rider, bid_id, offer_id).await
            }));
        }

        let mut winners = 0;
        let mut losers = 0;

        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(err) => {
                    assert_eq!(err.code, 112);
                    losers += 1;
                }
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(losers, 7);
        assert_eq!(trips.created_count().await, 1);
    }

    #[tokio::test]
    async fn accept_requires_ownership() {
        let (engine, trips, _) = engine();
        let (bid, _) = bid_with_rider(&engine).await;

        let offer = engine
            .submit_offer(bid.id.clone(), Uuid::new_v4(), 4.5, 1400, None)
            .await
            .unwrap();

        let stranger = User::new(Uuid::new_v4());
        let err = engine
            .accept_offer(stranger, bid.id, offer.id)
            .await
            .unwrap_err();
        assert_eq!(err.code, 120);
        assert_eq!(trips.created_count().await, 0);
    }

    #[tokio::test]
    async fn superseded_offer_cannot_be_accepted() {
        let (engine, _, _) = engine();
        let (bid, rider) = bid_with_rider(&engine).await;

        let driver = Uuid::new_v4();
        let first = engine
            .submit_offer(bid.id.clone(), driver.clone(), 4.5, 1600, None)
            .await
            .unwrap();
        let revised = engine
            .submit_offer(bid.id.clone(), driver, 4.5, 1400, None)
            .await
            .unwrap();

        let err = engine
            .accept_offer(rider.clone(), bid.id.clone(), first.id)
            .await
            .unwrap_err();
        assert_eq!(err.code, 121);

        let err = engine
            .accept_offer(rider.clone(), bid.id.clone(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.code, 121);

        engine.accept_offer(rider, bid.id, revised.id).await.unwrap();
    }

    #[tokio::test]
    async fn trip_failure_rolls_the_match_back() {
        let (engine, trips, _) = engine();
        let (bid, rider) = bid_with_rider(&engine).await;

        let offer = engine
            .submit_offer(bid.id.clone(), Uuid::new_v4(), 4.5, 1400, None)
            .await
            .unwrap();

        trips.fail_next.store(true, Ordering::SeqCst);

        let err = engine
            .accept_offer(rider.clone(), bid.id.clone(), offer.id.clone())
            .await
            .unwrap_err();
        assert_eq!(err.code, 4);

        let stored = engine.find_bid(bid.id.clone()).await.unwrap();
        assert!(stored.is_open());
        assert_eq!(stored.accepted_offer_id(), None);

        // the rider retries and the same offer goes through
        let trip = engine
            .accept_offer(rider, bid.id, offer.id)
            .await
            .unwrap();
        assert_eq!(trip.fare, 1400);
        assert_eq!(trips.created_count().await, 1);
    }

    #[tokio::test]
    async fn trip_timeout_rolls_the_match_back() {
        let mut config = Config::default();
        config.trip_timeout = std::time::Duration::from_millis(50);

        let (engine, trips, _) = engine_with(config);
        let (bid, rider) = bid_with_rider(&engine).await;

        let offer = engine
            .submit_offer(bid.id.clone(), Uuid::new_v4(), 4.5, 1400, None)
            .await
            .unwrap();

        trips.hang_next.store(true, Ordering::SeqCst);

        let err = engine
            .accept_offer(rider, bid.id.clone(), offer.id)
            .await
            .unwrap_err();
        assert_eq!(err.code, 4);

        let stored = engine.find_bid(bid.id).await.unwrap();
        assert!(stored.is_open());
    }

    #[tokio::test]
    async fn accept_after_deadline_fails() {
        let mut config = Config::default();
        config.bid_ttl = chrono::Duration::milliseconds(50);

        let (engine, trips, _) = engine_with(config);
        let (bid, rider) = bid_with_rider(&engine).await;

        let offer = engine
            .submit_offer(bid.id.clone(), Uuid::new_v4(), 4.5, 1400, None)
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;

        let err = engine
            .accept_offer(rider, bid.id.clone(), offer.id)
            .await
            .unwrap_err();
        assert_eq!(err.code, 111);

        let stored = engine.find_bid(bid.id).await.unwrap();
        assert_eq!(stored.status.name(), "expired");
        assert_eq!(trips.created_count().await, 0);
    }

    #[tokio::test]
    async fn cancellation_beats_late_acceptance() {
        let (engine, trips, _) = engine();
        let (bid, rider) = bid_with_rider(&engine).await;

        let offer = engine
            .submit_offer(bid.id.clone(), Uuid::new_v4(), 4.5, 1400, None)
            .await
            .unwrap();

        engine.cancel_bid(rider.clone(), bid.id.clone()).await.unwrap();

        let err = engine
            .accept_offer(rider, bid.id, offer.id)
            .await
            .unwrap_err();
        assert_eq!(err.code, 112);
        assert_eq!(trips.created_count().await, 0);
    }
}
