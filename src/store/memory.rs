use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::entities::{Bid, BoundingBox, Offer, ScheduledRide, Status};
use crate::error::{bid_expired_error, bid_not_open_error, invalid_request_error, Error};
use crate::store::Store;

/// In-memory store for tests and the load simulation. One mutex per bid;
/// the outer map lock is only held long enough to find the cell, so
/// negotiation on one bid never blocks another.
pub struct MemoryStore {
    bids: RwLock<HashMap<Uuid, Arc<Mutex<BidCell>>>>,
    scheduled: Mutex<HashMap<Uuid, ScheduledRide>>,
}

struct BidCell {
    bid: Bid,
    offers: Vec<Offer>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            bids: RwLock::new(HashMap::new()),
            scheduled: Mutex::new(HashMap::new()),
        }
    }

    async fn cell(&self, id: &Uuid) -> Result<Arc<Mutex<BidCell>>, Error> {
        self.bids
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| invalid_request_error())
    }

    async fn cells(&self) -> Vec<Arc<Mutex<BidCell>>> {
        self.bids.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_bid(&self, bid: &Bid) -> Result<(), Error> {
        let cell = BidCell {
            bid: bid.clone(),
            offers: vec![],
        };

        self.bids
            .write()
            .await
            .insert(bid.id.clone(), Arc::new(Mutex::new(cell)));

        Ok(())
    }

    async fn find_bid(&self, id: Uuid) -> Result<Bid, Error> {
        let cell = self.cell(&id).await?;
        let cell = cell.lock().await;

        Ok(cell.bid.clone())
    }

    async fn list_open_bids(
        &self,
        bounds: Option<BoundingBox>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Bid>, Error> {
        let mut bids = vec![];

        for cell in self.cells().await {
            let cell = cell.lock().await;

            if !cell.bid.is_open() || now >= cell.bid.expires_at {
                continue;
            }

            if let Some(bounds) = &bounds {
                if !bounds.contains(&cell.bid.pickup.coordinates) {
                    continue;
                }
            }

            bids.push(cell.bid.clone());
        }

        bids.sort_by_key(|bid| bid.created_at);

        Ok(bids)
    }

    async fn open_bids_due(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, Error> {
        let mut due = vec![];

        for cell in self.cells().await {
            let cell = cell.lock().await;

            if cell.bid.is_open() && now >= cell.bid.expires_at {
                due.push(cell.bid.id.clone());
            }
        }

        Ok(due)
    }

    async fn mark_matched(
        &self,
        id: Uuid,
        offer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Bid, Error> {
        let cell = self.cell(&id).await?;
        let mut cell = cell.lock().await;

        if cell.bid.expire_if_due(now) {
            return Err(bid_expired_error());
        }

        cell.bid.accept(offer_id)?;

        Ok(cell.bid.clone())
    }

    async fn revert_matched(&self, id: Uuid) -> Result<Bid, Error> {
        let cell = self.cell(&id).await?;
        let mut cell = cell.lock().await;

        cell.bid.reopen()?;

        Ok(cell.bid.clone())
    }

    async fn mark_cancelled(&self, id: Uuid, now: DateTime<Utc>) -> Result<Bid, Error> {
        let cell = self.cell(&id).await?;
        let mut cell = cell.lock().await;

        if cell.bid.expire_if_due(now) {
            return Err(bid_expired_error());
        }

        cell.bid.cancel()?;

        Ok(cell.bid.clone())
    }

    async fn mark_expired(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, Error> {
        let cell = self.cell(&id).await?;
        let mut cell = cell.lock().await;

        Ok(cell.bid.expire_if_due(now))
    }

    async fn insert_offer(&self, offer: &Offer, now: DateTime<Utc>) -> Result<(), Error> {
        let cell = self.cell(&offer.bid_id).await?;
        let mut cell = cell.lock().await;

        if cell.bid.expire_if_due(now) {
            return Err(bid_expired_error());
        }

        match &cell.bid.status {
            Status::Open => {}
            Status::Expired => return Err(bid_expired_error()),
            _ => return Err(bid_not_open_error()),
        }

        cell.offers.push(offer.clone());

        Ok(())
    }

    async fn list_offers(&self, bid_id: Uuid) -> Result<Vec<Offer>, Error> {
        let cell = self.cell(&bid_id).await?;
        let cell = cell.lock().await;

        let mut offers = cell.offers.clone();
        offers.sort_by_key(|offer| offer.created_at);

        Ok(offers)
    }

    async fn insert_scheduled_ride(&self, ride: &ScheduledRide) -> Result<(), Error> {
        self.scheduled
            .lock()
            .await
            .insert(ride.id.clone(), ride.clone());

        Ok(())
    }

    async fn find_scheduled_ride(&self, id: Uuid) -> Result<ScheduledRide, Error> {
        self.scheduled
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| invalid_request_error())
    }

    async fn list_upcoming_rides(&self, rider_id: Uuid) -> Result<Vec<ScheduledRide>, Error> {
        let scheduled = self.scheduled.lock().await;

        let mut rides: Vec<ScheduledRide> = scheduled
            .values()
            .filter(|ride| ride.rider_id == rider_id && ride.is_pending())
            .cloned()
            .collect();

        rides.sort_by_key(|ride| ride.scheduled_time);

        Ok(rides)
    }

    async fn cancel_scheduled_ride(&self, id: Uuid) -> Result<ScheduledRide, Error> {
        let mut scheduled = self.scheduled.lock().await;

        let ride = scheduled.get_mut(&id).ok_or_else(|| invalid_request_error())?;
        ride.cancel()?;

        Ok(ride.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Coordinates, Place, RideType};
    use chrono::Duration;

    fn open_bid(ttl_secs: i64) -> Bid {
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
            Duration::seconds(ttl_secs),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_matches_elect_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let bid = open_bid(180);
        store.insert_bid(&bid).await.unwrap();

        let mut handles = vec![];
        for _ in 0..8 {
            let store = store.clone();
            let bid_id = bid.id.clone();

            handles.push(tokio::spawn(async move {
                store
                    .mark_matched(bid_id, Uuid::new_v4(), Utc::now())
                    .await
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
    }

    #[tokio::test]
    async fn match_respects_deadline() {
        let store = MemoryStore::new();
        let bid = open_bid(180);
        store.insert_bid(&bid).await.unwrap();

        let late = Utc::now() + Duration::seconds(181);
        let err = store
            .mark_matched(bid.id.clone(), Uuid::new_v4(), late)
            .await
            .unwrap_err();
        assert_eq!(err.code, 111);

        // the failed attempt flipped the bid to expired
        let bid = store.find_bid(bid.id).await.unwrap();
        assert_eq!(bid.status.name(), "expired");
    }

    #[tokio::test]
    async fn offers_rechecked_at_write_time() {
        let store = MemoryStore::new();
        let bid = open_bid(180);
        store.insert_bid(&bid).await.unwrap();

        let offer = Offer::new(bid.id.clone(), Uuid::new_v4(), 4.8, 1400, None);
        store.insert_offer(&offer, Utc::now()).await.unwrap();

        store
            .mark_cancelled(bid.id.clone(), Utc::now())
            .await
            .unwrap();

        let late_offer = Offer::new(bid.id.clone(), Uuid::new_v4(), 4.9, 1450, None);
        let err = store
            .insert_offer(&late_offer, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.code, 110);

        // historical offers survive the close
        assert_eq!(store.list_offers(bid.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn expiry_sweep_is_idempotent() {
        let store = MemoryStore::new();
        let bid = open_bid(180);
        store.insert_bid(&bid).await.unwrap();

        let late = Utc::now() + Duration::seconds(200);

        assert_eq!(store.open_bids_due(late).await.unwrap(), vec![bid.id.clone()]);
        assert!(store.mark_expired(bid.id.clone(), late).await.unwrap());
        assert!(!store.mark_expired(bid.id.clone(), late).await.unwrap());
        assert!(store.open_bids_due(late).await.unwrap().is_empty());
    }
}
