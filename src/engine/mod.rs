mod bid_api;
mod match_api;
mod offer_api;
mod schedule_api;
mod surge_api;

use chrono::Utc;
use oso::Oso;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::{
    api::{BidEvent, TripFactory, API},
    auth::authorizor,
    config::Config,
    error::{unauthorized_error, Error},
    store::Store,
    surge::SurgeCalculator,
};

pub struct Engine {
    store: Arc<dyn Store>,
    trips: Arc<dyn TripFactory>,
    surge: SurgeCalculator,
    config: Config,
    authorizor: Oso,
    events: broadcast::Sender<BidEvent>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        trips: Arc<dyn TripFactory>,
        surge: SurgeCalculator,
        config: Config,
    ) -> Self {
        let (events, _) = broadcast::channel(256);

        Self {
            store,
            trips,
            surge,
            config,
            authorizor: authorizor::new(),
            events,
        }
    }

    pub fn authorize<Actor, Action, Resource>(
        &self,
        actor: Actor,
        action: Action,
        resource: Resource,
    ) -> Result<(), Error>
    where
        Actor: oso::ToPolar,
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        if self.authorizor.is_allowed(actor, action, resource)? {
            return Ok(());
        }

        Err(unauthorized_error())
    }

    pub(crate) fn publish(&self, event: BidEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }

    /// One sweep pass: expire every due open bid. Each expiry is the same
    /// compare-and-set the acceptance path uses, so a sweep racing an
    /// acceptance can never expire a bid that was just matched.
    #[tracing::instrument(skip(self))]
    pub async fn expire_due(&self) -> Result<usize, Error> {
        let now = Utc::now();
        let due = self.store.open_bids_due(now).await?;

        let mut expired = 0;
        for bid_id in due {
            if self.store.mark_expired(bid_id.clone(), now).await? {
                expired += 1;

                self.publish(BidEvent::Closed {
                    bid_id,
                    status: "expired".into(),
                });
            }
        }

        Ok(expired)
    }
}

impl API for Engine {}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    use async_trait::async_trait;

    use crate::api::TripFactory;
    use crate::config::Config;
    use crate::entities::{Bid, Coordinates, Offer, Place, Trip};
    use crate::error::{upstream_error, Error};
    use crate::store::MemoryStore;
    use crate::surge::{SurgeCalculator, TableSignal};

    use super::Engine;

    pub struct FakeTripFactory {
        pub created: Mutex<Vec<Trip>>,
        pub fail_next: AtomicBool,
        pub hang_next: AtomicBool,
    }

    impl FakeTripFactory {
        pub fn new() -> Self {
            Self {
                created: Mutex::new(vec![]),
                fail_next: AtomicBool::new(false),
                hang_next: AtomicBool::new(false),
            }
        }

        pub async fn created_count(&self) -> usize {
            self.created.lock().await.len()
        }
    }

    #[async_trait]
    impl TripFactory for FakeTripFactory {
        async fn create_trip(&self, bid: &Bid, offer: &Offer) -> Result<Trip, Error> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(upstream_error());
            }

            if self.hang_next.swap(false, Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }

            let trip = Trip::new(bid, offer);
            self.created.lock().await.push(trip.clone());

            Ok(trip)
        }
    }

    pub fn place(lat: f64, lng: f64) -> Place {
        Place::new(Coordinates { lat, lng }, "somewhere".into())
    }

    pub fn engine_with(
        config: Config,
    ) -> (Arc<Engine>, Arc<FakeTripFactory>, Arc<TableSignal>) {
        let store = Arc::new(MemoryStore::new());
        let trips = Arc::new(FakeTripFactory::new());
        let signal = Arc::new(TableSignal::new());
        let surge = SurgeCalculator::new(signal.clone(), config.surge_cap);

        let engine = Arc::new(Engine::new(store, trips.clone(), surge, config));

        (engine, trips, signal)
    }

    pub fn engine() -> (Arc<Engine>, Arc<FakeTripFactory>, Arc<TableSignal>) {
        engine_with(Config::default())
    }
}
