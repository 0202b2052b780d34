use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use rand_distr::{Distribution, Normal, Uniform};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{BidAPI, MatchAPI, OfferAPI, TripFactory};
use crate::auth::User;
use crate::engine::Engine;
use crate::entities::{Bid, Coordinates, Offer, Place, RideType, Trip};
use crate::error::Error;

/// Trip factory for local runs: no trip service around, just mint the
/// record.
pub struct LocalTripFactory;

#[async_trait]
impl TripFactory for LocalTripFactory {
    async fn create_trip(&self, bid: &Bid, offer: &Offer) -> Result<Trip, Error> {
        Ok(Trip::new(bid, offer))
    }
}

const DRIVER_WORKERS: usize = 10;
const RIDERS: usize = 25;
const OFFERS_PER_BID: usize = 4;

fn sample_place() -> Place {
    let mut rng = rand::thread_rng();

    let lat = Uniform::from(9.90..10.00).sample(&mut rng);
    let lng = Uniform::from(76.24..76.34).sample(&mut rng);

    Place::new(Coordinates { lat, lng }, "".into())
}

fn sample_offered_price() -> i64 {
    let mut rng = rand::thread_rng();
    Uniform::from(1000i64..2000).sample(&mut rng)
}

fn sample_counter_price() -> i64 {
    let mut rng = rand::thread_rng();
    let price = Normal::new(1500.0, 200.0).unwrap().sample(&mut rng);

    (price as i64).max(1)
}

fn sample_rating() -> f64 {
    let mut rng = rand::thread_rng();
    Uniform::from(3.5..5.0).sample(&mut rng)
}

fn sample_delay_ms(low: u64, high: u64) -> u64 {
    let mut rng = rand::thread_rng();
    Uniform::from(low..high).sample(&mut rng)
}

struct Simulation {
    e: Arc<Engine>,
    matched: AtomicUsize,
    unmatched: AtomicUsize,
    conflicts: AtomicUsize,
}

impl Simulation {
    #[tracing::instrument(skip(self, tx))]
    async fn run_rider(&self, tx: Sender<Uuid>) {
        let rider = User::new(Uuid::new_v4());

        let bid = self
            .e
            .create_bid(
                rider.clone(),
                sample_place(),
                sample_place(),
                RideType::Standard,
                sample_offered_price(),
            )
            .await
            .unwrap();

        tracing::info!("created bid {:?}", &bid.id);

        for _ in 0..OFFERS_PER_BID {
            tx.send(bid.id.clone()).await.unwrap();
        }

        // think time while counter-offers trickle in
        tokio::time::sleep(std::time::Duration::from_millis(sample_delay_ms(150, 400))).await;

        let offers = self.e.list_offers(bid.id.clone(), false).await.unwrap();

        let cheapest = offers
            .iter()
            .min_by_key(|offer| offer.counter_price)
            .cloned();

        match cheapest {
            Some(offer) => match self.e.accept_offer(rider, bid.id, offer.id).await {
                Ok(trip) => {
                    tracing::info!("matched trip {:?} at fare {}", &trip.id, trip.fare);
                    self.matched.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) if err.is_conflict() || err.code == 121 => {
                    tracing::debug!(code = err.code, "acceptance lost a race");
                    self.conflicts.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    tracing::warn!(code = err.code, "unexpected acceptance failure");
                }
            },
            None => {
                tracing::warn!("no offers arrived, cancelling bid");
                let _ = self.e.cancel_bid(rider, bid.id).await;
                self.unmatched.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[tracing::instrument(skip(self, rx))]
    async fn run_driver(&self, rx: Receiver<Uuid>) {
        let driver_id = Uuid::new_v4();
        let rating = sample_rating();

        while let Ok(bid_id) = rx.recv().await {
            tokio::time::sleep(std::time::Duration::from_millis(sample_delay_ms(10, 120)))
                .await;

            match self
                .e
                .submit_offer(bid_id, driver_id.clone(), rating, sample_counter_price(), None)
                .await
            {
                Ok(offer) => {
                    tracing::info!("submitted offer {:?} at {}", &offer.id, offer.counter_price);
                }
                Err(err) if err.is_conflict() => {
                    tracing::debug!(code = err.code, "bid closed before the offer landed");
                    self.conflicts.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    tracing::warn!(code = err.code, "unexpected offer failure");
                }
            }
        }
    }
}

pub struct Executor {
    s: Arc<Simulation>,
}

impl Executor {
    #[tracing::instrument(name = "Executor::new", skip_all)]
    pub fn new(e: Arc<Engine>) -> Self {
        Self {
            s: Arc::new(Simulation {
                e,
                matched: AtomicUsize::new(0),
                unmatched: AtomicUsize::new(0),
                conflicts: AtomicUsize::new(0),
            }),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn run(&self) {
        let (tx, rx): (Sender<Uuid>, Receiver<Uuid>) = async_channel::unbounded();

        let mut driver_handles = vec![];
        for _ in 0..DRIVER_WORKERS {
            let rx = rx.clone();
            let s = self.s.clone();

            driver_handles.push(tokio::spawn(async move {
                s.run_driver(rx).await;
            }));
        }

        let mut rider_handles = vec![];
        for _ in 0..RIDERS {
            let tx = tx.clone();
            let s = self.s.clone();

            rider_handles.push(tokio::spawn(async move {
                s.run_rider(tx).await;
            }));
        }

        futures::future::join_all(rider_handles).await;

        tx.close();
        futures::future::join_all(driver_handles).await;

        tracing::info!(
            matched = self.s.matched.load(Ordering::Relaxed),
            unmatched = self.s.unmatched.load(Ordering::Relaxed),
            conflicts = self.s.conflicts.load(Ordering::Relaxed),
            "simulation finished"
        );
    }
}
