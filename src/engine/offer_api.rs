use super::Engine;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    api::{BidEvent, OfferAPI},
    entities::Offer,
    error::{invalid_offer_error, Error},
};

/// A driver's newest offer supersedes their earlier ones for display and
/// acceptance; the full history stays on record.
pub(super) fn latest_per_driver(offers: &[Offer]) -> Vec<Offer> {
    let mut latest: HashMap<Uuid, &Offer> = HashMap::new();

    // offers arrive sorted by created_at, so the last write per driver wins
    for offer in offers.iter() {
        latest.insert(offer.driver_id.clone(), offer);
    }

    let mut collapsed: Vec<Offer> = latest.into_values().cloned().collect();
    collapsed.sort_by_key(|offer| offer.created_at);

    collapsed
}

#[async_trait]
impl OfferAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn submit_offer(
        &self,
        bid_id: Uuid,
        driver_id: Uuid,
        driver_rating: f64,
        counter_price: i64,
        message: Option<String>,
    ) -> Result<Offer, Error> {
        if counter_price <= 0 {
            return Err(invalid_offer_error());
        }

        if !(0.0..=5.0).contains(&driver_rating) {
            return Err(invalid_offer_error());
        }

        let offer = Offer::new(bid_id, driver_id, driver_rating, counter_price, message);

        // the store re-checks the bid's status and deadline at write time
        self.store.insert_offer(&offer, Utc::now()).await?;

        self.publish(BidEvent::OfferSubmitted {
            bid_id: offer.bid_id.clone(),
            offer_id: offer.id.clone(),
        });

        Ok(offer)
    }

    #[tracing::instrument(skip(self))]
    async fn list_offers(
        &self,
        bid_id: Uuid,
        include_superseded: bool,
    ) -> Result<Vec<Offer>, Error> {
        let offers = self.store.list_offers(bid_id).await?;

        if include_superseded {
            return Ok(offers);
        }

        Ok(latest_per_driver(&offers))
    }
}
