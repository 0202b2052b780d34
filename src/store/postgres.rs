use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geo_types::Geometry;
use geozero::wkb;
use sqlx::{types::Json, Acquire, Executor, Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::entities::{Bid, BoundingBox, Offer, ScheduledRide, Status};
use crate::error::{bid_expired_error, bid_not_open_error, invalid_request_error, Error};
use crate::store::Store;

type Database = Postgres;

/// Durable store. Status lives in its own column beside the JSONB record so
/// conditional transitions and sweeps never deserialize the whole row set;
/// `FOR UPDATE` row locks serialize transitions per bid.
pub struct PgStore {
    pool: Pool<Database>,
}

impl PgStore {
    #[tracing::instrument(name = "PgStore::new", skip_all)]
    pub async fn new(pool: Pool<Database>) -> Result<Self, Error> {
        pool.execute(
            "CREATE TABLE IF NOT EXISTS bids (id UUID PRIMARY KEY, status VARCHAR NOT NULL, expires_at TIMESTAMPTZ NOT NULL, pickup geometry(Point), data jsonb NOT NULL)",
        )
        .await?;

        pool.execute(
            "CREATE TABLE IF NOT EXISTS offers (id UUID PRIMARY KEY, bid_id UUID NOT NULL, driver_id UUID NOT NULL, created_at TIMESTAMPTZ NOT NULL, data jsonb NOT NULL, CONSTRAINT fk_offer_bid FOREIGN KEY(bid_id) REFERENCES bids(id))",
        )
        .await?;

        pool.execute(
            "CREATE TABLE IF NOT EXISTS scheduled_rides (id UUID PRIMARY KEY, rider_id UUID NOT NULL, status VARCHAR NOT NULL, scheduled_time TIMESTAMPTZ NOT NULL, data jsonb NOT NULL)",
        )
        .await?;

        Ok(Self { pool })
    }
}

#[tracing::instrument(skip(tx))]
async fn fetch_bid_for_update(
    tx: &mut Transaction<'_, Database>,
    id: &Uuid,
) -> Result<Bid, Error> {
    let Json(bid): Json<Bid> = tx
        .fetch_optional(sqlx::query("SELECT data FROM bids WHERE id = $1 FOR UPDATE").bind(id))
        .await?
        .ok_or_else(|| invalid_request_error())?
        .try_get("data")?;

    Ok(bid)
}

#[tracing::instrument(skip(tx))]
async fn update_bid(tx: &mut Transaction<'_, Database>, bid: &Bid) -> Result<(), Error> {
    tx.execute(
        sqlx::query("UPDATE bids SET status = $2, data = $3 WHERE id = $1")
            .bind(&bid.id)
            .bind(bid.status.name())
            .bind(Json(bid)),
    )
    .await?;

    Ok(())
}

#[async_trait]
impl Store for PgStore {
    #[tracing::instrument(skip(self))]
    async fn insert_bid(&self, bid: &Bid) -> Result<(), Error> {
        let pickup: Geometry<f64> = bid.pickup.coordinates.clone().into();

        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query(
                "INSERT INTO bids (id, status, expires_at, pickup, data) VALUES ($1, $2, $3, ST_SetSRID($4, 4326), $5)",
            )
            .bind(&bid.id)
            .bind(bid.status.name())
            .bind(&bid.expires_at)
            .bind(wkb::Encode(pickup))
            .bind(Json(bid)),
        )
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_bid(&self, id: Uuid) -> Result<Bid, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(sqlx::query("SELECT data FROM bids WHERE id = $1").bind(&id))
            .await?;

        let result = maybe_result.ok_or_else(|| invalid_request_error())?;
        let Json(bid) = result.try_get("data")?;

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn list_open_bids(
        &self,
        bounds: Option<BoundingBox>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Bid>, Error> {
        let mut conn = self.pool.acquire().await?;

        let results = match bounds {
            Some(bounds) => {
                let query = "
                    SELECT data FROM bids
                    WHERE status = 'open'
                        AND expires_at > $1
                        AND ST_Within(pickup, ST_MakeEnvelope($2, $3, $4, $5, 4326))
                ";

                conn.fetch_all(
                    sqlx::query(query)
                        .bind(&now)
                        .bind(bounds.min_lng)
                        .bind(bounds.min_lat)
                        .bind(bounds.max_lng)
                        .bind(bounds.max_lat),
                )
                .await?
            }
            None => {
                conn.fetch_all(
                    sqlx::query("SELECT data FROM bids WHERE status = 'open' AND expires_at > $1")
                        .bind(&now),
                )
                .await?
            }
        };

        let mut bids = vec![];
        for result in results.iter() {
            let Json(bid): Json<Bid> = result.try_get("data")?;
            bids.push(bid);
        }

        bids.sort_by_key(|bid| bid.created_at);

        Ok(bids)
    }

    #[tracing::instrument(skip(self))]
    async fn open_bids_due(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, Error> {
        let mut conn = self.pool.acquire().await?;

        let results = conn
            .fetch_all(
                sqlx::query("SELECT id FROM bids WHERE status = 'open' AND expires_at <= $1")
                    .bind(&now),
            )
            .await?;

        let mut due = vec![];
        for result in results.iter() {
            due.push(result.try_get("id")?);
        }

        Ok(due)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_matched(
        &self,
        id: Uuid,
        offer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Bid, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut bid = fetch_bid_for_update(&mut tx, &id).await?;

        if bid.expire_if_due(now) {
            update_bid(&mut tx, &bid).await?;
            tx.commit().await?;

            return Err(bid_expired_error());
        }

        bid.accept(offer_id)?;

        update_bid(&mut tx, &bid).await?;
        tx.commit().await?;

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn revert_matched(&self, id: Uuid) -> Result<Bid, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut bid = fetch_bid_for_update(&mut tx, &id).await?;
        bid.reopen()?;

        update_bid(&mut tx, &bid).await?;
        tx.commit().await?;

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_cancelled(&self, id: Uuid, now: DateTime<Utc>) -> Result<Bid, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut bid = fetch_bid_for_update(&mut tx, &id).await?;

        if bid.expire_if_due(now) {
            update_bid(&mut tx, &bid).await?;
            tx.commit().await?;

            return Err(bid_expired_error());
        }

        bid.cancel()?;

        update_bid(&mut tx, &bid).await?;
        tx.commit().await?;

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_expired(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut bid = fetch_bid_for_update(&mut tx, &id).await?;

        if !bid.expire_if_due(now) {
            return Ok(false);
        }

        update_bid(&mut tx, &bid).await?;
        tx.commit().await?;

        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    async fn insert_offer(&self, offer: &Offer, now: DateTime<Utc>) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        // the deadline and status are re-checked under the row lock, so an
        // offer can never land on a bid that closed after a stale read
        let mut bid = fetch_bid_for_update(&mut tx, &offer.bid_id).await?;

        if bid.expire_if_due(now) {
            update_bid(&mut tx, &bid).await?;
            tx.commit().await?;

            return Err(bid_expired_error());
        }

        match &bid.status {
            Status::Open => {}
            Status::Expired => return Err(bid_expired_error()),
            _ => return Err(bid_not_open_error()),
        }

        tx.execute(
            sqlx::query(
                "INSERT INTO offers (id, bid_id, driver_id, created_at, data) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&offer.id)
            .bind(&offer.bid_id)
            .bind(&offer.driver_id)
            .bind(&offer.created_at)
            .bind(Json(offer)),
        )
        .await?;

        tx.commit().await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list_offers(&self, bid_id: Uuid) -> Result<Vec<Offer>, Error> {
        let mut conn = self.pool.acquire().await?;

        let results = conn
            .fetch_all(
                sqlx::query("SELECT data FROM offers WHERE bid_id = $1 ORDER BY created_at ASC")
                    .bind(&bid_id),
            )
            .await?;

        let mut offers = vec![];
        for result in results.iter() {
            let Json(offer): Json<Offer> = result.try_get("data")?;
            offers.push(offer);
        }

        Ok(offers)
    }

    #[tracing::instrument(skip(self))]
    async fn insert_scheduled_ride(&self, ride: &ScheduledRide) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query(
                "INSERT INTO scheduled_rides (id, rider_id, status, scheduled_time, data) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&ride.id)
            .bind(&ride.rider_id)
            .bind(ride.status.name())
            .bind(&ride.scheduled_time)
            .bind(Json(ride)),
        )
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_scheduled_ride(&self, id: Uuid) -> Result<ScheduledRide, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(
                sqlx::query("SELECT data FROM scheduled_rides WHERE id = $1").bind(&id),
            )
            .await?;

        let result = maybe_result.ok_or_else(|| invalid_request_error())?;
        let Json(ride) = result.try_get("data")?;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn list_upcoming_rides(&self, rider_id: Uuid) -> Result<Vec<ScheduledRide>, Error> {
        let mut conn = self.pool.acquire().await?;

        let results = conn
            .fetch_all(
                sqlx::query(
                    "SELECT data FROM scheduled_rides WHERE rider_id = $1 AND status = 'pending' ORDER BY scheduled_time ASC",
                )
                .bind(&rider_id),
            )
            .await?;

        let mut rides = vec![];
        for result in results.iter() {
            let Json(ride): Json<ScheduledRide> = result.try_get("data")?;
            rides.push(ride);
        }

        Ok(rides)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_scheduled_ride(&self, id: Uuid) -> Result<ScheduledRide, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let Json(mut ride): Json<ScheduledRide> = tx
            .fetch_optional(
                sqlx::query("SELECT data FROM scheduled_rides WHERE id = $1 FOR UPDATE").bind(&id),
            )
            .await?
            .ok_or_else(|| invalid_request_error())?
            .try_get("data")?;

        ride.cancel()?;

        tx.execute(
            sqlx::query("UPDATE scheduled_rides SET status = $2, data = $3 WHERE id = $1")
                .bind(&ride.id)
                .bind(ride.status.name())
                .bind(Json(&ride)),
        )
        .await?;

        tx.commit().await?;

        Ok(ride)
    }
}
