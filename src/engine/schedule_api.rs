use super::Engine;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    api::ScheduleAPI,
    auth::User,
    entities::{Place, RideType, ScheduledRide},
    error::{invalid_request_error, too_soon_error, Error},
};

#[async_trait]
impl ScheduleAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn schedule_ride(
        &self,
        user: User,
        pickup: Place,
        dropoff: Place,
        ride_type: RideType,
        scheduled_time: DateTime<Utc>,
    ) -> Result<ScheduledRide, Error> {
        if !pickup.coordinates.is_valid() || !dropoff.coordinates.is_valid() {
            return Err(invalid_request_error());
        }

        if pickup.coordinates == dropoff.coordinates {
            return Err(invalid_request_error());
        }

        if scheduled_time < Utc::now() + self.config.scheduling_lead_time {
            return Err(too_soon_error());
        }

        let ride = ScheduledRide::new(user.id, pickup, dropoff, ride_type, scheduled_time);

        self.store.insert_scheduled_ride(&ride).await?;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn list_scheduled_rides(&self, user: User) -> Result<Vec<ScheduledRide>, Error> {
        self.store.list_upcoming_rides(user.id).await
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_scheduled_ride(&self, user: User, id: Uuid) -> Result<ScheduledRide, Error> {
        let ride = self.store.find_scheduled_ride(id.clone()).await?;

        self.authorize(user, "cancel", ride)?;

        self.store.cancel_scheduled_ride(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{engine, place};
    use chrono::Duration;

    #[tokio::test]
    async fn lead_time_boundary() {
        let (engine, _, _) = engine();
        let rider = User::new(Uuid::new_v4());

        let err = engine
            .schedule_ride(
                rider.clone(),
                place(9.93, 76.26),
                place(9.97, 76.28),
                RideType::Standard,
                Utc::now() + Duration::minutes(10),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, 103);

        let ride = engine
            .schedule_ride(
                rider,
                place(9.93, 76.26),
                place(9.97, 76.28),
                RideType::Standard,
                Utc::now() + Duration::minutes(31),
            )
            .await
            .unwrap();
        assert!(ride.is_pending());
    }

    #[tokio::test]
    async fn upcoming_rides_are_ordered_and_exclude_cancelled() {
        let (engine, _, _) = engine();
        let rider = User::new(Uuid::new_v4());

        let tomorrow = engine
            .schedule_ride(
                rider.clone(),
                place(9.93, 76.26),
                place(9.97, 76.28),
                RideType::Standard,
                Utc::now() + Duration::hours(24),
            )
            .await
            .unwrap();

        let tonight = engine
            .schedule_ride(
                rider.clone(),
                place(9.93, 76.26),
                place(9.97, 76.28),
                RideType::Premium,
                Utc::now() + Duration::hours(6),
            )
            .await
            .unwrap();

        let dropped = engine
            .schedule_ride(
                rider.clone(),
                place(9.93, 76.26),
                place(9.97, 76.28),
                RideType::Standard,
                Utc::now() + Duration::hours(12),
            )
            .await
            .unwrap();

        engine
            .cancel_scheduled_ride(rider.clone(), dropped.id)
            .await
            .unwrap();

        // another rider's request stays out of the listing
        engine
            .schedule_ride(
                User::new(Uuid::new_v4()),
                place(9.93, 76.26),
                place(9.97, 76.28),
                RideType::Standard,
                Utc::now() + Duration::hours(5),
            )
            .await
            .unwrap();

        let upcoming = engine.list_scheduled_rides(rider).await.unwrap();
        let ids: Vec<Uuid> = upcoming.iter().map(|ride| ride.id.clone()).collect();

        assert_eq!(ids, vec![tonight.id, tomorrow.id]);
    }

    #[tokio::test]
    async fn cancel_requires_ownership() {
        let (engine, _, _) = engine();
        let rider = User::new(Uuid::new_v4());

        let ride = engine
            .schedule_ride(
                rider.clone(),
                place(9.93, 76.26),
                place(9.97, 76.28),
                RideType::Standard,
                Utc::now() + Duration::hours(2),
            )
            .await
            .unwrap();

        let err = engine
            .cancel_scheduled_ride(User::new(Uuid::new_v4()), ride.id.clone())
            .await
            .unwrap_err();
        assert_eq!(err.code, 120);

        let cancelled = engine.cancel_scheduled_ride(rider, ride.id).await.unwrap();
        assert!(!cancelled.is_pending());
    }
}
