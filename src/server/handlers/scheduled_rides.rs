use axum::extract::{Extension, Json, Path, Query};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{DynAPI, ScheduleAPI};
use crate::auth::User;
use crate::entities::{Place, RideType, ScheduledRide};
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    rider_id: Uuid,
    pickup: Place,
    dropoff: Place,
    ride_type: RideType,
    scheduled_time: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
pub struct ListParams {
    rider_id: Uuid,
}

#[derive(Serialize, Deserialize)]
pub struct CancelParams {
    rider_id: Uuid,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    Json(params): Json<CreateParams>,
) -> Result<Json<ScheduledRide>, Error> {
    let ride = api
        .schedule_ride(
            User::new(params.rider_id),
            params.pickup,
            params.dropoff,
            params.ride_type,
            params.scheduled_time,
        )
        .await?;

    Ok(ride.into())
}

pub async fn list(
    Extension(api): Extension<DynAPI>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ScheduledRide>>, Error> {
    let rides = api.list_scheduled_rides(User::new(params.rider_id)).await?;

    Ok(rides.into())
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<CancelParams>,
) -> Result<Json<ScheduledRide>, Error> {
    let ride = api
        .cancel_scheduled_ride(User::new(params.rider_id), id)
        .await?;

    Ok(ride.into())
}
