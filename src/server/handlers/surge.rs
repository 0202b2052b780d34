use axum::extract::{Extension, Json, Query};
use serde::{Deserialize, Serialize};

use crate::api::{DynAPI, SurgeAPI, SurgeTarget};
use crate::entities::{Coordinates, SurgeZone};
use crate::error::{invalid_request_error, Error};

#[derive(Serialize, Deserialize)]
pub struct CheckParams {
    zone: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
}

pub async fn check(
    Extension(api): Extension<DynAPI>,
    Query(params): Query<CheckParams>,
) -> Result<Json<SurgeZone>, Error> {
    let target = match (params.zone, params.lat, params.lng) {
        (Some(zone), _, _) => SurgeTarget::Zone(zone),
        (None, Some(lat), Some(lng)) => SurgeTarget::Point(Coordinates { lat, lng }),
        _ => return Err(invalid_request_error()),
    };

    let zone = api.check_surge(target).await?;

    Ok(zone.into())
}
