use axum::extract::{Extension, Json, Path, Query};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{DynAPI, OfferAPI};
use crate::entities::Offer;
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    driver_id: Uuid,
    driver_rating: f64,
    counter_price: i64,
    message: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ListParams {
    include_superseded: Option<bool>,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    Path(bid_id): Path<Uuid>,
    Json(params): Json<CreateParams>,
) -> Result<Json<Offer>, Error> {
    let offer = api
        .submit_offer(
            bid_id,
            params.driver_id,
            params.driver_rating,
            params.counter_price,
            params.message,
        )
        .await?;

    Ok(offer.into())
}

pub async fn list(
    Extension(api): Extension<DynAPI>,
    Path(bid_id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Offer>>, Error> {
    let offers = api
        .list_offers(bid_id, params.include_superseded.unwrap_or(false))
        .await?;

    Ok(offers.into())
}
