mod handlers;

use std::net::SocketAddr;

use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Router,
};

use crate::api::DynAPI;
use crate::server::handlers::{bids, offers, scheduled_rides, surge};

pub async fn serve(api: DynAPI, addr: SocketAddr) {
    let app = Router::new()
        .route("/bids", post(bids::create).get(bids::list_open))
        .route("/bids/:id", get(bids::find))
        .route("/bids/:id/cancel", patch(bids::cancel))
        .route("/bids/:id/accept", patch(bids::accept))
        .route("/bids/:id/offers", post(offers::create).get(offers::list))
        .route("/surge", get(surge::check))
        .route(
            "/scheduled_rides",
            post(scheduled_rides::create).get(scheduled_rides::list),
        )
        .route(
            "/scheduled_rides/:id/cancel",
            patch(scheduled_rides::cancel),
        )
        .layer(Extension(api));

    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
