use std::sync::Arc;

use palfrey::config::Config;
use palfrey::db::PgPool;
use palfrey::engine::Engine;
use palfrey::expirer::BidExpirer;
use palfrey::external::trip_service::TripServiceClient;
use palfrey::server;
use palfrey::simulation;
use palfrey::store::{MemoryStore, PgStore};
use palfrey::surge::{SurgeCalculator, TableSignal};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env().unwrap();

    let signal = Arc::new(TableSignal::new());
    let surge = SurgeCalculator::new(signal, config.surge_cap);

    if std::env::var("SIMULATION").is_ok() {
        let store = Arc::new(MemoryStore::new());
        let trips = Arc::new(simulation::LocalTripFactory);

        let engine = Arc::new(Engine::new(store, trips, surge, config.clone()));

        BidExpirer::new(engine.clone(), config.expiry_sweep_interval).spawn();

        simulation::Executor::new(engine).run().await;
        return;
    }

    let PgPool(pool) = PgPool::new(&config.database_url, 5).await.unwrap();

    let store = Arc::new(PgStore::new(pool).await.unwrap());
    let trips = Arc::new(TripServiceClient::new(config.trip_service_url.clone()));

    let engine = Arc::new(Engine::new(store, trips, surge, config.clone()));

    BidExpirer::new(engine.clone(), config.expiry_sweep_interval).spawn();

    server::serve(engine, config.bind_addr).await;
}
