use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::entities::{BoundingBox, Coordinates, SurgeZone};
use crate::error::Error;

/// Zones are a fixed lat/lng grid; good enough to bucket demand without any
/// external geo dependency.
const CELL_DEGREES: f64 = 0.05;

pub fn zone_for(coordinates: &Coordinates) -> String {
    let row = (coordinates.lat / CELL_DEGREES).floor() as i64;
    let col = (coordinates.lng / CELL_DEGREES).floor() as i64;

    format!("z{}:{}", row, col)
}

pub fn zone_bounds(zone_id: &str) -> Option<BoundingBox> {
    let cells = zone_id.strip_prefix('z')?;
    let (row, col) = cells.split_once(':')?;

    let row: i64 = row.parse().ok()?;
    let col: i64 = col.parse().ok()?;

    Some(BoundingBox {
        min_lat: row as f64 * CELL_DEGREES,
        min_lng: col as f64 * CELL_DEGREES,
        max_lat: (row + 1) as f64 * CELL_DEGREES,
        max_lng: (col + 1) as f64 * CELL_DEGREES,
    })
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ZoneStats {
    pub demand: u32,
    pub supply: u32,
}

/// Demand/supply counts come from outside the engine. The engine never
/// inspects where they came from.
#[async_trait]
pub trait SurgeSignal: Send + Sync {
    async fn zone_stats(&self, zone_id: &str) -> Result<ZoneStats, Error>;
}

/// A table-backed signal: the default wiring, and what the simulation and
/// tests feed.
pub struct TableSignal {
    stats: Mutex<HashMap<String, ZoneStats>>,
}

impl TableSignal {
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(HashMap::new()),
        }
    }

    pub async fn set(&self, zone_id: &str, demand: u32, supply: u32) {
        self.stats
            .lock()
            .await
            .insert(zone_id.into(), ZoneStats { demand, supply });
    }
}

#[async_trait]
impl SurgeSignal for TableSignal {
    async fn zone_stats(&self, zone_id: &str) -> Result<ZoneStats, Error> {
        Ok(self
            .stats
            .lock()
            .await
            .get(zone_id)
            .copied()
            .unwrap_or_default())
    }
}

pub struct Reading {
    pub zone: SurgeZone,
    pub signal_unavailable: bool,
}

pub struct SurgeCalculator {
    signal: Arc<dyn SurgeSignal>,
    cap: f64,
}

impl SurgeCalculator {
    pub fn new(signal: Arc<dyn SurgeSignal>, cap: f64) -> Self {
        Self {
            signal,
            cap: cap.max(1.0),
        }
    }

    /// Never fails: an unavailable signal degrades to multiplier 1.0 and the
    /// reading is flagged so the bid can record "surge unknown".
    #[tracing::instrument(skip(self))]
    pub async fn compute(&self, zone_id: &str) -> Reading {
        match self.signal.zone_stats(zone_id).await {
            Ok(stats) => {
                let (multiplier, reasons) = multiplier_for(stats, self.cap);

                Reading {
                    zone: SurgeZone {
                        zone_id: zone_id.into(),
                        multiplier,
                        reasons,
                        computed_at: Utc::now(),
                    },
                    signal_unavailable: false,
                }
            }
            Err(err) => {
                tracing::warn!(code = err.code, zone_id, "surge signal unavailable");

                Reading {
                    zone: SurgeZone {
                        zone_id: zone_id.into(),
                        multiplier: 1.0,
                        reasons: vec!["signal unavailable".into()],
                        computed_at: Utc::now(),
                    },
                    signal_unavailable: true,
                }
            }
        }
    }
}

/// Linear in the demand/supply ratio above parity, quantized to 0.1 and
/// clamped to [1.0, cap]. Zero supply with waiting demand pins to the cap.
fn multiplier_for(stats: ZoneStats, cap: f64) -> (f64, Vec<String>) {
    if stats.supply == 0 {
        if stats.demand == 0 {
            return (1.0, vec![]);
        }

        return (cap, vec!["no available drivers".into()]);
    }

    let ratio = stats.demand as f64 / stats.supply as f64;

    if ratio <= 1.0 {
        return (1.0, vec![]);
    }

    let raw = 1.0 + 0.5 * (ratio - 1.0);
    let quantized = (raw * 10.0).round() / 10.0;

    (quantized.clamp(1.0, cap), vec!["demand exceeds supply".into()])
}

#[test]
fn multiplier_bounds_test() {
    let cap = 3.0;

    let (quiet, _) = multiplier_for(ZoneStats { demand: 0, supply: 0 }, cap);
    assert_eq!(quiet, 1.0);

    let (balanced, _) = multiplier_for(
        ZoneStats {
            demand: 5,
            supply: 5,
        },
        cap,
    );
    assert_eq!(balanced, 1.0);

    let (busy, reasons) = multiplier_for(
        ZoneStats {
            demand: 12,
            supply: 6,
        },
        cap,
    );
    assert_eq!(busy, 1.5);
    assert_eq!(reasons, vec!["demand exceeds supply".to_string()]);

    let (extreme, _) = multiplier_for(
        ZoneStats {
            demand: 100,
            supply: 1,
        },
        cap,
    );
    assert_eq!(extreme, cap);

    let (starved, reasons) = multiplier_for(
        ZoneStats {
            demand: 3,
            supply: 0,
        },
        cap,
    );
    assert_eq!(starved, cap);
    assert_eq!(reasons, vec!["no available drivers".to_string()]);
}

#[test]
fn zone_grid_round_trip_test() {
    let coordinates = Coordinates { lat: 9.93, lng: 76.26 };

    let zone_id = zone_for(&coordinates);
    let bounds = zone_bounds(&zone_id).unwrap();

    assert!(bounds.contains(&coordinates));

    // negative hemisphere cells resolve too
    let southern = Coordinates {
        lat: -33.87,
        lng: -70.64,
    };
    let bounds = zone_bounds(&zone_for(&southern)).unwrap();
    assert!(bounds.contains(&southern));

    assert!(zone_bounds("not-a-zone").is_none());
    assert!(zone_bounds("z1").is_none());
}

#[test]
fn unavailable_signal_defaults_to_base_test() {
    struct DownSignal;

    #[async_trait]
    impl SurgeSignal for DownSignal {
        async fn zone_stats(&self, _zone_id: &str) -> Result<ZoneStats, Error> {
            Err(crate::error::upstream_error())
        }
    }

    let calculator = SurgeCalculator::new(Arc::new(DownSignal), 3.0);
    let reading = tokio_test::block_on(calculator.compute("z0:0"));

    assert!(reading.signal_unavailable);
    assert_eq!(reading.zone.multiplier, 1.0);
    assert_eq!(reading.zone.reasons, vec!["signal unavailable".to_string()]);
}
