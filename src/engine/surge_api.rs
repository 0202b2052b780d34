use super::Engine;

use async_trait::async_trait;

use crate::{
    api::{SurgeAPI, SurgeTarget},
    entities::SurgeZone,
    error::{invalid_request_error, Error},
    surge,
};

#[async_trait]
impl SurgeAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn check_surge(&self, target: SurgeTarget) -> Result<SurgeZone, Error> {
        let zone_id = match target {
            SurgeTarget::Zone(zone_id) => {
                surge::zone_bounds(&zone_id).ok_or_else(|| invalid_request_error())?;
                zone_id
            }
            SurgeTarget::Point(coordinates) => {
                if !coordinates.is_valid() {
                    return Err(invalid_request_error());
                }

                surge::zone_for(&coordinates)
            }
        };

        Ok(self.surge.compute(&zone_id).await.zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::engine;
    use crate::entities::Coordinates;

    #[tokio::test]
    async fn check_by_point_and_zone_agree() {
        let (engine, _, signal) = engine();

        let coordinates = Coordinates { lat: 9.93, lng: 76.26 };
        let zone_id = surge::zone_for(&coordinates);
        signal.set(&zone_id, 9, 3).await;

        let by_point = engine
            .check_surge(SurgeTarget::Point(coordinates))
            .await
            .unwrap();
        let by_zone = engine
            .check_surge(SurgeTarget::Zone(zone_id.clone()))
            .await
            .unwrap();

        assert_eq!(by_point.zone_id, zone_id);
        assert_eq!(by_point.multiplier, by_zone.multiplier);
        assert_eq!(by_point.multiplier, 2.0);
        assert!(!by_point.reasons.is_empty());
    }

    #[tokio::test]
    async fn multiplier_clamped_to_cap() {
        let (engine, _, signal) = engine();

        let coordinates = Coordinates { lat: 9.93, lng: 76.26 };
        let zone_id = surge::zone_for(&coordinates);
        signal.set(&zone_id, 500, 1).await;

        let zone = engine.check_surge(SurgeTarget::Zone(zone_id)).await.unwrap();
        assert_eq!(zone.multiplier, 3.0);
    }

    #[tokio::test]
    async fn rejects_malformed_targets() {
        let (engine, _, _) = engine();

        let err = engine
            .check_surge(SurgeTarget::Zone("nope".into()))
            .await
            .unwrap_err();
        assert_eq!(err.code, 101);

        let err = engine
            .check_surge(SurgeTarget::Point(Coordinates {
                lat: 120.0,
                lng: 0.0,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, 101);
    }
}
