use chrono::{DateTime, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Place, RideType};
use crate::error::{invalid_transition_error, Error};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduledRide {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub pickup: Place,
    pub dropoff: Place,
    pub ride_type: RideType,
    pub scheduled_time: DateTime<Utc>,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Cancelled,
}

impl ScheduleStatus {
    pub fn name(&self) -> String {
        match self {
            Self::Pending => "pending".into(),
            Self::Cancelled => "cancelled".into(),
        }
    }
}

impl ScheduledRide {
    pub fn new(
        rider_id: Uuid,
        pickup: Place,
        dropoff: Place,
        ride_type: RideType,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rider_id,
            pickup,
            dropoff,
            ride_type,
            scheduled_time,
            status: ScheduleStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ScheduleStatus::Pending
    }

    pub fn cancel(&mut self) -> Result<(), Error> {
        match self.status {
            ScheduleStatus::Pending => {
                self.status = ScheduleStatus::Cancelled;
                Ok(())
            }
            _ => Err(invalid_transition_error()),
        }
    }
}

impl PolarClass for ScheduledRide {
    fn get_polar_class_builder() -> oso::ClassBuilder<ScheduledRide> {
        oso::Class::builder()
            .name("ScheduledRide")
            .add_attribute_getter("id", |recv: &ScheduledRide| recv.id.clone())
            .add_attribute_getter("rider_id", |recv: &ScheduledRide| recv.rider_id.clone())
    }

    fn get_polar_class() -> oso::Class {
        let builder = ScheduledRide::get_polar_class_builder();
        builder.build()
    }
}
