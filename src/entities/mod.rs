mod bid;
mod offer;
mod place;
mod scheduled_ride;
mod surge_zone;
mod trip;

pub use bid::{Bid, BidSummary, RideType, Status};
pub use offer::Offer;
pub use place::{BoundingBox, Coordinates, Place};
pub use scheduled_ride::{ScheduleStatus, ScheduledRide};
pub use surge_zone::SurgeZone;
pub use trip::Trip;
