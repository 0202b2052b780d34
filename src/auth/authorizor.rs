use oso::{Oso, PolarClass};

use crate::auth::User;
use crate::entities::{Bid, ScheduledRide};

pub fn new() -> Oso {
    let mut o = Oso::new();

    o.register_class(User::get_polar_class()).unwrap();
    o.register_class(Bid::get_polar_class()).unwrap();
    o.register_class(ScheduledRide::get_polar_class()).unwrap();

    o.load_str(include_str!("rules.polar")).unwrap();

    o
}

#[test]
fn bid_rider_role_test() {
    use crate::entities::{Coordinates, Place, RideType};
    use chrono::Duration;
    use uuid::Uuid;

    let authorizor = new();

    let rider = User::new(Uuid::new_v4());
    let stranger = User::new(Uuid::new_v4());

    let pickup = Place::new(Coordinates { lat: 9.93, lng: 76.26 }, "".into());
    let dropoff = Place::new(Coordinates { lat: 9.97, lng: 76.28 }, "".into());
    let bid = Bid::new(
        rider.id.clone(),
        pickup,
        dropoff,
        RideType::Standard,
        1500,
        1.0,
        false,
        Duration::seconds(180),
    );

    let result = authorizor.query_rule("has_role", (rider.clone(), "rider", bid.clone()));
    assert!(result.unwrap().next().unwrap().is_ok());

    let result = authorizor.query_rule("has_role", (stranger.clone(), "rider", bid.clone()));
    assert!(result.unwrap().next().is_none());

    let result = authorizor.is_allowed(rider.clone(), "accept", bid.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(rider.clone(), "cancel", bid.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(stranger.clone(), "accept", bid.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(stranger.clone(), "cancel", bid.clone());
    assert_eq!(result.unwrap(), false);
}

#[test]
fn scheduled_ride_rider_role_test() {
    use crate::entities::{Coordinates, Place, RideType};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    let authorizor = new();

    let rider = User::new(Uuid::new_v4());
    let stranger = User::new(Uuid::new_v4());

    let pickup = Place::new(Coordinates { lat: 9.93, lng: 76.26 }, "".into());
    let dropoff = Place::new(Coordinates { lat: 9.97, lng: 76.28 }, "".into());
    let ride = ScheduledRide::new(
        rider.id.clone(),
        pickup,
        dropoff,
        RideType::Standard,
        Utc::now() + Duration::minutes(45),
    );

    let result = authorizor.query_rule("has_role", (rider.clone(), "rider", ride.clone()));
    assert!(result.unwrap().next().unwrap().is_ok());

    let result = authorizor.is_allowed(rider.clone(), "cancel", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(stranger.clone(), "cancel", ride.clone());
    assert_eq!(result.unwrap(), false);
}
