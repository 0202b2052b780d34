use geo_types::{Geometry, Point};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl From<Coordinates> for Geometry<f64> {
    fn from(coordinates: Coordinates) -> Self {
        Geometry::Point(Point::new(coordinates.lng, coordinates.lat))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Place {
    pub coordinates: Coordinates,
    pub address: String,
}

impl Place {
    pub fn new(coordinates: Coordinates, address: String) -> Self {
        Self {
            coordinates,
            address,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn contains(&self, coordinates: &Coordinates) -> bool {
        coordinates.lat >= self.min_lat
            && coordinates.lat <= self.max_lat
            && coordinates.lng >= self.min_lng
            && coordinates.lng <= self.max_lng
    }
}

#[test]
fn coordinate_validity_test() {
    assert!(Coordinates { lat: 0.0, lng: 0.0 }.is_valid());
    assert!(Coordinates {
        lat: -90.0,
        lng: 180.0
    }
    .is_valid());
    assert!(!Coordinates {
        lat: 90.5,
        lng: 0.0
    }
    .is_valid());
    assert!(!Coordinates {
        lat: f64::NAN,
        lng: 0.0
    }
    .is_valid());
}

#[test]
fn bounding_box_contains_test() {
    let bounds = BoundingBox {
        min_lat: 10.0,
        min_lng: 20.0,
        max_lat: 11.0,
        max_lng: 21.0,
    };

    assert!(bounds.contains(&Coordinates {
        lat: 10.5,
        lng: 20.5
    }));
    assert!(bounds.contains(&Coordinates {
        lat: 10.0,
        lng: 21.0
    }));
    assert!(!bounds.contains(&Coordinates {
        lat: 11.5,
        lng: 20.5
    }));
    assert!(!bounds.contains(&Coordinates {
        lat: 10.5,
        lng: 19.5
    }));
}
