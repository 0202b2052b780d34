pub mod bids;
pub mod offers;
pub mod scheduled_rides;
pub mod surge;
