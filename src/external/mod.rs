pub mod trip_service;
