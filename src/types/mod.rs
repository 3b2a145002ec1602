pub mod calendar;
pub mod reading;
pub mod snapshot;
