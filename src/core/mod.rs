pub mod acquisition;
pub mod scheduler;
