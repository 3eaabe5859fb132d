pub mod blocking;
pub mod models;
pub mod schedule;
