pub mod actor;
pub mod booking;
pub mod order;
pub mod quote;
pub mod schedule;
