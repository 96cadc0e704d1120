pub mod candidate;
pub mod ranking;
