pub mod billing;
pub mod distance;
