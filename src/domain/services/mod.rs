mod aggregator;
mod controller;

pub use aggregator::*;
pub use controller::*;
