pub mod driver;
pub mod error;
pub mod gate;

pub use driver::{Driver, RunReport};
pub use error::DriverError;
pub use gate::{evaluate, GateDecision, Totals};
