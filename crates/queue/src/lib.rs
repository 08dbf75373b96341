pub mod batcher;
pub mod delivery;
pub mod error;

pub use batcher::BatchAccumulator;
pub use delivery::{delivery_queue, DeliveryQueue, DeliveryReceiver, Routes};
pub use error::QueueError;
