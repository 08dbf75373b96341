pub mod error;
pub mod memcache;
pub mod store;
pub mod worker;

pub use error::StoreError;
pub use memcache::MemcacheStore;
pub use store::KeyValueStore;
pub use worker::{run_loader, DestinationOutcome, LoaderSettings};
