mod clock;
mod storage;

pub use clock::{Clock, SystemClock};
pub use storage::{IEntitlementStorage, StorageHealth};
