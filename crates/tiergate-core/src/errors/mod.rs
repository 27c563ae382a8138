mod recovery;
mod storage_error;
mod tiergate_error;

pub use recovery::RecoveryAction;
pub use storage_error::StorageError;
pub use tiergate_error::{ErrorKind, TierGateError, TierGateResult};
