//! The on-disk project registries.
//!
//! - [`RegistryStore`] - owns both files and the lock that serializes every
//!   mutation.
//! - [`RegistryTxn`] - exclusive handle obtained from the store. It is the
//!   only way to append.
//! - [`ConsistencyReport`] - result of cross-checking both files.

mod consistency;
mod ledger;
mod store;

pub use consistency::*;
pub use ledger::{next_candidate_id, parse_ids, parse_projects};
pub use store::*;
