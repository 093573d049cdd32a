//! Secure index: the durable map from relative path to remote object
//! identity (§3, §4.F).

pub mod entry;
pub mod factory;
pub mod store;

pub use entry::{EntryStatus, IndexEntry};
pub use factory::{IndexFactory, OpenedIndex};
pub use store::SecureIndex;
