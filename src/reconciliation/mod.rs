//! Reconciliation of locally edited members and expenses with a remote store
//!
//! The working copy is diffed against the last synced snapshot and replayed as
//! ordered create/update/delete calls. Freshly added members are created first
//! so their expenses can be attached to the store-assigned ids.

pub mod change;
pub mod engine;
pub mod report;

pub use change::*;
pub use engine::*;
pub use report::*;
