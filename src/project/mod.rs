//! Project editing: local mutations, change tracking and save

pub mod session;

pub use session::*;
