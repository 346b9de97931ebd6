//! Settlement engine: net balances per member and the transfers that clear them

pub mod balance;
pub mod payment;

pub use balance::*;
pub use payment::*;
