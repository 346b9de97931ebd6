//! # Tabsplit Core
//!
//! Balance settlement and edit reconciliation for shared expense tabs.
//!
//! ## Features
//!
//! - **Settlement**: net balances per member and a deterministic list of
//!   transfers that clears every debt
//! - **Involvement**: expenses shared by everyone or by an explicit subset
//! - **Local editing**: placeholder ids for unsaved members and expenses,
//!   change tracking against the last synced snapshot
//! - **Reconciliation**: ordered create/update/delete replay against a store,
//!   with per-operation failure reporting
//! - **Storage abstraction**: any backend implementing [`ProjectStore`]
//!
//! ## Quick Start
//!
//! ```rust
//! use tabsplit_core::{compute_settlement, EntityId, Expense, Member};
//! use bigdecimal::BigDecimal;
//!
//! let members = vec![
//!     Member::new(EntityId::persisted("a"), Some("Ana".to_string()), 0).with_expense(
//!         Expense::new(EntityId::persisted("e1"), None, Some(BigDecimal::from(30)), 0),
//!     ),
//!     Member::new(EntityId::persisted("b"), Some("Bo".to_string()), 1),
//!     Member::new(EntityId::persisted("c"), Some("Cy".to_string()), 2),
//! ];
//!
//! let payments = compute_settlement(&members);
//! assert_eq!(payments.len(), 2);
//! ```

pub mod project;
pub mod reconciliation;
pub mod settlement;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use project::*;
pub use reconciliation::*;
pub use settlement::*;
pub use traits::*;
pub use types::*;
