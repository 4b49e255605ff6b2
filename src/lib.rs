//! # Sysforest
//!
//! Sysforest keeps a forest of identified *systems*. Each system names its
//! parent by id, and the forest guarantees the parent links never form a cycle,
//! even when a system is moved under a new parent at runtime.
//!
//! ```
//! use sysforest::{System, SystemForest, SystemId};
//!
//! let mut forest = SystemForest::new();
//! forest.add(System::from_raw(11, 0, "billing")).unwrap();
//! forest.add(System::from_raw(22, 11, "invoices")).unwrap();
//!
//! // 11 cannot move below its own child.
//! assert!(forest.add(System::from_raw(11, 22, "billing")).is_err());
//! assert_eq!(forest.depth(SystemId(22)).unwrap(), Some(2));
//! ```
//!
//! The structure is single threaded and purely in memory. Wrap it in a lock if it
//! must be shared.

pub mod forest;
pub mod system;

pub use forest::{AddOutcome, Anchor, DuplicatePolicy, ForestError, SystemForest};
pub use system::{System, SystemFormatError, SystemId};
