//! # Statement Core
//!
//! Turns the text of a bank or credit card statement into a typed,
//! reconciled statement, or rejects it.
//!
//! ## Features
//!
//! - **Variant descriptors**: each institution's layout is plain data (TOML or code), compiled once
//! - **Field extraction**: label grammars and positional multi-figure lines, with exact decimal amounts
//! - **Transaction extraction**: ordinary, single-occurrence and installment lines
//! - **Reconciliation**: exact balance and transaction-total identities, no tolerance
//! - **Collaborator seams**: async text sources and exporters behind traits
//!
//! ## Quick Start
//!
//! ```rust
//! use statement_core::{StatementEngine, VariantRegistry};
//!
//! let registry = VariantRegistry::with_builtins().unwrap();
//! let mut engine = StatementEngine::for_variant(&registry, "bpi-credit").unwrap();
//!
//! // Text without the format signature is rejected before any extraction
//! assert!(engine.parse("hello").is_err());
//! assert!(engine.statement().is_pristine());
//! ```

pub mod reconciliation;
pub mod statement;
pub mod traits;
pub mod types;
pub mod utils;
pub mod variant;

// Re-export commonly used types
pub use reconciliation::{is_balanced, is_transaction_complete, reconcile, ReconciliationCheck};
pub use statement::*;
pub use traits::*;
pub use types::*;
pub use variant::{Variant, VariantDescriptor, VariantRegistry};
