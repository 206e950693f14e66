//! Tables, column resolution, invoice scoping, and derived amounts.
//!
//! Input arrives as loosely named relational tables. This module turns
//! them into per-invoice bundles with alias-tolerant field access.

mod derive;
mod error;
pub mod fields;
mod resolve;
mod scope;
mod table;

pub use derive::*;
pub use error::*;
pub use resolve::*;
pub use scope::*;
pub use table::*;
