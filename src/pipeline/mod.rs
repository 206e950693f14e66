//! Batch orchestration: configuration, the per-invoice chain, and status
//! reconciliation.
//!
//! ```text
//! TableSource ─▶ InvoiceBundle ─▶ for id in invoice_ids():
//!     scope ─▶ assemble ─▶ serialize ─▶ Transport::submit ─▶ reconcile ─▶ StatusStore
//! ```

mod batch;
mod config;
mod reconcile;

pub use batch::*;
pub use config::*;
pub use reconcile::*;
