//! # cxml-invoice
//!
//! Turns loosely named relational invoice tables into signed cXML
//! `InvoiceDetailRequest` documents, posts them to a receiving endpoint,
//! and writes the outcome back to the source records.
//!
//! All monetary values use [`rust_decimal::Decimal`]. Column names are
//! resolved through alias lists, so `InvoiceID`, `invoice_id` and
//! `header_invoiceid` all name the same field.
//!
//! ## Quick Start
//!
//! ```rust
//! use cxml_invoice::core::{InvoiceBundle, InvoiceId, Sheet, Table, Value};
//! use cxml_invoice::cxml::{Assembler, DocumentDefaults, SignatureMaterial, StaticSignature, serialize};
//!
//! let header = Table::new(&["invoice_id", "invoice_date"])
//!     .row(vec![Value::Int(4701265854), Value::from("2025-06-01")]);
//! let items = Table::new(&["invoice_id", "quantity", "unit_price", "currency"])
//!     .row(vec![Value::Int(4701265854), Value::Int(1), Value::Int(100), Value::from("GBP")]);
//! let bundle = InvoiceBundle::default()
//!     .with(Sheet::Header, header)
//!     .with(Sheet::Items, items);
//!
//! let id = InvoiceId::Numeric(4701265854);
//! let defaults = DocumentDefaults::default();
//! let signer = StaticSignature(SignatureMaterial::default());
//! let doc = Assembler::new(&defaults, &signer).assemble(&id, &bundle.scoped(&id))?;
//! let xml = String::from_utf8(serialize(&doc)?).unwrap();
//!
//! assert!(xml.contains("<InvoiceDetailRequest>"));
//! assert!(xml.contains(r#"<Money currency="GBP">100</Money>"#));
//! # Ok::<(), cxml_invoice::core::CxmlError>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Tables, column resolution, scoping, cXML assembly and signature block, status parsing, in-memory store, batch pipeline |
//! | `submit` | Blocking HTTP submission client |
//! | `postgres` | Postgres table source and status store |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod cxml;

#[cfg(feature = "core")]
pub mod pipeline;

#[cfg(feature = "core")]
pub mod store;

#[cfg(feature = "core")]
pub mod submit;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
