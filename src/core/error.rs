use thiserror::Error;

/// Errors raised while loading, assembling, or reconciling invoices.
///
/// Sparse or uncoercible input never lands here: missing optional values
/// degrade to defaults inside the assembler. Transport failures have their
/// own type, [`crate::submit::TransportError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CxmlError {
    /// Required structural input is absent or unsafe (e.g. a table name
    /// that fails the identifier check).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No invoice-identifier column could be resolved in any table of the bundle.
    #[error("missing invoice identifier: {0}")]
    MissingInvoiceIdentifier(String),

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Signature material was rejected by the composer.
    #[error("signature error: {0}")]
    Signature(String),

    /// The relational store failed to answer a query.
    #[error("store error: {0}")]
    Store(String),

    /// The reconciler could not identify the invoice to update.
    #[error("reconciliation error: {0}")]
    Reconciliation(String),

    /// An amount computed from the input does not fit a decimal.
    #[error("amount out of range: {0}")]
    Amount(String),
}

impl CxmlError {
    /// Whether this error is a configuration-class failure (fatal for the
    /// current invoice, never for the batch).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::MissingInvoiceIdentifier(_)
        )
    }
}

/// Check that a table or column identifier is safe to interpolate into SQL.
///
/// Only ASCII letters, digits, `_` and `.` are accepted (`schema.table` is
/// allowed).
pub fn check_identifier(name: &str) -> Result<&str, CxmlError> {
    if name.is_empty() {
        return Err(CxmlError::Configuration("empty table name".into()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(CxmlError::Configuration(format!(
            "table name not allowed: {name:?}"
        )));
    }
    Ok(name)
}
