use thiserror::Error;

/// Errors that make a set of artifacts unusable for debugging.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// A label the debug protocol depends on is absent from the label file.
    #[error("required label not found: {label}")]
    MissingControlAddress {
        /// Name of the missing label.
        label: &'static str,
    },
}
