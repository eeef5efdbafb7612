use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("invalid function: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("package not found: {0}")]
    PackageNotFound(String),

    #[error("package already exists: {0}")]
    PackageAlreadyExists(String),

    #[error("package mismatch: {0}")]
    PackageMismatch(String),

    #[error("runtime not found for package type: {0}")]
    RuntimeNotFound(String),

    #[error("module not found: {0}")]
    ModuleNotFound(String),

    #[error("function not found: {0}")]
    FunctionNotFound(String),

    #[error("module {0} already exists")]
    AlreadyClaimed(String),

    #[error("function runtime {0} not found")]
    Unavailable(String),

    #[error("state not found: {0}")]
    StateNotFound(String),

    #[error("state store error: {0}")]
    StateBackend(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("event broker closed")]
    BrokerClosed,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FsError {
    /// True for the lookup-miss variants a caller may want to default on.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FsError::PackageNotFound(_)
                | FsError::FunctionNotFound(_)
                | FsError::ModuleNotFound(_)
                | FsError::StateNotFound(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FsError::Cancelled)
    }
}

/// A single offending field in a function definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

/// Every field that failed validation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.violations.push(FieldViolation {
            field: field.into(),
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    /// Names of the offending fields.
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", v.field, v.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
