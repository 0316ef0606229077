// src/error_handling/error_handler.rs
//! Error handler for participants driving disputes
//!
//! A long-running participant must log a failed move and keep going. The
//! handler classifies each `DisputeError`, logs it with its context, keeps
//! counters, and tells the caller whether retrying the move makes sense.

use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::error_types::{DisputeError, ErrorKind};

/// Severity of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

/// Where an error happened
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Component in which the error occurred
    pub component: String,

    /// Operation during which the error occurred
    pub operation: String,

    /// Additional data related to the error
    pub metadata: HashMap<String, String>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    /// Add metadata to the context
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    fn describe(&self) -> String {
        let mut pairs: Vec<String> = self.metadata.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        pairs.sort();
        if pairs.is_empty() {
            format!("{}::{}", self.component, self.operation)
        } else {
            format!("{}::{} [{}]", self.component, self.operation, pairs.join(" "))
        }
    }
}

/// Error handler configuration
#[derive(Debug, Clone)]
pub struct ErrorHandlerConfig {
    /// Severity given to consistency failures; forged proofs from a
    /// counterparty are expected, local bugs are not
    pub consistency_severity: ErrorSeverity,

    /// Whether external failures may be retried
    pub retry_external: bool,
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        Self {
            consistency_severity: ErrorSeverity::Error,
            retry_external: true,
        }
    }
}

/// Error handler statistics
#[derive(Debug, Clone, Default)]
pub struct ErrorHandlerStats {
    /// Total number of handled errors
    pub total_errors: u64,

    /// Number of errors by kind
    pub errors_by_kind: HashMap<ErrorKind, u64>,

    /// Number of errors by severity
    pub errors_by_severity: HashMap<ErrorSeverity, u64>,

    /// Number of errors reported as retryable
    pub retryable_errors: u64,
}

/// Outcome of handling one error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandledError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub code: u32,
    pub retryable: bool,
}

/// Error handler
#[derive(Debug, Clone, Default)]
pub struct ErrorHandler {
    /// Handler configuration
    config: ErrorHandlerConfig,

    /// Statistics, shared between clones
    stats: Arc<RwLock<ErrorHandlerStats>>,
}

impl ErrorHandler {
    /// Create a new error handler with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new error handler with a custom configuration
    pub fn with_config(config: ErrorHandlerConfig) -> Self {
        Self {
            config,
            stats: Arc::new(RwLock::new(ErrorHandlerStats::default())),
        }
    }

    /// Severity of an error
    pub fn severity(&self, err: &DisputeError) -> ErrorSeverity {
        if err.is_cancelled() {
            return ErrorSeverity::Info;
        }
        match err.kind() {
            ErrorKind::Validation | ErrorKind::Arithmetic => ErrorSeverity::Warning,
            ErrorKind::Consistency => self.config.consistency_severity,
            ErrorKind::External => ErrorSeverity::Error,
        }
    }

    /// Whether repeating the failed call may succeed.
    ///
    /// Only external failures qualify, and never a cancellation.
    pub fn is_retryable(&self, err: &DisputeError) -> bool {
        self.config.retry_external && err.kind() == ErrorKind::External && !err.is_cancelled()
    }

    /// Classify, log and count an error
    pub fn handle(&self, err: &DisputeError, context: &ErrorContext) -> HandledError {
        let handled = HandledError {
            kind: err.kind(),
            severity: self.severity(err),
            code: err.to_error_code(),
            retryable: self.is_retryable(err),
        };

        let where_ = context.describe();
        match handled.severity {
            ErrorSeverity::Debug => debug!("{}: [{}] {}", where_, handled.code, err),
            ErrorSeverity::Info => info!("{}: [{}] {}", where_, handled.code, err),
            ErrorSeverity::Warning => warn!("{}: [{}] {}", where_, handled.code, err),
            ErrorSeverity::Error | ErrorSeverity::Critical => error!("{}: [{}] {}", where_, handled.code, err),
        }

        match self.stats.write() {
            Ok(mut stats) => {
                stats.total_errors += 1;
                *stats.errors_by_kind.entry(handled.kind).or_insert(0) += 1;
                *stats.errors_by_severity.entry(handled.severity).or_insert(0) += 1;
                if handled.retryable {
                    stats.retryable_errors += 1;
                }
            }
            Err(e) => warn!("error statistics unavailable: {}", e),
        }
        handled
    }

    /// Snapshot of the statistics
    pub fn stats(&self) -> ErrorHandlerStats {
        match self.stats.read() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of handled errors of one kind
    pub fn count(&self, kind: ErrorKind) -> u64 {
        self.stats().errors_by_kind.get(&kind).copied().unwrap_or(0)
    }
}
