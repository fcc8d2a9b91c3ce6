//! Structured composition logging.
//!
//! Every request gets a `request_id` and carries the script hash, so log
//! lines of concurrent requests for different scripts can be told apart.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Logger for one composition request.
#[derive(Debug, Clone)]
pub struct CompositionLogger {
    request_id: String,
    script_hash: String,
    operation: String,
}

impl CompositionLogger {
    /// Create a logger with a fresh request ID.
    pub fn new(script_hash: &str, operation: &str) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            script_hash: script_hash.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            request_id = %self.request_id,
            script_hash = %self.short_hash(),
            operation = %self.operation,
            "Composition started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            request_id = %self.request_id,
            script_hash = %self.short_hash(),
            operation = %self.operation,
            "Composition progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            request_id = %self.request_id,
            script_hash = %self.short_hash(),
            operation = %self.operation,
            "Composition warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            request_id = %self.request_id,
            script_hash = %self.short_hash(),
            operation = %self.operation,
            "Composition error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            request_id = %self.request_id,
            script_hash = %self.short_hash(),
            operation = %self.operation,
            "Composition completed: {}", message
        );
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn script_hash(&self) -> &str {
        &self.script_hash
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// First 12 hex digits, enough to correlate log lines.
    fn short_hash(&self) -> &str {
        let end = self.script_hash.len().min(12);
        &self.script_hash[..end]
    }

    /// Create a tracing span for this request.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "composition",
            request_id = %self.request_id,
            script_hash = %self.short_hash(),
            operation = %self.operation
        )
    }
}
