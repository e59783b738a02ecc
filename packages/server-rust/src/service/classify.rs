//! Envelope classification: converts an `Envelope` into a typed `Operation`.

use std::sync::atomic::{AtomicU64, Ordering};

use recordgate_core::Envelope;

use super::operation::{ClassifyError, Operation, OperationContext};

// ---------------------------------------------------------------------------
// OperationService
// ---------------------------------------------------------------------------

/// Classifies incoming envelopes into typed `Operation` variants.
///
/// Each classified envelope gets a fresh call id. Matching is exact and
/// case-sensitive; nothing about the payload is checked here.
#[derive(Debug)]
pub struct OperationService {
    call_id_counter: AtomicU64,
}

impl OperationService {
    /// Create a new `OperationService`. Call ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            call_id_counter: AtomicU64::new(1),
        }
    }

    fn next_call_id(&self) -> u64 {
        self.call_id_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Classify an `Envelope` into an `Operation`.
    ///
    /// # Errors
    ///
    /// Returns `ClassifyError::UnknownOperation` carrying the operation name
    /// verbatim when it is not one of the recognized tokens. No call id is
    /// consumed in that case.
    pub fn classify(&self, envelope: Envelope) -> Result<Operation, ClassifyError> {
        let Some(kind) = envelope.kind() else {
            return Err(ClassifyError::UnknownOperation {
                operation: envelope.operation,
            });
        };
        let ctx = OperationContext::new(self.next_call_id(), kind);
        Ok(Operation::new(ctx, envelope.payload))
    }
}

impl Default for OperationService {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
