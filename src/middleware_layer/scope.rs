use std::time::Instant;

use http::Method;
use tracing::{Span, field};
use uuid::Uuid;

/// Diagnostic context for one gated request.
///
/// Opening a scope creates the `auth` span every log line of the request is
/// attached to; dropping it closes the scope, whichever way the request
/// ended.
pub struct DiagnosticScope {
    trace_id: Uuid,
    span: Span,
    opened_at: Instant,
}

impl DiagnosticScope {
    pub fn open(method: &Method, path: &str) -> Self {
        let trace_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "auth",
            %trace_id,
            %method,
            path,
            user.id = field::Empty,
            user.key = field::Empty,
        );
        tracing::debug!(parent: &span, "Diagnostic scope opened");
        Self {
            trace_id,
            span,
            opened_at: Instant::now(),
        }
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for DiagnosticScope {
    fn drop(&mut self) {
        tracing::debug!(
            parent: &self.span,
            elapsed_ms = self.opened_at.elapsed().as_millis() as u64,
            "Diagnostic scope released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_scope_gets_its_own_trace_id() {
        let a = DiagnosticScope::open(&Method::GET, "/api/session");
        let b = DiagnosticScope::open(&Method::GET, "/api/session");
        assert_ne!(a.trace_id(), b.trace_id());
    }
}
