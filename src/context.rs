use tracing::{Span, info_span};

pub const ANONYMOUS: &str = "anonymous";

/// Who is calling and the span their log records attach to.
///
/// Built once at the edge (HTTP handler or CLI job) and passed down to every
/// service call, so operations never reach for a process-wide logger.
#[derive(Debug, Clone)]
pub struct CallContext {
    actor: String,
    span: Span,
}

impl CallContext {
    pub fn new(actor: impl Into<String>) -> Self {
        let actor = actor.into();
        let span = info_span!("pfa", actor = %actor);
        Self { actor, span }
    }

    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS)
    }

    /// Context for an offline job, logged as `job:<name>`.
    pub fn job(name: &str) -> Self {
        let actor = format!("job:{name}");
        let span = info_span!("audit", actor = %actor, job = name);
        Self { actor, span }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
