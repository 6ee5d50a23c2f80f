use chainclaw_types::error::{Classify, ErrorClass};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("blocked by risk gate: {0}")]
    RiskBlocked(String),
    #[error("guardrail violation: {0}")]
    Guardrail(String),
    #[error("{0}")]
    Simulation(String),
    #[error("No confirmation received, cancelling.")]
    ConfirmationTimeout,
    #[error("confirmation declined")]
    ConfirmationDeclined,
    #[error("store error: {0}")]
    Store(#[from] chainclaw_memory::StoreError),
    #[error("boundary error: {0}")]
    Boundary(#[source] anyhow::Error),
}

impl Classify for PipelineError {
    fn class(&self) -> ErrorClass {
        match self {
            PipelineError::RiskBlocked(_) => ErrorClass::Config,
            PipelineError::Guardrail(_) => ErrorClass::Config,
            PipelineError::Simulation(_) => ErrorClass::Unknown,
            PipelineError::ConfirmationTimeout => ErrorClass::Abort,
            PipelineError::ConfirmationDeclined => ErrorClass::Abort,
            PipelineError::Store(e) => e.class(),
            PipelineError::Boundary(_) => ErrorClass::Transient,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
