use thiserror::Error;

/// Failures that abort a whole cycle. Stage-level AI failures never surface here.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("no thoughts produced for '{question}' (failed agents: {})", .failed_agents.join(", "))]
    NoThoughts {
        question: String,
        failed_agents: Vec<String>,
    },

    #[error(transparent)]
    Core(#[from] cogloop_core::Error),
}

impl From<CycleError> for cogloop_core::Error {
    fn from(e: CycleError) -> Self {
        match e {
            CycleError::NoThoughts { question, .. } => cogloop_core::Error::NoThoughts(question),
            CycleError::Core(e) => e,
        }
    }
}
