/// Errors raised by the session registry.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("maximum session count reached: {0}")]
    ResourceExhausted(usize),
}
