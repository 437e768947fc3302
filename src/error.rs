use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitmentError {
    #[error("Parameter error: {0}")]
    Parameter(String),

    #[error("Invalid group element: {0}")]
    InvalidElement(String),

    #[error("Value out of range: {0}")]
    Range(String),

    #[error("No value has been committed yet")]
    NotCommitted,

    #[error("No commitment has been received yet")]
    MissingCommitment,

    #[error("Opening does not match commitment: {0}")]
    InvalidOpening(String),

    #[error("Protocol step {step} not allowed in state {state}")]
    ProtocolState {
        step: &'static str,
        state: &'static str,
    },

    #[error("Challenge must be < 2^{challenge_space_bits}")]
    ChallengeOutOfRange { challenge_space_bits: u64 },

    #[error("Prime generation failed: no {bits}-bit prime after {attempts} candidates")]
    PrimeGenerationFailed { bits: u64, attempts: usize },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

pub type Result<T> = std::result::Result<T, CommitmentError>;
