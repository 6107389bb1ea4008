use thiserror::Error;

#[derive(Debug, Error)]
pub enum LucroRealError {
    #[error("Missing required rate {rate}: {reason}")]
    MissingRequiredRate { rate: String, reason: String },

    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid taxable base for {tax}: {reason}")]
    InvalidBase { tax: String, reason: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for LucroRealError {
    fn from(e: serde_json::Error) -> Self {
        LucroRealError::SerializationError(e.to_string())
    }
}
