pub mod config;
pub mod corporate_tax;
pub mod deductions;
pub mod engine;
pub mod error;
pub mod guard;
pub mod incentives;
pub mod settlement;
pub mod snapshot;
pub mod turnover;
pub mod types;

pub use error::LucroRealError;
pub use types::*;

/// Standard result type for all Lucro Real computations
pub type LucroRealResult<T> = Result<T, LucroRealError>;
