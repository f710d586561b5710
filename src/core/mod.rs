pub mod clock;
pub mod error;
pub mod id;

pub use error::{AppError, AppResult, ErrorBody, INTERNAL_ERROR_MESSAGE};
pub use id::DocId;
