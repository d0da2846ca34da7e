mod app_error;

pub use app_error::{AppError, ProblemDetails};

pub type Result<T> = std::result::Result<T, AppError>;
