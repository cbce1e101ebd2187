pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod process;
pub mod routes;
pub mod uploads;
pub mod ws;

pub use routes::create_router;

use serde::Serialize;

/// Error payload shared by all API endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
