pub mod envelope;
pub mod error;
pub mod extract;
pub mod state;
#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;
pub mod utils;

pub use envelope::{ok, ApiResponse, ApiResult};
pub use error::ApiError;
pub use extract::{ApiJson, ApiQuery};
pub use state::AppState;
