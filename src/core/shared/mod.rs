pub mod error;
pub mod extract;
pub mod schema;
pub mod state;
pub mod utils;

pub use error::{ApiError, ApiResult};
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use utils::{with_conn, DbPool};
