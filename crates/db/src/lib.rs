mod error;
pub mod models;
mod pool;
pub mod repositories;

pub use error::*;
pub use models::ProjectLog;
pub use pool::*;
pub use repositories::*;
