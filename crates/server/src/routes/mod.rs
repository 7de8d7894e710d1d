pub mod drafts;
pub mod execution;
mod health;
pub mod plan;
pub mod projects;
pub mod sse;
pub mod titles;
mod ws;

pub use health::*;
pub use ws::*;
