mod draft;
mod export;
mod log;
mod plan;
mod project;
mod research;
mod title;

pub use draft::*;
pub use export::*;
pub use log::*;
pub use plan::*;
pub use project::*;
pub use research::*;
pub use title::*;
