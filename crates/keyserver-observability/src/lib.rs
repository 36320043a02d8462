mod export;
mod federation;
mod http;
mod lock;
mod task;

pub use export::*;
pub use federation::*;
pub use http::*;
pub use lock::*;
pub use task::*;
