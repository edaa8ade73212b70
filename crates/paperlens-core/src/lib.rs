pub mod config;
pub mod diagram;
pub mod materializer;
pub mod progress;
pub mod reveal;
pub mod segmenter;
pub mod session;

pub use config::*;
pub use diagram::*;
pub use materializer::*;
pub use progress::*;
pub use reveal::*;
pub use segmenter::*;
pub use session::*;
