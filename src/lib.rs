// Library surface for the binary, headless integration tests and reuse.
pub mod announce;
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod geo;
pub mod logging;
pub mod route_io;
pub mod runtime;
pub mod sample;
pub mod session;
pub mod simplify;
pub mod source;
pub mod speech;
pub mod store;
pub mod summary;
pub mod util;

pub use error::{Error, Result};
pub use sample::{LatLon, PositionSample, Route};
pub use session::{Session, SessionConfig, SessionSnapshot, SessionState};
pub use summary::{ActivitySummary, SportType};
