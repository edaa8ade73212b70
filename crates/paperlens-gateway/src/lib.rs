pub mod connection;
pub mod driver;
pub mod endpoint;
pub mod upload;

pub use connection::{ConnectionEvent, ConnectionManager};
pub use driver::{spawn_session, DriverOptions, SessionCommand, SessionHandle};
pub use endpoint::{Endpoint, EndpointError};
pub use upload::{UploadClient, UploadError};
