mod store;
mod types;

pub use store::{ConnectionRegistry, RegistryStats};
pub use types::{ConnectionHandle, ConnectionInfo, EnqueueError};
