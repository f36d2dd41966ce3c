mod handler;
mod message;

pub use handler::ws_handler;
pub use message::{InboundMessage, MessageKind};
