mod settings;

pub use settings::{JwtConfig, RelayConfig, ServerConfig, Settings};
