use std::sync::Arc;

use crate::auth::{IdentityVerifier, JwtVerifier};
use crate::config::Settings;
use crate::registry::ConnectionRegistry;
use crate::router::MessageRouter;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub registry: Arc<ConnectionRegistry>,
    pub router: Arc<MessageRouter>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let verifier = Arc::new(JwtVerifier::new(&settings.jwt));
        Self::with_verifier(settings, verifier)
    }

    /// Build state around a custom credential verifier (tests swap in stubs)
    pub fn with_verifier(settings: Settings, verifier: Arc<dyn IdentityVerifier>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Arc::new(MessageRouter::new(registry.clone()));

        Self {
            settings: Arc::new(settings),
            verifier,
            registry,
            router,
        }
    }
}
