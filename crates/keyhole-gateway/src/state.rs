use std::sync::Arc;

use keyhole_identity::Identity;
use keyhole_shortener::Mediator;
use typed_builder::TypedBuilder;

use crate::middleware::subnet::TrustedSubnet;

/// Shared state behind both wire fronts.
#[derive(Clone, TypedBuilder)]
pub struct AppState {
    /// Deadline-bounded entry point into the shortener.
    pub mediator: Arc<Mediator>,
    /// Token issuance and validation.
    pub identity: Arc<Identity>,
    /// Cookie / metadata name carrying the user token.
    pub auth_key: String,
    /// Subnet admitted to the internal stats endpoint; `None` rejects all.
    #[builder(default)]
    pub trusted_subnet: Option<TrustedSubnet>,
}
