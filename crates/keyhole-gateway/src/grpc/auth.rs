use std::sync::Arc;

use keyhole_identity::Identity;
use tonic::metadata::{MetadataKey, MetadataValue};
use tonic::{Request, Response, Status};
use tracing::debug;

/// The authenticated caller of a gRPC method.
#[derive(Debug, Clone)]
pub struct GrpcUser {
    pub user_id: String,
    /// Set when the request carried no token and one was issued for it.
    issued: Option<String>,
}

/// Per-request metadata authentication shared by all gRPC methods.
///
/// Mirrors the cookie middleware: a request without the token metadata gets
/// a freshly issued identity returned in response metadata; a present but
/// invalid token is rejected with `PERMISSION_DENIED`.
pub struct GrpcAuth {
    identity: Arc<Identity>,
    auth_key: String,
}

impl GrpcAuth {
    pub fn new(identity: Arc<Identity>, auth_key: String) -> Self {
        Self { identity, auth_key }
    }

    /// Resolves the caller's identity from request metadata.
    pub fn authenticate<T>(&self, request: &Request<T>) -> Result<GrpcUser, Status> {
        match request.metadata().get(self.auth_key.as_str()) {
            Some(value) => {
                let token = value
                    .to_str()
                    .map_err(|_| Status::permission_denied("token authentication failed"))?;
                let user_id = self.identity.validate(token).map_err(|e| {
                    debug!(error = %e, "rejected tampered token metadata");
                    Status::permission_denied("token authentication failed")
                })?;
                Ok(GrpcUser {
                    user_id,
                    issued: None,
                })
            }
            None => {
                let issued = self
                    .identity
                    .issue()
                    .map_err(|e| Status::internal(e.to_string()))?;
                Ok(GrpcUser {
                    user_id: issued.user_id,
                    issued: Some(issued.token),
                })
            }
        }
    }

    /// Attaches a freshly issued token to the response metadata, when one
    /// was issued for this request.
    pub fn attach_issued<T>(&self, response: &mut Response<T>, user: &GrpcUser) {
        let Some(token) = &user.issued else { return };
        let Ok(key) = MetadataKey::from_bytes(self.auth_key.as_bytes()) else {
            return;
        };
        if let Ok(value) = MetadataValue::try_from(token.as_str()) {
            response.metadata_mut().insert(key, value);
        }
    }
}
