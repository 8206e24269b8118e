use std::net::{IpAddr, SocketAddr};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::state::AppState;

/// A parsed CIDR network admitted to internal endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedSubnet {
    network: IpAddr,
    prefix_len: u8,
}

impl TrustedSubnet {
    /// Parses `a.b.c.d/len` (or the v6 equivalent). Returns `None` on any
    /// malformed input, which callers treat as "admit nobody".
    pub fn parse(cidr: &str) -> Option<Self> {
        let (network, prefix_len) = cidr.split_once('/')?;
        let network: IpAddr = network.parse().ok()?;
        let prefix_len: u8 = prefix_len.parse().ok()?;
        let max = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max {
            return None;
        }
        Some(Self {
            network,
            prefix_len,
        })
    }

    /// Prefix match of `ip` against the network.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (ip, &self.network) {
            (IpAddr::V4(ip), IpAddr::V4(net)) => {
                let bits = u32::from(*ip) ^ u32::from(*net);
                self.prefix_len == 0 || bits >> (32 - u32::from(self.prefix_len)) == 0
            }
            (IpAddr::V6(ip), IpAddr::V6(net)) => {
                let bits = u128::from(*ip) ^ u128::from(*net);
                self.prefix_len == 0 || bits >> (128 - u32::from(self.prefix_len)) == 0
            }
            _ => false,
        }
    }
}

/// Admits only callers inside the configured trusted subnet.
///
/// The peer address is taken from `ConnectInfo` when available, falling
/// back to `X-Real-IP` and then the first `X-Forwarded-For` entry. With no
/// subnet configured every caller is rejected.
pub async fn admit_trusted(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(subnet) = &state.trusted_subnet else {
        return forbidden();
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    if let Some(ip) = peer {
        if subnet.contains(&ip) {
            return next.run(request).await;
        }
    }

    match forwarded_ip(request.headers()) {
        Some(ip) if subnet.contains(&ip) => next.run(request).await,
        other => {
            debug!(ip = ?other, "stats request from outside the trusted subnet");
            forbidden()
        }
    }
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "internal subnet access violation").into_response()
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
    {
        return Some(real_ip);
    }

    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|value| value.trim().parse().ok())
}
