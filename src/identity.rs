use axum::extract::{ConnectInfo, Request};
use axum::http::header::USER_AGENT;
use std::fmt;
use std::net::SocketAddr;

// Shared partition for requests whose peer address is unavailable
pub const UNKNOWN_CLIENT: &str = "unknown";

// Rate-limit partition key - the client's source address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_CLIENT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<SocketAddr> for ClientKey {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.ip().to_string())
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Who the request claims to be, and where it came from
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub key: ClientKey,
    pub agent: String,
}

impl ClientIdentity {
    pub fn from_request(req: &Request) -> Self {
        let key = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| ClientKey::from(*addr))
            .unwrap_or_else(ClientKey::unknown);

        // non-utf8 agents read as empty, which the classifier rejects
        let agent = req
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Self { key, agent }
    }

    // Agent prefix safe for log lines
    pub fn agent_preview(&self) -> &str {
        match self.agent.char_indices().nth(50) {
            Some((idx, _)) => &self.agent[..idx],
            None => &self.agent,
        }
    }
}
