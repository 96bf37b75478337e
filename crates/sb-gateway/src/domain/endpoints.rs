//! The fixed set of HTTP endpoints the host talks to.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayEndpoint {
    Health,
    Status,
    Ready,
    Disconnect,
    Poll,
    Response,
}

impl GatewayEndpoint {
    pub const ALL: [GatewayEndpoint; 6] = [
        Self::Health,
        Self::Status,
        Self::Ready,
        Self::Disconnect,
        Self::Poll,
        Self::Response,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Self::Health => "/health",
            Self::Status => "/status",
            Self::Ready => "/ready",
            Self::Disconnect => "/disconnect",
            Self::Poll => "/poll",
            Self::Response => "/response",
        }
    }

    /// `POST` endpoints change state; the rest are `GET`.
    pub fn is_post(self) -> bool {
        matches!(self, Self::Ready | Self::Disconnect | Self::Response)
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.path() == path)
    }
}

impl fmt::Display for GatewayEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.is_post() { "POST" } else { "GET" };
        write!(f, "{verb} {}", self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_unique_and_parse_back() {
        for endpoint in GatewayEndpoint::ALL {
            assert_eq!(GatewayEndpoint::from_path(endpoint.path()), Some(endpoint));
        }
    }

    #[test]
    fn test_unknown_path() {
        assert_eq!(GatewayEndpoint::from_path("/mcp/tools"), None);
        assert_eq!(GatewayEndpoint::from_path("poll"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(GatewayEndpoint::Poll.to_string(), "GET /poll");
        assert_eq!(GatewayEndpoint::Response.to_string(), "POST /response");
    }
}
