//! Server configuration from the environment

use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_SESSIONS: usize = 256;
const DEFAULT_CONTEXT_TURNS: usize = 20;
const DEFAULT_IDLE_SECS: u64 = 600;

/// Process-wide server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Upper bound on concurrently open sessions
    pub max_sessions: usize,
    /// Transcript turns forwarded to the hosted responder
    pub context_turns: usize,
    /// Sessions with no events and no stream subscriber for this long are discarded
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_sessions: DEFAULT_MAX_SESSIONS,
            context_turns: DEFAULT_CONTEXT_TURNS,
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_SECS),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparsable values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("EXPLORER_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let max_sessions = lookup("EXPLORER_MAX_SESSIONS")
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_SESSIONS);

        let context_turns = lookup("EXPLORER_CONTEXT_TURNS")
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_CONTEXT_TURNS);

        let idle_secs = lookup("EXPLORER_SESSION_IDLE_SECS")
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_IDLE_SECS);

        Self {
            port,
            max_sessions,
            context_turns,
            idle_timeout: Duration::from_secs(idle_secs),
        }
    }
}
