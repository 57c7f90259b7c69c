use mcp_bridge_config::AuthConfig;

/// Outcome of checking a request's `Authorization` header against the
/// configured bearer allow-list. `/health` bypasses this check entirely;
/// every other path goes through it when `auth` is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Allowed,
    /// No `Authorization` header at all.
    Missing,
    /// A header was present but its token isn't in the allow-list.
    Forbidden,
}

pub fn check(config: Option<&AuthConfig>, header: Option<&str>, path: &str) -> AuthOutcome {
    let Some(config) = config else {
        return AuthOutcome::Allowed;
    };
    if path == "/health" {
        return AuthOutcome::Allowed;
    }

    let Some(token) = header.and_then(|h| h.strip_prefix("Bearer ")) else {
        return AuthOutcome::Missing;
    };

    if config.allowed_tokens.iter().any(|t| t == token) {
        AuthOutcome::Allowed
    } else {
        AuthOutcome::Forbidden
    }
}
