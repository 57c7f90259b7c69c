use hyper::HeaderMap;
use mcp_bridge_config::CorsConfig;

const ALLOWED_METHODS: &str = "GET, POST, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Accept, Authorization, Mcp-Session-Id";
const EXPOSED_HEADERS: &str = "Mcp-Session-Id";

/// Applies the configured CORS policy to a response's headers, ahead of
/// routing. `*` in the allow-list permits any origin; otherwise the request's
/// `Origin` must appear in the list verbatim.
pub fn apply_headers(headers: &mut HeaderMap, config: &CorsConfig, request_origin: Option<&str>) {
    let allow_origin = match request_origin {
        Some(origin) if config.allowed_origins.iter().any(|o| o == "*") => Some(origin.to_string()),
        Some(origin) if config.allowed_origins.iter().any(|o| o == origin) => Some(origin.to_string()),
        None if config.allowed_origins.iter().any(|o| o == "*") => Some("*".to_string()),
        _ => None,
    };

    let Some(allow_origin) = allow_origin else {
        return;
    };

    if let Ok(value) = allow_origin.parse() {
        headers.insert("Access-Control-Allow-Origin", value);
    }
    headers.insert("Access-Control-Allow-Methods", ALLOWED_METHODS.parse().unwrap());
    headers.insert("Access-Control-Allow-Headers", ALLOWED_HEADERS.parse().unwrap());
    headers.insert("Access-Control-Expose-Headers", EXPOSED_HEADERS.parse().unwrap());
}

/// `true` when the policy permits `origin` (used to decide whether an
/// `OPTIONS` preflight should short-circuit with CORS headers or a plain
/// 204 with none).
pub fn is_allowed(config: &CorsConfig, origin: Option<&str>) -> bool {
    match origin {
        Some(origin) => config.allowed_origins.iter().any(|o| o == "*" || o == origin),
        None => config.allowed_origins.iter().any(|o| o == "*"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_allows_any_origin() {
        let config = CorsConfig { allowed_origins: vec!["*".into()] };
        let mut headers = HeaderMap::new();
        apply_headers(&mut headers, &config, Some("https://example.com"));
        assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), "https://example.com");
    }

    #[test]
    fn exact_allow_list_rejects_other_origins() {
        let config = CorsConfig { allowed_origins: vec!["https://a.test".into()] };
        let mut headers = HeaderMap::new();
        apply_headers(&mut headers, &config, Some("https://b.test"));
        assert!(headers.get("Access-Control-Allow-Origin").is_none());
    }

    #[test]
    fn exact_allow_list_accepts_matching_origin() {
        let config = CorsConfig { allowed_origins: vec!["https://a.test".into()] };
        let mut headers = HeaderMap::new();
        apply_headers(&mut headers, &config, Some("https://a.test"));
        assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), "https://a.test");
    }
}
