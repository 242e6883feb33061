/// Builds the upstream URL for a forwarded request.
///
/// The destination is normalized by stripping a trailing slash so the
/// original path (which always starts with `/`) concatenates cleanly.
///
/// # Examples
///
/// ```rust
/// use portico_rs::utils::url::join_upstream;
///
/// let url = join_upstream("http://users-1:8080", "/api/users/42?page=2");
/// assert_eq!(url, "http://users-1:8080/api/users/42?page=2");
///
/// let url = join_upstream("http://users-1:8080/", "/api/users/42");
/// assert_eq!(url, "http://users-1:8080/api/users/42");
/// ```
pub fn join_upstream(destination: &str, path_and_query: &str) -> String {
    format!("{}{}", destination.trim_end_matches('/'), path_and_query)
}

/// Builds the health-probe URL for a destination.
///
/// The wire contract is an HTTP GET to `<destination>/health` with the
/// destination normalized by stripping a trailing `/`.
pub fn probe_endpoint(destination: &str) -> String {
    format!("{}/health", destination.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_upstream_plain() {
        assert_eq!(
            join_upstream("http://backend:8080", "/v1/users"),
            "http://backend:8080/v1/users"
        );
    }

    #[test]
    fn test_join_upstream_strips_trailing_slash() {
        assert_eq!(
            join_upstream("http://backend:8080/", "/v1/users"),
            "http://backend:8080/v1/users"
        );
    }

    #[test]
    fn test_join_upstream_keeps_query() {
        assert_eq!(
            join_upstream("http://backend:8080", "/v1/users?limit=10&offset=20"),
            "http://backend:8080/v1/users?limit=10&offset=20"
        );
    }

    #[test]
    fn test_probe_endpoint() {
        assert_eq!(probe_endpoint("http://backend:8080"), "http://backend:8080/health");
        assert_eq!(probe_endpoint("http://backend:8080/"), "http://backend:8080/health");
    }
}
