use std::collections::HashMap;

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36";

/// Builds the outbound header set for a caller credential.
pub trait HeaderBuilder: Send + Sync {
    fn build_headers(&self, credential: &str) -> HashMap<String, String>;
}

/// Browser-like headers with the credential carried as session cookies.
#[derive(Debug, Clone, Default)]
pub struct DefaultHeaderBuilder;

impl HeaderBuilder for DefaultHeaderBuilder {
    fn build_headers(&self, credential: &str) -> HashMap<String, String> {
        let token = credential.trim().trim_start_matches("sso=");
        let mut headers = HashMap::new();
        headers.insert("User-Agent".to_string(), USER_AGENT.to_string());
        headers.insert("Accept".to_string(), "*/*".to_string());
        headers.insert("Accept-Language".to_string(), "en-US,en;q=0.9".to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert(
            "Cookie".to_string(),
            format!("sso={}; sso-rw={}", token, token),
        );
        headers
    }
}

/// Header set for imagine calls: the builder's headers with `Referer` and
/// `Origin` pinned.
pub fn imagine_headers(
    builder: &dyn HeaderBuilder,
    credential: &str,
    referer: &str,
    origin: &str,
) -> HashMap<String, String> {
    let mut headers = builder.build_headers(credential);
    headers.retain(|name, _| {
        !name.eq_ignore_ascii_case("referer") && !name.eq_ignore_ascii_case("origin")
    });
    headers.insert("Referer".to_string(), referer.to_string());
    headers.insert("Origin".to_string(), origin.to_string());
    headers
}
