use crate::error::Result;
use async_trait::async_trait;

/// Category under which generated images are cached.
pub const IMAGE_CATEGORY: &str = "image";

/// Route prefix under which cached images are served locally.
pub const FILE_PROXY_PREFIX: &str = "/v1/files/image";

/// Turn an absolute URL or a relative storage path into an absolute path
/// rooted at `/`. Blank input maps to `/`. The path is kept verbatim: no
/// percent-encoding and no dot-segment removal.
pub fn normalize_asset_path(raw_url: &str) -> String {
    let raw = raw_url.trim();
    if raw.is_empty() {
        return "/".to_string();
    }

    let path = if is_absolute_url(raw) {
        url_path(raw).to_string()
    } else {
        raw.to_string()
    };

    if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    }
}

/// Resolve uploaded file references against the asset origin. Blank entries
/// are dropped; absolute URLs pass through untouched.
pub fn to_asset_urls<S: AsRef<str>>(asset_origin: &str, file_uris: &[S]) -> Vec<String> {
    let origin = asset_origin.trim_end_matches('/');
    file_uris
        .iter()
        .map(|uri| uri.as_ref().trim())
        .filter(|uri| !uri.is_empty())
        .map(|uri| {
            if is_absolute_url(uri) {
                uri.to_string()
            } else {
                format!("{}/{}", origin, uri.trim_start_matches('/'))
            }
        })
        .collect()
}

/// Path component of an absolute URL: everything after the authority, up to
/// the query or fragment.
fn url_path(url: &str) -> &str {
    let rest = url.find("://").map(|i| &url[i + 3..]).unwrap_or(url);
    let start = rest
        .find(|c| matches!(c, '/' | '?' | '#'))
        .unwrap_or(rest.len());
    let path = &rest[start..];
    let end = path.find(|c| matches!(c, '?' | '#')).unwrap_or(path.len());
    &path[..end]
}

fn is_absolute_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Source of download sessions. One session is opened per conversion call.
#[async_trait]
pub trait AssetDownloader: Send + Sync {
    async fn open(&self) -> Result<Box<dyn AssetSession>>;
}

/// Downloads remote assets into local storage and renders them inline.
#[async_trait]
pub trait AssetSession: Send {
    /// Fetch the asset at `path` and cache it locally under `category`.
    async fn download(&mut self, path: &str, credential: &str, category: &str) -> Result<()>;

    /// Fetch the asset and return it as a `data:` URI, or `None` when nothing
    /// could be produced.
    async fn to_base64(
        &mut self,
        url: &str,
        credential: &str,
        category: &str,
    ) -> Result<Option<String>>;

    async fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_absolute_url() {
        assert_eq!(
            normalize_asset_path("https://assets.grok.com/users/abc/img.png?x=1"),
            "/users/abc/img.png"
        );
        assert_eq!(normalize_asset_path("http://host"), "/");
        assert_eq!(normalize_asset_path("https://host?q=1#top"), "/");
        assert_eq!(
            normalize_asset_path("https://assets.grok.com/a/b.png#frag"),
            "/a/b.png"
        );
    }

    #[test]
    fn test_normalize_keeps_path_verbatim() {
        assert_eq!(
            normalize_asset_path("https://assets.grok.com/users/u/x/../a b.png"),
            "/users/u/x/../a b.png"
        );
        assert_eq!(
            normalize_asset_path("https://assets.grok.com/users/u/%41.png"),
            "/users/u/%41.png"
        );
    }

    #[test]
    fn test_normalize_relative_path() {
        assert_eq!(normalize_asset_path("users/abc/img.png"), "/users/abc/img.png");
        assert_eq!(normalize_asset_path("  /already/rooted "), "/already/rooted");
        assert_eq!(normalize_asset_path(""), "/");
        assert_eq!(normalize_asset_path("   "), "/");
    }

    #[test]
    fn test_to_asset_urls() {
        let urls = to_asset_urls(
            "https://assets.grok.com/",
            &["/users/u/1.png", "", "https://cdn.example.com/2.png", "users/u/3.png"],
        );
        assert_eq!(
            urls,
            vec![
                "https://assets.grok.com/users/u/1.png",
                "https://cdn.example.com/2.png",
                "https://assets.grok.com/users/u/3.png",
            ]
        );
    }
}
