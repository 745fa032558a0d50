use crate::{
    config::ImagineConfig,
    error::Result,
    imagine::assets::{
        normalize_asset_path, AssetDownloader, AssetSession, FILE_PROXY_PREFIX, IMAGE_CATEGORY,
    },
    models::ResponseFormat,
};
use std::sync::Arc;

/// Turns remote image URLs into what the caller asked for: locally proxied
/// links or bare base64 payloads.
#[derive(Clone)]
pub struct AssetConverter {
    config: Arc<ImagineConfig>,
    downloader: Arc<dyn AssetDownloader>,
}

impl AssetConverter {
    pub fn new(config: Arc<ImagineConfig>, downloader: Arc<dyn AssetDownloader>) -> Self {
        Self { config, downloader }
    }

    pub async fn convert<S: AsRef<str>>(
        &self,
        credential: &str,
        urls: &[S],
        format: ResponseFormat,
    ) -> Result<Vec<String>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let mut session = self.downloader.open().await?;
        let result = self
            .convert_with(session.as_mut(), credential, urls, format)
            .await;
        if let Err(e) = session.close().await {
            log::warn!("Failed to close asset session: {}", e);
        }
        result
    }

    async fn convert_with<S: AsRef<str>>(
        &self,
        session: &mut dyn AssetSession,
        credential: &str,
        urls: &[S],
        format: ResponseFormat,
    ) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(urls.len());

        for raw in urls {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }

            match format {
                ResponseFormat::Url => {
                    let path = normalize_asset_path(raw);
                    if path == "/" {
                        continue;
                    }
                    session.download(&path, credential, IMAGE_CATEGORY).await?;
                    out.push(self.proxied_url(&path));
                }
                ResponseFormat::B64Json => {
                    let data_uri = session.to_base64(raw, credential, IMAGE_CATEGORY).await?;
                    match data_uri.as_deref() {
                        Some(uri) if !uri.is_empty() => out.push(strip_data_uri_prefix(uri)),
                        _ => log::debug!("No inline data produced for {}", raw),
                    }
                }
            }
        }

        Ok(out)
    }

    fn proxied_url(&self, path: &str) -> String {
        let base = self
            .config
            .app_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .unwrap_or("");
        format!("{}{}{}", base, FILE_PROXY_PREFIX, path)
    }
}

/// Drop the `data:<type>;base64,` header, keeping everything after the first comma.
pub fn strip_data_uri_prefix(data_uri: &str) -> String {
    match data_uri.split_once(',') {
        Some((_, payload)) => payload.to_string(),
        None => data_uri.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImagineError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls {
        opened: usize,
        closed: usize,
        downloads: Vec<(String, String, String)>,
        inline: Vec<String>,
    }

    struct FakeDownloader {
        calls: Arc<Mutex<Calls>>,
        fail_download: bool,
    }

    struct FakeSession {
        calls: Arc<Mutex<Calls>>,
        fail_download: bool,
    }

    #[async_trait]
    impl AssetDownloader for FakeDownloader {
        async fn open(&self) -> Result<Box<dyn AssetSession>> {
            self.calls.lock().unwrap().opened += 1;
            Ok(Box::new(FakeSession {
                calls: self.calls.clone(),
                fail_download: self.fail_download,
            }))
        }
    }

    #[async_trait]
    impl AssetSession for FakeSession {
        async fn download(&mut self, path: &str, credential: &str, category: &str) -> Result<()> {
            if self.fail_download {
                return Err(ImagineError::AssetError("disk full".into()));
            }
            self.calls.lock().unwrap().downloads.push((
                path.to_string(),
                credential.to_string(),
                category.to_string(),
            ));
            Ok(())
        }

        async fn to_base64(
            &mut self,
            url: &str,
            _credential: &str,
            _category: &str,
        ) -> Result<Option<String>> {
            self.calls.lock().unwrap().inline.push(url.to_string());
            Ok(match url {
                u if u.ends_with("missing.png") => None,
                u if u.ends_with("raw.png") => Some("QUJD".to_string()),
                _ => Some("data:image/png;base64,AAAA".to_string()),
            })
        }

        async fn close(&mut self) -> Result<()> {
            self.calls.lock().unwrap().closed += 1;
            Ok(())
        }
    }

    fn converter(config: ImagineConfig, fail_download: bool) -> (AssetConverter, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let downloader = FakeDownloader {
            calls: calls.clone(),
            fail_download,
        };
        (
            AssetConverter::new(Arc::new(config), Arc::new(downloader)),
            calls,
        )
    }

    #[test]
    fn test_strip_data_uri_prefix() {
        assert_eq!(strip_data_uri_prefix("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_uri_prefix("AAAA"), "AAAA");
        assert_eq!(strip_data_uri_prefix("a,b,c"), "b,c");
    }

    #[tokio::test]
    async fn test_empty_input_skips_collaborator() {
        let (converter, calls) = converter(ImagineConfig::new(), false);
        let empty: Vec<String> = Vec::new();
        for format in [ResponseFormat::Url, ResponseFormat::B64Json] {
            let out = converter.convert("t", &empty, format).await.unwrap();
            assert!(out.is_empty());
        }
        assert_eq!(calls.lock().unwrap().opened, 0);
    }

    #[tokio::test]
    async fn test_b64_mode_strips_prefix_and_skips_empty() {
        let (converter, calls) = converter(ImagineConfig::new(), false);
        let out = converter
            .convert(
                "t",
                &["https://assets/a.png", "  ", "https://assets/missing.png", "https://assets/raw.png"],
                ResponseFormat::B64Json,
            )
            .await
            .unwrap();

        assert_eq!(out, vec!["AAAA", "QUJD"]);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.inline.len(), 3);
        assert_eq!((calls.opened, calls.closed), (1, 1));
    }

    #[tokio::test]
    async fn test_url_mode_builds_proxied_links() {
        let config = ImagineConfig::new().with_app_url("https://api.example.org/");
        let (converter, calls) = converter(config, false);
        let out = converter
            .convert(
                "cred",
                &["https://assets.grok.com/users/u/img.png", "https://host", "users/u/2.png"],
                ResponseFormat::Url,
            )
            .await
            .unwrap();

        assert_eq!(
            out,
            vec![
                "https://api.example.org/v1/files/image/users/u/img.png",
                "https://api.example.org/v1/files/image/users/u/2.png",
            ]
        );
        let calls = calls.lock().unwrap();
        assert_eq!(
            calls.downloads[0],
            (
                "/users/u/img.png".to_string(),
                "cred".to_string(),
                "image".to_string()
            )
        );
        assert_eq!(calls.closed, 1);
    }

    #[tokio::test]
    async fn test_url_mode_without_app_url_is_relative() {
        let (converter, _calls) = converter(ImagineConfig::new(), false);
        let out = converter
            .convert("t", &["/users/u/img.png"], ResponseFormat::Url)
            .await
            .unwrap();
        assert_eq!(out, vec!["/v1/files/image/users/u/img.png"]);
    }

    #[tokio::test]
    async fn test_session_closed_on_failure() {
        let (converter, calls) = converter(ImagineConfig::new(), true);
        let err = converter
            .convert("t", &["https://assets/a.png"], ResponseFormat::Url)
            .await
            .unwrap_err();
        assert!(matches!(err, ImagineError::AssetError(_)));
        let calls = calls.lock().unwrap();
        assert_eq!((calls.opened, calls.closed), (1, 1));
    }
}
