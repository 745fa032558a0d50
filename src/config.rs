use std::env;
use std::time::Duration;

use crate::models::ImageGenerationMethod;

pub const DEFAULT_WS_ENDPOINT: &str = "wss://grok.com/ws/imagine/listen";
pub const DEFAULT_CHAT_ENDPOINT: &str = "https://grok.com/rest/app-chat/conversations/new";
pub const DEFAULT_ASSET_ORIGIN: &str = "https://assets.grok.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_ASPECT_RATIO: &str = "2:3";
pub const DEFAULT_REFERER: &str = "https://grok.com/imagine";
pub const DEFAULT_ORIGIN: &str = "https://grok.com";

#[derive(Debug, Clone)]
pub struct ImagineConfig {
    pub proxy_url: Option<String>,
    pub timeout_secs: u64,
    /// Public base URL prepended to proxied file links.
    pub app_url: Option<String>,
    pub ws_endpoint: String,
    pub chat_endpoint: String,
    pub asset_origin: String,
    pub aspect_ratio: String,
    pub referer: String,
    pub origin: String,
    pub image_method: ImageGenerationMethod,
}

impl Default for ImagineConfig {
    fn default() -> Self {
        ImagineConfig {
            proxy_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            app_url: None,
            ws_endpoint: DEFAULT_WS_ENDPOINT.to_string(),
            chat_endpoint: DEFAULT_CHAT_ENDPOINT.to_string(),
            asset_origin: DEFAULT_ASSET_ORIGIN.to_string(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            image_method: ImageGenerationMethod::Legacy,
        }
    }
}

impl ImagineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();

        let proxy_url = non_empty_var("IMAGINE_PROXY_URL");
        let timeout_secs = env::var("IMAGINE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(defaults.timeout_secs);
        let app_url = non_empty_var("IMAGINE_APP_URL");
        let ws_endpoint = non_empty_var("IMAGINE_WS_ENDPOINT").unwrap_or(defaults.ws_endpoint);
        let chat_endpoint =
            non_empty_var("IMAGINE_CHAT_ENDPOINT").unwrap_or(defaults.chat_endpoint);
        let asset_origin = non_empty_var("IMAGINE_ASSET_ORIGIN").unwrap_or(defaults.asset_origin);
        let aspect_ratio = non_empty_var("IMAGINE_ASPECT_RATIO").unwrap_or(defaults.aspect_ratio);
        let image_method = ImageGenerationMethod::resolve(
            env::var("IMAGINE_IMAGE_METHOD").ok().as_deref().unwrap_or(""),
        );

        ImagineConfig {
            proxy_url,
            timeout_secs,
            app_url,
            ws_endpoint,
            chat_endpoint,
            asset_origin,
            aspect_ratio,
            referer: defaults.referer,
            origin: defaults.origin,
            image_method,
        }
    }

    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_app_url(mut self, app_url: impl Into<String>) -> Self {
        self.app_url = Some(app_url.into());
        self
    }

    pub fn with_endpoints(
        mut self,
        ws_endpoint: impl Into<String>,
        chat_endpoint: impl Into<String>,
    ) -> Self {
        self.ws_endpoint = ws_endpoint.into();
        self.chat_endpoint = chat_endpoint.into();
        self
    }

    pub fn with_asset_origin(mut self, asset_origin: impl Into<String>) -> Self {
        self.asset_origin = asset_origin.into();
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = aspect_ratio.into();
        self
    }

    pub fn with_image_method(mut self, method: ImageGenerationMethod) -> Self {
        self.image_method = method;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
