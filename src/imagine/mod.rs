pub mod aggregator;
pub mod assets;
pub mod converter;
pub mod edit_client;
pub mod headers;
pub mod proxy;
pub mod ws_client;

use crate::{config::ImagineConfig, error::Result, models::ResponseFormat};
use std::sync::Arc;
use std::time::Duration;

pub use aggregator::{ImageSlot, ResultAggregator};
pub use assets::{normalize_asset_path, to_asset_urls, AssetDownloader, AssetSession};
pub use converter::AssetConverter;
pub use edit_client::{EditClient, LineStream};
pub use headers::{DefaultHeaderBuilder, HeaderBuilder};
pub use ws_client::{BoxError, GenerationClient, ProgressListener};

#[derive(Clone)]
pub struct ImagineClient {
    config: Arc<ImagineConfig>,
    generation_client: GenerationClient,
    edit_client: EditClient,
    converter: AssetConverter,
}

impl ImagineClient {
    pub fn new(config: ImagineConfig, downloader: Arc<dyn AssetDownloader>) -> Self {
        Self::with_headers(config, downloader, Arc::new(DefaultHeaderBuilder))
    }

    pub fn with_headers(
        config: ImagineConfig,
        downloader: Arc<dyn AssetDownloader>,
        headers: Arc<dyn HeaderBuilder>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            generation_client: GenerationClient::new(config.clone(), headers.clone()),
            edit_client: EditClient::new(config.clone(), headers),
            converter: AssetConverter::new(config.clone(), downloader),
            config,
        }
    }

    pub fn config(&self) -> &ImagineConfig {
        &self.config
    }

    pub fn generation(&self) -> &GenerationClient {
        &self.generation_client
    }

    pub fn editing(&self) -> &EditClient {
        &self.edit_client
    }

    pub fn converter(&self) -> &AssetConverter {
        &self.converter
    }

    /// Generate over the socket, then convert the URLs into `format`.
    pub async fn generate_images(
        &self,
        credential: &str,
        prompt: &str,
        count: usize,
        format: ResponseFormat,
        listener: Option<&dyn ProgressListener>,
        timeout: Option<Duration>,
    ) -> Result<Vec<String>> {
        let urls = self
            .generation_client
            .generate(credential, prompt, count, listener, timeout)
            .await?;
        self.converter.convert(credential, &urls, format).await
    }

    pub async fn edit<S: AsRef<str>>(
        &self,
        credential: &str,
        prompt: &str,
        file_uris: &[S],
    ) -> Result<LineStream> {
        self.edit_client.edit(credential, prompt, file_uris).await
    }
}
