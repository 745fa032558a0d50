pub mod config;
pub mod error;
pub mod imagine;
pub mod logger;
pub mod models;

pub use config::ImagineConfig;
pub use error::{ImagineError, Result};
pub use imagine::{
    AssetConverter, AssetDownloader, AssetSession, DefaultHeaderBuilder, EditClient,
    GenerationClient, HeaderBuilder, ImagineClient, LineStream, ProgressListener,
};
pub use models::{
    EditCandidate, GenerationRequest, ImageGenerationMethod, InboundEvent, ResponseFormat,
};
