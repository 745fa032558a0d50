use crate::{
    config::ImagineConfig,
    error::{ImagineError, Result},
    imagine::{
        assets::to_asset_urls,
        headers::{imagine_headers, HeaderBuilder},
    },
    models::{build_edit_candidates, EditCandidate, EDIT_VARIANTS},
};
use futures::stream::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;

/// Longest slice of an error body kept on a failed candidate.
const ERROR_BODY_LIMIT: usize = 500;
const LINE_BUFFER: usize = 64;

pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Clone)]
pub struct EditClient {
    config: Arc<ImagineConfig>,
    headers: Arc<dyn HeaderBuilder>,
}

impl EditClient {
    pub fn new(config: Arc<ImagineConfig>, headers: Arc<dyn HeaderBuilder>) -> Self {
        Self { config, headers }
    }

    /// Backend models tried by `edit`, in order.
    pub fn candidate_models() -> Vec<&'static str> {
        EDIT_VARIANTS.iter().map(|variant| variant.model_name).collect()
    }

    /// Request an edit of the referenced images. The first candidate model
    /// that answers 200 wins; its body is handed back as a stream of lines.
    pub async fn edit<S: AsRef<str>>(
        &self,
        credential: &str,
        prompt: &str,
        file_uris: &[S],
    ) -> Result<LineStream> {
        let image_urls = to_asset_urls(&self.config.asset_origin, file_uris);
        if image_urls.is_empty() {
            return Err(ImagineError::MissingReferenceImages);
        }

        let headers = self.build_headers(credential)?;
        let mut last_error: Option<ImagineError> = None;

        for candidate in build_edit_candidates(prompt, &image_urls) {
            log::info!("Image edit: trying model {}", candidate.model_name);
            match self.attempt(&candidate, headers.clone()).await {
                Ok(response) => {
                    log::info!("Image edit: streaming from {}", candidate.model_name);
                    return Ok(stream_lines(response));
                }
                Err(e) => {
                    log::warn!("Image edit with {} failed: {}", candidate.model_name, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ImagineError::EditRequestFailed))
    }

    async fn attempt(
        &self,
        candidate: &EditCandidate,
        headers: HeaderMap,
    ) -> Result<reqwest::Response> {
        let client = self.http_client()?;
        let response = client
            .post(&self.config.chat_endpoint)
            .headers(headers)
            .json(&candidate.payload)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = read_error_body(response, ERROR_BODY_LIMIT).await;
            return Err(ImagineError::UpstreamEditRequestFailed {
                model: candidate.model_name.clone(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().timeout(self.config.timeout());
        if let Some(proxy_url) = &self.config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| ImagineError::ConfigError(format!("invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }
        builder
            .build()
            .map_err(|e| ImagineError::ConfigError(e.to_string()))
    }

    fn build_headers(&self, credential: &str) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        let headers = imagine_headers(
            self.headers.as_ref(),
            credential,
            &self.config.referer,
            &self.config.origin,
        );
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ImagineError::ConfigError(format!("invalid header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| ImagineError::ConfigError(format!("invalid header value: {}", e)))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

/// Move the response into a reader task. The connection is released when the
/// body is exhausted or the returned stream is dropped, even while the
/// upstream is idle.
fn stream_lines(response: reqwest::Response) -> LineStream {
    let (tx, rx) = tokio::sync::mpsc::channel(LINE_BUFFER);

    tokio::spawn(async move {
        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        // Bytes before this offset are known to hold no newline.
        let mut scanned = 0;

        loop {
            let chunk = tokio::select! {
                _ = tx.closed() => return,
                chunk = body.next() => chunk,
            };
            match chunk {
                Some(Ok(bytes)) => {
                    buffer.extend_from_slice(&bytes);
                    while let Some(offset) = buffer[scanned..].iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = buffer.drain(..=scanned + offset).collect();
                        scanned = 0;
                        if tx.send(Ok(decode_line(&line))).await.is_err() {
                            return;
                        }
                    }
                    scanned = buffer.len();
                }
                Some(Err(e)) => {
                    let _ = tx.send(Err(ImagineError::RequestError(e.to_string()))).await;
                    return;
                }
                None => break,
            }
        }

        if !buffer.is_empty() {
            let _ = tx.send(Ok(decode_line(&buffer))).await;
        }
    });

    Box::pin(ReceiverStream::new(rx))
}

/// Read at most `limit` characters of a failed response body, stopping as soon
/// as that many are in hand.
async fn read_error_body(response: reqwest::Response, limit: usize) -> String {
    let mut body = response.bytes_stream();
    let mut raw: Vec<u8> = Vec::new();

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => raw.extend_from_slice(&bytes),
            Err(e) => {
                log::debug!("Image edit: error body read failed: {}", e);
                break;
            }
        }
        // A split multi-byte char can only be the last one, so stop once it
        // lies past the limit.
        if raw.len() > limit && String::from_utf8_lossy(&raw).chars().count() > limit {
            break;
        }
    }

    truncate_chars(&String::from_utf8_lossy(&raw), limit)
}

fn decode_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.trim_end_matches('\n').trim_end_matches('\r').to_string()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
