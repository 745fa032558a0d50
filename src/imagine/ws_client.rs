use crate::{
    config::ImagineConfig,
    error::{ImagineError, Result},
    imagine::{
        aggregator::ResultAggregator,
        headers::{imagine_headers, HeaderBuilder},
        proxy::connect_via_proxy,
    },
    logger,
    models::{EventKind, GenerationRequest, InboundEvent},
};
use async_trait::async_trait;
use futures::{FutureExt, SinkExt, Stream, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{
    client::IntoClientRequest,
    handshake::client::Request,
    http::{HeaderName, HeaderValue},
    Error as WsError, Message,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Longest single wait on the socket before re-checking the deadline.
const MAX_RECV_WAIT: Duration = Duration::from_secs(5);
const MIN_RECV_WAIT: Duration = Duration::from_secs(1);

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Receives `(ordinal, progress)` updates while images render.
///
/// Failures are logged and dropped; they never affect the generation call.
#[async_trait]
pub trait ProgressListener: Send + Sync {
    async fn on_progress(&self, index: usize, progress: f64) -> std::result::Result<(), BoxError>;
}

#[async_trait]
impl<F> ProgressListener for F
where
    F: Fn(usize, f64) -> std::result::Result<(), BoxError> + Send + Sync,
{
    async fn on_progress(&self, index: usize, progress: f64) -> std::result::Result<(), BoxError> {
        self(index, progress)
    }
}

#[derive(Clone)]
pub struct GenerationClient {
    config: Arc<ImagineConfig>,
    headers: Arc<dyn HeaderBuilder>,
}

impl GenerationClient {
    pub fn new(config: Arc<ImagineConfig>, headers: Arc<dyn HeaderBuilder>) -> Self {
        Self { config, headers }
    }

    /// Generate `count` images for `prompt` and return their URLs in the order
    /// they completed. Stops early once `count` images are final; otherwise
    /// returns whatever completed before the timeout.
    pub async fn generate(
        &self,
        credential: &str,
        prompt: &str,
        count: usize,
        listener: Option<&dyn ProgressListener>,
        timeout: Option<Duration>,
    ) -> Result<Vec<String>> {
        let started = Instant::now();
        let request = GenerationRequest::new(
            prompt,
            count,
            self.config.aspect_ratio.as_str(),
            timeout.unwrap_or_else(|| self.config.timeout()),
        );
        let _timer = logger::timer("imagine generation");

        log::info!(
            "Imagine generation: {} image(s), timeout {}s [req:{}]",
            request.target_count,
            request.timeout.as_secs(),
            request.request_id
        );

        let ws_request = self.build_ws_request(credential)?;
        let mut ws = match tokio::time::timeout(request.timeout, self.connect(ws_request)).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                log::error!("Imagine websocket connect failed: {}", e);
                return Err(e);
            }
            Err(_) => {
                return Err(ImagineError::ConnectionFailed(
                    "timed out opening imagine websocket".into(),
                ))
            }
        };

        let outcome = run_session(&mut ws, &request, listener, started).await;

        if let Err(e) = ws.close(None).await {
            log::debug!("Imagine websocket close failed: {}", e);
        }

        match &outcome {
            Ok(urls) => log::info!(
                "Imagine generation finished with {} image(s) [req:{}]",
                urls.len(),
                request.request_id
            ),
            Err(e) => log::warn!(
                "Imagine generation failed: {} [req:{}]",
                e,
                request.request_id
            ),
        }
        outcome
    }

    /// Open the socket directly, or through a CONNECT tunnel when a proxy is
    /// configured.
    async fn connect(&self, ws_request: Request) -> Result<Socket> {
        let connected = match &self.config.proxy_url {
            Some(proxy_url) => {
                let uri = ws_request.uri();
                let host = uri
                    .host()
                    .ok_or_else(|| ImagineError::ConfigError("websocket endpoint has no host".into()))?
                    .to_string();
                let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
                    Some("wss") => 443,
                    _ => 80,
                });
                let tunnel = connect_via_proxy(proxy_url, &host, port).await?;
                tokio_tungstenite::client_async_tls_with_config(ws_request, tunnel, None, None).await
            }
            None => tokio_tungstenite::connect_async(ws_request).await,
        };
        connected
            .map(|(ws, _response)| ws)
            .map_err(|e| ImagineError::ConnectionFailed(e.to_string()))
    }

    fn build_ws_request(&self, credential: &str) -> Result<Request> {
        let mut ws_request = self
            .config
            .ws_endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| ImagineError::ConfigError(format!("invalid websocket endpoint: {}", e)))?;

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
            ws_request.headers_mut().insert(name, value);
        }
        Ok(ws_request)
    }
}

async fn run_session<S>(
    ws: &mut S,
    request: &GenerationRequest,
    listener: Option<&dyn ProgressListener>,
    started: Instant,
) -> Result<Vec<String>>
where
    S: Stream<Item = std::result::Result<Message, WsError>>
        + futures::Sink<Message, Error = WsError>
        + Unpin,
{
    let payload = request.to_ws_payload(chrono::Utc::now().timestamp_millis());
    ws.send(Message::Text(serde_json::to_string(&payload)?))
        .await
        .map_err(|e| ImagineError::ConnectionFailed(e.to_string()))?;
    collect_images(ws, request, listener, started).await
}

/// Drive the inbound half of the socket until enough images are final or the
/// deadline passes.
pub(crate) async fn collect_images<S>(
    inbound: &mut S,
    request: &GenerationRequest,
    listener: Option<&dyn ProgressListener>,
    started: Instant,
) -> Result<Vec<String>>
where
    S: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    let mut aggregator = ResultAggregator::new(request.target_count);

    while started.elapsed() < request.timeout {
        let remaining = request
            .timeout
            .saturating_sub(started.elapsed())
            .max(MIN_RECV_WAIT);
        let message = match tokio::time::timeout(remaining.min(MAX_RECV_WAIT), inbound.next()).await
        {
            Err(_) => continue,
            Ok(None) => {
                return Err(ImagineError::ChannelReceiveFailed(
                    "connection closed".into(),
                ))
            }
            Ok(Some(Err(e))) => return Err(ImagineError::ChannelReceiveFailed(e.to_string())),
            Ok(Some(Ok(message))) => message,
        };

        let raw = match message {
            Message::Text(text) => text,
            Message::Binary(bytes) => String::from_utf8_lossy(&bytes).to_string(),
            Message::Close(frame) => {
                let reason = frame
                    .map(|f| format!("{} {}", f.code, f.reason))
                    .unwrap_or_else(|| "no close frame".to_string());
                return Err(ImagineError::ChannelReceiveFailed(format!(
                    "socket closed by peer: {}",
                    reason
                )));
            }
            _ => continue,
        };

        let Some(event) = InboundEvent::parse(&raw) else {
            continue;
        };
        if event.is_foreign(&request.request_id) {
            continue;
        }
        if let EventKind::Error { code, message } = &event.kind {
            return Err(ImagineError::RemoteGeneration {
                code: code.clone(),
                message: message.clone(),
            });
        }

        let (image_id, ordinal) = aggregator.slot_for(event.image_id.as_deref());

        if let Some(progress) = event.progress {
            aggregator.update_progress(&image_id, progress);
            if let Some(listener) = listener {
                notify_progress(listener, ordinal, progress).await;
            }
        }

        if let Some(url) = event.url.as_deref() {
            if event.is_completed() && aggregator.record(&image_id, url) {
                break;
            }
        }
    }

    if aggregator.completed_count() == 0 {
        return Err(ImagineError::NoCompletedImages);
    }
    Ok(aggregator.into_urls())
}

async fn notify_progress(listener: &dyn ProgressListener, index: usize, progress: f64) {
    match AssertUnwindSafe(listener.on_progress(index, progress))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::debug!("Imagine progress callback failed: {}", e),
        Err(_) => log::debug!("Imagine progress callback panicked"),
    }
}
