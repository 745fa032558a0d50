use crate::error::{ImagineError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Upper bound on the proxy's reply to CONNECT.
const MAX_RESPONSE_HEAD: usize = 8 * 1024;

/// Open a tunnel to `target_host:target_port` through an HTTP proxy using
/// `CONNECT`. Credentials in the proxy URL are sent as basic auth.
pub async fn connect_via_proxy(
    proxy_url: &str,
    target_host: &str,
    target_port: u16,
) -> Result<TcpStream> {
    let proxy = Url::parse(proxy_url)
        .map_err(|e| ImagineError::ConfigError(format!("invalid proxy: {}", e)))?;
    if proxy.scheme() != "http" {
        return Err(ImagineError::ConfigError(format!(
            "unsupported proxy scheme for websocket: {}",
            proxy.scheme()
        )));
    }
    let proxy_host = proxy
        .host_str()
        .ok_or_else(|| ImagineError::ConfigError("proxy url has no host".into()))?;
    let proxy_addr = format!("{}:{}", proxy_host, proxy.port_or_known_default().unwrap_or(80));

    let mut stream = TcpStream::connect(&proxy_addr).await.map_err(|e| {
        ImagineError::ConnectionFailed(format!("proxy {} unreachable: {}", proxy_addr, e))
    })?;

    let authority = format!("{}:{}", target_host, target_port);
    let mut head = format!("CONNECT {0} HTTP/1.1\r\nHost: {0}\r\n", authority);
    if let Some(credentials) = basic_credentials(&proxy) {
        head.push_str(&format!("Proxy-Authorization: Basic {}\r\n", credentials));
    }
    head.push_str("\r\n");

    stream
        .write_all(head.as_bytes())
        .await
        .map_err(|e| ImagineError::ConnectionFailed(format!("proxy write failed: {}", e)))?;

    let reply = read_response_head(&mut stream).await?;
    let status_line = reply.lines().next().unwrap_or_default();
    match status_line.split_whitespace().nth(1) {
        Some(code) if code.starts_with('2') => {
            log::debug!("Proxy tunnel to {} open via {}", authority, proxy_addr);
            Ok(stream)
        }
        _ => Err(ImagineError::ConnectionFailed(format!(
            "proxy refused tunnel to {}: {}",
            authority, status_line
        ))),
    }
}

fn basic_credentials(proxy: &Url) -> Option<String> {
    if proxy.username().is_empty() {
        return None;
    }
    let pair = format!("{}:{}", proxy.username(), proxy.password().unwrap_or_default());
    Some(STANDARD.encode(pair))
}

/// Read up to the blank line ending the proxy's reply. Reads byte by byte so
/// nothing belonging to the tunnel is consumed.
async fn read_response_head(stream: &mut TcpStream) -> Result<String> {
    let mut head = Vec::new();
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_RESPONSE_HEAD {
            return Err(ImagineError::ConnectionFailed(
                "proxy reply exceeds header limit".into(),
            ));
        }
        let byte = stream.read_u8().await.map_err(|e| {
            ImagineError::ConnectionFailed(format!("proxy closed during CONNECT: {}", e))
        })?;
        head.push(byte);
    }
    Ok(String::from_utf8_lossy(&head).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn read_head(stream: &mut TcpStream) -> String {
        read_response_head(stream).await.unwrap()
    }

    #[tokio::test]
    async fn test_tunnel_sends_connect_with_credentials() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let proxy = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let head = read_head(&mut stream).await;
            stream
                .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
                .await
                .unwrap();
            stream.write_all(b"tunneled").await.unwrap();
            head
        });

        let mut tunnel = connect_via_proxy(
            &format!("http://user:secret@{}", addr),
            "grok.com",
            443,
        )
        .await
        .unwrap();

        let mut payload = [0u8; 8];
        tunnel.read_exact(&mut payload).await.unwrap();
        assert_eq!(&payload, b"tunneled");

        let head = proxy.await.unwrap();
        assert!(head.starts_with("CONNECT grok.com:443 HTTP/1.1\r\n"));
        assert!(head.contains("Host: grok.com:443\r\n"));
        assert!(head.contains(&format!(
            "Proxy-Authorization: Basic {}\r\n",
            STANDARD.encode("user:secret")
        )));
    }

    #[tokio::test]
    async fn test_refused_tunnel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let head = read_head(&mut stream).await;
            assert!(!head.contains("Proxy-Authorization"));
            stream
                .write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
                .await
                .unwrap();
        });

        let err = connect_via_proxy(&format!("http://{}", addr), "grok.com", 443)
            .await
            .unwrap_err();
        match err {
            ImagineError::ConnectionFailed(message) => assert!(message.contains("407")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unsupported_proxy_scheme() {
        let err = connect_via_proxy("socks5://127.0.0.1:1080", "grok.com", 443)
            .await
            .unwrap_err();
        assert!(matches!(err, ImagineError::ConfigError(_)));

        let err = connect_via_proxy("not a url", "grok.com", 443)
            .await
            .unwrap_err();
        assert!(matches!(err, ImagineError::ConfigError(_)));
    }
}
