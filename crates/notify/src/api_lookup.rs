//! Check lookup against the host's REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use uptime_core::{Check, CheckLookup, LookupError};

use crate::traits::NotifyError;

/// Resolves checks with `GET {api_url}/checks/{id}`.
#[derive(Debug, Clone)]
pub struct HttpCheckLookup {
    base: Url,
    client: reqwest::Client,
}

impl HttpCheckLookup {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let base = Url::parse(api_url)
            .map_err(|e| NotifyError::Config(format!("invalid checks api url '{api_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(NotifyError::Config(format!(
                "checks api url '{api_url}' cannot be a base"
            )));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }

    fn check_url(&self, check_id: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("checks").push(check_id);
        }
        url
    }
}

#[async_trait]
impl CheckLookup for HttpCheckLookup {
    async fn lookup_check(&self, check_id: &str) -> Result<Check, LookupError> {
        let url = self.check_url(check_id);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| LookupError::Backend(format!("GET {url}: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(LookupError::NotFound(check_id.to_string())),
            status if !status.is_success() => {
                Err(LookupError::Backend(format!("GET {url} returned {status}")))
            }
            _ => response
                .json::<Check>()
                .await
                .map_err(|e| LookupError::Backend(format!("invalid check document from {url}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn lookup(api_url: &str) -> HttpCheckLookup {
        HttpCheckLookup::new(api_url, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn check_url_appends_segments() {
        assert_eq!(
            lookup("http://localhost:8082/api").check_url("abc").as_str(),
            "http://localhost:8082/api/checks/abc"
        );
        assert_eq!(
            lookup("http://localhost:8082/api/").check_url("abc").as_str(),
            "http://localhost:8082/api/checks/abc"
        );
        assert_eq!(
            lookup("http://localhost:8082").check_url("abc").as_str(),
            "http://localhost:8082/checks/abc"
        );
    }

    #[test]
    fn check_id_is_escaped() {
        assert_eq!(
            lookup("http://localhost/api").check_url("a/b c").as_str(),
            "http://localhost/api/checks/a%2Fb%20c"
        );
    }

    #[test]
    fn rejects_bad_urls() {
        assert!(HttpCheckLookup::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpCheckLookup::new("mailto:ops@example.com", Duration::from_secs(1)).is_err());
    }

    /// Serve one request with `status_line` and a JSON `body`; yields the request line.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            while !String::from_utf8_lossy(&raw).contains("\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            let reply = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            let request = String::from_utf8_lossy(&raw).into_owned();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}/api"), handle)
    }

    #[tokio::test]
    async fn host_document_decodes_to_check() {
        let body = r#"{"_id":"abc","name":"FooBar","url":"http://foobar.com","isUp":false,"isPaused":true,"interval":60000}"#;
        let (api_url, server) = serve_once("HTTP/1.1 200 OK", body).await;

        let check = lookup(&api_url).lookup_check("abc").await.unwrap();
        assert_eq!(check.id, "abc");
        assert_eq!(check.name, "FooBar");
        assert_eq!(check.url, "http://foobar.com");
        assert_eq!(check.is_up, Some(false));
        assert!(check.is_paused);
        assert_eq!(server.await.unwrap(), "GET /api/checks/abc HTTP/1.1");
    }

    #[tokio::test]
    async fn not_found_maps_to_not_found() {
        let (api_url, server) = serve_once("HTTP/1.1 404 Not Found", r#"{"error":"no such check"}"#).await;

        match lookup(&api_url).lookup_check("missing").await {
            Err(LookupError::NotFound(id)) => assert_eq!(id, "missing"),
            other => panic!("expected NotFound, got: {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn server_error_maps_to_backend() {
        let (api_url, server) = serve_once("HTTP/1.1 503 Service Unavailable", "{}").await;

        match lookup(&api_url).lookup_check("abc").await {
            Err(LookupError::Backend(msg)) => assert!(msg.contains("503"), "{msg}"),
            other => panic!("expected Backend, got: {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_body_maps_to_backend() {
        let (api_url, server) = serve_once("HTTP/1.1 200 OK", "<html>not json</html>").await;

        assert!(matches!(
            lookup(&api_url).lookup_check("abc").await,
            Err(LookupError::Backend(_))
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_host_maps_to_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(matches!(
            lookup(&format!("http://{addr}/api")).lookup_check("abc").await,
            Err(LookupError::Backend(_))
        ));
    }
}
