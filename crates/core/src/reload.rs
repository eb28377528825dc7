//! Live-reload notifications
//!
//! The executor calls a [`CompletionListener`] after every successful step
//! whose task is flagged `reload`. [`HttpReloadNotifier`] forwards the
//! [`CompletionMessage`] to an external live-reload server.

use conveyor_action_protocol::CompletionMessage;
use reqwest::header::CONTENT_TYPE;

/// Receives a message each time a reload-flagged task finishes.
pub trait CompletionListener: Send + Sync {
    fn task_completed(&self, message: CompletionMessage);
}

/// POSTs completion messages as JSON to a live-reload endpoint.
///
/// Requests are sent in the background; a slow or unreachable server never
/// holds up the pipeline, failures are only logged.
#[derive(Debug, Clone)]
pub struct HttpReloadNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpReloadNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl CompletionListener for HttpReloadNotifier {
    fn task_completed(&self, message: CompletionMessage) {
        let body = match message.to_json() {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(task = %message.task, error = %e, "failed to encode reload message");
                return;
            }
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(task = %message.task, "no async runtime; reload notification dropped");
            return;
        };

        let request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        let url = self.url.clone();
        let task = message.task;

        runtime.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(%task, %url, "reload server notified");
                }
                Ok(response) => {
                    tracing::warn!(%task, %url, status = %response.status(), "reload server rejected notification");
                }
                Err(e) => {
                    tracing::warn!(%task, %url, error = %e, "failed to notify reload server");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn posts_json_message_to_reload_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/changed", listener.local_addr().unwrap());

        let notifier = HttpReloadNotifier::new(url);
        notifier.task_completed(CompletionMessage::new(
            "dev:scss",
            vec![PathBuf::from("build/css/main.css")],
        ));

        let (mut socket, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
            .await
            .unwrap()
            .unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !String::from_utf8_lossy(&request).contains("finishedAt") {
            let n = tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buf))
                .await
                .unwrap()
                .unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n")
            .await
            .unwrap();

        let request = String::from_utf8_lossy(&request).to_lowercase();
        assert!(request.starts_with("post /changed"));
        assert!(request.contains("content-type: application/json"));
        assert!(request.contains("\"task\":\"dev:scss\""));
        assert!(request.contains("build/css/main.css"));
    }

    #[test]
    fn without_runtime_notification_is_dropped() {
        let notifier = HttpReloadNotifier::new("http://127.0.0.1:9/changed");
        notifier.task_completed(CompletionMessage::new("mv:js", Vec::new()));
    }
}
