//! HTTP transport tests against a loopback server
//!
//! The server is a bare `TcpListener` speaking just enough HTTP/1.1 to
//! answer one request, so the request bytes reqwest produces can be
//! inspected as well.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use streamchat_core::{
    ChatRequest, ChatSynchronizer, ChatTransport, ChunkStream, ClientConfig, ConversationId,
    ConversationRegistry, ConversationStore, ExchangeOutcome, ExchangeState, HttpTransport,
    StaticCredentials, StreamEnd, TransportError,
};

/// A request as the loopback server received it
#[derive(Debug)]
struct CapturedRequest {
    head: String,
    body: String,
}

impl CapturedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }
}

/// Serve one response, written in the given pieces, and report the request
async fn serve_once(
    status_line: &'static str,
    content_type: &'static str,
    pieces: Vec<&'static str>,
) -> (String, oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let _ = tx.send(request);

        let length: usize = pieces.iter().map(|p| p.len()).sum();
        let head = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {length}\r\nConnection: close\r\n\r\n"
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        for piece in pieces {
            socket.write_all(piece.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let _ = socket.shutdown().await;
    });

    (format!("http://{addr}"), rx)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending a full request");
        buf.extend_from_slice(&chunk[..n]);

        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_string();
        let length = head
            .lines()
            .find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);

        let body_start = end + 4;
        if buf.len() >= body_start + length {
            let body = String::from_utf8_lossy(&buf[body_start..body_start + length]).to_string();
            return CapturedRequest { head, body };
        }
    }
}

fn transport_for(base_url: &str) -> HttpTransport {
    HttpTransport::new(&ClientConfig::default().with_base_url(base_url)).unwrap()
}

#[tokio::test]
async fn test_posts_json_with_bearer_token() {
    let (base_url, captured) =
        serve_once("200 OK", "text/event-stream", vec!["data: [DONE]\n"]).await;
    let transport = transport_for(&base_url);

    let request = ChatRequest::new(&ConversationId::from("sess-9"), "Hello there");
    let body = transport.open_stream(&request, "tok-123").await.unwrap();
    let mut chunks = ChunkStream::new(body);
    assert!(chunks.next_chunk().await.is_none());
    assert_eq!(chunks.end_reason(), Some(StreamEnd::Sentinel));

    let captured = captured.await.unwrap();
    assert!(captured.head.starts_with("POST /api/chat/stream HTTP/1.1"));
    assert_eq!(captured.header("authorization"), Some("Bearer tok-123"));
    assert_eq!(captured.header("accept"), Some("text/event-stream"));
    let json: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "session_id": "sess-9", "message": "Hello there" })
    );
}

#[tokio::test]
async fn test_non_success_status_carries_body() {
    let (base_url, _captured) =
        serve_once("500 Internal Server Error", "text/plain", vec!["server error"]).await;
    let transport = transport_for(&base_url);

    let request = ChatRequest::new(&ConversationId::from("s"), "hi");
    let err = transport.open_stream(&request, "t").await.err().unwrap();

    assert_eq!(
        err,
        TransportError::Status {
            status: 500,
            body: "server error".to_string(),
        }
    );
    assert_eq!(err.to_string(), "HTTP 500: server error");
}

#[tokio::test]
async fn test_no_content_response_has_no_body_to_stream() {
    let (base_url, _captured) = serve_once("204 No Content", "text/plain", vec![]).await;
    let transport = transport_for(&base_url);

    let request = ChatRequest::new(&ConversationId::from("s"), "hi");
    let err = transport.open_stream(&request, "t").await.err().unwrap();

    assert_eq!(err, TransportError::MissingBody);
    assert_eq!(err.to_string(), "response body is not readable");
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = transport_for(&format!("http://{addr}"));
    let request = ChatRequest::new(&ConversationId::from("s"), "hi");
    let err = transport.open_stream(&request, "t").await.err().unwrap();

    assert!(matches!(err, TransportError::Network(_)), "{err:?}");
}

#[tokio::test]
async fn test_synchronizer_over_http_end_to_end() {
    let (base_url, _captured) = serve_once(
        "200 OK",
        "text/event-stream",
        vec![
            "data: {\"type\":\"start\",\"session_id\":\"srv\"}\n\n",
            "data: {\"type\":\"token\",\"content\":\"Hel\"}\n\ndata: {\"type\":\"tok",
            "en\",\"content\":\"lo\"}\n\n",
            "data: {\"type\":\"done\",\"message_id\":\"m-1\"}\n\n",
        ],
    )
    .await;

    let store = Arc::new(ConversationStore::new());
    let id = ConversationId::from("conv");
    store.select(id.clone());
    let sync = ChatSynchronizer::new(
        Arc::new(transport_for(&base_url)),
        Arc::clone(&store),
        Arc::new(StaticCredentials::new("t")),
    );

    let report = sync.submit("hi").await.into_report().unwrap();

    assert_eq!(report.outcome, ExchangeOutcome::Complete);
    assert_eq!(report.state(), ExchangeState::Complete);
    assert_eq!(report.server_session_id.as_deref(), Some("srv"));
    assert_eq!(report.server_message_id.as_deref(), Some("m-1"));
    assert_eq!(store.tail(&id).unwrap().content(), "Hello");
}

#[tokio::test]
async fn test_synchronizer_over_http_status_failure() {
    let (base_url, _captured) =
        serve_once("500 Internal Server Error", "text/plain", vec!["server error"]).await;

    let store = Arc::new(ConversationStore::new());
    let id = ConversationId::from("conv");
    store.select(id.clone());
    let sync = ChatSynchronizer::new(
        Arc::new(transport_for(&base_url)),
        Arc::clone(&store),
        Arc::new(StaticCredentials::new("t")),
    );

    let report = sync.submit("hi").await.into_report().unwrap();

    assert_eq!(report.state(), ExchangeState::Failed);
    assert_eq!(
        store.tail(&id).unwrap().content(),
        "\n[Error: HTTP 500: server error]"
    );
}
