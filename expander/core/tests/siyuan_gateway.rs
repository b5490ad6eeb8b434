//! SiYuan gateway against a minimal HTTP responder
//!
//! The responder serves one request per connection and answers by path from
//! a fixed table, recording what it received.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use expander_core::gateway::{FOLD_BLOCK, GET_BLOCK_ATTRS, UNFOLD_BLOCK};
use expander_core::{
    AttributeGateway, BlockId, CommandGateway, FoldState, GatewayError, SiyuanConfig,
    SiyuanGateway,
};

#[derive(Clone, Debug)]
struct Received {
    path: String,
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct Responder {
    base_url: String,
    received: Arc<Mutex<Vec<Received>>>,
}

impl Responder {
    /// Serve `routes` (path -> HTTP status and body) until the test ends
    async fn start(routes: HashMap<&'static str, (u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&received);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let routes = routes.clone();
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    serve_one(stream, &routes, &log).await;
                });
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            received,
        }
    }

    fn received(&self) -> Vec<Received> {
        self.received.lock().clone()
    }
}

async fn serve_one(
    mut stream: TcpStream,
    routes: &HashMap<&'static str, (u16, String)>,
    log: &Mutex<Vec<Received>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let path = lines
        .next()
        .and_then(|request_line| request_line.split_whitespace().nth(1))
        .unwrap_or_default()
        .to_string();

    let mut content_length = 0;
    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap(),
                "authorization" => authorization = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = serde_json::from_slice(&buf[header_end..]).unwrap_or(Value::Null);

    log.lock().push(Received {
        path: path.clone(),
        authorization,
        body,
    });

    let (status, payload) = routes
        .get(path.as_str())
        .cloned()
        .unwrap_or((404, "not found".to_string()));
    let response = format!(
        "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.ok();
}

fn ok(data: Value) -> (u16, String) {
    (200, json!({ "code": 0, "msg": "", "data": data }).to_string())
}

fn client(responder: &Responder, token: Option<&str>) -> SiyuanGateway {
    SiyuanGateway::from_config(&SiyuanConfig {
        base_url: responder.base_url.clone(),
        token: token.map(str::to_string),
        timeout: Some(Duration::from_secs(5)),
    })
    .unwrap()
}

#[tokio::test]
async fn test_fold_state_reads_fold_attribute() {
    let responder = Responder::start(HashMap::from([(
        GET_BLOCK_ATTRS,
        ok(json!({ "id": "blk-1", "fold": "1" })),
    )]))
    .await;
    let gateway = client(&responder, None);

    let state = gateway.fold_state(&BlockId::new("blk-1")).await.unwrap();
    assert_eq!(state, FoldState::Folded);

    let received = responder.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].path, GET_BLOCK_ATTRS);
    assert_eq!(received[0].body, json!({ "id": "blk-1" }));
    assert_eq!(received[0].authorization, None);
}

#[tokio::test]
async fn test_unfolded_and_unknown_blocks_read_as_unfolded() {
    let responder = Responder::start(HashMap::from([(
        GET_BLOCK_ATTRS,
        ok(json!({ "id": "blk-1", "fold": "0" })),
    )]))
    .await;
    let gateway = client(&responder, None);
    assert_eq!(
        gateway.fold_state(&BlockId::new("blk-1")).await.unwrap(),
        FoldState::Unfolded
    );

    let responder = Responder::start(HashMap::from([(GET_BLOCK_ATTRS, ok(Value::Null))])).await;
    let gateway = client(&responder, None);
    assert_eq!(
        gateway.fold_state(&BlockId::new("gone")).await.unwrap(),
        FoldState::Unfolded
    );
}

#[tokio::test]
async fn test_commands_post_to_their_endpoints_with_token() {
    let responder = Responder::start(HashMap::from([
        (FOLD_BLOCK, ok(Value::Null)),
        (UNFOLD_BLOCK, ok(json!({ "ok": true }))),
    ]))
    .await;
    let gateway = client(&responder, Some("s3cret"));

    gateway.fold(&BlockId::new("a")).await.unwrap();
    let ack = gateway.unfold(&BlockId::new("b")).await.unwrap();
    assert_eq!(ack.payload, json!({ "ok": true }));

    let received = responder.received();
    assert_eq!(received.len(), 2);
    let fold = received.iter().find(|r| r.path == FOLD_BLOCK).unwrap();
    let unfold = received.iter().find(|r| r.path == UNFOLD_BLOCK).unwrap();
    assert_eq!(fold.body, json!({ "id": "a" }));
    assert_eq!(unfold.body, json!({ "id": "b" }));
    assert_eq!(fold.authorization.as_deref(), Some("Token s3cret"));
}

#[tokio::test]
async fn test_non_zero_code_is_rejected() {
    let responder = Responder::start(HashMap::from([(
        FOLD_BLOCK,
        (200, json!({ "code": -1, "msg": "invalid ID argument", "data": null }).to_string()),
    )]))
    .await;
    let gateway = client(&responder, None);

    let err = gateway.fold(&BlockId::new("a")).await.unwrap_err();
    match err {
        GatewayError::Rejected { endpoint, code, msg } => {
            assert_eq!(endpoint, FOLD_BLOCK);
            assert_eq!(code, -1);
            assert_eq!(msg, "invalid ID argument");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_http_error_status() {
    let responder = Responder::start(HashMap::new()).await;
    let gateway = client(&responder, None);

    let err = gateway.unfold(&BlockId::new("a")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_unreadable_body() {
    let responder = Responder::start(HashMap::from([(
        GET_BLOCK_ATTRS,
        (200, "<html>kernel booting</html>".to_string()),
    )]))
    .await;
    let gateway = client(&responder, None);

    let err = gateway.fold_state(&BlockId::new("a")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Decode { .. }));
}

#[tokio::test]
async fn test_unreachable_kernel_is_transport_error() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = SiyuanGateway::new(format!("http://{addr}"), None, None).unwrap();
    let err = gateway.fold(&BlockId::new("a")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Transport { .. }));
}
