use crosspost_core::{AcquireConfig, AcquisitionError, MediaPost, MediaType};
use media_fetcher::{Acquirer, HttpMediaSource};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

fn http_response(status_line: &str, headers: &[(&str, String)], body: &[u8]) -> Vec<u8> {
    let mut head = format!("HTTP/1.1 {}\r\n", status_line);
    for (name, value) in headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    ));

    let mut response = head.into_bytes();
    response.extend_from_slice(body);
    response
}

/// Serves one canned response per accepted connection and reports the raw
/// request heads it saw.
async fn serve<F>(responses: F) -> (SocketAddr, mpsc::UnboundedReceiver<String>)
where
    F: FnOnce(SocketAddr) -> Vec<Vec<u8>>,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let responses = responses(addr);
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for response in responses {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let _ = tx.send(String::from_utf8_lossy(&head).to_lowercase());

            socket.write_all(&response).await.unwrap();
            let _ = socket.shutdown().await;
        }
    });

    (addr, rx)
}

fn config() -> AcquireConfig {
    AcquireConfig {
        backoff_unit_ms: 5,
        timeout_secs: 10,
        ..Default::default()
    }
}

fn temp_root() -> PathBuf {
    std::env::temp_dir().join(format!("crosspost_http_{}", uuid::Uuid::new_v4()))
}

fn post(url: String, media_type: MediaType) -> MediaPost {
    MediaPost::new(
        "pics",
        "abc123",
        "A picture",
        "https://www.reddit.com/r/pics/comments/abc123/a_picture/",
        media_type,
        url,
    )
}

#[tokio::test]
async fn test_jpeg_download_over_http() {
    let body = vec![0xFFu8; 2048];
    let served = body.clone();
    let (addr, mut requests) = serve(move |_| {
        vec![http_response(
            "200 OK",
            &[("Content-Type", "image/jpeg".to_string())],
            &served,
        )]
    })
    .await;

    let root = temp_root();
    let acquirer = Acquirer::new(HttpMediaSource::new(&config()).unwrap(), &root, &config());
    let path = acquirer
        .acquire(&post(format!("http://{}/media/photo", addr), MediaType::Image))
        .await
        .unwrap();

    assert_eq!(path.extension().unwrap(), "jpg");
    assert_eq!(std::fs::read(&path).unwrap(), body);

    let request = requests.recv().await.unwrap();
    assert!(request.starts_with("get /media/photo "));
    assert!(request.contains("referer: https://www.reddit.com/r/pics/comments/abc123/a_picture/"));
    assert!(request.contains("accept-encoding: identity"));
    assert!(request.contains("user-agent: mozilla/5.0"));
}

#[tokio::test]
async fn test_redirect_is_followed() {
    let (addr, mut requests) = serve(|addr| {
        vec![
            http_response(
                "302 Found",
                &[("Location", format!("http://{}/final/clip", addr))],
                b"",
            ),
            http_response(
                "200 OK",
                &[("Content-Type", "video/mp4".to_string())],
                &[1u8; 4096],
            ),
        ]
    })
    .await;

    let root = temp_root();
    let acquirer = Acquirer::new(HttpMediaSource::new(&config()).unwrap(), &root, &config());
    let path = acquirer
        .acquire(&post(format!("http://{}/start", addr), MediaType::Video))
        .await
        .unwrap();

    assert_eq!(path.extension().unwrap(), "mp4");
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);

    assert!(requests.recv().await.unwrap().starts_with("get /start "));
    assert!(requests.recv().await.unwrap().starts_with("get /final/clip "));
}

#[tokio::test]
async fn test_error_status_exhausts_retries() {
    let (addr, mut requests) = serve(|_| {
        (0..3)
            .map(|_| http_response("404 Not Found", &[], b"gone"))
            .collect()
    })
    .await;

    let root = temp_root();
    let acquirer = Acquirer::new(HttpMediaSource::new(&config()).unwrap(), &root, &config());
    let result = acquirer
        .acquire(&post(format!("http://{}/img.png", addr), MediaType::Image))
        .await;

    match result {
        Err(AcquisitionError::HttpStatus { status, .. }) => assert_eq!(status, 404),
        other => panic!("unexpected result {:?}", other),
    }

    let mut seen = 0;
    while requests.try_recv().is_ok() {
        seen += 1;
    }
    assert_eq!(seen, 3);
    assert_eq!(acquirer.retry_metrics().last_delays.len(), 2);
}
