//! HTTP conversion service against a throwaway local server.
//!
//! The server is a bare tokio listener that reads one multipart request,
//! hands the raw bytes back to the test, and answers with a canned response.

use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use vidconv::{
    ControllerConfig, Controller, ConversionError, ConversionService, FileSystemSink,
    HttpConversionService, SourceFile, Status, VidConvError,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Canned {
    status_line: &'static str,
    body: &'static [u8],
}

/// Serve exactly one request; returns the endpoint URL and the captured
/// request text.
async fn serve_once(reply: Canned) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/convert", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = sock.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            if request_complete(&raw) {
                break;
            }
        }

        let head = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            reply.status_line,
            reply.body.len()
        );
        sock.write_all(head.as_bytes()).await.unwrap();
        sock.write_all(reply.body).await.unwrap();
        sock.shutdown().await.ok();
        let _ = tx.send(String::from_utf8_lossy(&raw).into_owned());
    });

    (url, rx)
}

/// A multipart request is complete once its closing boundary has arrived.
fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some(boundary) = text
        .lines()
        .find(|l| l.to_ascii_lowercase().starts_with("content-type:"))
        .and_then(|l| l.split("boundary=").nth(1))
        .map(|b| b.trim().to_string())
    else {
        return false;
    };
    text.contains(&format!("--{boundary}--"))
}

// ── Service ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_posts_file_and_target_as_multipart() {
    let (url, captured) = serve_once(Canned {
        status_line: "200 OK",
        body: b"CONVERTED",
    })
    .await;

    let service = HttpConversionService::new(url).unwrap();
    let file = SourceFile::new("movie.mkv", b"RAWVIDEOBYTES".to_vec());
    let payload = service.convert(file, "mp4".into()).await.unwrap();
    assert_eq!(&payload[..], b"CONVERTED");

    let request = captured.await.unwrap();
    assert!(request.starts_with("POST /convert HTTP/1.1"));
    assert!(request.contains("multipart/form-data"));
    assert!(request.contains("name=\"file\"; filename=\"movie.mkv\""));
    assert!(request.contains("RAWVIDEOBYTES"));
    assert!(request.contains("name=\"to_format\""));
    assert!(request.contains("\r\n\r\nmp4\r\n"));
}

#[tokio::test]
async fn test_server_error_is_service_failure() {
    let (url, _captured) = serve_once(Canned {
        status_line: "500 Internal Server Error",
        body: b"ffmpeg exited with 1",
    })
    .await;

    let service = HttpConversionService::new(url).unwrap();
    let err = service
        .convert(SourceFile::new("a.avi", vec![0u8; 16]), "mp4".into())
        .await
        .unwrap_err();
    match err {
        ConversionError::ServiceFailure { status, ref message } => {
            assert_eq!(status, Some(500));
            assert!(message.contains("500"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_service_is_service_failure() {
    // Bind then drop to get a port with nothing listening.
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();
    let service = HttpConversionService::new(format!("http://{addr}/convert")).unwrap();
    let err = service
        .convert(SourceFile::new("a.avi", vec![0u8; 16]), "mp4".into())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConversionError::ServiceFailure { status: None, .. }
    ));
}

// ── Controller over HTTP ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_controller_saves_converted_file() {
    let (url, _captured) = serve_once(Canned {
        status_line: "200 OK",
        body: b"webm-bytes",
    })
    .await;
    let dir = tempfile::tempdir().unwrap();

    let config = ControllerConfig::builder()
        .service_url(url.clone())
        .output_dir(dir.path())
        .build()
        .unwrap();
    let controller = Controller::new(
        config,
        Arc::new(HttpConversionService::new(url).unwrap()),
        Arc::new(FileSystemSink::new(dir.path())),
    );

    controller
        .intake(SourceFile::new("holiday.MOV", b"source".to_vec()))
        .unwrap();
    controller.select_target("webm").unwrap();
    let out = controller.submit().await.unwrap();

    assert_eq!(out.file_name, "holiday.webm");
    assert_eq!(out.location.as_deref(), Some(dir.path().join("holiday.webm").as_path()));
    let saved = std::fs::read(dir.path().join("holiday.webm")).unwrap();
    assert_eq!(saved, b"webm-bytes");
    assert_eq!(controller.status(), Status::Succeeded);
}

#[tokio::test]
async fn test_convert_file_reports_http_failure() {
    let (url, _captured) = serve_once(Canned {
        status_line: "502 Bad Gateway",
        body: b"",
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("clip.avi");
    std::fs::write(&input, b"avi").unwrap();

    let config = ControllerConfig::builder()
        .service_url(url)
        .output_dir(dir.path().join("out"))
        .build()
        .unwrap();
    let err = vidconv::convert_file(&input, "mp4", &config)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Conversion failed: HTTP 502 Bad Gateway");
    assert!(matches!(err, VidConvError::Conversion(_)));
    assert!(!dir.path().join("out").join("clip.mp4").exists());
}
