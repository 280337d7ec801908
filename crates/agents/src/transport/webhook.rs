// SPDX-License-Identifier: MIT

//! Raw HTTP/1.1-over-TCP client for webhook agents (spec.md §4.5).
//!
//! Same shape as a minimal HTTP client: no hyper/reqwest, just a
//! `TcpStream` plus hand-rolled request lines and Content-Length framing.

use crate::envelope::ExecuteRequest;
use mywant_core::CoreError;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// POST an [`ExecuteRequest`] envelope to a webhook agent and parse its
/// JSON response body. `deadline` is the caller's per-call timeout (spec.md
/// §5: "every agent call carries a deadline"), not a value hardcoded here —
/// do-agent calls are expected to pass [`crate::AgentDispatcher`]'s
/// configured `do_agent_deadline`.
pub async fn post_execute(
    addr: &str,
    path: &str,
    token: Option<&str>,
    request: &ExecuteRequest,
    deadline: Duration,
) -> Result<String, CoreError> {
    let body = serde_json::to_string(request)
        .map_err(|e| CoreError::TransportFailed { agent: request.agent_name.clone(), message: e.to_string() })?;
    let auth_header = token.map(|t| format!("Authorization: Bearer {}\r\n", t)).unwrap_or_default();
    let http_request = format!(
        "POST {} HTTP/1.1\r\nHost: localhost\r\n{}Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        path,
        auth_header,
        body.len(),
        body
    );
    tokio::time::timeout(deadline, send_request(addr, &http_request))
        .await
        .map_err(|_| CoreError::Timeout { context: format!("webhook request to {addr}{path}") })?
}

async fn send_request(addr: &str, request: &str) -> Result<String, CoreError> {
    let agent_context = addr.to_string();
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|e| CoreError::TransportFailed { agent: agent_context.clone(), message: format!("connect failed: {e}") })?;
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|e| CoreError::TransportFailed { agent: agent_context.clone(), message: format!("write failed: {e}") })?;

    let mut reader = BufReader::new(&mut stream);
    read_http_response(&mut reader, &agent_context).await
}

async fn read_http_response<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
    agent_context: &str,
) -> Result<String, CoreError> {
    let mut status_line = String::new();
    reader
        .read_line(&mut status_line)
        .await
        .map_err(|e| CoreError::TransportFailed { agent: agent_context.to_string(), message: format!("read status failed: {e}") })?;
    let status_code = status_line.split_whitespace().nth(1).and_then(|s| s.parse::<u16>().ok()).unwrap_or(0);

    let mut content_length: usize = 0;
    loop {
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .await
            .map_err(|e| CoreError::TransportFailed { agent: agent_context.to_string(), message: format!("read header failed: {e}") })?;
        if line == "\r\n" || line.is_empty() {
            break;
        }
        if let Some(val) = line.to_ascii_lowercase().strip_prefix("content-length:") {
            content_length = val.trim().parse().unwrap_or(0);
        }
    }

    let body = if content_length > 0 {
        let mut buf = vec![0u8; content_length];
        reader
            .read_exact(&mut buf)
            .await
            .map_err(|e| CoreError::TransportFailed { agent: agent_context.to_string(), message: format!("read body failed: {e}") })?;
        String::from_utf8_lossy(&buf).into_owned()
    } else {
        String::new()
    };

    if status_code >= 400 {
        return Err(CoreError::TransportFailed {
            agent: agent_context.to_string(),
            message: format!("HTTP {status_code}: {}", body.trim()),
        });
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader as TokioBufReader;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn post_execute_roundtrips_against_a_local_echo_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind should succeed");
        let addr = listener.local_addr().expect("addr").to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept should succeed");
            let (read_half, mut write_half) = socket.split();
            let mut reader = TokioBufReader::new(read_half);
            let mut request_line = String::new();
            reader.read_line(&mut request_line).await.expect("read request line");
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).await.expect("read header");
                if line == "\r\n" {
                    break;
                }
                if let Some(val) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = val.trim().parse().unwrap_or(0);
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).await.expect("read body");
            let response_body = body;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
                response_body.len(),
                String::from_utf8_lossy(&response_body)
            );
            write_half.write_all(response.as_bytes()).await.expect("write response");
        });

        let request = ExecuteRequest {
            want_id: "want-1".to_string(),
            agent_name: "remote_agent".to_string(),
            operation: "do".to_string(),
            want_state: Default::default(),
            params: Default::default(),
            callback_url: None,
        };
        let response = post_execute(&addr, "/execute", Some("tok"), &request, Duration::from_secs(5))
            .await
            .expect("post should succeed");
        server.await.expect("server task should finish");
        assert!(response.contains("remote_agent"));
    }
}
