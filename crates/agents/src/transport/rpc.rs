// SPDX-License-Identifier: MIT

//! Length-prefixed JSON-over-TCP RPC transport (spec.md §4.5).
//!
//! Wire format: 4-byte big-endian length prefix followed by a JSON payload.
//! No TLS handling here; `Transport::Rpc.tls` is surfaced to callers that
//! wrap the stream before it reaches [`write_message`]/[`read_message`].

use mywant_core::CoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

const MAX_MESSAGE_BYTES: u32 = 16 * 1024 * 1024;

/// Encode `payload` to JSON with no length prefix.
pub fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>, CoreError> {
    serde_json::to_vec(payload).map_err(|e| CoreError::Internal { message: format!("rpc encode failed: {e}") })
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CoreError> {
    serde_json::from_slice(bytes).map_err(|e| CoreError::Internal { message: format!("rpc decode failed: {e}") })
}

/// Write a length-prefixed message: 4-byte big-endian length then the bytes.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> Result<(), CoreError> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| CoreError::Internal { message: "rpc message too large to frame".to_string() })?;
    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| CoreError::Internal { message: format!("rpc write failed: {e}") })?;
    writer.write_all(bytes).await.map_err(|e| CoreError::Internal { message: format!("rpc write failed: {e}") })
}

/// Read a length-prefixed message, rejecting frames over [`MAX_MESSAGE_BYTES`].
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, CoreError> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| CoreError::Internal { message: format!("rpc read length failed: {e}") })?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_MESSAGE_BYTES {
        return Err(CoreError::Internal { message: format!("rpc frame of {len} bytes exceeds limit") });
    }
    let mut body = vec![0u8; len as usize];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| CoreError::Internal { message: format!("rpc read body failed: {e}") })?;
    Ok(body)
}

/// Connect to `addr`, send `request`, and decode the framed JSON response.
/// `deadline` is the caller's per-call timeout (spec.md §5), threaded down
/// from [`crate::AgentDispatcher`]'s configured `do_agent_deadline` rather
/// than a constant fixed here.
pub async fn call<Req: Serialize, Resp: DeserializeOwned>(
    addr: &str,
    request: &Req,
    deadline: Duration,
) -> Result<Resp, CoreError> {
    tokio::time::timeout(deadline, call_inner(addr, request))
        .await
        .map_err(|_| CoreError::Timeout { context: format!("rpc call to {addr}") })?
}

async fn call_inner<Req: Serialize, Resp: DeserializeOwned>(addr: &str, request: &Req) -> Result<Resp, CoreError> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|e| CoreError::TransportFailed { agent: addr.to_string(), message: format!("connect failed: {e}") })?;
    let encoded = encode(request)?;
    write_message(&mut stream, &encoded).await?;
    let response_bytes = read_message(&mut stream).await?;
    decode(&response_bytes)
}
