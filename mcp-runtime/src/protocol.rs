//! JSON-RPC 2.0 envelopes and stdio message framing.
//!
//! Two framings are accepted on input: `Content-Length` headers followed by a
//! JSON body, and one JSON document per line. Responses are written back in
//! the framing the request arrived in.

use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const UPSTREAM_ERROR: i64 = -32000;
pub const REQUEST_CANCELLED: i64 = -32800;

/// A failed call at the transport level. The host sees no tool result at all.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: PARSE_ERROR,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_REQUEST,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: message.into(),
            data: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: message.into(),
            data: None,
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self {
            code: UPSTREAM_ERROR,
            message: message.into(),
            data: None,
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            code: REQUEST_CANCELLED,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

pub fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result
    })
}

pub fn error_response(id: Value, error: RpcError) -> Value {
    let mut payload = json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    });
    if let Some(data) = error.data {
        payload["error"]["data"] = data;
    }
    payload
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `Content-Length: N\r\n\r\n<body>`
    ContentLength,
    /// One JSON document per line
    Line,
}

/// Upper bound on a single `Content-Length` body.
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ReadError {
    /// The stream failed or ended mid-message; the session is over.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// One message could not be decoded. The stream is positioned at the
    /// next message and the reply goes out in `framing`.
    #[error("{message}")]
    Malformed { framing: Framing, message: String },
}

fn malformed(framing: Framing, message: impl Into<String>) -> ReadError {
    ReadError::Malformed {
        framing,
        message: message.into(),
    }
}

pub async fn read_message<R>(reader: &mut R) -> Result<Option<(Value, Framing)>, ReadError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut bad_header: Option<String> = None;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if content_length.is_none() && bad_header.is_none() {
                return Ok(None);
            }
            return Err(ReadError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            )));
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            if content_length.is_some() || bad_header.is_some() {
                break;
            }
            // Blank separator between line-delimited messages.
            continue;
        }

        if content_length.is_none()
            && bad_header.is_none()
            && (trimmed.starts_with('{') || trimmed.starts_with('['))
        {
            let json: Value = serde_json::from_str(trimmed)
                .map_err(|e| malformed(Framing::Line, format!("Invalid JSON payload: {e}")))?;
            return Ok(Some((json, Framing::Line)));
        }

        if trimmed.to_ascii_lowercase().starts_with("content-length:") {
            let raw_len = trimmed
                .split_once(':')
                .map(|(_, right)| right.trim())
                .unwrap_or_default();
            match raw_len.parse::<usize>() {
                Ok(parsed) => content_length = Some(parsed),
                Err(_) => bad_header = Some(format!("Invalid Content-Length header: {raw_len}")),
            }
        }
    }

    if let Some(message) = bad_header {
        return Err(malformed(Framing::ContentLength, message));
    }
    let Some(content_length) = content_length else {
        return Err(malformed(Framing::ContentLength, "Missing Content-Length header"));
    };
    if content_length > MAX_MESSAGE_BYTES {
        // Skip the body so the next read starts at a message boundary.
        let mut body = (&mut *reader).take(content_length as u64);
        tokio::io::copy(&mut body, &mut tokio::io::sink()).await?;
        return Err(malformed(
            Framing::ContentLength,
            format!("Message of {content_length} bytes exceeds the {MAX_MESSAGE_BYTES} byte limit"),
        ));
    }

    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;

    let json: Value = serde_json::from_slice(&payload).map_err(|e| {
        malformed(Framing::ContentLength, format!("Invalid JSON payload: {e}"))
    })?;
    Ok(Some((json, Framing::ContentLength)))
}

pub async fn write_message<W>(
    writer: &mut W,
    value: &Value,
    framing: Framing,
) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
        Framing::Line => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
    }
    writer.flush().await?;
    Ok(())
}
