//! Wire envelope for the relay protocol.
//!
//! One JSON document per line in both directions. Requests carry the
//! operation name under `command` and a parameter object under `params`;
//! responses are tagged with `status` and carry either a `result` value
//! or an error `message`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub command: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Request {
    pub fn new(command: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            command: command.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    Success { result: Value },
    Error { message: String },
}

impl Response {
    pub fn success(result: Value) -> Self {
        Self::Success { result }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Reads the next request from the connection.
///
/// Returns `Ok(None)` on a clean EOF. A line that is not valid JSON maps
/// to [`BridgeError::Protocol`] so the caller can answer with an error
/// response and keep the session alive; IO failures surface as
/// [`BridgeError::Transport`] and end the session.
pub async fn read_request<R>(reader: &mut R) -> Result<Option<Request>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        return serde_json::from_str(trimmed)
            .map(Some)
            .map_err(|err| BridgeError::Protocol(err.to_string()));
    }
}

pub async fn write_response<W>(writer: &mut W, response: &Response) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut payload = serde_json::to_string(response)?;
    payload.push('\n');
    writer.write_all(payload.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_parses_without_params() {
        let request: Request = serde_json::from_str(r#"{"command":"list_nodes"}"#).unwrap();
        assert_eq!(request.command, "list_nodes");
        assert!(request.params.is_empty());
    }

    #[test]
    fn success_response_shape() {
        let response = Response::success(json!({"name": "Blur1"}));
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded, json!({"status": "success", "result": {"name": "Blur1"}}));
    }

    #[test]
    fn error_response_shape() {
        let response = Response::error("missing parameter: node_type");
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(
            encoded,
            json!({"status": "error", "message": "missing parameter: node_type"})
        );
    }

    #[tokio::test]
    async fn read_request_skips_blank_lines_and_stops_at_eof() {
        let input = b"\n{\"command\":\"get_script_info\",\"params\":{}}\n".to_vec();
        let mut reader = tokio::io::BufReader::new(std::io::Cursor::new(input));
        let request = read_request(&mut reader).await.unwrap().unwrap();
        assert_eq!(request.command, "get_script_info");
        assert!(read_request(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_request_reports_malformed_json() {
        let mut reader = tokio::io::BufReader::new(std::io::Cursor::new(b"not json\n".to_vec()));
        match read_request(&mut reader).await {
            Err(BridgeError::Protocol(_)) => {}
            other => panic!("expected protocol error, got {other:?}"),
        }
    }
}
