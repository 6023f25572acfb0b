//! Unix socket session framing

use serde::Serialize;
use std::sync::Arc;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::unix::{OwnedReadHalf, OwnedWriteHalf},
    sync::Mutex,
};

/// Writing half of a session
///
/// Every message is serialized to a single line. Concurrent senders are
/// serialized by the inner lock so lines never interleave.
#[derive(Debug, Clone)]
pub struct SessionWriter {
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl SessionWriter {
    pub fn new(writer: OwnedWriteHalf) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Send one JSON-RPC message
    pub async fn send<T: Serialize>(&self, message: &T) -> std::io::Result<()> {
        let json = serde_json::to_string(message)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut writer = self.writer.lock().await;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        Ok(())
    }
}

/// Session reader for processing incoming messages
pub struct SessionReader {
    reader: BufReader<OwnedReadHalf>,
}

impl SessionReader {
    /// Create a new session reader
    pub fn new(reader: OwnedReadHalf) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next line from the socket
    pub async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        let bytes_read = self.reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            // EOF - connection closed
            return Ok(None);
        }

        // Remove trailing newline
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{GetCompositionParams, JsonRpcRequest, Request, RequestId};
    use tokio::net::UnixStream;

    #[tokio::test]
    async fn test_session_read_write() {
        let (client, server) = UnixStream::pair().unwrap();
        let (read_half, _server_write) = server.into_split();
        let (_client_read, client_write) = client.into_split();

        let writer = SessionWriter::new(client_write);
        let mut reader = SessionReader::new(read_half);

        let request = JsonRpcRequest::new(
            Request::GetComposition(GetCompositionParams {
                target: 2,
                page: 0,
            }),
            RequestId::Number(1),
        );
        writer.send(&request).await.unwrap();

        let line = reader.read_line().await.unwrap();
        assert!(line.is_some());
        let received: JsonRpcRequest = serde_json::from_str(&line.unwrap()).unwrap();
        assert_eq!(received, request);
    }

    #[tokio::test]
    async fn test_session_reader_strips_crlf() {
        let (client, server) = UnixStream::pair().unwrap();
        let (read_half, _) = server.into_split();
        let (_, mut client_write) = client.into_split();
        let mut reader = SessionReader::new(read_half);

        client_write.write_all(b"{}\r\n").await.unwrap();

        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_session_reader_eof() {
        let (client, server) = UnixStream::pair().unwrap();
        let (read_half, _) = server.into_split();
        let mut reader = SessionReader::new(read_half);

        // Close client side
        drop(client);

        // Should read EOF
        let line = reader.read_line().await.unwrap();
        assert!(line.is_none());
    }
}
