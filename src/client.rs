use miette::{Context, Result, miette};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use crate::protocol::{self, Command, ParseError, Reply};

const MAX_REPLY_BYTES: usize = 64 * 1024 * 1024;

/// Client side of one store connection.
///
/// The connection is opened once, carries the database selection made through
/// [`StoreClient::select`], and is closed when the client is dropped.
pub struct StoreClient {
    addr: String,
    stream: TcpStream,
}

impl StoreClient {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| miette!("failed to connect to {}: {}", addr, e))?;

        tracing::debug!("connected to {}", addr);

        Ok(StoreClient {
            addr: addr.to_string(),
            stream,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one command and read exactly one reply frame
    pub async fn roundtrip(&mut self, command: &Command) -> Result<Reply> {
        let request_bytes = protocol::serialize_frame(&command.to_frame());

        self.stream
            .write_all(request_bytes.as_ref())
            .await
            .map_err(|e| miette!("failed to send {} to {}: {}", command.name(), self.addr, e))?;

        self.stream
            .flush()
            .await
            .map_err(|e| miette!("failed to flush {} to {}: {}", command.name(), self.addr, e))?;

        let reply = self
            .read_single_resp_frame()
            .await
            .wrap_err(format!("reading {} reply from {}", command.name(), self.addr))?;

        tracing::debug!(
            "{} on {} replied with {}",
            command.name(),
            self.addr,
            protocol::reply_kind(&reply)
        );

        Ok(reply)
    }

    /// Select the logical database; the store must acknowledge with OK
    pub async fn select(&mut self, index: &str) -> Result<()> {
        let reply = self
            .roundtrip(&Command::Select {
                index: index.to_string(),
            })
            .await?;

        protocol::expect_ok(reply)
            .map_err(|e| miette!("selecting database {} on {}: {}", index, self.addr, e))?;

        tracing::debug!("selected database {} on {}", index, self.addr);
        Ok(())
    }

    async fn read_single_resp_frame(&mut self) -> Result<Reply> {
        let mut buffer = Vec::with_capacity(4096);
        let mut chunk = [0_u8; 4096];

        loop {
            let read = self
                .stream
                .read(&mut chunk)
                .await
                .map_err(|e| miette!("failed reading store reply: {}", e))?;

            if read == 0 {
                return Err(miette!(
                    "connection closed before a full RESP reply was received"
                ));
            }

            buffer.extend_from_slice(&chunk[..read]);

            if buffer.len() > MAX_REPLY_BYTES {
                return Err(miette!(
                    "store reply exceeded max size ({} bytes)",
                    MAX_REPLY_BYTES
                ));
            }

            match protocol::parse_resp_with_remaining(&buffer) {
                Ok((frame, _)) => return Ok(frame),
                Err(ParseError::Incomplete) => continue,
                Err(err) => return Err(miette!("failed to parse RESP reply: {}", err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use redis_protocol::resp2::types::BytesFrame;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Test helper to create a mock store that answers each request with one
    /// canned response, written in the given chunks
    async fn create_mock_store(responses: Vec<Vec<Vec<u8>>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buffer = vec![0; 1024];

            for chunks in responses {
                let _ = stream.read(&mut buffer).await.unwrap();
                for chunk in chunks {
                    stream.write_all(&chunk).await.unwrap();
                    stream.flush().await.unwrap();
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        addr
    }

    #[tokio::test]
    async fn test_roundtrip_reads_reply_split_across_chunks() {
        let addr = create_mock_store(vec![vec![
            b"$11\r\nhello".to_vec(),
            b" world\r\n".to_vec(),
        ]])
        .await;

        let mut client = StoreClient::connect(&addr).await.unwrap();
        let reply = client
            .roundtrip(&Command::Type {
                key: Bytes::from_static(b"k"),
            })
            .await
            .unwrap();

        assert_eq!(reply, BytesFrame::BulkString("hello world".into()));
    }

    #[tokio::test]
    async fn test_roundtrip_surfaces_closed_connection() {
        let addr = create_mock_store(vec![]).await;

        let mut client = StoreClient::connect(&addr).await.unwrap();
        let result = client
            .roundtrip(&Command::Ttl {
                key: Bytes::from_static(b"k"),
            })
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_select_accepts_ok() {
        let addr = create_mock_store(vec![vec![b"+OK\r\n".to_vec()]]).await;

        let mut client = StoreClient::connect(&addr).await.unwrap();
        assert!(client.select("0").await.is_ok());
    }

    #[tokio::test]
    async fn test_select_rejects_error_reply() {
        let addr = create_mock_store(vec![vec![b"-ERR invalid DB index\r\n".to_vec()]]).await;

        let mut client = StoreClient::connect(&addr).await.unwrap();
        assert!(client.select("99").await.is_err());
    }

    #[tokio::test]
    async fn test_connect_fails_for_unreachable_store() {
        // Bind then drop a listener so the port is very likely closed
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert!(StoreClient::connect(&addr).await.is_err());
    }
}
