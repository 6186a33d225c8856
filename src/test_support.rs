//! Helpers shared by the networked tests.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// How long a test waits for a reply before failing.
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// A line-oriented test client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    /// Writes raw bytes without adding a delimiter.
    pub async fn send_raw(&mut self, data: &[u8]) {
        self.writer.write_all(data).await.unwrap();
    }

    /// Reads one reply line without its delimiter.
    ///
    /// Returns `None` once the server has closed the connection.
    pub async fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match tokio::time::timeout(REPLY_TIMEOUT, self.reader.read_line(&mut line)).await {
            Ok(Ok(0)) | Ok(Err(_)) => None,
            Ok(Ok(_)) => Some(line.trim_end_matches('\n').to_string()),
            Err(_) => panic!("timed out waiting for a reply"),
        }
    }

    /// Sends one request line and returns the reply.
    pub async fn request(&mut self, line: &str) -> String {
        self.send_raw(format!("{}\n", line).as_bytes()).await;
        self.read_line()
            .await
            .unwrap_or_else(|| panic!("connection closed after {:?}", line))
    }

    /// Asserts that the server closes the connection.
    pub async fn assert_closed(&mut self) {
        assert_eq!(self.read_line().await, None);
    }
}
