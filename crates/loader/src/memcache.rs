//! Memcached backend speaking the text protocol.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::store::KeyValueStore;

/// Longest key memcached accepts.
const MAX_KEY_LEN: usize = 250;

/// Memcached client holding one persistent connection.
///
/// Connects lazily on the first write and reconnects on the next write
/// after any I/O failure or interrupted request.
pub struct MemcacheStore {
    addr: String,
    conn: Mutex<Option<BufStream<TcpStream>>>,
}

impl MemcacheStore {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            conn: Mutex::new(None),
        }
    }

    async fn connect(&self) -> Result<BufStream<TcpStream>, StoreError> {
        debug!(address = %self.addr, "connecting to memcached");
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| StoreError::Connection(format!("{}: {}", self.addr, e)))?;
        stream.set_nodelay(true)?;
        Ok(BufStream::new(stream))
    }
}

#[async_trait]
impl KeyValueStore for MemcacheStore {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        validate_key(key)?;

        let mut guard = self.conn.lock().await;
        // Taken out for the duration of the request: if this future is
        // dropped mid-request the half-used connection goes with it.
        let mut stream = match guard.take() {
            Some(stream) => stream,
            None => self.connect().await?,
        };

        let result = write_set(&mut stream, key, value).await;
        match result {
            Ok(()) | Err(StoreError::NotStored(_)) => *guard = Some(stream),
            Err(ref e) => debug!(address = %self.addr, error = %e, "dropping connection"),
        }
        result
    }

    fn address(&self) -> &str {
        &self.addr
    }
}

async fn write_set(
    stream: &mut BufStream<TcpStream>,
    key: &str,
    value: &[u8],
) -> Result<(), StoreError> {
    let header = format!("set {} 0 0 {}\r\n", key, value.len());
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(value).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await?;

    let mut reply = String::new();
    if stream.read_line(&mut reply).await? == 0 {
        return Err(StoreError::Connection("connection closed by server".into()));
    }
    match reply.trim_end() {
        "STORED" => Ok(()),
        "NOT_STORED" => Err(StoreError::NotStored(key.to_string())),
        other => Err(StoreError::Protocol(other.to_string())),
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(StoreError::InvalidKey(format!(
            "key length {} outside 1..={}",
            key.len(),
            MAX_KEY_LEN
        )));
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(StoreError::InvalidKey(format!("{:?} contains whitespace", key)));
    }
    Ok(())
}
