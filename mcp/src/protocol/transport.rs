//! Line-delimited transport for JSON-RPC messages
//!
//! Each message is a single line of JSON terminated by a newline. The
//! gateway normally talks over stdin/stdout; any async reader/writer pair
//! works, which is what the tests use.

use super::{JsonRpcRequest, JsonRpcResponse};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error};

/// Transport over stdin/stdout
pub type StdioTransport = LineTransport<BufReader<io::Stdin>, io::Stdout>;

/// Newline-delimited JSON-RPC transport
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

impl StdioTransport {
    pub fn stdio() -> Self {
        LineTransport::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Read the next JSON-RPC request.
    ///
    /// Blank lines are skipped. Returns None on EOF.
    pub async fn read_request(&mut self) -> io::Result<Option<JsonRpcRequest>> {
        loop {
            let mut line = String::new();

            let n = self.reader.read_line(&mut line).await?;
            if n == 0 {
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str(trimmed) {
                Ok(request) => {
                    debug!(request = ?request, "Received JSON-RPC request");
                    return Ok(Some(request));
                }
                Err(e) => {
                    // Lines may carry confirmation phrases or secrets; log the error only
                    error!(error = %e, "Failed to parse JSON-RPC request");
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("Invalid JSON: {}", e),
                    ));
                }
            }
        }
    }

    /// Write a JSON-RPC response as a single line and flush.
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response).map_err(|e| {
            error!(error = %e, "Failed to serialize JSON-RPC response");
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )
        })?;

        debug!(id = ?response.id, error = response.error.is_some(), "Sending JSON-RPC response");

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }

    pub async fn close(&mut self) -> io::Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}
