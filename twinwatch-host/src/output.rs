//! Alert outputs.

use std::path::PathBuf;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::envelope::Delivery;
use crate::error::HostError;

/// Destination for delivered alerts.
///
/// Unlike a metrics sink, an alert output reports every failure: the
/// dispatcher only commits an entity's new state once all outputs accepted
/// the batch's alerts.
#[derive(Debug)]
pub enum Output<A> {
    /// Append alerts to a file, one JSON object per line.
    File(PathBuf),

    /// Send alerts to a TCP server as newline-delimited JSON.
    ///
    /// A connection is opened for each batch that raised alerts.
    Tcp(String),

    /// Send alerts through a channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    Channel(mpsc::Sender<Delivery<A>>),
}

impl<A> Output<A> {
    /// Create a file output.
    ///
    /// # Example
    ///
    /// ```rust
    /// use twinwatch_host::Output;
    /// use twinwatch_types::GasAlert;
    ///
    /// let output: Output<GasAlert> = Output::file("alerts.ndjson");
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Output::File(path.into())
    }

    /// Create a TCP output.
    pub fn tcp(addr: impl Into<String>) -> Self {
        Output::Tcp(addr.into())
    }

    /// Create a channel output and return both the output and receiver.
    ///
    /// Delivery waits while the channel is full.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Delivery<A>>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            Output::File(path) => format!("file:{}", path.display()),
            Output::Tcp(addr) => format!("tcp:{addr}"),
            Output::Channel(_) => "channel".to_string(),
        }
    }
}

impl<A: Serialize + Clone> Output<A> {
    /// Deliver the alerts raised by one batch, in order.
    ///
    /// File and TCP outputs write the whole batch with a single `write_all`.
    pub(crate) async fn emit(&self, deliveries: &[Delivery<A>]) -> Result<(), HostError> {
        if deliveries.is_empty() {
            return Ok(());
        }
        match self {
            Output::File(path) => {
                let lines = encode_lines(deliveries)?;
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?;
                file.write_all(&lines).await?;
                file.flush().await?;
            }
            Output::Tcp(addr) => {
                let lines = encode_lines(deliveries)?;
                let mut stream = tokio::net::TcpStream::connect(addr).await?;
                stream.write_all(&lines).await?;
                stream.shutdown().await?;
            }
            Output::Channel(tx) => {
                for delivery in deliveries {
                    tx.send(delivery.clone())
                        .await
                        .map_err(|_| HostError::Closed)?;
                }
            }
        }
        Ok(())
    }
}

fn encode_lines<T: Serialize>(values: &[T]) -> Result<Vec<u8>, HostError> {
    let mut buf = Vec::new();
    for value in values {
        serde_json::to_writer(&mut buf, value)?;
        buf.push(b'\n');
    }
    Ok(buf)
}
