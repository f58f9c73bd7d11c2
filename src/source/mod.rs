//! Message sources.
//!
//! Every source is a byte stream of newline-delimited JSON envelopes; the
//! [`StreamSource`] turns it into a channel the dispatcher consumes.

mod stream;

pub use stream::{LineStats, StreamSource};

use std::path::PathBuf;
use std::pin::Pin;

use anyhow::{Context, Result};
use tokio::io::AsyncRead;

/// A boxed async reader.
pub type Reader = Pin<Box<dyn AsyncRead + Send>>;

/// Where to read envelopes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A file of newline-delimited JSON.
    File(PathBuf),
    /// A TCP endpoint streaming newline-delimited JSON (host:port).
    Tcp(String),
    /// Standard input.
    Stdin,
}

impl Input {
    /// Pick an input from the command-line flags. Neither flag means stdin.
    pub fn from_flags(file: Option<PathBuf>, connect: Option<String>) -> Self {
        match (file, connect) {
            (Some(path), _) => Input::File(path),
            (None, Some(addr)) => Input::Tcp(addr),
            (None, None) => Input::Stdin,
        }
    }

    /// Open the input.
    pub async fn open(&self) -> Result<Reader> {
        match self {
            Input::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("failed to open {}", path.display()))?;
                Ok(Box::pin(file))
            }
            Input::Tcp(addr) => {
                tracing::info!(addr = %addr, "connecting");
                let stream = tokio::net::TcpStream::connect(addr)
                    .await
                    .with_context(|| format!("failed to connect to {addr}"))?;
                tracing::info!(addr = %addr, "connected");
                Ok(Box::pin(stream))
            }
            Input::Stdin => Ok(Box::pin(tokio::io::stdin())),
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            Input::File(path) => format!("file:{}", path.display()),
            Input::Tcp(addr) => format!("tcp:{addr}"),
            Input::Stdin => "stdin".to_string(),
        }
    }
}
