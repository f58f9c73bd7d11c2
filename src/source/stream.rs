//! Stream-based message source.
//!
//! Reads newline-delimited JSON envelopes from an async byte stream (a file,
//! a TCP connection or stdin) and forwards them to the dispatcher.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use twinwatch_host::Envelope;

/// Counts kept by the reader task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LineStats {
    pub lines: u64,
    pub parsed: u64,
    pub malformed: u64,
    /// The stream ended on an I/O error rather than EOF.
    pub read_error: bool,
}

/// A source that parses envelopes from an async reader in the background.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use twinwatch::StreamSource;
/// use twinwatch_types::GasSensorMessage;
///
/// # tokio_test::block_on(async {
/// let data = r#"{"id":"s1","message":{"reading":12,"timestamp":0}}"#.to_string() + "\n";
/// let source = StreamSource::<GasSensorMessage>::spawn(Cursor::new(data), "example", 16);
/// let (mut rx, _task) = source.into_parts();
/// assert_eq!(rx.recv().await.unwrap().id, "s1");
/// # });
/// ```
#[derive(Debug)]
pub struct StreamSource<M> {
    receiver: mpsc::Receiver<Envelope<M>>,
    description: String,
    task: JoinHandle<LineStats>,
}

impl<M> StreamSource<M>
where
    M: DeserializeOwned + Send + 'static,
{
    /// Spawn a background task that reads from the given async reader.
    ///
    /// Blank lines are ignored. Lines that are not UTF-8 or do not parse are
    /// logged, counted as malformed and skipped. The task ends at EOF, on an
    /// I/O error, or when the receiver is dropped.
    pub fn spawn<R>(reader: R, description: &str, capacity: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let desc = description.to_string();

        let task = tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            let mut stats = LineStats::default();

            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => {
                        tracing::debug!(source = %desc, lines = stats.lines, "end of input");
                        break;
                    }
                    Ok(_) => {
                        stats.lines += 1;
                        let text = match std::str::from_utf8(&buf) {
                            Ok(text) => text.trim(),
                            Err(e) => {
                                stats.malformed += 1;
                                tracing::warn!(
                                    source = %desc,
                                    line = stats.lines,
                                    error = %e,
                                    "skipping line that is not UTF-8"
                                );
                                continue;
                            }
                        };
                        if text.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Envelope<M>>(text) {
                            Ok(envelope) => {
                                stats.parsed += 1;
                                if tx.send(envelope).await.is_err() {
                                    // Receiver dropped
                                    break;
                                }
                            }
                            Err(e) => {
                                stats.malformed += 1;
                                tracing::warn!(
                                    source = %desc,
                                    line = stats.lines,
                                    error = %e,
                                    "skipping malformed line"
                                );
                            }
                        }
                    }
                    Err(e) => {
                        stats.read_error = true;
                        tracing::error!(source = %desc, error = %e, "read error");
                        break;
                    }
                }
            }
            stats
        });

        Self {
            receiver: rx,
            description: format!("stream: {}", description),
            task,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Split into the envelope receiver and the reader task.
    pub fn into_parts(self) -> (mpsc::Receiver<Envelope<M>>, JoinHandle<LineStats>) {
        (self.receiver, self.task)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use twinwatch_types::{GasSensorMessage, GridNodeMessage, Millis};

    use super::*;

    fn gas_line(id: &str, reading: u32) -> String {
        format!(r#"{{"id":"{id}","message":{{"reading":{reading},"timestamp":1703160000000}}}}"#)
    }

    async fn collect<M: DeserializeOwned + Send + 'static>(
        data: String,
    ) -> (Vec<Envelope<M>>, LineStats) {
        let source = StreamSource::<M>::spawn(Cursor::new(data), "test", 16);
        let (mut rx, task) = source.into_parts();
        let mut out = Vec::new();
        while let Some(env) = rx.recv().await {
            out.push(env);
        }
        (out, task.await.unwrap())
    }

    #[tokio::test]
    async fn test_stream_source_reads_envelopes_in_order() {
        let data = format!("{}\n{}\n", gas_line("s1", 10), gas_line("s2", 90));
        let (envs, stats) = collect::<GasSensorMessage>(data).await;

        assert_eq!(envs.len(), 2);
        assert_eq!(envs[0].id, "s1");
        assert_eq!(envs[1].message.reading, 90);
        assert_eq!(envs[1].message.timestamp, Millis(1_703_160_000_000));
        assert_eq!(
            stats,
            LineStats {
                lines: 2,
                parsed: 2,
                malformed: 0,
                read_error: false,
            }
        );
    }

    #[tokio::test]
    async fn test_stream_source_skips_malformed_lines() {
        let data = format!("not valid json\n\n{}\n{{\"id\":\"s3\"}}\n", gas_line("s1", 10));
        let (envs, stats) = collect::<GasSensorMessage>(data).await;

        assert_eq!(envs.len(), 1);
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.lines, 4);
    }

    #[tokio::test]
    async fn test_stream_source_skips_invalid_utf8_line() {
        let mut data = format!("{}\n", gas_line("s1", 10)).into_bytes();
        data.extend_from_slice(b"\xff\xfe garbage\n");
        data.extend_from_slice(format!("{}\n", gas_line("s2", 300)).as_bytes());

        let source = StreamSource::<GasSensorMessage>::spawn(Cursor::new(data), "test", 16);
        let (mut rx, task) = source.into_parts();
        let mut ids = Vec::new();
        while let Some(env) = rx.recv().await {
            ids.push(env.id);
        }
        let stats = task.await.unwrap();

        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(
            stats,
            LineStats {
                lines: 3,
                parsed: 2,
                malformed: 1,
                read_error: false,
            }
        );
    }

    #[tokio::test]
    async fn test_stream_source_records_read_error() {
        let reader = tokio_test::io::Builder::new()
            .read(format!("{}\n", gas_line("s1", 10)).as_bytes())
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let source = StreamSource::<GasSensorMessage>::spawn(reader, "test", 16);
        let (mut rx, task) = source.into_parts();
        assert_eq!(rx.recv().await.unwrap().id, "s1");
        assert!(rx.recv().await.is_none());

        let stats = task.await.unwrap();
        assert_eq!(stats.parsed, 1);
        assert!(stats.read_error);
    }

    #[tokio::test]
    async fn test_stream_source_without_trailing_newline() {
        let (envs, _) = collect::<GasSensorMessage>(gas_line("s1", 10)).await;
        assert_eq!(envs.len(), 1);
    }

    #[tokio::test]
    async fn test_stream_source_grid_messages() {
        let data = concat!(
            r#"{"id":"23","message":{"type":"init","region":"NW","node_type":"controller","latitude":47.5,"longitude":122.6}}"#,
            "\n",
            r#"{"id":"23","message":{"type":"status","condition":"severe"}}"#,
            "\n"
        )
        .to_string();
        let (envs, _) = collect::<GridNodeMessage>(data).await;

        assert!(envs[0].message.is_init());
        assert_eq!(envs[1].message.condition.as_deref(), Some("severe"));
    }

    #[tokio::test]
    async fn test_stream_source_description() {
        let source = StreamSource::<GasSensorMessage>::spawn(Cursor::new(""), "tcp://localhost:9090", 1);
        assert_eq!(source.description(), "stream: tcp://localhost:9090");
    }

    #[tokio::test]
    async fn test_stream_source_empty_stream() {
        let (envs, stats) = collect::<GasSensorMessage>(String::new()).await;
        assert!(envs.is_empty());
        assert_eq!(stats, LineStats::default());
    }
}
