//! Message sources

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;

/// Ordered stream of raw order payloads
///
/// `next_message` must be cancel-safe: the pipeline may drop the pending
/// future when shutdown is signalled, and no message may be lost by that.
#[async_trait]
pub trait MessageSource: Send {
    /// Next payload, or `None` once the source is exhausted
    async fn next_message(&mut self) -> Result<Option<Bytes>>;
}

#[async_trait]
impl<S: MessageSource + ?Sized> MessageSource for Box<S> {
    async fn next_message(&mut self) -> Result<Option<Bytes>> {
        (**self).next_message().await
    }
}

/// Source fed through an in-process channel
pub struct ChannelSource {
    rx: mpsc::Receiver<Bytes>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Bytes>) -> Self {
        Self { rx }
    }

    /// Create a bounded channel and the source reading from it
    pub fn channel(capacity: usize) -> (mpsc::Sender<Bytes>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn next_message(&mut self) -> Result<Option<Bytes>> {
        Ok(self.rx.recv().await)
    }
}

/// Source reading one JSON document per line
///
/// Blank lines are skipped.
pub struct LineSource<R> {
    lines: Lines<R>,
    line_no: u64,
}

impl<R> LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }

    /// Number of lines read so far
    pub fn line_no(&self) -> u64 {
        self.line_no
    }
}

impl LineSource<BufReader<File>> {
    /// Read payloads from a file
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).await.map_err(|e| {
            Error::Source(format!(
                "Failed to open {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl LineSource<BufReader<Stdin>> {
    /// Read payloads from standard input
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R> MessageSource for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_message(&mut self) -> Result<Option<Bytes>> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| Error::Source(format!("read failed after line {}: {}", self.line_no, e)))?;

            match line {
                Some(line) => {
                    self.line_no += 1;
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Ok(Some(Bytes::from(line)));
                }
                None => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_order() -> Result<()> {
        let (tx, mut source) = ChannelSource::channel(8);
        tx.send(Bytes::from_static(b"one")).await.unwrap();
        tx.send(Bytes::from_static(b"two")).await.unwrap();
        drop(tx);

        assert_eq!(source.next_message().await?, Some(Bytes::from_static(b"one")));
        assert_eq!(source.next_message().await?, Some(Bytes::from_static(b"two")));
        assert_eq!(source.next_message().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_line_source_skips_blank_lines() -> Result<()> {
        let input: &[u8] = b"{\"a\":1}\n\n   \n{\"b\":2}\n";
        let mut source = LineSource::new(BufReader::new(input));

        assert_eq!(source.next_message().await?, Some(Bytes::from("{\"a\":1}")));
        assert_eq!(source.next_message().await?, Some(Bytes::from("{\"b\":2}")));
        assert_eq!(source.next_message().await?, None);
        assert_eq!(source.line_no(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_boxed_source() -> Result<()> {
        let input: &[u8] = b"x\n";
        let mut source: Box<dyn MessageSource> = Box::new(LineSource::new(BufReader::new(input)));
        assert_eq!(source.next_message().await?, Some(Bytes::from("x")));
        assert_eq!(source.next_message().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let result = LineSource::open("/definitely/not/here.jsonl").await;
        assert!(matches!(result, Err(Error::Source(_))));
    }
}
