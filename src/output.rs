use crate::error::FilterError;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

enum Command {
    Record(String),
    Shutdown,
}

/// Handle used to queue complete records for the agent.
///
/// Clones share one queue drained by a single task, so a record is always
/// written in full before the next one starts no matter how many producers
/// are emitting.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    tx: mpsc::UnboundedSender<Command>,
}

/// The draining task; `finish` stops it and hands the sink back.
pub struct WriterTask<W> {
    tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<std::io::Result<W>>,
}

impl OutputWriter {
    pub fn spawn<W>(writer: W) -> (Self, WriterTask<W>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(drain(rx, writer));
        (
            Self { tx: tx.clone() },
            WriterTask { tx, handle },
        )
    }

    /// Queues one record. The trailing newline is added here.
    pub fn emit(&self, record: impl Into<String>) -> Result<(), FilterError> {
        let mut record = record.into();
        record.push('\n');
        tracing::trace!(record = %crate::logging::safe_log_string(record.trim_end()), "emit");
        self.tx
            .send(Command::Record(record))
            .map_err(|_| FilterError::OutputClosed)
    }
}

async fn drain<W>(mut rx: mpsc::UnboundedReceiver<Command>, mut writer: W) -> std::io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = rx.recv().await {
        match command {
            Command::Record(record) => {
                writer.write_all(record.as_bytes()).await?;
                writer.flush().await?;
            }
            Command::Shutdown => break,
        }
    }
    writer.flush().await?;
    Ok(writer)
}

impl<W> WriterTask<W> {
    /// Writes everything queued so far, then stops. Records emitted after
    /// this point are refused with [`FilterError::OutputClosed`].
    pub async fn finish(self) -> Result<W, FilterError> {
        // The task may already be gone after a write error; the join below
        // reports that error.
        let _ = self.tx.send(Command::Shutdown);
        let writer = self.handle.await.map_err(std::io::Error::other)??;
        Ok(writer)
    }
}
