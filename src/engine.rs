use crate::capability::Filter;
use crate::dispatch::Dispatcher;
use crate::error::FilterError;
use crate::handshake::process_config;
use crate::output::OutputWriter;
use crate::reader::LineReader;
use crate::registry::Registry;
use crate::session::SessionTracker;
use tokio::io::{AsyncRead, AsyncWrite};

/// Drives a [`Filter`] through one conversation with the agent: handshake,
/// registration, then one record at a time until the stream ends.
pub struct FilterRunner<F> {
    filter: F,
    raw_logging: bool,
}

impl<F: Filter> FilterRunner<F> {
    pub fn new(filter: F) -> Self {
        Self {
            filter,
            raw_logging: false,
        }
    }

    /// Log received records without escaping.
    pub fn raw_logging(mut self, raw: bool) -> Self {
        self.raw_logging = raw;
        self
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }

    pub fn into_filter(self) -> F {
        self.filter
    }

    /// Talks to the agent over `input`/`output` and hands `output` back
    /// once everything queued has been written.
    ///
    /// End of input is a clean shutdown at any point. Any protocol
    /// violation stops processing immediately and is returned after the
    /// pending output has been flushed.
    pub async fn run<R, W>(&mut self, input: R, output: W) -> Result<W, FilterError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out, writer) = OutputWriter::spawn(output);
        let result = self.serve(input, out).await;
        let sink = writer.finish().await;
        match result {
            Ok(()) => sink,
            Err(err) => {
                tracing::error!("stopping filter: {err}");
                Err(err)
            }
        }
    }

    async fn serve<R>(&mut self, input: R, out: OutputWriter) -> Result<(), FilterError>
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = LineReader::new(input).raw_logging(self.raw_logging);

        let Some(config) = process_config(&mut reader, &mut self.filter).await? else {
            tracing::info!("agent closed the stream during the handshake");
            return Ok(());
        };

        let registry = Registry::build(&mut self.filter);
        registry.register(&out)?;

        let tracker = self.filter.track_sessions().then(SessionTracker::new);
        let mut dispatcher = Dispatcher::new(registry, config, tracker, out);
        while let Some(line) = reader.next_line().await? {
            dispatcher.dispatch(&mut self.filter, &line)?;
        }

        tracing::info!("agent closed the stream");
        Ok(())
    }
}
