use thiserror::Error;

/// Everything that stops the filter.
///
/// There is no recoverable variant: once the stream with the agent is out of
/// step, later records cannot be trusted, so every error ends the process.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("malformed record ({reason}): {line:?}")]
    Framing { reason: &'static str, line: String },
    #[error("received {class} verb {verb:?} that was never registered")]
    UnregisteredVerb { class: String, verb: String },
    #[error("{verb} expects {expected} parameters, got {got}")]
    ParamCount {
        verb: &'static str,
        expected: String,
        got: usize,
    },
    #[error("event references unknown session {session_id}")]
    UnknownSession { session_id: String },
    #[error("filter handler failed: {0:#}")]
    Handler(#[from] anyhow::Error),
    #[error("output writer is closed")]
    OutputClosed,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FilterError {
    pub(crate) fn framing(reason: &'static str, line: &str) -> Self {
        Self::Framing {
            reason,
            line: line.to_string(),
        }
    }
}
