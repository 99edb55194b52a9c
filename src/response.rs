use crate::error::FilterError;
use crate::event::{Event, ProtocolVersion};
use crate::output::OutputWriter;
use std::borrow::Cow;

/// Escape a body line for the agent: a leading `.` is doubled so it cannot
/// be mistaken for the end-of-data marker.
pub fn dot_stuff(line: &str) -> Cow<'_, str> {
    if line.starts_with('.') {
        Cow::Owned(format!(".{line}"))
    } else {
        Cow::Borrowed(line)
    }
}

/// Undo [`dot_stuff`] on a line received from the agent.
pub fn dot_unstuff(line: &str) -> &str {
    line.strip_prefix('.').unwrap_or(line)
}

/// Encodes replies to one filter request and queues them on the
/// [`OutputWriter`].
///
/// Cheap to clone and `'static`, so a handler can move it into a spawned
/// task and answer later.
#[derive(Debug, Clone)]
pub struct Responder {
    out: OutputWriter,
    session_id: String,
    token: String,
    session_first: bool,
}

impl Responder {
    pub fn new(
        out: OutputWriter,
        version: &ProtocolVersion,
        session_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            out,
            session_id: session_id.into(),
            token: token.into(),
            session_first: version.session_first(),
        }
    }

    /// Returns `None` for report events, which expect no reply.
    pub fn for_event(event: &Event, out: &OutputWriter) -> Option<Self> {
        let token = event.token()?;
        Some(Self::new(
            out.clone(),
            event.version(),
            event.session_id(),
            token,
        ))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Emits `<kind>|<A>|<B>|<payload>` with the id pair ordered for the
    /// agent's protocol version.
    pub fn respond(&self, kind: &str, payload: &str) -> Result<(), FilterError> {
        let (first, second) = if self.session_first {
            (&self.session_id, &self.token)
        } else {
            (&self.token, &self.session_id)
        };
        self.out.emit(format!("{kind}|{first}|{second}|{payload}"))
    }

    pub fn proceed(&self) -> Result<(), FilterError> {
        self.respond("filter-result", "proceed")
    }

    /// `code_and_text` is the full SMTP reply, e.g. `550 go away`.
    pub fn reject(&self, code_and_text: &str) -> Result<(), FilterError> {
        self.respond("filter-result", &format!("reject|{code_and_text}"))
    }

    pub fn hard_reject(&self, text: &str) -> Result<(), FilterError> {
        self.reject(&format!("550 {text}"))
    }

    pub fn soft_reject(&self, text: &str) -> Result<(), FilterError> {
        self.reject(&format!("451 {text}"))
    }

    pub fn greylist(&self, text: &str) -> Result<(), FilterError> {
        self.reject(&format!("421 {text}"))
    }

    pub fn disconnect(&self, code_and_text: &str) -> Result<(), FilterError> {
        self.respond("filter-result", &format!("disconnect|{code_and_text}"))
    }

    pub fn junk(&self) -> Result<(), FilterError> {
        self.respond("filter-result", "junk")
    }

    pub fn rewrite(&self, value: &str) -> Result<(), FilterError> {
        self.respond("filter-result", &format!("rewrite|{value}"))
    }

    /// Relays one body line, dot-stuffed.
    pub fn dataline(&self, line: &str) -> Result<(), FilterError> {
        self.respond("filter-dataline", &dot_stuff(line))
    }

    pub fn dataline_end(&self) -> Result<(), FilterError> {
        self.respond("filter-dataline", ".")
    }

    /// Writes `Header: value`, with every extra line of `value` emitted as
    /// its own folded continuation record.
    pub fn write_multiline_header(&self, header: &str, value: &str) -> Result<(), FilterError> {
        let mut lines = value.split('\n');
        let first = lines.next().unwrap_or_default();
        self.respond("filter-dataline", &format!("{header}: {first}"))?;
        for line in lines {
            self.respond("filter-dataline", line)?;
        }
        Ok(())
    }

    /// Relays a whole message body followed by the end-of-data marker.
    pub fn flush_message<S: AsRef<str>>(&self, lines: &[S]) -> Result<(), FilterError> {
        for line in lines {
            self.dataline(line.as_ref())?;
        }
        self.dataline_end()
    }
}
