use crate::error::FilterError;
use crate::event::Event;
use crate::response::dot_unstuff;
use crate::verbs::{FilterVerb, ReportVerb};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

/// What the agent has told us about one SMTP session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub id: String,

    pub reverse_dns: String,
    pub source_address: String,
    pub source_ip: Option<IpAddr>,
    pub source_port: Option<u16>,
    pub helo_name: Option<String>,
    pub mta_name: Option<String>,
    pub authenticated_user: Option<String>,

    pub transaction_id: Option<String>,
    pub envelope_sender: Option<String>,
    pub recipients: Vec<String>,
    pub body: Vec<String>,
}

impl Session {
    pub fn new(id: &str, reverse_dns: &str, source_address: &str) -> Self {
        let source = parse_source(source_address);
        Self {
            id: id.to_string(),
            reverse_dns: reverse_dns.to_string(),
            source_address: source_address.to_string(),
            source_ip: source.map(|addr| addr.ip()),
            source_port: source.map(|addr| addr.port()),
            ..Default::default()
        }
    }

    /// Drops every transaction-scoped field in one go.
    pub fn reset(&mut self) {
        self.transaction_id = None;
        self.envelope_sender = None;
        self.recipients.clear();
        self.body.clear();
    }
}

/// `unix:` sockets carry no address to parse.
fn parse_source(source: &str) -> Option<SocketAddr> {
    if source.starts_with("unix:") {
        return None;
    }
    source.parse().ok()
}

/// Result of feeding a record to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracked {
    Updated,
    /// The `.` terminating a message body was received.
    MessageComplete,
}

/// Keeps one [`Session`] per session id, driven by the agent's reports and
/// by `data-line` requests.
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: HashMap<String, Session>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    pub fn remove(&mut self, session_id: &str) -> Option<Session> {
        self.sessions.remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Report verbs the tracker needs to see.
    pub fn tracks_report(verb: ReportVerb) -> bool {
        matches!(
            verb,
            ReportVerb::LinkConnect
                | ReportVerb::LinkDisconnect
                | ReportVerb::LinkGreeting
                | ReportVerb::LinkIdentify
                | ReportVerb::LinkAuth
                | ReportVerb::TxReset
                | ReportVerb::TxBegin
                | ReportVerb::TxMail
                | ReportVerb::TxRcpt
        )
    }

    /// Filter verbs the tracker registers by itself. `commit` is only
    /// checked when the filter registers it, since it needs an answer the
    /// tracker cannot give.
    pub fn tracks_filter(verb: FilterVerb) -> bool {
        verb == FilterVerb::DataLine
    }

    pub fn on_report(&mut self, verb: ReportVerb, event: &Event) -> Result<(), FilterError> {
        let id = event.session_id();
        let params = event.raw_params();
        match verb {
            ReportVerb::LinkConnect => self.link_connect(id, params),
            ReportVerb::LinkDisconnect => self.link_disconnect(id, params),
            ReportVerb::LinkGreeting => self.link_greeting(id, params),
            ReportVerb::LinkIdentify => self.link_identify(id, params),
            ReportVerb::LinkAuth => self.link_auth(id, params),
            ReportVerb::TxReset => self.tx_reset(id, params),
            ReportVerb::TxBegin => self.tx_begin(id, params),
            ReportVerb::TxMail => self.tx_mail(id, params),
            ReportVerb::TxRcpt => self.tx_rcpt(id, params),
            _ => Ok(()),
        }
    }

    pub fn on_filter(&mut self, verb: FilterVerb, event: &Event) -> Result<Tracked, FilterError> {
        let id = event.session_id();
        let params = event.raw_params();
        match verb {
            FilterVerb::DataLine => self.data_line(id, params),
            FilterVerb::Commit => self.commit(id, params).map(|()| Tracked::Updated),
            _ => Ok(Tracked::Updated),
        }
    }

    pub fn link_connect(&mut self, id: &str, params: &[String]) -> Result<(), FilterError> {
        let [rdns, _, source, _] = exact::<4>("link-connect", params)?;
        tracing::debug!(session = id, rdns = %rdns, source = %source, "session opened");
        self.insert(Session::new(id, rdns, source));
        Ok(())
    }

    pub fn link_disconnect(&mut self, id: &str, params: &[String]) -> Result<(), FilterError> {
        exact::<0>("link-disconnect", params)?;
        self.remove(id).ok_or_else(|| unknown(id))?;
        tracing::debug!(session = id, "session closed");
        Ok(())
    }

    pub fn link_greeting(&mut self, id: &str, params: &[String]) -> Result<(), FilterError> {
        let [mta_name] = exact::<1>("link-greeting", params)?;
        self.session_mut(id)?.mta_name = Some(mta_name.clone());
        Ok(())
    }

    pub fn link_identify(&mut self, id: &str, params: &[String]) -> Result<(), FilterError> {
        let [_, helo_name] = exact::<2>("link-identify", params)?;
        self.session_mut(id)?.helo_name = Some(helo_name.clone());
        Ok(())
    }

    pub fn link_auth(&mut self, id: &str, params: &[String]) -> Result<(), FilterError> {
        let [user, result] = exact::<2>("link-auth", params)?;
        let session = self.session_mut(id)?;
        if result == "pass" {
            session.authenticated_user = Some(user.clone());
        }
        Ok(())
    }

    pub fn tx_reset(&mut self, id: &str, params: &[String]) -> Result<(), FilterError> {
        exact::<1>("tx-reset", params)?;
        self.session_mut(id)?.reset();
        Ok(())
    }

    pub fn tx_begin(&mut self, id: &str, params: &[String]) -> Result<(), FilterError> {
        let [transaction_id] = exact::<1>("tx-begin", params)?;
        self.session_mut(id)?.transaction_id = Some(transaction_id.clone());
        Ok(())
    }

    pub fn tx_mail(&mut self, id: &str, params: &[String]) -> Result<(), FilterError> {
        let [_, sender, result] = exact::<3>("tx-mail", params)?;
        let session = self.session_mut(id)?;
        if result == "ok" {
            session.envelope_sender = Some(sender.clone());
        }
        Ok(())
    }

    pub fn tx_rcpt(&mut self, id: &str, params: &[String]) -> Result<(), FilterError> {
        let [_, recipient, result] = exact::<3>("tx-rcpt", params)?;
        let session = self.session_mut(id)?;
        if result == "ok" {
            session.recipients.push(recipient.clone());
        }
        Ok(())
    }

    /// `params` is the token followed by the pieces of the line; the agent
    /// split the line on `|`, and the pieces are concatenated back as-is.
    pub fn data_line(&mut self, id: &str, params: &[String]) -> Result<Tracked, FilterError> {
        let parts = match params {
            [_token, parts @ ..] if !parts.is_empty() => parts,
            _ => {
                return Err(FilterError::ParamCount {
                    verb: "data-line",
                    expected: "at least 2".to_string(),
                    got: params.len(),
                })
            }
        };
        let line = parts.concat();
        let session = self.session_mut(id)?;
        if line == "." {
            return Ok(Tracked::MessageComplete);
        }
        session.body.push(dot_unstuff(&line).to_string());
        Ok(Tracked::Updated)
    }

    pub fn commit(&mut self, id: &str, params: &[String]) -> Result<(), FilterError> {
        exact::<2>("commit", params)?;
        self.session_mut(id)?;
        Ok(())
    }

    fn session_mut(&mut self, id: &str) -> Result<&mut Session, FilterError> {
        self.sessions.get_mut(id).ok_or_else(|| unknown(id))
    }
}

fn unknown(id: &str) -> FilterError {
    FilterError::UnknownSession {
        session_id: id.to_string(),
    }
}

fn exact<'a, const N: usize>(
    verb: &'static str,
    params: &'a [String],
) -> Result<&'a [String; N], FilterError> {
    params.try_into().map_err(|_| FilterError::ParamCount {
        verb,
        expected: N.to_string(),
        got: params.len(),
    })
}
