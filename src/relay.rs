use smtpd_filter::{
    Context, Event, Filter, LinkConnectReport, LinkDisconnectReport, MailFromFilter,
    MessageComplete, Responder, Session,
};

/// Session-tracking filter that relays every message back to the agent,
/// optionally refusing some senders and stamping extra headers.
pub struct RelayFilter {
    rejected_senders: Vec<String>,
    reject_message: String,
    headers: Vec<(String, String)>,
    messages: u64,
}

impl RelayFilter {
    pub fn new(
        rejected_senders: Vec<String>,
        reject_message: String,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            rejected_senders: rejected_senders
                .iter()
                .map(|s| normalize_address(s))
                .collect(),
            reject_message,
            headers,
            messages: 0,
        }
    }

    pub fn messages_relayed(&self) -> u64 {
        self.messages
    }

    fn is_rejected(&self, sender: &str) -> bool {
        let sender = normalize_address(sender);
        self.rejected_senders.iter().any(|s| *s == sender)
    }
}

fn normalize_address(address: &str) -> String {
    address
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .to_ascii_lowercase()
}

/// Parses `Name: value` from the command line. A literal `\n` in the value
/// starts a folded continuation line.
pub fn parse_header(arg: &str) -> Result<(String, String), String> {
    let (name, value) = arg
        .split_once(':')
        .ok_or_else(|| format!("header {arg:?} is not of the form 'Name: value'"))?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(format!("invalid header name in {arg:?}"));
    }
    Ok((name.to_string(), value.trim_start().replace("\\n", "\n")))
}

impl LinkConnectReport for RelayFilter {
    fn link_connect(&mut self, ctx: &Context<'_>, event: &Event) -> anyhow::Result<()> {
        if let Some(session) = ctx.session() {
            tracing::info!(
                session = event.session_id(),
                rdns = %session.reverse_dns,
                source = %session.source_address,
                "new connection"
            );
        }
        Ok(())
    }
}

impl LinkDisconnectReport for RelayFilter {
    fn link_disconnect(&mut self, _ctx: &Context<'_>, event: &Event) -> anyhow::Result<()> {
        tracing::info!(session = event.session_id(), "connection closed");
        Ok(())
    }
}

impl MailFromFilter for RelayFilter {
    fn mail_from(
        &mut self,
        _ctx: &Context<'_>,
        event: &Event,
        respond: &Responder,
    ) -> anyhow::Result<()> {
        let sender = event.params().join("|");
        if self.is_rejected(&sender) {
            tracing::info!(session = event.session_id(), %sender, "sender rejected");
            respond.hard_reject(&self.reject_message)?;
        } else {
            respond.proceed()?;
        }
        Ok(())
    }
}

impl MessageComplete for RelayFilter {
    fn message_complete(
        &mut self,
        _ctx: &Context<'_>,
        event: &Event,
        session: &Session,
        respond: &Responder,
    ) -> anyhow::Result<()> {
        for (name, value) in &self.headers {
            respond.write_multiline_header(name, value)?;
        }
        respond.flush_message(&session.body)?;
        self.messages += 1;

        tracing::info!(
            session = event.session_id(),
            message = session.transaction_id.as_deref().unwrap_or("-"),
            sender = session.envelope_sender.as_deref().unwrap_or("<>"),
            recipients = session.recipients.len(),
            lines = session.body.len(),
            "message relayed"
        );
        Ok(())
    }
}

impl Filter for RelayFilter {
    fn track_sessions(&self) -> bool {
        true
    }

    fn as_link_connect(&mut self) -> Option<&mut dyn LinkConnectReport> {
        Some(self)
    }

    fn as_link_disconnect(&mut self) -> Option<&mut dyn LinkDisconnectReport> {
        Some(self)
    }

    fn as_mail_from(&mut self) -> Option<&mut dyn MailFromFilter> {
        if self.rejected_senders.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    fn as_message_complete(&mut self) -> Option<&mut dyn MessageComplete> {
        Some(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use smtpd_filter::FilterRunner;

    async fn converse(filter: RelayFilter, input: &str) -> (RelayFilter, String) {
        let mut runner = FilterRunner::new(filter);
        let output = runner.run(input.as_bytes(), Vec::new()).await.unwrap();
        (runner.into_filter(), String::from_utf8(output).unwrap())
    }

    #[test]
    fn header_arguments() {
        k9::assert_equal!(
            parse_header("X-Filtered: yes"),
            Ok(("X-Filtered".to_string(), "yes".to_string()))
        );
        k9::assert_equal!(
            parse_header("X-Long: first\\n\tsecond"),
            Ok(("X-Long".to_string(), "first\n\tsecond".to_string()))
        );
        assert!(parse_header("no colon").is_err());
        assert!(parse_header("bad name: x").is_err());
    }

    #[tokio::test]
    async fn rejects_listed_senders_only() {
        let filter = RelayFilter::new(
            vec!["<Spammer@Example.com>".to_string()],
            "go away".to_string(),
            vec![],
        );
        let input = "config|ready\n\
            report|0.5|1|smtp-in|link-connect|S1|rdns|pass|1.2.3.4:5000|5.6.7.8:25\n\
            filter|0.5|1|smtp-in|mail-from|S1|T1|spammer@example.com\n\
            filter|0.5|1|smtp-in|mail-from|S1|T2|friend@example.com\n";
        let (_, output) = converse(filter, input).await;
        assert!(output.contains("register|filter|smtp-in|mail-from\n"));
        assert!(output.ends_with(
            "filter-result|T1|S1|reject|550 go away\n\
             filter-result|T2|S1|proceed\n"
        ));
    }

    #[tokio::test]
    async fn stamps_headers_and_relays() {
        let filter = RelayFilter::new(
            vec![],
            String::new(),
            vec![("X-Relay".to_string(), "one\n\ttwo".to_string())],
        );
        let input = "config|ready\n\
            report|0.5|1|smtp-in|link-connect|S1|rdns|pass|1.2.3.4:5000|5.6.7.8:25\n\
            report|0.5|1|smtp-in|tx-begin|S1|M1\n\
            filter|0.5|1|smtp-in|data-line|S1|T|Subject: hi\n\
            filter|0.5|1|smtp-in|data-line|S1|T|..dots\n\
            filter|0.5|1|smtp-in|data-line|S1|T|.\n";
        let (filter, output) = converse(filter, input).await;
        assert!(!output.contains("mail-from"));
        assert!(output.ends_with(
            "register|ready\n\
             filter-dataline|T|S1|X-Relay: one\n\
             filter-dataline|T|S1|\ttwo\n\
             filter-dataline|T|S1|Subject: hi\n\
             filter-dataline|T|S1|..dots\n\
             filter-dataline|T|S1|.\n"
        ));
        k9::assert_equal!(filter.messages_relayed(), 1);
    }
}
