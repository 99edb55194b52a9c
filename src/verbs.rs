use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Which side of the protocol a record belongs to.
///
/// Reports are one-way notifications, filters are decision points that
/// expect a `filter-result` or `filter-dataline` answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum EventClass {
    Report,
    Filter,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum ReportVerb {
    LinkConnect,
    LinkDisconnect,
    LinkGreeting,
    LinkIdentify,
    LinkTls,
    LinkAuth,
    TxReset,
    TxBegin,
    TxMail,
    TxRcpt,
    TxEnvelope,
    TxData,
    TxCommit,
    TxRollback,
    ProtocolClient,
    ProtocolServer,
    FilterReport,
    FilterResponse,
    Timeout,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum FilterVerb {
    Connect,
    Helo,
    Ehlo,
    #[strum(serialize = "starttls")]
    StartTls,
    Auth,
    MailFrom,
    RcptTo,
    Data,
    DataLine,
    Rset,
    Quit,
    Noop,
    Help,
    Wiz,
    Commit,
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn wire_names() {
        for (verb, name) in [
            (ReportVerb::LinkConnect, "link-connect"),
            (ReportVerb::LinkTls, "link-tls"),
            (ReportVerb::TxRcpt, "tx-rcpt"),
            (ReportVerb::FilterResponse, "filter-response"),
            (ReportVerb::Timeout, "timeout"),
        ] {
            k9::assert_equal!(verb.to_string(), name.to_string());
            k9::assert_equal!(ReportVerb::from_str(name).ok(), Some(verb));
        }

        for (verb, name) in [
            (FilterVerb::StartTls, "starttls"),
            (FilterVerb::MailFrom, "mail-from"),
            (FilterVerb::RcptTo, "rcpt-to"),
            (FilterVerb::DataLine, "data-line"),
            (FilterVerb::Wiz, "wiz"),
        ] {
            k9::assert_equal!(verb.to_string(), name.to_string());
            k9::assert_equal!(FilterVerb::from_str(name).ok(), Some(verb));
        }
    }

    #[test]
    fn verb_sets() {
        k9::assert_equal!(ReportVerb::iter().count(), 19);
        k9::assert_equal!(FilterVerb::iter().count(), 15);
        assert!(ReportVerb::from_str("data-line").is_err());
        k9::assert_equal!(EventClass::Filter.to_string(), "filter".to_string());
    }
}
