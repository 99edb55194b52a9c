use crate::error::FilterError;
use crate::verbs::EventClass;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Records below this many atoms cannot be routed.
pub const MIN_ATOMS: usize = 6;

const CLASS: usize = 0;
const VERSION: usize = 1;
const TIMESTAMP: usize = 2;
const SUBSYSTEM: usize = 3;
const VERB: usize = 4;
const SESSION_ID: usize = 5;
const TOKEN: usize = 6;

/// The protocol version announced in atom 1 of every record.
///
/// The agent switched the order of session id and token in its replies
/// after version 0.5; `session_first` tells the encoder which layout the
/// agent expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolVersion(String);

/// Last version whose replies carry the token before the session id.
const TOKEN_FIRST_UNTIL: &str = "0.5";

impl ProtocolVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares dotted versions component by component, numerically.
    /// Versions that do not parse as dotted integers fall back to a plain
    /// string comparison.
    pub fn compare(&self, other: &str) -> Ordering {
        match (numeric_parts(&self.0), numeric_parts(other)) {
            (Some(mine), Some(theirs)) => mine.cmp(&theirs),
            _ => self.0.as_str().cmp(other),
        }
    }

    pub fn session_first(&self) -> bool {
        self.compare(TOKEN_FIRST_UNTIL) == Ordering::Greater
    }
}

fn numeric_parts(version: &str) -> Option<Vec<u32>> {
    let mut parts = version
        .split('.')
        .map(|p| p.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    while parts.len() > 1 && parts.last() == Some(&0) {
        parts.pop();
    }
    Some(parts)
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One dispatched record, split on `|`.
///
/// The atoms are kept verbatim; accessors hand out views into them.
#[derive(Debug, Clone)]
pub struct Event {
    class: EventClass,
    version: ProtocolVersion,
    atoms: Vec<String>,
}

impl Event {
    pub fn parse(line: &str) -> Result<Self, FilterError> {
        let atoms: Vec<String> = line.split('|').map(str::to_string).collect();
        if atoms.len() < MIN_ATOMS {
            return Err(FilterError::framing("too few atoms", line));
        }

        let class = EventClass::from_str(&atoms[CLASS])
            .map_err(|_| FilterError::framing("unknown record class", line))?;
        if class == EventClass::Filter && atoms.len() <= TOKEN {
            return Err(FilterError::framing("filter record without token", line));
        }

        let version = ProtocolVersion::new(atoms[VERSION].clone());
        Ok(Self {
            class,
            version,
            atoms,
        })
    }

    pub fn class(&self) -> EventClass {
        self.class
    }

    pub fn version(&self) -> &ProtocolVersion {
        &self.version
    }

    pub fn timestamp(&self) -> &str {
        &self.atoms[TIMESTAMP]
    }

    pub fn subsystem(&self) -> &str {
        &self.atoms[SUBSYSTEM]
    }

    pub fn verb(&self) -> &str {
        &self.atoms[VERB]
    }

    pub fn session_id(&self) -> &str {
        &self.atoms[SESSION_ID]
    }

    /// Correlation token of a filter request; reports carry none.
    pub fn token(&self) -> Option<&str> {
        match self.class {
            EventClass::Filter => self.atoms.get(TOKEN).map(String::as_str),
            EventClass::Report => None,
        }
    }

    /// Event parameters: after the session id for reports, after the
    /// token for filter requests.
    pub fn params(&self) -> &[String] {
        let start = match self.class {
            EventClass::Report => TOKEN,
            EventClass::Filter => TOKEN + 1,
        };
        self.atoms.get(start..).unwrap_or(&[])
    }

    /// Every atom after the session id, token included for filter requests.
    pub fn raw_params(&self) -> &[String] {
        self.atoms.get(TOKEN..).unwrap_or(&[])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_report() {
        let event =
            Event::parse("report|0.5|1576146008.006099|smtp-in|link-connect|7641df9771b4ed00|mail.example|pass|1.2.3.4:5000|5.6.7.8:25")
                .unwrap();
        k9::assert_equal!(event.class(), EventClass::Report);
        k9::assert_equal!(event.version().as_str(), "0.5");
        k9::assert_equal!(event.timestamp(), "1576146008.006099");
        k9::assert_equal!(event.subsystem(), "smtp-in");
        k9::assert_equal!(event.verb(), "link-connect");
        k9::assert_equal!(event.session_id(), "7641df9771b4ed00");
        k9::assert_equal!(event.token(), None);
        k9::assert_equal!(event.params().len(), 4);
        k9::assert_equal!(event.params(), event.raw_params());
    }

    #[test]
    fn parse_filter() {
        let event = Event::parse("filter|0.5|0|smtp-in|data-line|S1|TOK|a|b").unwrap();
        k9::assert_equal!(event.class(), EventClass::Filter);
        k9::assert_equal!(event.token(), Some("TOK"));
        k9::assert_equal!(event.params(), &["a".to_string(), "b".to_string()][..]);
        k9::assert_equal!(event.raw_params().len(), 3);
    }

    #[test]
    fn framing_violations() {
        for line in [
            "report|0.5|0|smtp-in|link-disconnect",
            "",
            "bogus|0.5|0|smtp-in|link-disconnect|S1",
            "filter|0.5|0|smtp-in|helo|S1",
        ] {
            assert!(
                matches!(Event::parse(line), Err(FilterError::Framing { .. })),
                "{line:?} should be rejected"
            );
        }
        assert!(Event::parse("report|0.5|0|smtp-in|link-disconnect|S1").is_ok());
    }

    #[test]
    fn field_order_threshold() {
        for (version, session_first) in [
            ("0.1", false),
            ("0.4", false),
            ("0.5", false),
            ("0.5.0", false),
            ("0.6", true),
            ("0.7", true),
            ("0.10", true),
            ("1.0", true),
        ] {
            k9::assert_equal!(
                ProtocolVersion::new(version).session_first(),
                session_first,
                "version {version}"
            );
        }
    }
}
