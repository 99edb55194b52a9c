use crate::capability::Filter;
use crate::error::FilterError;
use crate::reader::LineReader;
use std::collections::BTreeMap;
use tokio::io::AsyncRead;

/// The line that ends the configuration phase.
pub const CONFIG_READY: &str = "config|ready";

/// Key/value settings announced by the agent before registration, e.g.
/// `config|smtpd-version|7.4.0`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeConfig {
    entries: BTreeMap<String, String>,
}

impl HandshakeConfig {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn smtpd_version(&self) -> Option<&str> {
        self.get("smtpd-version")
    }

    pub fn protocol(&self) -> Option<&str> {
        self.get("protocol")
    }

    pub fn subsystem(&self) -> Option<&str> {
        self.get("subsystem")
    }

    pub fn admd(&self) -> Option<&str> {
        self.get("admd")
    }

    fn record(&mut self, fields: &[&str]) {
        if let ["config", key, value @ ..] = fields {
            if !value.is_empty() {
                self.entries.insert(key.to_string(), value.join("|"));
            }
        }
    }
}

/// Consumes records up to and including `config|ready`, forwarding each one
/// to the filter's [`ConfigReceiver`](crate::ConfigReceiver) if it has one.
///
/// Returns `Ok(None)` when the agent closes the stream first, which is a
/// normal shutdown.
pub async fn process_config<R, F>(
    reader: &mut LineReader<R>,
    filter: &mut F,
) -> Result<Option<HandshakeConfig>, FilterError>
where
    R: AsyncRead + Unpin,
    F: Filter + ?Sized,
{
    let mut config = HandshakeConfig::default();
    loop {
        let Some(line) = reader.next_line().await? else {
            return Ok(None);
        };

        let fields: Vec<&str> = line.split('|').collect();
        if let Some(receiver) = filter.as_config_receiver() {
            receiver.config(&fields)?;
        }

        if line == CONFIG_READY {
            tracing::info!(
                smtpd_version = config.smtpd_version().unwrap_or("unknown"),
                "configuration handshake complete"
            );
            return Ok(Some(config));
        }
        config.record(&fields);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::capability::ConfigReceiver;

    #[derive(Default)]
    struct Collect {
        seen: Vec<Vec<String>>,
    }

    impl ConfigReceiver for Collect {
        fn config(&mut self, fields: &[&str]) -> anyhow::Result<()> {
            self.seen.push(fields.iter().map(|f| f.to_string()).collect());
            Ok(())
        }
    }

    impl Filter for Collect {
        fn as_config_receiver(&mut self) -> Option<&mut dyn ConfigReceiver> {
            Some(self)
        }
    }

    #[tokio::test]
    async fn collects_until_ready() {
        let input = b"config|smtpd-version|7.4.0\nconfig|admd|mx|example\nconfig|ready\nreport|after\n";
        let mut reader = LineReader::new(&input[..]);
        let mut filter = Collect::default();

        let config = process_config(&mut reader, &mut filter)
            .await
            .unwrap()
            .unwrap();
        k9::assert_equal!(config.smtpd_version(), Some("7.4.0"));
        k9::assert_equal!(config.admd(), Some("mx|example"));
        k9::assert_equal!(config.protocol(), None);
        k9::assert_equal!(filter.seen.len(), 3);
        k9::assert_equal!(&filter.seen[2], &vec!["config".to_string(), "ready".to_string()]);

        // the record after the handshake is left for the dispatcher
        k9::assert_equal!(
            reader.next_line().await.unwrap(),
            Some("report|after".to_string())
        );
    }

    #[tokio::test]
    async fn early_close_is_clean() {
        let mut reader = LineReader::new(&b"config|smtpd-version|7.4.0\n"[..]);
        let mut filter = Collect::default();
        k9::assert_equal!(process_config(&mut reader, &mut filter).await.unwrap(), None);
    }
}
