use crate::error::FilterError;
use crate::logging::display_record;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};

/// Pulls newline-terminated records off the agent's stream.
pub struct LineReader<R> {
    lines: Lines<BufReader<R>>,
    raw_logging: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            lines: BufReader::new(input).lines(),
            raw_logging: false,
        }
    }

    /// Log records verbatim instead of escaping control characters.
    pub fn raw_logging(mut self, raw: bool) -> Self {
        self.raw_logging = raw;
        self
    }

    /// `Ok(None)` means the agent closed the stream.
    pub async fn next_line(&mut self) -> Result<Option<String>, FilterError> {
        match self.lines.next_line().await {
            Ok(Some(line)) => {
                tracing::trace!(record = %display_record(&line, self.raw_logging), "received");
                Ok(Some(line))
            }
            Ok(None) => Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::InvalidData => {
                Err(FilterError::framing("record is not UTF-8", ""))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn splits_lines_and_reports_eof() {
        let mut reader = LineReader::new(&b"config|ready\r\nreport|0.5|x\n"[..]);
        k9::assert_equal!(
            reader.next_line().await.unwrap(),
            Some("config|ready".to_string())
        );
        k9::assert_equal!(
            reader.next_line().await.unwrap(),
            Some("report|0.5|x".to_string())
        );
        k9::assert_equal!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_framing_error() {
        let mut reader = LineReader::new(&b"report|\xff\xfe\n"[..]);
        assert!(matches!(
            reader.next_line().await,
            Err(FilterError::Framing { .. })
        ));
    }
}
