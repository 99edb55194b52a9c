mod relay;

use anyhow::Result;
use smtpd_filter::logging::LoggingConfig;
use smtpd_filter::FilterRunner;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "smtpd-filter",
    about = "Relay filter for OpenSMTPD-style agents, speaking the filter protocol on stdin/stdout",
    author = "2026, Philippe TEMESI <https://www.tems.be>",
    version = "0.1.0"
)]
pub struct Opt {
    /// Verbose mode - log sessions and registration details
    #[structopt(short = "v", long = "verbose")]
    pub verbose: bool,

    /// Log received records without escaping control characters
    #[structopt(short = "r", long = "raw")]
    pub raw_display: bool,

    /// Log file path (default: stderr)
    #[structopt(long = "logs", parse(from_os_str))]
    pub log_file: Option<PathBuf>,

    /// Envelope sender to refuse (can be specified multiple times)
    #[structopt(long = "reject-sender", number_of_values = 1)]
    pub reject_senders: Vec<String>,

    /// SMTP text sent with refused senders
    #[structopt(long = "reject-message", default_value = "Sender not accepted")]
    pub reject_message: String,

    /// Header to add to every relayed message, as 'Name: value'
    /// (can be specified multiple times)
    #[structopt(long = "header", number_of_values = 1, parse(try_from_str = relay::parse_header))]
    pub headers: Vec<(String, String)>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::from_args();

    LoggingConfig {
        verbose: opt.verbose,
        log_file: opt.log_file.clone(),
    }
    .init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        rejected_senders = opt.reject_senders.len(),
        headers = opt.headers.len(),
        "starting filter"
    );

    let filter = relay::RelayFilter::new(opt.reject_senders, opt.reject_message, opt.headers);
    let mut runner = FilterRunner::new(filter).raw_logging(opt.raw_display);
    runner
        .run(tokio::io::stdin(), tokio::io::stdout())
        .await?;

    tracing::info!(
        messages = runner.filter().messages_relayed(),
        "filter finished"
    );
    Ok(())
}
