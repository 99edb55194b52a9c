//! Protocol engine for mail filters that talk to an OpenSMTPD-style agent
//! over stdin/stdout.
//!
//! A filter is any type implementing [`Filter`]; it opts into verbs by
//! implementing their capability traits and exposing them through the
//! matching `as_*` accessor. [`run`] performs the configuration handshake,
//! registers the exposed verbs and dispatches records until the agent
//! closes the stream.
//!
//! ```no_run
//! use smtpd_filter::{Context, Event, Filter, MailFromFilter, Responder};
//!
//! struct NoBounces;
//!
//! impl MailFromFilter for NoBounces {
//!     fn mail_from(&mut self, _: &Context<'_>, event: &Event, respond: &Responder) -> anyhow::Result<()> {
//!         match event.params().first().map(String::as_str) {
//!             Some("") | Some("<>") => respond.hard_reject("bounces not accepted here")?,
//!             _ => respond.proceed()?,
//!         }
//!         Ok(())
//!     }
//! }
//!
//! impl Filter for NoBounces {
//!     fn as_mail_from(&mut self) -> Option<&mut dyn MailFromFilter> {
//!         Some(self)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     smtpd_filter::run(NoBounces).await?;
//!     Ok(())
//! }
//! ```

mod capability;
mod dispatch;
mod engine;
mod error;
mod event;
mod handshake;
pub mod logging;
mod output;
mod reader;
mod registry;
mod response;
mod session;
mod verbs;

pub use capability::*;
pub use dispatch::Dispatcher;
pub use engine::FilterRunner;
pub use error::FilterError;
pub use event::{Event, ProtocolVersion, MIN_ATOMS};
pub use handshake::{process_config, HandshakeConfig, CONFIG_READY};
pub use output::{OutputWriter, WriterTask};
pub use reader::LineReader;
pub use registry::{Registry, Route};
pub use response::{dot_stuff, dot_unstuff, Responder};
pub use session::{Session, SessionTracker, Tracked};
pub use verbs::{EventClass, FilterVerb, ReportVerb};

/// Runs `filter` against the agent on stdin/stdout.
pub async fn run<F: Filter>(filter: F) -> Result<(), FilterError> {
    FilterRunner::new(filter)
        .run(tokio::io::stdin(), tokio::io::stdout())
        .await?;
    Ok(())
}
