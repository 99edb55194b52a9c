//! Capability traits.
//!
//! Every verb the agent can send has its own single-method trait. A filter
//! opts into a verb by implementing the trait and returning `Some(self)` from
//! the matching `as_*` accessor on [`Filter`]; only verbs answered that way
//! are registered with the agent.

use crate::event::Event;
use crate::handshake::HandshakeConfig;
use crate::output::OutputWriter;
use crate::response::Responder;
use crate::session::Session;
use crate::verbs::{FilterVerb, ReportVerb};

/// What a handler gets to see besides the event itself.
pub struct Context<'a> {
    config: &'a HandshakeConfig,
    session: Option<&'a Session>,
    output: &'a OutputWriter,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        config: &'a HandshakeConfig,
        session: Option<&'a Session>,
        output: &'a OutputWriter,
    ) -> Self {
        Self {
            config,
            session,
            output,
        }
    }

    /// Settings the agent sent during the handshake.
    pub fn config(&self) -> &'a HandshakeConfig {
        self.config
    }

    /// The event's session, when the filter tracks sessions.
    pub fn session(&self) -> Option<&'a Session> {
        self.session
    }

    /// Shared output queue, for work that outlives the handler.
    pub fn output(&self) -> &'a OutputWriter {
        self.output
    }
}

/// Receives each handshake record, split on `|`, including the final
/// `config|ready`.
pub trait ConfigReceiver {
    fn config(&mut self, fields: &[&str]) -> anyhow::Result<()>;
}

/// Called by the session tracker when a message body has been fully
/// received.
///
/// The implementation owns the reply: it must relay the message (for
/// instance with [`Responder::flush_message`]) or the message is lost.
pub trait MessageComplete {
    fn message_complete(
        &mut self,
        ctx: &Context<'_>,
        event: &Event,
        session: &Session,
        respond: &Responder,
    ) -> anyhow::Result<()>;
}

macro_rules! capabilities {
    (
        report { $($rverb:ident => $rtrait:ident :: $rmethod:ident, $raccessor:ident;)* }
        filter { $($fverb:ident => $ftrait:ident :: $fmethod:ident, $faccessor:ident;)* }
    ) => {
        $(
            pub trait $rtrait {
                fn $rmethod(&mut self, ctx: &Context<'_>, event: &Event) -> anyhow::Result<()>;
            }
        )*

        $(
            pub trait $ftrait {
                fn $fmethod(
                    &mut self,
                    ctx: &Context<'_>,
                    event: &Event,
                    respond: &Responder,
                ) -> anyhow::Result<()>;
            }
        )*

        /// The filter implementation driven by the engine.
        ///
        /// All methods have defaults: a filter that overrides nothing
        /// registers nothing.
        pub trait Filter {
            /// Let the engine maintain a [`Session`] per session id and hand
            /// it out through [`Context::session`].
            fn track_sessions(&self) -> bool {
                false
            }

            fn as_config_receiver(&mut self) -> Option<&mut dyn ConfigReceiver> {
                None
            }

            fn as_message_complete(&mut self) -> Option<&mut dyn MessageComplete> {
                None
            }

            $(
                fn $raccessor(&mut self) -> Option<&mut dyn $rtrait> {
                    None
                }
            )*

            $(
                fn $faccessor(&mut self) -> Option<&mut dyn $ftrait> {
                    None
                }
            )*
        }

        pub(crate) fn exposes_report<F: Filter + ?Sized>(filter: &mut F, verb: ReportVerb) -> bool {
            match verb {
                $(ReportVerb::$rverb => filter.$raccessor().is_some(),)*
            }
        }

        pub(crate) fn exposes_filter<F: Filter + ?Sized>(filter: &mut F, verb: FilterVerb) -> bool {
            match verb {
                $(FilterVerb::$fverb => filter.$faccessor().is_some(),)*
            }
        }

        /// `None` when the filter does not handle `verb`.
        pub(crate) fn call_report<F: Filter + ?Sized>(
            filter: &mut F,
            verb: ReportVerb,
            ctx: &Context<'_>,
            event: &Event,
        ) -> Option<anyhow::Result<()>> {
            match verb {
                $(ReportVerb::$rverb => filter.$raccessor().map(|h| h.$rmethod(ctx, event)),)*
            }
        }

        /// `None` when the filter does not handle `verb`.
        pub(crate) fn call_filter<F: Filter + ?Sized>(
            filter: &mut F,
            verb: FilterVerb,
            ctx: &Context<'_>,
            event: &Event,
            respond: &Responder,
        ) -> Option<anyhow::Result<()>> {
            match verb {
                $(FilterVerb::$fverb => filter.$faccessor().map(|h| h.$fmethod(ctx, event, respond)),)*
            }
        }
    };
}

capabilities! {
    report {
        LinkConnect => LinkConnectReport::link_connect, as_link_connect;
        LinkDisconnect => LinkDisconnectReport::link_disconnect, as_link_disconnect;
        LinkGreeting => LinkGreetingReport::link_greeting, as_link_greeting;
        LinkIdentify => LinkIdentifyReport::link_identify, as_link_identify;
        LinkTls => LinkTlsReport::link_tls, as_link_tls;
        LinkAuth => LinkAuthReport::link_auth, as_link_auth;
        TxReset => TxResetReport::tx_reset, as_tx_reset;
        TxBegin => TxBeginReport::tx_begin, as_tx_begin;
        TxMail => TxMailReport::tx_mail, as_tx_mail;
        TxRcpt => TxRcptReport::tx_rcpt, as_tx_rcpt;
        TxEnvelope => TxEnvelopeReport::tx_envelope, as_tx_envelope;
        TxData => TxDataReport::tx_data, as_tx_data;
        TxCommit => TxCommitReport::tx_commit, as_tx_commit;
        TxRollback => TxRollbackReport::tx_rollback, as_tx_rollback;
        ProtocolClient => ProtocolClientReport::protocol_client, as_protocol_client;
        ProtocolServer => ProtocolServerReport::protocol_server, as_protocol_server;
        FilterReport => FilterReportReport::filter_report, as_filter_report;
        FilterResponse => FilterResponseReport::filter_response, as_filter_response;
        Timeout => TimeoutReport::timeout, as_timeout;
    }
    filter {
        Connect => ConnectFilter::connect, as_connect;
        Helo => HeloFilter::helo, as_helo;
        Ehlo => EhloFilter::ehlo, as_ehlo;
        StartTls => StartTlsFilter::starttls, as_starttls;
        Auth => AuthFilter::auth, as_auth;
        MailFrom => MailFromFilter::mail_from, as_mail_from;
        RcptTo => RcptToFilter::rcpt_to, as_rcpt_to;
        Data => DataFilter::data, as_data;
        DataLine => DataLineFilter::data_line, as_data_line;
        Rset => RsetFilter::rset, as_rset;
        Quit => QuitFilter::quit, as_quit;
        Noop => NoopFilter::noop, as_noop;
        Help => HelpFilter::help, as_help;
        Wiz => WizFilter::wiz, as_wiz;
        Commit => CommitFilter::commit, as_commit;
    }
}
