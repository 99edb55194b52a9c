use crate::capability::{exposes_filter, exposes_report, Filter};
use crate::error::FilterError;
use crate::output::OutputWriter;
use crate::session::SessionTracker;
use crate::verbs::{EventClass, FilterVerb, ReportVerb};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

/// How one registered verb is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Feed the record to the session tracker first.
    pub track: bool,
    /// The filter implements the verb's capability trait.
    pub handler: bool,
}

/// The verbs advertised to the agent, one table per event class.
///
/// Built once before registration and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    reports: BTreeMap<ReportVerb, Route>,
    filters: BTreeMap<FilterVerb, Route>,
}

impl Registry {
    pub fn build<F: Filter + ?Sized>(filter: &mut F) -> Self {
        let tracking = filter.track_sessions();
        let mut registry = Self::default();

        for verb in ReportVerb::iter() {
            let route = Route {
                track: tracking && SessionTracker::tracks_report(verb),
                handler: exposes_report(filter, verb),
            };
            if route.track || route.handler {
                registry.reports.insert(verb, route);
            }
        }

        for verb in FilterVerb::iter() {
            let handler = exposes_filter(filter, verb);
            let route = Route {
                track: tracking
                    && (SessionTracker::tracks_filter(verb)
                        || (verb == FilterVerb::Commit && handler)),
                handler,
            };
            if route.track || route.handler {
                registry.filters.insert(verb, route);
            }
        }

        registry
    }

    pub fn report(&self, verb: ReportVerb) -> Option<Route> {
        self.reports.get(&verb).copied()
    }

    pub fn filter(&self, verb: FilterVerb) -> Option<Route> {
        self.filters.get(&verb).copied()
    }

    /// The registration records, `register|ready` last.
    pub fn records(&self) -> Vec<String> {
        let reports = self
            .reports
            .keys()
            .map(|verb| (EventClass::Report, verb.to_string()));
        let filters = self
            .filters
            .keys()
            .map(|verb| (EventClass::Filter, verb.to_string()));
        reports
            .chain(filters)
            .map(|(class, verb)| format!("register|{class}|smtp-in|{verb}"))
            .chain(std::iter::once("register|ready".to_string()))
            .collect()
    }

    pub fn register(&self, out: &OutputWriter) -> Result<(), FilterError> {
        for record in self.records() {
            tracing::debug!(%record, "registering");
            out.emit(record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::capability::{
        CommitFilter, Context, LinkTlsReport, MailFromFilter, TimeoutReport,
    };
    use crate::event::Event;
    use crate::response::Responder;

    #[derive(Default)]
    struct Partial {
        track: bool,
    }

    impl LinkTlsReport for Partial {
        fn link_tls(&mut self, _ctx: &Context<'_>, _event: &Event) -> anyhow::Result<()> {
            Ok(())
        }
    }

    impl TimeoutReport for Partial {
        fn timeout(&mut self, _ctx: &Context<'_>, _event: &Event) -> anyhow::Result<()> {
            Ok(())
        }
    }

    impl MailFromFilter for Partial {
        fn mail_from(
            &mut self,
            _ctx: &Context<'_>,
            _event: &Event,
            respond: &Responder,
        ) -> anyhow::Result<()> {
            Ok(respond.proceed()?)
        }
    }

    impl CommitFilter for Partial {
        fn commit(
            &mut self,
            _ctx: &Context<'_>,
            _event: &Event,
            respond: &Responder,
        ) -> anyhow::Result<()> {
            Ok(respond.proceed()?)
        }
    }

    impl Filter for Partial {
        fn track_sessions(&self) -> bool {
            self.track
        }
        fn as_link_tls(&mut self) -> Option<&mut dyn LinkTlsReport> {
            Some(self)
        }
        fn as_timeout(&mut self) -> Option<&mut dyn TimeoutReport> {
            Some(self)
        }
        fn as_mail_from(&mut self) -> Option<&mut dyn MailFromFilter> {
            Some(self)
        }
        fn as_commit(&mut self) -> Option<&mut dyn CommitFilter> {
            Some(self)
        }
    }

    struct Nothing;
    impl Filter for Nothing {}

    #[test]
    fn advertises_exactly_what_is_exposed() {
        let registry = Registry::build(&mut Partial::default());
        k9::assert_equal!(
            registry.records(),
            vec![
                "register|report|smtp-in|link-tls".to_string(),
                "register|report|smtp-in|timeout".to_string(),
                "register|filter|smtp-in|mail-from".to_string(),
                "register|filter|smtp-in|commit".to_string(),
                "register|ready".to_string(),
            ]
        );
        k9::assert_equal!(registry.report(ReportVerb::LinkConnect), None);
        k9::assert_equal!(
            registry.filter(FilterVerb::Commit),
            Some(Route {
                track: false,
                handler: true
            })
        );
    }

    #[test]
    fn empty_filter_only_signals_ready() {
        let registry = Registry::build(&mut Nothing);
        k9::assert_equal!(registry.records(), vec!["register|ready".to_string()]);
    }

    #[test]
    fn tracking_adds_bookkeeping_verbs() {
        let registry = Registry::build(&mut Partial { track: true });
        let records = registry.records();
        for verb in [
            "link-connect",
            "link-disconnect",
            "link-greeting",
            "link-identify",
            "link-auth",
            "tx-reset",
            "tx-begin",
            "tx-mail",
            "tx-rcpt",
        ] {
            assert!(records.contains(&format!("register|report|smtp-in|{verb}")));
        }
        assert!(records.contains(&"register|filter|smtp-in|data-line".to_string()));
        k9::assert_equal!(
            registry.filter(FilterVerb::DataLine),
            Some(Route {
                track: true,
                handler: false
            })
        );
        k9::assert_equal!(
            registry.filter(FilterVerb::Commit),
            Some(Route {
                track: true,
                handler: true
            })
        );

        // every verb at most once
        let mut deduped = records.clone();
        deduped.sort();
        deduped.dedup();
        k9::assert_equal!(deduped.len(), records.len());
    }
}
