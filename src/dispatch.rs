use crate::capability::{call_filter, call_report, Context, Filter};
use crate::error::FilterError;
use crate::event::Event;
use crate::handshake::HandshakeConfig;
use crate::output::OutputWriter;
use crate::registry::{Registry, Route};
use crate::response::Responder;
use crate::session::{Session, SessionTracker, Tracked};
use crate::verbs::{EventClass, FilterVerb, ReportVerb};
use std::str::FromStr;

/// Routes post-handshake records to the session tracker and the filter.
pub struct Dispatcher {
    registry: Registry,
    config: HandshakeConfig,
    tracker: Option<SessionTracker>,
    out: OutputWriter,
}

impl Dispatcher {
    pub fn new(
        registry: Registry,
        config: HandshakeConfig,
        tracker: Option<SessionTracker>,
        out: OutputWriter,
    ) -> Self {
        Self {
            registry,
            config,
            tracker,
            out,
        }
    }

    pub fn tracker(&self) -> Option<&SessionTracker> {
        self.tracker.as_ref()
    }

    pub fn dispatch<F: Filter + ?Sized>(
        &mut self,
        filter: &mut F,
        line: &str,
    ) -> Result<(), FilterError> {
        let event = Event::parse(line)?;
        match event.class() {
            EventClass::Report => self.report(filter, &event),
            EventClass::Filter => self.filter_request(filter, &event),
        }
    }

    fn report<F: Filter + ?Sized>(
        &mut self,
        filter: &mut F,
        event: &Event,
    ) -> Result<(), FilterError> {
        let verb = ReportVerb::from_str(event.verb()).map_err(|_| unregistered(event))?;
        let route = self.registry.report(verb).ok_or_else(|| unregistered(event))?;

        // the filter gets to see a session one last time before it is dropped
        if verb == ReportVerb::LinkDisconnect {
            self.call_report_handler(filter, verb, route, event)?;
            return self.track_report(verb, route, event);
        }

        self.track_report(verb, route, event)?;
        self.call_report_handler(filter, verb, route, event)
    }

    fn track_report(
        &mut self,
        verb: ReportVerb,
        route: Route,
        event: &Event,
    ) -> Result<(), FilterError> {
        match self.tracker.as_mut() {
            Some(tracker) if route.track => tracker.on_report(verb, event),
            _ => Ok(()),
        }
    }

    fn call_report_handler<F: Filter + ?Sized>(
        &self,
        filter: &mut F,
        verb: ReportVerb,
        route: Route,
        event: &Event,
    ) -> Result<(), FilterError> {
        if !route.handler {
            return Ok(());
        }
        let ctx = Context::new(&self.config, self.session(event), &self.out);
        if let Some(result) = call_report(filter, verb, &ctx, event) {
            result?;
        }
        Ok(())
    }

    fn filter_request<F: Filter + ?Sized>(
        &mut self,
        filter: &mut F,
        event: &Event,
    ) -> Result<(), FilterError> {
        let verb = FilterVerb::from_str(event.verb()).map_err(|_| unregistered(event))?;
        let route = self.registry.filter(verb).ok_or_else(|| unregistered(event))?;
        let respond = Responder::for_event(event, &self.out)
            .ok_or_else(|| FilterError::framing("filter record without token", event.verb()))?;

        let tracked = match self.tracker.as_mut() {
            Some(tracker) if route.track => tracker.on_filter(verb, event)?,
            _ => Tracked::Updated,
        };

        let session = self.session(event);
        let ctx = Context::new(&self.config, session, &self.out);

        if tracked == Tracked::MessageComplete {
            let session = session.ok_or_else(|| FilterError::UnknownSession {
                session_id: event.session_id().to_string(),
            })?;
            self.complete_message(filter, route, &ctx, event, session, &respond)?;
        }

        if route.handler {
            if let Some(result) = call_filter(filter, verb, &ctx, event, &respond) {
                result?;
            }
        }
        Ok(())
    }

    /// A message-complete collaborator takes over the reply. Without one,
    /// a filter that handles `data-line` itself answers on its own, and
    /// otherwise the body goes back to the agent unchanged.
    fn complete_message<F: Filter + ?Sized>(
        &self,
        filter: &mut F,
        route: Route,
        ctx: &Context<'_>,
        event: &Event,
        session: &Session,
        respond: &Responder,
    ) -> Result<(), FilterError> {
        tracing::debug!(
            session = event.session_id(),
            lines = session.body.len(),
            "message complete"
        );
        if let Some(collaborator) = filter.as_message_complete() {
            collaborator.message_complete(ctx, event, session, respond)?;
        } else if !route.handler {
            respond.flush_message(&session.body)?;
        }
        Ok(())
    }

    fn session(&self, event: &Event) -> Option<&Session> {
        self.tracker.as_ref()?.get(event.session_id())
    }
}

fn unregistered(event: &Event) -> FilterError {
    FilterError::UnregisteredVerb {
        class: event.class().to_string(),
        verb: event.verb().to_string(),
    }
}
