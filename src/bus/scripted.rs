//! Deterministic scripted bus for offline replay runs and tests.

use num_complex::Complex64;

use crate::config::{FederateConfig, ScriptValue};

use super::{BusError, BusValue, FederateBus, PubHandle, SubHandle};

/// One scripted input arrival.
#[derive(Debug, Clone)]
struct ScriptedEvent {
    target: String,
    time: f64,
    value: BusValue,
}

/// Latest value held by one subscription, plus its freshness flag.
#[derive(Debug, Clone, Default)]
struct Inbox {
    value: Option<BusValue>,
    updated: bool,
}

/// One recorded publish, for post-run assertions.
#[derive(Debug, Clone)]
pub struct PublishedSample {
    /// Logical time the publish happened at.
    pub time: f64,
    /// Publication name.
    pub name: String,
    /// Published value.
    pub value: BusValue,
}

/// In-process [`FederateBus`] that replays a fixed input script.
///
/// Time is granted in `period` increments capped at the requested horizon,
/// and scripted events are delivered as soon as granted time reaches their
/// timestamp. Every publish is recorded. Two buses built from the same
/// script behave identically.
#[derive(Debug)]
pub struct ScriptedBus {
    name: String,
    period: f64,
    pubs: Vec<String>,
    subs: Vec<String>,
    events: Vec<ScriptedEvent>,
    next_event: usize,
    inboxes: Vec<Inbox>,
    published: Vec<PublishedSample>,
    time: f64,
    executing: bool,
    finalized: bool,
}

impl ScriptedBus {
    /// Creates a bus with the given endpoints and an empty script.
    pub fn new(name: &str, period: f64, pubs: Vec<String>, subs: Vec<String>) -> Self {
        let inboxes = vec![Inbox::default(); subs.len()];
        Self {
            name: name.to_string(),
            period,
            pubs,
            subs,
            events: Vec::new(),
            next_event: 0,
            inboxes,
            published: Vec::new(),
            time: 0.0,
            executing: false,
            finalized: false,
        }
    }

    /// Builds a bus from the `federation` section of a federate config.
    pub fn from_config(cfg: &FederateConfig) -> Self {
        let fed = &cfg.federation;
        let mut bus = Self::new(
            &cfg.application.name,
            cfg.application.period,
            fed.publications.clone(),
            fed.subscriptions.clone(),
        );
        for event in &fed.script {
            let value = match event.value {
                ScriptValue::Double { value } => BusValue::Double(value),
                ScriptValue::Complex { re, im } => BusValue::Complex(Complex64::new(re, im)),
            };
            bus.push_event(&event.target, event.time, value);
        }
        bus
    }

    /// Schedules `value` to arrive on `target` at logical `time`.
    ///
    /// Events on an unknown target are silently dropped at delivery, like a
    /// federation publishing on a topic nobody subscribed to.
    pub fn push_event(&mut self, target: &str, time: f64, value: BusValue) {
        let event = ScriptedEvent {
            target: target.to_string(),
            time,
            value,
        };
        // Keep events ordered by arrival time; stable for equal times.
        let at = self.events.partition_point(|e| e.time <= time);
        self.events.insert(at, event);
        if at < self.next_event {
            self.next_event += 1;
        }
    }

    /// Every publish recorded so far, in publish order.
    pub fn published(&self) -> &[PublishedSample] {
        &self.published
    }

    /// Number of publishes recorded on the named publication.
    pub fn publish_count(&self, name: &str) -> usize {
        self.published.iter().filter(|p| p.name == name).count()
    }

    /// Current granted logical time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Whether the federate was finalized.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn ensure_live(&self) -> Result<(), BusError> {
        if self.finalized {
            return Err(BusError::Finalized);
        }
        Ok(())
    }

    fn ensure_executing(&self) -> Result<(), BusError> {
        self.ensure_live()?;
        if !self.executing {
            return Err(BusError::NotExecuting);
        }
        Ok(())
    }

    fn inbox(&self, sub: SubHandle) -> Result<&Inbox, BusError> {
        self.inboxes
            .get(sub.0)
            .ok_or(BusError::InvalidSubscription(sub.0))
    }

    /// Delivers all events whose timestamp is within granted time.
    fn deliver_due(&mut self) {
        while self.next_event < self.events.len() && self.events[self.next_event].time <= self.time
        {
            let event = self.events[self.next_event].clone();
            self.next_event += 1;
            if let Some(idx) = self.subs.iter().position(|s| s == &event.target) {
                self.inboxes[idx].value = Some(event.value);
                self.inboxes[idx].updated = true;
            }
        }
    }
}

impl FederateBus for ScriptedBus {
    fn federate_name(&self) -> &str {
        &self.name
    }

    fn period(&self) -> f64 {
        self.period
    }

    fn publication_names(&self) -> &[String] {
        &self.pubs
    }

    fn subscription_targets(&self) -> &[String] {
        &self.subs
    }

    fn enter_executing_mode(&mut self) -> Result<(), BusError> {
        self.ensure_live()?;
        self.executing = true;
        // Events scripted at t = 0 are visible from the first step.
        self.deliver_due();
        Ok(())
    }

    fn is_updated(&self, sub: SubHandle) -> Result<bool, BusError> {
        self.ensure_live()?;
        Ok(self.inbox(sub)?.updated)
    }

    fn read_double(&mut self, sub: SubHandle) -> Result<f64, BusError> {
        self.ensure_live()?;
        let target = self
            .subs
            .get(sub.0)
            .ok_or(BusError::InvalidSubscription(sub.0))?
            .clone();
        let inbox = &mut self.inboxes[sub.0];
        inbox.updated = false;
        match inbox.value {
            Some(BusValue::Double(v)) => Ok(v),
            Some(BusValue::Complex(_)) => Err(BusError::WrongKind {
                target,
                held: "complex",
                requested: "double",
            }),
            None => Ok(0.0),
        }
    }

    fn read_complex(&mut self, sub: SubHandle) -> Result<Complex64, BusError> {
        self.ensure_live()?;
        let target = self
            .subs
            .get(sub.0)
            .ok_or(BusError::InvalidSubscription(sub.0))?
            .clone();
        let inbox = &mut self.inboxes[sub.0];
        inbox.updated = false;
        match inbox.value {
            Some(BusValue::Complex(v)) => Ok(v),
            Some(BusValue::Double(_)) => Err(BusError::WrongKind {
                target,
                held: "double",
                requested: "complex",
            }),
            None => Ok(Complex64::new(0.0, 0.0)),
        }
    }

    fn publish_double(&mut self, handle: PubHandle, value: f64) -> Result<(), BusError> {
        self.ensure_executing()?;
        let name = self
            .pubs
            .get(handle.0)
            .ok_or(BusError::InvalidPublication(handle.0))?
            .clone();
        self.published.push(PublishedSample {
            time: self.time,
            name,
            value: BusValue::Double(value),
        });
        Ok(())
    }

    fn publish_complex(&mut self, handle: PubHandle, value: Complex64) -> Result<(), BusError> {
        self.ensure_executing()?;
        let name = self
            .pubs
            .get(handle.0)
            .ok_or(BusError::InvalidPublication(handle.0))?
            .clone();
        self.published.push(PublishedSample {
            time: self.time,
            name,
            value: BusValue::Complex(value),
        });
        Ok(())
    }

    fn request_time(&mut self, requested: f64) -> Result<f64, BusError> {
        self.ensure_executing()?;
        let granted = (self.time + self.period).min(requested.max(self.time));
        self.time = granted;
        self.deliver_due();
        Ok(granted)
    }

    fn finalize(&mut self) -> Result<(), BusError> {
        self.ensure_live()?;
        self.finalized = true;
        self.executing = false;
        Ok(())
    }
}
