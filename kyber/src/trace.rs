//! Tracing hooks for the key generation protocol.
//!
//! A [`Tracer`] is told about phase changes, received bundles and evictions. Every method has an
//! empty default, so an implementation only overrides what it cares about. [`PerfProfiler`]
//! records how long every phase takes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::dkg::{Index, Phase};

/// Observer of a protocol run.
pub trait Tracer: Send {
    fn protocol_begins(&mut self) {}
    fn phase_begins(&mut self, _phase: Phase) {}
    /// A dealer was evicted by this node.
    fn evicted_dealer(&mut self, _index: Index, _reason: &str) {}
    /// A share holder was evicted by this node.
    fn evicted_holder(&mut self, _index: Index, _reason: &str) {}
    /// A bundle issued by `from` was accepted during `phase`.
    fn bundle_received(&mut self, _phase: Phase, _from: Index) {}
    fn protocol_ends(&mut self) {}
}

macro_rules! forward {
    ($this:ident => $inner:expr) => {
        fn protocol_begins(&mut $this) {
            if let Some(t) = $inner {
                t.protocol_begins()
            }
        }
        fn phase_begins(&mut $this, phase: Phase) {
            if let Some(t) = $inner {
                t.phase_begins(phase)
            }
        }
        fn evicted_dealer(&mut $this, index: Index, reason: &str) {
            if let Some(t) = $inner {
                t.evicted_dealer(index, reason)
            }
        }
        fn evicted_holder(&mut $this, index: Index, reason: &str) {
            if let Some(t) = $inner {
                t.evicted_holder(index, reason)
            }
        }
        fn bundle_received(&mut $this, phase: Phase, from: Index) {
            if let Some(t) = $inner {
                t.bundle_received(phase, from)
            }
        }
        fn protocol_ends(&mut $this) {
            if let Some(t) = $inner {
                t.protocol_ends()
            }
        }
    };
}

impl<T: Tracer + ?Sized> Tracer for Box<T> {
    forward!(self => Some(&mut **self));
}

impl<T: Tracer + ?Sized> Tracer for &mut T {
    forward!(self => Some(&mut **self));
}

impl<T: Tracer> Tracer for Option<T> {
    forward!(self => self.as_mut());
}

/// Shares one tracer between the protocol and the caller, who reads it once the run is over.
impl<T: Tracer> Tracer for Arc<Mutex<T>> {
    forward!(self => self.lock().ok().as_deref_mut());
}

/// Errors raised when a profile is not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum ProfileError {
    /// the protocol never began
    NotStarted,
    /// the protocol has not ended yet
    NotFinished,
}

/// A [`Tracer`] that measures the wall time of each phase.
#[derive(Debug, Default, Clone)]
pub struct PerfProfiler {
    started: Option<Instant>,
    ended: Option<Instant>,
    current: Option<(Phase, Instant)>,
    phases: Vec<(Phase, Duration)>,
    bundles: BTreeMap<Phase, usize>,
    evicted_dealers: Vec<Index>,
    evicted_holders: Vec<Index>,
}

impl PerfProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    fn close_phase(&mut self, now: Instant) {
        if let Some((phase, since)) = self.current.take() {
            self.phases.push((phase, now.duration_since(since)));
        }
    }

    /// The timings of a finished run.
    pub fn get_report(&self) -> Result<PerfReport, ProfileError> {
        let started = self.started.ok_or(ProfileError::NotStarted)?;
        let ended = self.ended.ok_or(ProfileError::NotFinished)?;
        Ok(PerfReport {
            total: ended.duration_since(started),
            phases: self.phases.clone(),
            bundles: self.bundles.clone(),
            evicted_dealers: self.evicted_dealers.clone(),
            evicted_holders: self.evicted_holders.clone(),
        })
    }
}

impl Tracer for PerfProfiler {
    fn protocol_begins(&mut self) {
        *self = Self { started: Some(Instant::now()), ..Self::default() };
    }

    fn phase_begins(&mut self, phase: Phase) {
        let now = Instant::now();
        self.close_phase(now);
        self.current = Some((phase, now));
    }

    fn evicted_dealer(&mut self, index: Index, _reason: &str) {
        self.evicted_dealers.push(index);
    }

    fn evicted_holder(&mut self, index: Index, _reason: &str) {
        self.evicted_holders.push(index);
    }

    fn bundle_received(&mut self, phase: Phase, _from: Index) {
        *self.bundles.entry(phase).or_default() += 1;
    }

    fn protocol_ends(&mut self) {
        let now = Instant::now();
        self.close_phase(now);
        self.ended = Some(now);
    }
}

/// Timings collected by a [`PerfProfiler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfReport {
    pub total: Duration,
    pub phases: Vec<(Phase, Duration)>,
    pub bundles: BTreeMap<Phase, usize>,
    pub evicted_dealers: Vec<Index>,
    pub evicted_holders: Vec<Index>,
}

impl fmt::Display for PerfReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Protocol took {:?}", self.total)?;
        let total = self.total.as_secs_f64();
        for (phase, took) in &self.phases {
            let share = if total > 0.0 { took.as_secs_f64() / total * 100.0 } else { 0.0 };
            let bundles = self.bundles.get(phase).copied().unwrap_or_default();
            writeln!(f, "  - {phase}: {took:?} ({share:.1}%), {bundles} bundles")?;
        }
        if !self.evicted_dealers.is_empty() {
            writeln!(f, "  evicted dealers: {:?}", self.evicted_dealers)?;
        }
        if !self.evicted_holders.is_empty() {
            writeln!(f, "  evicted holders: {:?}", self.evicted_holders)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_needs_a_finished_run() {
        let mut profiler = PerfProfiler::new();
        assert_eq!(profiler.get_report(), Err(ProfileError::NotStarted));
        profiler.protocol_begins();
        assert_eq!(profiler.get_report(), Err(ProfileError::NotFinished));
        profiler.protocol_ends();
        assert!(profiler.get_report().is_ok());
    }

    #[test]
    fn phases_are_recorded_in_order() {
        let mut profiler = PerfProfiler::new();
        profiler.protocol_begins();
        for phase in [Phase::Deal, Phase::Response, Phase::Justif] {
            profiler.phase_begins(phase);
            profiler.bundle_received(phase, 0);
        }
        profiler.bundle_received(Phase::Deal, 1);
        profiler.evicted_dealer(3, "duplicate bundle");
        profiler.protocol_ends();

        let report = profiler.get_report().unwrap();
        let phases: Vec<_> = report.phases.iter().map(|(p, _)| *p).collect();
        assert_eq!(phases, vec![Phase::Deal, Phase::Response, Phase::Justif]);
        assert_eq!(report.bundles[&Phase::Deal], 2);
        assert_eq!(report.evicted_dealers, vec![3]);
        let rendered = report.to_string();
        assert!(rendered.contains("deal"));
        assert!(rendered.contains("evicted dealers: [3]"));
    }

    #[test]
    fn defaults_do_nothing() {
        struct Silent;
        impl Tracer for Silent {}
        let mut tracer: Box<dyn Tracer> = Box::new(Silent);
        tracer.protocol_begins();
        tracer.phase_begins(Phase::Finish);
        tracer.protocol_ends();
    }
}
