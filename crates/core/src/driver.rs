//! Simulation drivers
//!
//! A [`Simulation`](crate::simulation::Simulation) is generic over who feeds
//! it. [`LiveDriver`] runs from player input and timers and records every
//! applied action; [`PlaybackDriver`] re-applies a recorded action stream.
//! The trait is sealed: these two are the only drivers.

use std::collections::VecDeque;

use crate::simulation::SimEvent;
use crate::types::ReplayAction;

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::LiveDriver {}
    impl Sealed for super::PlaybackDriver {}
}

pub trait Driver: sealed::Sealed {
    /// Whether pending garbage is turned into board rows by the simulation
    /// itself. Playback instead receives the rows as recorded actions.
    fn materializes_garbage(&self) -> bool;

    /// Called once for every action that was applied.
    fn record(&mut self, action: &ReplayAction);

    fn emit(&mut self, event: SimEvent);

    fn drain_events(&mut self) -> Vec<SimEvent>;
}

#[derive(Debug, Default)]
pub struct LiveDriver {
    actions: Vec<ReplayAction>,
    events: Vec<SimEvent>,
}

impl LiveDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every applied action so far, in order.
    pub fn actions(&self) -> &[ReplayAction] {
        &self.actions
    }

    pub fn take_actions(&mut self) -> Vec<ReplayAction> {
        std::mem::take(&mut self.actions)
    }
}

impl Driver for LiveDriver {
    fn materializes_garbage(&self) -> bool {
        true
    }

    fn record(&mut self, action: &ReplayAction) {
        self.actions.push(action.clone());
    }

    fn emit(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }
}

#[derive(Debug, Default)]
pub struct PlaybackDriver {
    pending: VecDeque<ReplayAction>,
    last_t: u32,
    events: Vec<SimEvent>,
}

impl PlaybackDriver {
    pub fn new(actions: impl IntoIterator<Item = ReplayAction>) -> Self {
        let pending: VecDeque<ReplayAction> = actions.into_iter().collect();
        let last_t = pending.back().map_or(0, |a| a.t);
        Self {
            pending,
            last_t,
            events: Vec::new(),
        }
    }

    /// Pop the next action if it is due at or before `t`.
    pub fn pop_due(&mut self, t: u32) -> Option<ReplayAction> {
        if self.pending.front()?.t <= t {
            self.pending.pop_front()
        } else {
            None
        }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Timestamp of the next pending action.
    pub fn next_time(&self) -> Option<u32> {
        self.pending.front().map(|a| a.t)
    }

    /// Timestamp of the last recorded action.
    pub fn end_time(&self) -> u32 {
        self.last_t
    }
}

impl Driver for PlaybackDriver {
    fn materializes_garbage(&self) -> bool {
        false
    }

    fn record(&mut self, _action: &ReplayAction) {}

    fn emit(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }
}
