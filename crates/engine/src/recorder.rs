//! Live game plus its two recordings.

use std::sync::Arc;

use blockstack_core::{
    GarbageEvent, Input, LiveDriver, Objective, Ruleset, SimEvent, SimOptions, Simulation,
    Stats,
};
use blockstack_replay::replay2::{Replay2Config, Replay2Encoder, ReplayState, CAPTION_LREM};
use blockstack_replay::{CodecError, LegacyReplay, ReplayExport, ReplayMeta};
use blockstack_types::{GameMode, ScoringAction};
use log::{debug, info};
use thiserror::Error;

use crate::place::{apply_bot_move, PlaceError, Placement};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Place(#[from] PlaceError),
}

/// Header fields shared by both replay formats.
pub fn replay_meta<D: blockstack_core::Driver>(sim: &Simulation<D>) -> ReplayMeta {
    let ruleset = sim.ruleset();
    let mut meta = ReplayMeta::new(sim.seed(), sim.mode());
    meta.bs = ruleset.base_block_set;
    meta.das = ruleset.das;
    meta.arr = ruleset.arr;
    meta
}

fn replay2_config(meta: &ReplayMeta) -> Replay2Config {
    Replay2Config {
        soft_drop_id: Some(meta.soft_drop_id),
        game_start: Some(meta.game_start),
        seed: Some(meta.seed.clone()),
        m: Some(meta.m),
        bs: Some(meta.bs),
        se: Some(meta.se),
        das: Some(meta.das),
        arr: Some(meta.arr),
        ..Replay2Config::default()
    }
}

/// A live simulation whose every step is also captured as Replay2 frames.
///
/// The legacy action stream is the simulation's own record; the frame stream
/// is captured after each call.
#[derive(Debug)]
pub struct GameRecorder {
    sim: Simulation<LiveDriver>,
    meta: ReplayMeta,
    frames: Replay2Encoder,
    events: Vec<SimEvent>,
}

impl GameRecorder {
    pub fn new(ruleset: Arc<Ruleset>, options: SimOptions) -> Result<Self, RecordError> {
        let soft_drop_id = options.soft_drop_id;
        let sim = Simulation::live(ruleset, options);
        let mut meta = replay_meta(&sim);
        meta.soft_drop_id = soft_drop_id;
        let frames = Replay2Encoder::new(replay2_config(&meta));
        let mut recorder = Self {
            sim,
            meta,
            frames,
            events: Vec::new(),
        };
        recorder.advance(0)?;
        Ok(recorder)
    }

    pub fn sim(&self) -> &Simulation<LiveDriver> {
        &self.sim
    }

    pub fn stats(&self) -> &Stats {
        self.sim.stats()
    }

    pub fn meta_mut(&mut self) -> &mut ReplayMeta {
        &mut self.meta
    }

    /// Events observed since the last call.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn input(&mut self, input: Input, t: u32) -> Result<bool, RecordError> {
        let applied = self.sim.input(input, t);
        self.capture(t)?;
        Ok(applied)
    }

    pub fn advance(&mut self, now: u32) -> Result<(), RecordError> {
        self.sim.advance(now);
        self.capture(now)
    }

    pub fn add_garbage(&mut self, event: GarbageEvent, t: u32) -> Result<bool, RecordError> {
        let applied = self.sim.add_garbage(event, t);
        self.capture(t)?;
        Ok(applied)
    }

    /// Play a bot placement. Rejected moves are not recorded.
    pub fn play(&mut self, placement: &Placement, t: u32) -> Result<(), RecordError> {
        let result = apply_bot_move(&mut self.sim, placement, t);
        self.capture(t)?;
        Ok(result?)
    }

    fn capture(&mut self, t: u32) -> Result<(), RecordError> {
        let t = t.max(self.sim.clock());
        for event in self.sim.drain_events() {
            match &event {
                SimEvent::Scored {
                    action: Some(action),
                    ..
                } => self.frames.push_score(*action, 1),
                SimEvent::Attack { event, .. } if event.combo > 1 => {
                    let combo = event.combo.min(u16::MAX as u32) as u16;
                    self.frames.push_score(ScoringAction::Combo, combo);
                }
                SimEvent::Ended(reason) => debug!("recorded game ended: {reason:?}"),
                _ => {}
            }
            self.events.push(event);
        }

        let mut state = ReplayState::capture(&self.sim);
        if let Some(Objective::Lines(goal)) = self.sim.objective() {
            let left = goal.saturating_sub(self.sim.stats().lines);
            state.set_caption(CAPTION_LREM, Some(left.to_string()));
        }
        self.frames.capture(t, &state)?;
        Ok(())
    }

    /// Close both recordings. `game_end` is the wall clock end in ms since
    /// the epoch, or 0 to leave it unset.
    pub fn finish(mut self, game_end: u64) -> Recording {
        self.meta.game_end = game_end;
        self.frames.config_mut().game_end = (game_end > 0).then_some(game_end);
        let actions = self.sim.actions().to_vec();
        info!(
            "recorded {} actions and {} frames",
            actions.len(),
            self.frames.frame_count()
        );
        let (replay2_config, replay2) = self.frames.finish();
        Recording {
            stats: *self.sim.stats(),
            valid: self.sim.replay_valid(),
            legacy: LegacyReplay::new(self.meta, actions),
            replay2_config,
            replay2,
        }
    }
}

/// Finished recordings of one game.
#[derive(Debug, Clone)]
pub struct Recording {
    pub stats: Stats,
    /// `false` when the ruleset changed mid-game.
    pub valid: bool,
    pub legacy: LegacyReplay,
    pub replay2_config: Replay2Config,
    pub replay2: Vec<u8>,
}

impl Recording {
    pub fn export(&self) -> Result<ReplayExport, RecordError> {
        Ok(ReplayExport::from_legacy(&self.legacy)?)
    }

    pub fn export_replay2(&self) -> Result<ReplayExport, RecordError> {
        let game_time = self.legacy.game_time_ms();
        Ok(ReplayExport::new(
            &self.replay2,
            &self.replay2_config,
            game_time,
        )?)
    }

    pub fn mode(&self) -> Option<GameMode> {
        self.legacy.meta.mode()
    }
}
