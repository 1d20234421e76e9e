//! Re-simulating a recorded legacy replay.

use std::sync::Arc;

use blockstack_core::{
    EndReason, PlaybackDriver, Ruleset, SimEvent, SimOptions, Simulation, Stats,
};
use blockstack_replay::replay2::{Replay2Config, Replay2Encoder, ReplayState};
use blockstack_replay::{CodecResult, LegacyReplay};
use blockstack_types::GameMode;
use log::{debug, warn};
use serde::Serialize;

/// Result of playing a replay to the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSummary {
    pub score: u32,
    pub lines: u32,
    pub attack: u32,
    pub pieces: u32,
    pub holds: u32,
    pub max_combo: u32,
    pub finesse: u32,
    pub key_presses: u32,
    pub game_time_ms: u32,
    pub end_reason: Option<String>,
}

impl PlaybackSummary {
    fn new(stats: &Stats, game_time_ms: u32, end: Option<EndReason>) -> Self {
        Self {
            score: stats.score,
            lines: stats.lines,
            attack: stats.attack,
            pieces: stats.pieces,
            holds: stats.holds,
            max_combo: stats.max_combo,
            finesse: stats.finesse,
            key_presses: stats.key_presses,
            game_time_ms,
            end_reason: end.map(|reason| format!("{reason:?}")),
        }
    }
}

#[derive(Debug)]
pub struct PlaybackSession {
    sim: Simulation<PlaybackDriver>,
    game_time_ms: u32,
}

impl PlaybackSession {
    pub fn new(ruleset: Arc<Ruleset>, replay: &LegacyReplay) -> Self {
        let mode = replay.meta.mode().unwrap_or_else(|| {
            warn!("unknown replay mode {:#x}, playing as live", replay.meta.m);
            GameMode::default()
        });
        let mut options = SimOptions::new(replay.meta.seed.clone()).with_mode(mode);
        options.soft_drop_id = replay.meta.soft_drop_id;
        let sim = Simulation::playback(ruleset, options, replay.actions.iter().cloned());
        Self {
            sim,
            game_time_ms: replay.game_time_ms(),
        }
    }

    pub fn sim(&self) -> &Simulation<PlaybackDriver> {
        &self.sim
    }

    /// Apply actions up to `t`, returning the events they produced.
    pub fn step_until(&mut self, t: u32) -> Vec<SimEvent> {
        self.sim.play_until(t);
        self.sim.drain_events()
    }

    pub fn is_finished(&self) -> bool {
        self.sim.remaining() == 0 || self.sim.is_ended()
    }

    pub fn run(mut self) -> PlaybackSummary {
        let applied = self.sim.play_to_end();
        debug!("replay applied {applied} actions");
        PlaybackSummary::new(self.sim.stats(), self.game_time_ms, self.sim.end_reason())
    }

    /// Play the replay through, capturing a Replay2 frame at every action
    /// time.
    pub fn render_replay2(
        mut self,
        config: Replay2Config,
    ) -> CodecResult<(Replay2Config, Vec<u8>)> {
        let mut encoder = Replay2Encoder::new(config);
        encoder.capture(0, &ReplayState::capture(&self.sim))?;
        while let Some(t) = self.sim.driver().next_time() {
            self.sim.play_until(t);
            encoder.capture(t, &ReplayState::capture(&self.sim))?;
            if self.sim.is_ended() {
                break;
            }
        }
        Ok(encoder.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::GameRecorder;
    use blockstack_core::{Input, Key};
    use blockstack_replay::replay2::{decode, states};

    fn recorded() -> crate::recorder::Recording {
        let mut rec = GameRecorder::new(
            Arc::new(Ruleset::default()),
            SimOptions::new("playback-seed"),
        )
        .unwrap();
        for (i, key) in [Key::Left, Key::RotateCw, Key::Right, Key::HardDrop]
            .into_iter()
            .cycle()
            .take(24)
            .enumerate()
        {
            let t = i as u32 * 150;
            rec.input(Input::Press(key), t).unwrap();
            rec.input(Input::Release(key), t + 40).unwrap();
        }
        rec.finish(0)
    }

    #[test]
    fn playback_matches_the_recorded_game() {
        let recording = recorded();
        let summary = PlaybackSession::new(Arc::new(Ruleset::default()), &recording.legacy).run();
        assert_eq!(summary.pieces, recording.stats.pieces);
        assert_eq!(summary.score, recording.stats.score);
        assert_eq!(summary.lines, recording.stats.lines);
    }

    #[test]
    fn rendered_frames_end_on_the_final_board() {
        let recording = recorded();
        let session = PlaybackSession::new(Arc::new(Ruleset::default()), &recording.legacy);
        let (_, bytes) = session.render_replay2(Replay2Config::default()).unwrap();
        let (_, rendered) = states(&decode(&bytes).unwrap()).unwrap().pop().unwrap();
        let (_, live) = states(&decode(&recording.replay2).unwrap())
            .unwrap()
            .pop()
            .unwrap();
        assert_eq!(rendered.matrix, live.matrix);
    }

    #[test]
    fn summary_serializes_in_camel_case() {
        let summary = PlaybackSummary::new(&Stats::default(), 1234, Some(EndReason::BlockOut));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["gameTimeMs"], 1234);
        assert_eq!(json["keyPresses"], 0);
        assert_eq!(json["endReason"], "BlockOut");
    }
}
