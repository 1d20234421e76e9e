use blockstack_types::ScoringAction;
use log::{debug, error};

use super::frame::{Frame, FrameType, ScoreEntry};
use super::state::ReplayState;
use super::{Replay2Config, FULL_FRAME_INTERVAL};
use crate::bitstream::{BitReader, BitWriter};
use crate::error::{CodecError, CodecResult};

/// Builds a Replay2 stream from successive visible states.
///
/// Every emitted frame is read back from the bit stream and applied to a
/// shadow state; if that no longer matches the captured state the frame is
/// rejected with [`CodecError::Drift`].
#[derive(Debug, Clone)]
pub struct Replay2Encoder {
    config: Replay2Config,
    writer: BitWriter,
    frames: usize,
    last_t: Option<u32>,
    last_full: Option<u32>,
    decoded: ReplayState,
    sounds: Vec<u8>,
    score: Vec<ScoreEntry>,
}

impl Replay2Encoder {
    pub fn new(config: Replay2Config) -> Self {
        Self {
            config,
            writer: BitWriter::new(),
            frames: 0,
            last_t: None,
            last_full: None,
            decoded: ReplayState::default(),
            sounds: Vec::new(),
            score: Vec::new(),
        }
    }

    pub fn config(&self) -> &Replay2Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Replay2Config {
        &mut self.config
    }

    /// Frames written so far.
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// State a decoder holds after the frames written so far.
    pub fn state(&self) -> &ReplayState {
        &self.decoded
    }

    /// Queue a sound for the next frame.
    pub fn push_sound(&mut self, sound_id: u8) {
        self.sounds.push(sound_id);
    }

    /// Queue a score event for the next frame. Counted events of the same
    /// kind are merged.
    pub fn push_score(&mut self, action: ScoringAction, count: u16) {
        if action.has_count() {
            if let Some(entry) = self.score.iter_mut().find(|e| e.action == action) {
                entry.count = entry.count.saturating_add(count);
                return;
            }
        }
        self.score.push(ScoreEntry { action, count });
    }

    /// Record `state` at `t`. Returns whether a frame was written.
    ///
    /// Times earlier than the previous frame are clamped to it. A DIFF frame
    /// with no changes and no pending events is skipped.
    pub fn capture(&mut self, t: u32, state: &ReplayState) -> CodecResult<bool> {
        let t = self.last_t.map_or(t, |last| t.max(last));
        let mut target = state.clone();
        target.normalize();

        let full = self
            .last_full
            .map_or(true, |last| t - last >= FULL_FRAME_INTERVAL);
        let mut frame = if full {
            Frame::full(t, &target)
        } else {
            Frame::diff(t, &self.decoded, &target)
        };
        frame.sounds = self.sounds.clone();
        frame.score = self.score.clone();
        if frame.kind == FrameType::Diff && frame.is_empty() {
            return Ok(false);
        }

        let start = self.writer.len_bits();
        let shadow = match self.write_checked(&frame, start, &target) {
            Ok(shadow) => shadow,
            Err(err) => {
                self.writer.truncate(start);
                return Err(err);
            }
        };

        self.decoded = shadow;
        self.frames += 1;
        self.last_t = Some(t);
        if full {
            debug!("replay2 full frame at {t} ms");
            self.last_full = Some(t);
        }
        self.sounds.clear();
        self.score.clear();
        Ok(true)
    }

    /// Append `frame` and read it back from `start`, returning the decoded
    /// state once it matches `target`.
    fn write_checked(
        &mut self,
        frame: &Frame,
        start: usize,
        target: &ReplayState,
    ) -> CodecResult<ReplayState> {
        frame.write(&mut self.writer, self.last_t)?;

        let mut reader = BitReader::new(self.writer.as_bytes());
        reader.skip(start)?;
        let echoed = Frame::read(&mut reader, self.last_t)?;
        let mut shadow = self.decoded.clone();
        shadow.apply(&echoed)?;
        if shadow != *target {
            error!("replay2 drift at {} ms, frame {:?}", frame.timestamp, frame.kind);
            return Err(CodecError::Drift {
                timestamp: frame.timestamp,
            });
        }
        Ok(shadow)
    }

    pub fn finish(self) -> (Replay2Config, Vec<u8>) {
        (self.config, self.writer.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay2::{decode, CurrentBlock, Property};
    use crate::piece::Position;
    use blockstack_types::{PieceKind, PieceRef, Rotation};

    fn state() -> ReplayState {
        let mut state = ReplayState::default();
        state.current = Some(CurrentBlock {
            piece: PieceRef::standard(PieceKind::T),
            position: Position {
                x: 3,
                y: 0,
                rotation: Rotation::North,
            },
        });
        state.queue = vec![PieceRef::standard(PieceKind::I)];
        state
    }

    #[test]
    fn unchanged_states_are_skipped() {
        let mut encoder = Replay2Encoder::new(Replay2Config::default());
        assert!(encoder.capture(0, &state()).unwrap());
        assert!(!encoder.capture(16, &state()).unwrap());
        encoder.push_sound(2);
        assert!(encoder.capture(32, &state()).unwrap());
        assert_eq!(encoder.frame_count(), 2);
    }

    #[test]
    fn counted_scores_merge() {
        let mut encoder = Replay2Encoder::new(Replay2Config::default());
        encoder.push_score(ScoringAction::SoftDrop, 3);
        encoder.push_score(ScoringAction::SoftDrop, 2);
        encoder.push_score(ScoringAction::Clear2, 1);
        encoder.capture(0, &state()).unwrap();
        let (_, bytes) = encoder.finish();
        let frames = decode(&bytes).unwrap();
        assert_eq!(
            frames[0].score,
            vec![
                ScoreEntry {
                    action: ScoringAction::SoftDrop,
                    count: 5
                },
                ScoreEntry {
                    action: ScoringAction::Clear2,
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn keyframes_are_forced_by_interval() {
        let mut encoder = Replay2Encoder::new(Replay2Config::default());
        let mut current = state();
        for (i, t) in [0, 20_000, 32_766, 32_767, 40_000].into_iter().enumerate() {
            if let Some(block) = current.current.as_mut() {
                block.position.y = i as i8;
            }
            encoder.capture(t, &current).unwrap();
        }
        let (_, bytes) = encoder.finish();
        let kinds: Vec<_> = decode(&bytes).unwrap().iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            [
                FrameType::Full,
                FrameType::Diff,
                FrameType::Diff,
                FrameType::Full,
                FrameType::Diff
            ]
        );
    }

    #[test]
    fn oversized_queue_is_rejected_without_writing() {
        let mut encoder = Replay2Encoder::new(Replay2Config::default());
        encoder.capture(0, &state()).unwrap();
        let mut long = state();
        long.queue = vec![PieceRef::standard(PieceKind::O); 16];
        assert!(matches!(
            encoder.capture(10, &long),
            Err(CodecError::ValueOutOfRange {
                field: "queue length",
                ..
            })
        ));
        assert_eq!(encoder.frame_count(), 1);
        assert_eq!(encoder.state(), &state());

        let mut clean = Replay2Encoder::new(Replay2Config::default());
        clean.capture(0, &state()).unwrap();
        let mut moved = state();
        moved.queue.push(PieceRef::standard(PieceKind::O));
        encoder.capture(20, &moved).unwrap();
        clean.capture(20, &moved).unwrap();
        assert_eq!(encoder.finish().1, clean.finish().1);
    }

    #[test]
    fn long_captions_are_cut_before_comparison() {
        let mut encoder = Replay2Encoder::new(Replay2Config::default());
        let mut captioned = state();
        captioned.set_caption(1, Some("x".repeat(300)));
        encoder.capture(0, &captioned).unwrap();
        let frames = decode(&encoder.clone().finish().1).unwrap();
        assert!(frames[0].has(Property::CaptionChange));
        assert_eq!(encoder.state().captions[&1].len(), 255);
    }
}
