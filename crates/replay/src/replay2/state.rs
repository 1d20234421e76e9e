use std::collections::BTreeMap;

use blockstack_core::{Driver, Simulation};
use blockstack_types::{Cell, PieceRef, BOARD_CELLS, EMPTY_CELL};

use super::frame::{trim_to_bytes, Frame, FrameType, RulesetProps};
use super::MAX_CAPTION_BYTES;
use crate::error::{CodecError, CodecResult};
use crate::piece::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurrentBlock {
    pub piece: PieceRef,
    pub position: Position,
}

/// Everything a replay viewer draws.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayState {
    pub matrix: [Cell; BOARD_CELLS],
    pub current: Option<CurrentBlock>,
    pub hold: Option<PieceRef>,
    pub queue: Vec<PieceRef>,
    pub ghost: bool,
    pub skin_id: u8,
    pub captions: BTreeMap<u8, String>,
}

impl Default for ReplayState {
    fn default() -> Self {
        Self {
            matrix: [EMPTY_CELL; BOARD_CELLS],
            current: None,
            hold: None,
            queue: Vec::new(),
            ghost: true,
            skin_id: 0,
            captions: BTreeMap::new(),
        }
    }
}

impl ReplayState {
    /// Visible state of a running game. The queue is cut to the ruleset's
    /// preview count.
    pub fn capture<D: Driver>(sim: &Simulation<D>) -> Self {
        let previews = sim.ruleset().show_previews as usize;
        Self {
            matrix: *sim.board().cells(),
            current: sim.active().map(|piece| CurrentBlock {
                piece: piece.piece_ref(),
                position: Position {
                    x: piece.x,
                    y: piece.y,
                    rotation: piece.rotation,
                },
            }),
            hold: sim.hold_piece(),
            queue: sim.queue().take(previews).copied().collect(),
            ghost: sim.ruleset().ghost,
            skin_id: 0,
            captions: BTreeMap::new(),
        }
    }

    pub fn ruleset(&self) -> RulesetProps {
        RulesetProps {
            ghost: self.ghost,
            skin_id: self.skin_id,
        }
    }

    pub fn set_caption(&mut self, position: u8, text: Option<String>) {
        match text {
            Some(text) => {
                self.captions.insert(position, text);
            }
            None => {
                self.captions.remove(&position);
            }
        }
    }

    /// Overwrite `other` with this state, reusing its allocations.
    pub fn copy_to(&self, other: &mut ReplayState) {
        other.clone_from(self);
    }

    /// Clamp fields to what the wire format can carry.
    pub(crate) fn normalize(&mut self) {
        for text in self.captions.values_mut() {
            let cut = trim_to_bytes(text, MAX_CAPTION_BYTES).len();
            text.truncate(cut);
        }
    }

    /// Apply one frame's state properties. Sound and score events leave the
    /// state unchanged.
    pub fn apply(&mut self, frame: &Frame) -> CodecResult<()> {
        let invalid = |reason| CodecError::InvalidFrame {
            timestamp: frame.timestamp,
            reason,
        };

        if frame.kind == FrameType::Full {
            self.captions.clear();
        }
        if let Some(matrix) = &frame.matrix {
            self.matrix = **matrix;
        }
        for changes in [&frame.matrix_changes, &frame.matrix_bitmask]
            .into_iter()
            .flatten()
        {
            for change in changes {
                let cell = self
                    .matrix
                    .get_mut(change.index as usize)
                    .ok_or(invalid("matrix change outside the board"))?;
                *cell = change.cell;
            }
        }
        if let Some(current) = frame.current_block {
            self.current = current;
        }
        if let Some(delta) = frame.position {
            let block = self
                .current
                .as_mut()
                .ok_or(invalid("position change without a current block"))?;
            block.position = delta.apply(block.position);
        }
        if let Some(hold) = frame.hold_block {
            self.hold = hold;
        }
        if let Some(queue) = &frame.queue {
            self.queue.clone_from(queue);
        }
        if let Some(piece) = frame.queue_shift {
            if self.queue.is_empty() {
                return Err(invalid("queue shift on an empty queue"));
            }
            self.queue.remove(0);
            self.queue.push(piece);
        }
        if let Some(ruleset) = frame.ruleset {
            self.ghost = ruleset.ghost;
            self.skin_id = ruleset.skin_id;
        }
        for caption in &frame.captions {
            self.set_caption(caption.position, caption.text.clone());
        }
        Ok(())
    }
}
