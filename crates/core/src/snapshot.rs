use arrayvec::ArrayVec;

use crate::catalog::Piece;
use crate::simulation::EndReason;
use crate::types::{Cell, PieceRef, BOARD_CELLS};

/// Preview slots kept in a snapshot.
pub const SNAPSHOT_PREVIEWS: usize = 10;

/// Copy of everything a renderer or bot needs, without borrowing the
/// simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimSnapshot {
    pub board: [Cell; BOARD_CELLS],
    pub active: Option<Piece>,
    pub ghost_y: Option<i8>,
    pub hold: Option<PieceRef>,
    pub queue: ArrayVec<PieceRef, SNAPSHOT_PREVIEWS>,
    pub can_hold: bool,
    pub end_reason: Option<EndReason>,
    pub score: u32,
    pub lines: u32,
    pub combo: u32,
    pub b2b: bool,
    pub red_bar: u8,
    pub clock: u32,
}

impl SimSnapshot {
    pub fn clear(&mut self) {
        self.board = [0; BOARD_CELLS];
        self.active = None;
        self.ghost_y = None;
        self.hold = None;
        self.queue.clear();
        self.can_hold = true;
        self.end_reason = None;
        self.score = 0;
        self.lines = 0;
        self.combo = 0;
        self.b2b = false;
        self.red_bar = 0;
        self.clock = 0;
    }

    pub fn playable(&self) -> bool {
        self.end_reason.is_none()
    }

    /// Board cells as rows, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.board.chunks(crate::types::BOARD_WIDTH as usize)
    }
}

impl Default for SimSnapshot {
    fn default() -> Self {
        Self {
            board: [0; BOARD_CELLS],
            active: None,
            ghost_y: None,
            hold: None,
            queue: ArrayVec::new(),
            can_hold: true,
            end_reason: None,
            score: 0,
            lines: 0,
            combo: 0,
            b2b: false,
            red_bar: 0,
            clock: 0,
        }
    }
}
