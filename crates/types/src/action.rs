//! Recorded input actions.
//!
//! Every state change of a simulation is expressed as a [`ReplayAction`]; a
//! live game records them as they happen, and playback re-applies them.
//!
//! | Code | Action | Payload |
//! |------|--------|---------|
//! | 0 | MOVE_LEFT | - |
//! | 1 | MOVE_RIGHT | - |
//! | 2 | DAS_LEFT | - |
//! | 3 | DAS_RIGHT | - |
//! | 4 | ROTATE_LEFT | - |
//! | 5 | ROTATE_RIGHT | - |
//! | 6 | ROTATE_180 | - |
//! | 7 | HARD_DROP | - |
//! | 8 | SOFT_DROP_BEGIN_END | begin flag |
//! | 9 | GRAVITY_STEP | rows |
//! | 10 | HOLD_BLOCK | - |
//! | 11 | GARBAGE_ADD | lines, hole column |
//! | 12 | SGARBAGE_ADD | lines |
//! | 13 | REDBAR_SET | pending height |
//! | 14 | ARR_MOVE | direction |
//! | 15 | AUX | see [`AuxCode`] |

use crate::{PieceSetId, Rotation};

/// Horizontal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn dx(self) -> i8 {
        match self {
            Direction::Left => -1,
            Direction::Right => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionCode {
    MoveLeft,
    MoveRight,
    DasLeft,
    DasRight,
    RotateLeft,
    RotateRight,
    Rotate180,
    HardDrop,
    SoftDropBeginEnd,
    GravityStep,
    HoldBlock,
    GarbageAdd,
    SolidGarbageAdd,
    RedbarSet,
    ArrMove,
    Aux,
}

impl ActionCode {
    pub const ALL: [ActionCode; 16] = [
        ActionCode::MoveLeft,
        ActionCode::MoveRight,
        ActionCode::DasLeft,
        ActionCode::DasRight,
        ActionCode::RotateLeft,
        ActionCode::RotateRight,
        ActionCode::Rotate180,
        ActionCode::HardDrop,
        ActionCode::SoftDropBeginEnd,
        ActionCode::GravityStep,
        ActionCode::HoldBlock,
        ActionCode::GarbageAdd,
        ActionCode::SolidGarbageAdd,
        ActionCode::RedbarSet,
        ActionCode::ArrMove,
        ActionCode::Aux,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

/// Sub-codes carried by an `AUX` action.
///
/// | Code | Aux | Payload |
/// |------|-----|---------|
/// | 0 | AFK | away flag |
/// | 1 | BLOCK_SET | piece set id |
/// | 2 | MOVE_TO | x, y, rotation, kick index when rotated |
/// | 3 | RANDOMIZER | randomizer id |
/// | 4 | MATRIX_MOD | list of (cell index, cell value) |
/// | 5 | WIDE_GARBAGE_ADD | lines, column, width, invert |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuxCode {
    Afk,
    BlockSet,
    MoveTo,
    Randomizer,
    MatrixMod,
    WideGarbageAdd,
}

impl AuxCode {
    pub const ALL: [AuxCode; 6] = [
        AuxCode::Afk,
        AuxCode::BlockSet,
        AuxCode::MoveTo,
        AuxCode::Randomizer,
        AuxCode::MatrixMod,
        AuxCode::WideGarbageAdd,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuxAction {
    Afk { away: bool },
    /// Switch the piece set used for subsequently spawned pieces.
    BlockSet { set: PieceSetId },
    /// Teleport the active piece. `kick` is set when it arrived by a
    /// rotation, holding the index of the kick that rotation used.
    MoveTo {
        x: i8,
        y: i8,
        rotation: Rotation,
        kick: Option<u8>,
    },
    Randomizer { id: u8 },
    /// Direct cell edits: `(cell index, cell value)`.
    MatrixMod { changes: Vec<(u8, u8)> },
    WideGarbageAdd {
        lines: u8,
        column: u8,
        width: u8,
        invert: bool,
    },
}

impl AuxAction {
    pub fn code(&self) -> AuxCode {
        match self {
            AuxAction::Afk { .. } => AuxCode::Afk,
            AuxAction::BlockSet { .. } => AuxCode::BlockSet,
            AuxAction::MoveTo { .. } => AuxCode::MoveTo,
            AuxAction::Randomizer { .. } => AuxCode::Randomizer,
            AuxAction::MatrixMod { .. } => AuxCode::MatrixMod,
            AuxAction::WideGarbageAdd { .. } => AuxCode::WideGarbageAdd,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    MoveLeft,
    MoveRight,
    DasLeft,
    DasRight,
    RotateLeft,
    RotateRight,
    Rotate180,
    HardDrop,
    SoftDrop { begin: bool },
    GravityStep { rows: u8 },
    HoldBlock,
    GarbageAdd { lines: u8, column: u8 },
    SolidGarbageAdd { lines: u8 },
    RedbarSet { height: u8 },
    ArrMove { direction: Direction },
    Aux(AuxAction),
}

impl ActionKind {
    pub fn code(&self) -> ActionCode {
        match self {
            ActionKind::MoveLeft => ActionCode::MoveLeft,
            ActionKind::MoveRight => ActionCode::MoveRight,
            ActionKind::DasLeft => ActionCode::DasLeft,
            ActionKind::DasRight => ActionCode::DasRight,
            ActionKind::RotateLeft => ActionCode::RotateLeft,
            ActionKind::RotateRight => ActionCode::RotateRight,
            ActionKind::Rotate180 => ActionCode::Rotate180,
            ActionKind::HardDrop => ActionCode::HardDrop,
            ActionKind::SoftDrop { .. } => ActionCode::SoftDropBeginEnd,
            ActionKind::GravityStep { .. } => ActionCode::GravityStep,
            ActionKind::HoldBlock => ActionCode::HoldBlock,
            ActionKind::GarbageAdd { .. } => ActionCode::GarbageAdd,
            ActionKind::SolidGarbageAdd { .. } => ActionCode::SolidGarbageAdd,
            ActionKind::RedbarSet { .. } => ActionCode::RedbarSet,
            ActionKind::ArrMove { .. } => ActionCode::ArrMove,
            ActionKind::Aux(_) => ActionCode::Aux,
        }
    }

    /// Whether the action came from the player's own input (as opposed to
    /// timers, the opponent or the engine).
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            ActionKind::MoveLeft
                | ActionKind::MoveRight
                | ActionKind::DasLeft
                | ActionKind::DasRight
                | ActionKind::RotateLeft
                | ActionKind::RotateRight
                | ActionKind::Rotate180
                | ActionKind::HardDrop
                | ActionKind::SoftDrop { .. }
                | ActionKind::HoldBlock
                | ActionKind::ArrMove { .. }
                | ActionKind::Aux(AuxAction::MoveTo { .. })
        )
    }
}

/// One recorded action with its timestamp in milliseconds since game start.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplayAction {
    pub t: u32,
    pub kind: ActionKind,
}

impl ReplayAction {
    pub fn new(t: u32, kind: ActionKind) -> Self {
        Self { t, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_codes_match_kinds() {
        assert_eq!(ActionKind::HardDrop.code().code(), 7);
        assert_eq!(ActionKind::GravityStep { rows: 1 }.code().code(), 9);
        assert_eq!(
            ActionKind::Aux(AuxAction::Randomizer { id: 0 }).code().code(),
            15
        );
        assert_eq!(
            AuxAction::WideGarbageAdd {
                lines: 1,
                column: 0,
                width: 1,
                invert: false
            }
            .code()
            .code(),
            5
        );
        assert_eq!(ActionCode::from_code(16), None);
        assert_eq!(AuxCode::from_code(6), None);
    }

    #[test]
    fn garbage_is_not_user_input() {
        assert!(!ActionKind::GarbageAdd { lines: 1, column: 0 }.is_user_input());
        assert!(!ActionKind::GravityStep { rows: 1 }.is_user_input());
        assert!(ActionKind::HoldBlock.is_user_input());
    }
}
