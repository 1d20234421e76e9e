//! Core types module - shared ids, enums and constant tables
//!
//! Everything in here is plain data with no external dependencies, so it can be
//! used by the simulation, the replay codecs and the bot/live adapters alike.
//!
//! # Board Dimensions
//!
//! The playfield is always 10 columns wide. It has 20 visible rows plus one
//! hidden "deadline" row above them:
//!
//! | Row index | Meaning |
//! |-----------|---------|
//! | `< 0` | Free space above the board (pieces may pass through, never lock there) |
//! | `0` | Hidden deadline row |
//! | `1..=20` | Visible rows, top to bottom |
//!
//! # Block Ids
//!
//! | Piece | Block id | Cell color id |
//! |-------|----------|---------------|
//! | I | 0 | 5 |
//! | O | 1 | 3 |
//! | T | 2 | 7 |
//! | L | 3 | 2 |
//! | J | 4 | 6 |
//! | S | 5 | 4 |
//! | Z | 6 | 1 |
//!
//! Cell value `8` is garbage and `9` is solid (unclearable) garbage.
//!
//! # Examples
//!
//! ```
//! use blockstack_types::{PieceKind, Rotation, RotationDelta, BOARD_WIDTH, BOARD_HEIGHT};
//!
//! let piece = PieceKind::from_str("t").unwrap();
//! assert_eq!(piece, PieceKind::T);
//! assert_eq!(piece.id(), 2);
//!
//! assert_eq!(Rotation::North.apply(RotationDelta::Cw), Rotation::East);
//! assert_eq!(Rotation::North.apply(RotationDelta::Half), Rotation::South);
//!
//! assert_eq!(BOARD_WIDTH, 10);
//! assert_eq!(BOARD_HEIGHT, 21);
//! ```

mod action;
mod scoring;

pub use action::{ActionCode, ActionKind, AuxAction, AuxCode, Direction, ReplayAction};
pub use scoring::{ScoringAction, DEFAULT_ATTACK_TABLE, DEFAULT_COMBO_TABLE};

/// Board width in cells (10 columns)
pub const BOARD_WIDTH: u8 = 10;

/// Number of visible rows
pub const VISIBLE_ROWS: u8 = 20;

/// Number of hidden rows above the visible area
pub const HIDDEN_ROWS: u8 = 1;

/// Total rows stored by the board (visible + hidden deadline row)
pub const BOARD_HEIGHT: u8 = VISIBLE_ROWS + HIDDEN_ROWS;

/// Total number of stored cells
pub const BOARD_CELLS: usize = BOARD_WIDTH as usize * BOARD_HEIGHT as usize;

/// DAS (Delayed Auto Shift) default in milliseconds.
pub const DEFAULT_DAS_MS: u32 = 133;

/// ARR (Auto Repeat Rate) default in milliseconds.
pub const DEFAULT_ARR_MS: u32 = 10;

/// Default lock delay triple: `(lockDelay, maxLockDelayWithoutLock, maxWithoutLock)`.
pub const DEFAULT_LOCK_DELAY_MS: [u32; 3] = [500, 5_000, 20_000];

/// Default delay before received garbage may materialize.
pub const DEFAULT_GARBAGE_DELAY_MS: u32 = 500;

/// Nominal frame duration used by frame-based DAS evaluation (60 FPS).
pub const FRAME_RATE: u32 = 60;

/// A single board cell: `0` is empty, anything else is a color/block id.
pub type Cell = u8;

/// Empty cell value
pub const EMPTY_CELL: Cell = 0;

/// Regular (clearable) garbage cell
pub const GARBAGE_CELL: Cell = 8;

/// Solid garbage cell; rows containing one are never cleared
pub const SOLID_CELL: Cell = 9;

/// The seven tetromino kinds, numbered by block id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PieceKind {
    I,
    O,
    T,
    L,
    J,
    S,
    Z,
}

impl PieceKind {
    pub const ALL: [PieceKind; 7] = [
        PieceKind::I,
        PieceKind::O,
        PieceKind::T,
        PieceKind::L,
        PieceKind::J,
        PieceKind::S,
        PieceKind::Z,
    ];

    /// Block id inside the standard piece set.
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Cell color id written into the board when this piece locks.
    pub fn color(self) -> Cell {
        match self {
            PieceKind::I => 5,
            PieceKind::O => 3,
            PieceKind::T => 7,
            PieceKind::L => 2,
            PieceKind::J => 6,
            PieceKind::S => 4,
            PieceKind::Z => 1,
        }
    }

    /// Parse piece kind from string (case-insensitive)
    ///
    /// # Examples
    ///
    /// ```
    /// use blockstack_types::PieceKind;
    ///
    /// assert_eq!(PieceKind::from_str("i"), Some(PieceKind::I));
    /// assert_eq!(PieceKind::from_str("Z"), Some(PieceKind::Z));
    /// assert_eq!(PieceKind::from_str("G"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "i" => Some(PieceKind::I),
            "o" => Some(PieceKind::O),
            "t" => Some(PieceKind::T),
            "l" => Some(PieceKind::L),
            "j" => Some(PieceKind::J),
            "s" => Some(PieceKind::S),
            "z" => Some(PieceKind::Z),
            _ => None,
        }
    }

    /// Uppercase letter, as used by the bot protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            PieceKind::I => "I",
            PieceKind::O => "O",
            PieceKind::T => "T",
            PieceKind::L => "L",
            PieceKind::J => "J",
            PieceKind::S => "S",
            PieceKind::Z => "Z",
        }
    }
}

/// Piece set ids.
///
/// | Id | Set | Notes |
/// |----|-----|-------|
/// | 0 | Standard | SRS, all-spin tables |
/// | 1 | Big | scale 2, moves 2 columns at a time |
/// | 2 | Big+ | scale 2, moves 1 column at a time |
/// | 3 | ARS | Arika rotation, 3 kicks |
/// | 4 | Pentomino | 18 pieces |
/// | 5 | M123 | mono/di/trominoes |
/// | 6 | All-29 | tetrominoes + M123 + pentominoes |
/// | 7 | Cultris II | 8 kicks |
/// | 8 | O-spin | 16 kicks |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PieceSetId {
    Standard,
    Big,
    BigPlus,
    Ars,
    Pentomino,
    M123,
    All29,
    Cultris2,
    OSpin,
}

impl PieceSetId {
    pub const ALL: [PieceSetId; 9] = [
        PieceSetId::Standard,
        PieceSetId::Big,
        PieceSetId::BigPlus,
        PieceSetId::Ars,
        PieceSetId::Pentomino,
        PieceSetId::M123,
        PieceSetId::All29,
        PieceSetId::Cultris2,
        PieceSetId::OSpin,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }
}

/// A piece identity without a position: block id within a piece set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PieceRef {
    pub id: u8,
    pub set: PieceSetId,
}

impl PieceRef {
    pub const fn new(id: u8, set: PieceSetId) -> Self {
        Self { id, set }
    }

    /// Standard-set reference for a tetromino kind.
    pub fn standard(kind: PieceKind) -> Self {
        Self::new(kind.id(), PieceSetId::Standard)
    }

    /// Tetromino kind, for sets whose first seven ids are the tetrominoes.
    pub fn kind(self) -> Option<PieceKind> {
        match self.set {
            PieceSetId::Pentomino | PieceSetId::M123 => None,
            _ => PieceKind::from_id(self.id),
        }
    }
}

/// Rotation states (spawn, CW, 180, CCW)
///
/// The rotation cycle goes: North → East → South → West → North
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    North,
    East,
    South,
    West,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::North,
        Rotation::East,
        Rotation::South,
        Rotation::West,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index & 3) as usize]
    }

    /// Rotate clockwise (90°)
    ///
    /// # Examples
    ///
    /// ```
    /// use blockstack_types::Rotation;
    ///
    /// assert_eq!(Rotation::North.rotate_cw(), Rotation::East);
    /// assert_eq!(Rotation::West.rotate_cw(), Rotation::North);
    /// ```
    pub fn rotate_cw(&self) -> Self {
        self.apply(RotationDelta::Cw)
    }

    /// Rotate counter-clockwise (-90°)
    pub fn rotate_ccw(&self) -> Self {
        self.apply(RotationDelta::Ccw)
    }

    pub fn apply(self, delta: RotationDelta) -> Self {
        Self::from_index((self.index() as i8 + delta.value()).rem_euclid(4) as u8)
    }

    /// Delta that turns `self` into `to`, if they differ.
    pub fn delta_to(self, to: Rotation) -> Option<RotationDelta> {
        match (to.index() as i8 - self.index() as i8).rem_euclid(4) {
            1 => Some(RotationDelta::Cw),
            2 => Some(RotationDelta::Half),
            3 => Some(RotationDelta::Ccw),
            _ => None,
        }
    }

    /// Parse rotation from string
    ///
    /// Accepts full names or single letters (case-insensitive):
    /// "north" | "n", "east" | "e", "south" | "s", "west" | "w"
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "north" | "n" => Some(Rotation::North),
            "east" | "e" => Some(Rotation::East),
            "south" | "s" => Some(Rotation::South),
            "west" | "w" => Some(Rotation::West),
            _ => None,
        }
    }

    /// Convert to lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            Rotation::North => "north",
            Rotation::East => "east",
            Rotation::South => "south",
            Rotation::West => "west",
        }
    }
}

/// Rotation request: `-1` (CCW), `+1` (CW) or `2` (180°).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationDelta {
    Ccw,
    Cw,
    Half,
}

impl RotationDelta {
    pub fn value(self) -> i8 {
        match self {
            RotationDelta::Ccw => -1,
            RotationDelta::Cw => 1,
            RotationDelta::Half => 2,
        }
    }

    pub fn from_value(value: i8) -> Option<Self> {
        match value {
            -1 => Some(RotationDelta::Ccw),
            1 => Some(RotationDelta::Cw),
            2 => Some(RotationDelta::Half),
            _ => None,
        }
    }
}

/// Spin classification of a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpinKind {
    #[default]
    None,
    TSpin,
    TSpinMini,
    AllSpin,
    AllSpinMini,
}

impl SpinKind {
    pub fn is_spin(self) -> bool {
        self != SpinKind::None
    }

    pub fn is_mini(self) -> bool {
        matches!(self, SpinKind::TSpinMini | SpinKind::AllSpinMini)
    }

    /// Bot protocol spelling: `none`, `mini` or `full`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpinKind::None => "none",
            SpinKind::TSpinMini | SpinKind::AllSpinMini => "mini",
            SpinKind::TSpin | SpinKind::AllSpin => "full",
        }
    }
}

/// Game modes. Replays pack the mode into the upper 16 bits of `m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GameMode {
    #[default]
    Live,
    Sprint,
    Practice,
    CheeseRace,
    Survival,
    Ultra,
    Maps,
    Tsd20,
    PcMode,
    Usermode,
    Bot,
}

impl GameMode {
    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn from_id(id: u16) -> Option<Self> {
        use GameMode::*;
        [
            Live, Sprint, Practice, CheeseRace, Survival, Ultra, Maps, Tsd20, PcMode, Usermode,
            Bot,
        ]
        .get(id as usize)
        .copied()
    }

    /// Pack with a submode into the replay `m` field.
    pub fn pack(self, submode: u16) -> u32 {
        ((self.id() as u32) << 16) | submode as u32
    }

    pub fn unpack(m: u32) -> Option<(Self, u16)> {
        Some((Self::from_id((m >> 16) as u16)?, (m & 0xFFFF) as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_ids_follow_catalog_order() {
        let ids: Vec<u8> = PieceKind::ALL.iter().map(|k| k.id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(PieceKind::from_id(6), Some(PieceKind::Z));
        assert_eq!(PieceKind::from_id(7), None);
    }

    #[test]
    fn rotation_delta_roundtrip() {
        for from in Rotation::ALL {
            for delta in [RotationDelta::Ccw, RotationDelta::Cw, RotationDelta::Half] {
                let to = from.apply(delta);
                assert_eq!(from.delta_to(to), Some(delta));
            }
            assert_eq!(from.delta_to(from), None);
        }
    }

    #[test]
    fn mode_packing() {
        let m = GameMode::Sprint.pack(3);
        assert_eq!(m, (1 << 16) | 3);
        assert_eq!(GameMode::unpack(m), Some((GameMode::Sprint, 3)));
    }

    #[test]
    fn piece_ref_kind_only_for_tetromino_sets() {
        assert_eq!(
            PieceRef::new(2, PieceSetId::Cultris2).kind(),
            Some(PieceKind::T)
        );
        assert_eq!(PieceRef::new(2, PieceSetId::Pentomino).kind(), None);
    }
}
