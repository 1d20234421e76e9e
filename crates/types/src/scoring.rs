//! Scoring action codes and their constant tables.
//!
//! | Code | Action | Points | B2B bonus | Attack index |
//! |------|--------|--------|-----------|--------------|
//! | 0 | SOFT_DROP | 1 | - | - |
//! | 1 | HARD_DROP | 2 | - | - |
//! | 2 | CLEAR1 | 100 | - | 1 |
//! | 3 | CLEAR2 | 300 | - | 2 |
//! | 4 | CLEAR3 | 500 | - | 3 |
//! | 5 | CLEAR4 | 800 | 400 | 4 |
//! | 6 | TSPIN_MINI | 100 | - | - |
//! | 7 | TSPIN | 400 | - | - |
//! | 8 | TSPIN_MINI_SINGLE | 200 | 100 | 8 |
//! | 9 | TSPIN_SINGLE | 800 | 400 | 7 |
//! | 10 | TSPIN_DOUBLE | 1200 | 600 | 5 |
//! | 11 | TSPIN_TRIPLE | 1600 | 800 | 6 |
//! | 12 | PERFECT_CLEAR | 300 | - | 9 |
//! | 13 | COMBO | 50 | - | - |
//! | 14 | CLEAR5 | 1600 | 800 | 6 |

/// Default lines-attack table.
///
/// Indices: 0 zero, 1 single, 2 double, 3 triple, 4 four-line clear, 5 TSD,
/// 6 TST, 7 TSS, 8 mini TSS, 9 perfect clear, 10 back-to-back bonus.
pub const DEFAULT_ATTACK_TABLE: [u8; 11] = [0, 0, 1, 2, 4, 4, 6, 2, 0, 10, 1];

/// Default combo-attack table, indexed by `min(combo - 1, 12)` where `combo`
/// counts consecutive clearing pieces (the first clear is combo 1).
pub const DEFAULT_COMBO_TABLE: [u8; 13] = [0, 0, 1, 1, 1, 2, 2, 3, 3, 4, 4, 4, 5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoringAction {
    SoftDrop,
    HardDrop,
    Clear1,
    Clear2,
    Clear3,
    Clear4,
    TSpinMini,
    TSpin,
    TSpinMiniSingle,
    TSpinSingle,
    TSpinDouble,
    TSpinTriple,
    PerfectClear,
    Combo,
    Clear5,
}

impl ScoringAction {
    pub const ALL: [ScoringAction; 15] = [
        ScoringAction::SoftDrop,
        ScoringAction::HardDrop,
        ScoringAction::Clear1,
        ScoringAction::Clear2,
        ScoringAction::Clear3,
        ScoringAction::Clear4,
        ScoringAction::TSpinMini,
        ScoringAction::TSpin,
        ScoringAction::TSpinMiniSingle,
        ScoringAction::TSpinSingle,
        ScoringAction::TSpinDouble,
        ScoringAction::TSpinTriple,
        ScoringAction::PerfectClear,
        ScoringAction::Combo,
        ScoringAction::Clear5,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Base points for one occurrence.
    pub fn points(self) -> u32 {
        match self {
            ScoringAction::SoftDrop => 1,
            ScoringAction::HardDrop => 2,
            ScoringAction::Clear1 => 100,
            ScoringAction::Clear2 => 300,
            ScoringAction::Clear3 => 500,
            ScoringAction::Clear4 => 800,
            ScoringAction::TSpinMini => 100,
            ScoringAction::TSpin => 400,
            ScoringAction::TSpinMiniSingle => 200,
            ScoringAction::TSpinSingle => 800,
            ScoringAction::TSpinDouble => 1200,
            ScoringAction::TSpinTriple => 1600,
            ScoringAction::PerfectClear => 300,
            ScoringAction::Combo => 50,
            ScoringAction::Clear5 => 1600,
        }
    }

    /// Extra points when this clear continues a back-to-back chain.
    ///
    /// `Some` exactly for the back-to-back eligible clears.
    pub fn b2b_bonus(self) -> Option<u32> {
        match self {
            ScoringAction::Clear4 => Some(400),
            ScoringAction::Clear5 => Some(800),
            ScoringAction::TSpinMiniSingle => Some(100),
            ScoringAction::TSpinSingle => Some(400),
            ScoringAction::TSpinDouble => Some(600),
            ScoringAction::TSpinTriple => Some(800),
            _ => None,
        }
    }

    pub fn is_b2b_eligible(self) -> bool {
        self.b2b_bonus().is_some()
    }

    /// Index into the lines-attack table.
    pub fn attack_index(self) -> Option<usize> {
        match self {
            ScoringAction::Clear1 => Some(1),
            ScoringAction::Clear2 => Some(2),
            ScoringAction::Clear3 => Some(3),
            ScoringAction::Clear4 => Some(4),
            ScoringAction::TSpinMiniSingle => Some(8),
            ScoringAction::TSpinSingle => Some(7),
            ScoringAction::TSpinDouble => Some(5),
            ScoringAction::TSpinTriple => Some(6),
            ScoringAction::PerfectClear => Some(9),
            ScoringAction::Clear5 => Some(6),
            _ => None,
        }
    }

    /// Replay2 score entries carry a count only for these actions.
    pub fn has_count(self) -> bool {
        matches!(self, ScoringAction::SoftDrop | ScoringAction::Combo)
    }
}
