//! Bot protocol - JSON messages exchanged with a move-suggestion bot
//!
//! Every message carries its command in `type`. Boards are sent as rows from
//! the bottom of the matrix up, one letter per cell (`null` when empty).

use serde::{Deserialize, Serialize};

use blockstack_core::{Board, LiveDriver, Simulation};
use blockstack_engine::{Placement, SpinClaim};
use blockstack_types::{
    Cell, PieceKind, PieceRef, PieceSetId, Rotation, BOARD_HEIGHT, EMPTY_CELL,
};

// ============== Game -> Bot Messages ==============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotCommand {
    Start {
        hold: Option<char>,
        queue: Vec<char>,
        combo: u32,
        back_to_back: bool,
        board: Vec<Vec<Option<char>>>,
    },
    Stop,
    Suggest,
    NewPiece {
        piece: char,
    },
    Rules,
    Play {
        #[serde(rename = "move")]
        mv: Move,
    },
}

// ============== Bot -> Game Messages ==============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotMessage {
    Ready,
    Info {
        name: String,
        #[serde(default)]
        version: String,
    },
    Suggestion {
        moves: Vec<Move>,
    },
    Error {
        reason: String,
    },
}

/// Bot connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BotState {
    #[default]
    NoInfo,
    Initializing,
    Stopped,
    Ready,
    SendingMove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub location: Location,
    pub spin: Spin,
}

/// Piece and position of a move. `(x, y)` is the top-left corner of the
/// piece's bounding box, with `y` counted upward from the bottom row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub orientation: Orientation,
    #[serde(rename = "type")]
    pub piece: char,
    pub x: i8,
    pub y: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Orientation(pub Rotation);

impl<'de> Deserialize<'de> for Orientation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <&str>::deserialize(deserializer)?;
        Rotation::from_str(s)
            .map(Orientation)
            .ok_or_else(|| serde::de::Error::custom("invalid orientation"))
    }
}

impl Serialize for Orientation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spin {
    #[default]
    None,
    Mini,
    Full,
}

impl From<Spin> for SpinClaim {
    fn from(spin: Spin) -> Self {
        match spin {
            Spin::None => SpinClaim::None,
            Spin::Mini => SpinClaim::Mini,
            Spin::Full => SpinClaim::Full,
        }
    }
}

impl From<SpinClaim> for Spin {
    fn from(claim: SpinClaim) -> Self {
        match claim {
            SpinClaim::None => Spin::None,
            SpinClaim::Mini => Spin::Mini,
            SpinClaim::Full => Spin::Full,
        }
    }
}

/// Board row `y` as counted by the bot (bottom row is 0).
fn flip_row(y: i8) -> i8 {
    BOARD_HEIGHT as i8 - 1 - y
}

impl Move {
    /// Board-space placement, resolving the letter within `set`.
    pub fn to_placement(&self, set: PieceSetId) -> Option<Placement> {
        let kind = PieceKind::from_str(&self.location.piece.to_string())?;
        Some(Placement {
            piece: PieceRef::new(kind.id(), set),
            x: self.location.x,
            y: flip_row(self.location.y),
            rotation: self.location.orientation.0,
            spin: self.spin.into(),
        })
    }

    pub fn from_placement(placement: &Placement) -> Option<Self> {
        Some(Self {
            location: Location {
                orientation: Orientation(placement.rotation),
                piece: piece_letter(placement.piece)?,
                x: placement.x,
                y: flip_row(placement.y),
            },
            spin: placement.spin.into(),
        })
    }
}

/// Letter of a tetromino.
pub fn piece_letter(piece: PieceRef) -> Option<char> {
    piece.kind().and_then(|k| k.as_str().chars().next())
}

/// Letter of a board cell; garbage and solid rows are `G`.
pub fn cell_letter(cell: Cell) -> Option<char> {
    match cell {
        EMPTY_CELL => None,
        1 => Some('Z'),
        2 => Some('L'),
        3 => Some('O'),
        4 => Some('S'),
        5 => Some('I'),
        6 => Some('J'),
        7 => Some('T'),
        _ => Some('G'),
    }
}

/// Board rows from the bottom up.
pub fn board_rows(board: &Board) -> Vec<Vec<Option<char>>> {
    (0..BOARD_HEIGHT as usize)
        .rev()
        .map(|y| board.row(y).iter().map(|&c| cell_letter(c)).collect())
        .collect()
}

/// `start` message describing the current game.
pub fn start_command(sim: &Simulation<LiveDriver>) -> BotCommand {
    let previews = sim.ruleset().show_previews as usize;
    let mut queue: Vec<char> = sim
        .active()
        .and_then(|p| piece_letter(p.piece_ref()))
        .into_iter()
        .collect();
    queue.extend(sim.queue().take(previews).filter_map(|&p| piece_letter(p)));
    BotCommand::Start {
        hold: sim.hold_piece().and_then(piece_letter),
        queue,
        combo: sim.combo(),
        back_to_back: sim.back_to_back(),
        board: board_rows(sim.board()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstack_types::BOARD_WIDTH;

    #[test]
    fn commands_are_tagged_by_type() {
        let json = serde_json::to_string(&BotCommand::NewPiece { piece: 'T' }).unwrap();
        assert_eq!(json, r#"{"type":"new_piece","piece":"T"}"#);
        assert_eq!(
            serde_json::to_string(&BotCommand::Suggest).unwrap(),
            r#"{"type":"suggest"}"#
        );
    }

    #[test]
    fn suggestion_parses() {
        let raw = r#"{"type":"suggestion","moves":[{"location":{"orientation":"West","type":"T","x":0,"y":1},"spin":"full"}]}"#;
        let BotMessage::Suggestion { moves } = serde_json::from_str(raw).unwrap() else {
            panic!("expected a suggestion");
        };
        assert_eq!(moves[0].location.orientation, Orientation(Rotation::West));
        assert_eq!(moves[0].spin, Spin::Full);

        let placement = moves[0].to_placement(PieceSetId::Standard).unwrap();
        assert_eq!(placement.piece, PieceRef::standard(PieceKind::T));
        assert_eq!(placement.y, 19);
        assert_eq!(placement.spin, SpinClaim::Full);
        assert_eq!(Move::from_placement(&placement), Some(moves[0]));
    }

    #[test]
    fn unknown_orientation_is_rejected() {
        let raw = r#"{"orientation":"up","type":"T","x":0,"y":0}"#;
        assert!(serde_json::from_str::<Location>(raw).is_err());
    }

    #[test]
    fn board_rows_start_at_the_bottom() {
        let mut board = Board::new();
        let bottom = BOARD_HEIGHT as i8 - 1;
        board.set(0, bottom, PieceKind::T.color());
        board.set(0, bottom - 1, blockstack_types::GARBAGE_CELL);
        let rows = board_rows(&board);
        assert_eq!(rows.len(), BOARD_HEIGHT as usize);
        assert_eq!(rows[0].len(), BOARD_WIDTH as usize);
        assert_eq!(rows[0][0], Some('T'));
        assert_eq!(rows[1][0], Some('G'));
        assert_eq!(rows[2][0], None);
    }
}
