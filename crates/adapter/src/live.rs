//! Live transport shapes: board snapshots, attacks and inbound events.
//!
//! Snapshots go over the wire packed: the red bar in one byte, the row count
//! in five bits, then every cell of every row in four bits, top row first.

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use blockstack_core::{AttackEvent, Board, GarbageEvent, LiveDriver, Simulation};
use blockstack_replay::bitstream::{BitReader, BitWriter};
use blockstack_replay::CodecError;
use blockstack_types::{Cell, BOARD_HEIGHT, BOARD_WIDTH, SOLID_CELL};

const RED_BAR_BITS: u32 = 8;
const HEIGHT_BITS: u32 = 5;
const CELL_BITS: u32 = 4;

type Row = [Cell; BOARD_WIDTH as usize];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiveError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("snapshot has {0} rows, at most {max} allowed", max = BOARD_HEIGHT)]
    TooTall(u8),
    #[error("invalid cell {cell} at row {row}, column {column}")]
    InvalidCell { row: usize, column: usize, cell: u32 },
}

/// Board occupancy as seen by an opponent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSnapshot {
    /// Rows from the top; the hidden row is included when present.
    pub rows: ArrayVec<Row, { BOARD_HEIGHT as usize }>,
    /// Pending garbage lines.
    pub red_bar: u8,
}

impl LiveSnapshot {
    pub fn from_board(board: &Board, red_bar: u8) -> Self {
        let rows = board
            .rows()
            .map(|row| {
                let mut cells = [0; BOARD_WIDTH as usize];
                cells.copy_from_slice(row);
                cells
            })
            .collect();
        Self { rows, red_bar }
    }

    pub fn capture(sim: &Simulation<LiveDriver>) -> Self {
        Self::from_board(sim.board(), sim.red_bar())
    }

    pub fn to_binary(&self) -> Vec<u8> {
        let mut writer = BitWriter::new();
        writer.push_bits(self.red_bar as u32, RED_BAR_BITS);
        writer.push_bits(self.rows.len() as u32, HEIGHT_BITS);
        for row in &self.rows {
            for &cell in row {
                writer.push_bits(cell.min(SOLID_CELL) as u32, CELL_BITS);
            }
        }
        writer.into_bytes()
    }

    /// Occupancy masks of every row, top first.
    pub fn row_masks(&self) -> impl Iterator<Item = u16> + '_ {
        self.rows.iter().map(|row| row_to_binary(row))
    }
}

/// Unpack a snapshot written by [`LiveSnapshot::to_binary`].
pub fn parse_binary_matrix(bytes: &[u8]) -> Result<LiveSnapshot, LiveError> {
    let mut reader = BitReader::new(bytes);
    let red_bar = reader.pull_u8(RED_BAR_BITS)?;
    let height = reader.pull_u8(HEIGHT_BITS)?;
    if height > BOARD_HEIGHT {
        return Err(LiveError::TooTall(height));
    }
    let mut rows = ArrayVec::new();
    for row in 0..height as usize {
        let mut cells = [0; BOARD_WIDTH as usize];
        for (column, cell) in cells.iter_mut().enumerate() {
            let value = reader.pull_bits(CELL_BITS)?;
            if value > SOLID_CELL as u32 {
                return Err(LiveError::InvalidCell {
                    row,
                    column,
                    cell: value,
                });
            }
            *cell = value as Cell;
        }
        rows.push(cells);
    }
    Ok(LiveSnapshot { rows, red_bar })
}

/// Occupancy of one row, column 0 in the lowest bit.
pub fn row_to_binary(row: &[Cell]) -> u16 {
    row.iter()
        .take(BOARD_WIDTH as usize)
        .enumerate()
        .filter(|&(_, &cell)| cell != 0)
        .fold(0, |mask, (x, _)| mask | 1 << x)
}

/// Outbound attack notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackMessage {
    pub attack_lines: u8,
    pub combo_attack: u8,
    /// Scoring action code of the clear.
    #[serde(rename = "type")]
    pub kind: u8,
    pub b2b: bool,
    pub combo: u32,
}

impl From<&AttackEvent> for AttackMessage {
    fn from(event: &AttackEvent) -> Self {
        Self {
            attack_lines: event.attack,
            combo_attack: event.combo_attack,
            kind: event.kind.code(),
            b2b: event.b2b,
            combo: event.combo,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveInbound {
    GarbageAdd { lines: u8 },
    OpponentSnapshot(LiveSnapshot),
}

impl LiveInbound {
    /// Garbage for the local simulation, if this event carries any.
    pub fn garbage(&self) -> Option<GarbageEvent> {
        match *self {
            LiveInbound::GarbageAdd { lines } if lines > 0 => {
                Some(GarbageEvent::Incoming { lines })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstack_types::{ScoringAction, GARBAGE_CELL};

    fn board() -> Board {
        let mut board = Board::new();
        let bottom = BOARD_HEIGHT as i8 - 1;
        for x in 1..BOARD_WIDTH as i8 {
            board.set(x, bottom, GARBAGE_CELL);
        }
        board.set(4, bottom - 1, 7);
        board
    }

    #[test]
    fn snapshot_packs_four_bits_per_cell() {
        let snapshot = LiveSnapshot::from_board(&board(), 3);
        let bytes = snapshot.to_binary();
        assert_eq!(bytes.len(), (8 + 5 + 4 * 210 + 7) / 8);
        assert_eq!(parse_binary_matrix(&bytes), Ok(snapshot));
    }

    #[test]
    fn row_masks_mark_filled_columns() {
        let snapshot = LiveSnapshot::from_board(&board(), 0);
        let masks: Vec<u16> = snapshot.row_masks().collect();
        assert_eq!(masks[20], 0b11_1111_1110);
        assert_eq!(masks[19], 1 << 4);
        assert_eq!(masks[0], 0);
    }

    #[test]
    fn truncated_snapshot_is_rejected() {
        let bytes = LiveSnapshot::from_board(&board(), 0).to_binary();
        assert!(matches!(
            parse_binary_matrix(&bytes[..20]),
            Err(LiveError::Codec(CodecError::Truncated { .. }))
        ));
    }

    #[test]
    fn out_of_range_cell_is_rejected() {
        let mut writer = BitWriter::new();
        writer.push_bits(0, RED_BAR_BITS);
        writer.push_bits(1, HEIGHT_BITS);
        writer.push_bits(12, CELL_BITS);
        for _ in 1..BOARD_WIDTH {
            writer.push_bits(0, CELL_BITS);
        }
        assert_eq!(
            parse_binary_matrix(&writer.into_bytes()),
            Err(LiveError::InvalidCell {
                row: 0,
                column: 0,
                cell: 12
            })
        );
    }

    #[test]
    fn attack_message_shape() {
        let event = AttackEvent {
            attack: 4,
            combo_attack: 1,
            kind: ScoringAction::TSpinDouble,
            b2b: true,
            combo: 2,
        };
        let json = serde_json::to_value(AttackMessage::from(&event)).unwrap();
        assert_eq!(json["attackLines"], 4);
        assert_eq!(json["comboAttack"], 1);
        assert_eq!(json["type"], ScoringAction::TSpinDouble.code());
        assert_eq!(json["b2b"], true);
    }

    #[test]
    fn only_nonzero_garbage_reaches_the_game() {
        assert_eq!(
            LiveInbound::GarbageAdd { lines: 2 }.garbage(),
            Some(GarbageEvent::Incoming { lines: 2 })
        );
        assert_eq!(LiveInbound::GarbageAdd { lines: 0 }.garbage(), None);
    }
}
