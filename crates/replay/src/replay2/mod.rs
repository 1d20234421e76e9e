//! Replay2 frame format
//!
//! A replay is a sequence of frames. FULL frames carry the whole visible state
//! (matrix, current block, hold, queue) and are forced at least every
//! [`FULL_FRAME_INTERVAL`] ms so a player can seek without decoding from the
//! start. DIFF frames carry only the properties that changed since the
//! previous frame, flagged in a presence bitmask.
//!
//! # Frame layout
//!
//! | Field | Bits |
//! |-------|------|
//! | frame type (0 FULL, 1 DIFF) | 1 |
//! | FULL: absolute timestamp | 32 |
//! | DIFF: delta from the previous frame, tier tag + value | 2 + 6/9/15 |
//! | property presence mask, bit `n` for property `n` | 12 |
//! | present properties in id order | ... |

mod decoder;
mod encoder;
mod frame;
mod state;

use serde::{Deserialize, Serialize};

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{CodecError, CodecResult};
use crate::piece::{pull_position, push_position, Position};

pub use decoder::{decode, seek, states, Replay2Decoder};
pub use encoder::Replay2Encoder;
pub use frame::{CaptionChange, Frame, FrameType, MatrixChange, RulesetProps, ScoreEntry};
pub use state::{CurrentBlock, ReplayState};

pub const DIFF_FRAME_TIMESTAMP_BITS: u32 = 15;
pub const DIFF_FRAME_MAX_TIME: u32 = 32_767;
pub const FULL_FRAME_INTERVAL: u32 = 32_767;

pub const TIMESTAMP_TAG_BITS: u32 = 2;
pub const TIMESTAMP_SMALL_BITS: u32 = 6;
pub const TIMESTAMP_MEDIUM_BITS: u32 = 9;
pub const TIMESTAMP_LARGE_BITS: u32 = DIFF_FRAME_TIMESTAMP_BITS;
pub const TIMESTAMP_SMALL_MAX: u32 = 63;
pub const TIMESTAMP_MEDIUM_MAX: u32 = 511;
pub const TIMESTAMP_LARGE_MAX: u32 = 32_767;

pub const FULL_TIMESTAMP_BITS: u32 = 32;
pub const PROPERTY_MASK_BITS: u32 = 12;

/// Caption slots.
pub const CAPTION_LREM: u8 = 0;
pub const CAPTION_SPRINT_INFO: u8 = 1;
/// Captions longer than this many bytes are cut.
pub const MAX_CAPTION_BYTES: usize = 255;

pub const CONFIG_VERSION: u32 = 4;

/// Frame properties, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Matrix,
    MatrixChange,
    MatrixBitmask,
    CurrentBlock,
    CurrentBlockState,
    HoldBlock,
    Queue,
    QueueShift,
    Ruleset,
    SoundEffect,
    CaptionChange,
    Score,
}

impl Property {
    pub const ALL: [Property; 12] = [
        Property::Matrix,
        Property::MatrixChange,
        Property::MatrixBitmask,
        Property::CurrentBlock,
        Property::CurrentBlockState,
        Property::HoldBlock,
        Property::Queue,
        Property::QueueShift,
        Property::Ruleset,
        Property::SoundEffect,
        Property::CaptionChange,
        Property::Score,
    ];

    /// Present in every FULL frame.
    pub const FULL_REQUIRED: [Property; 4] = [
        Property::Matrix,
        Property::CurrentBlock,
        Property::HoldBlock,
        Property::Queue,
    ];

    /// Never present in a FULL frame.
    pub const FULL_BANNED: [Property; 4] = [
        Property::MatrixChange,
        Property::MatrixBitmask,
        Property::CurrentBlockState,
        Property::QueueShift,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn bit(self) -> u16 {
        1 << self.id()
    }
}

/// How the current block moved since the previous frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionDelta {
    Left,
    Right,
    Down,
    RotateCw,
    RotateCcw,
    Rotate180,
    Absolute(Position),
}

pub const POSITION_DELTA_BITS: u32 = 3;
const POSITION_RESERVED: u8 = 6;
const POSITION_ABSOLUTE: u8 = 7;

impl PositionDelta {
    /// Single-step code when one exists, otherwise an absolute position.
    pub fn between(before: Position, after: Position) -> Self {
        let dx = after.x as i16 - before.x as i16;
        let dy = after.y as i16 - before.y as i16;
        let same_place = dx == 0 && dy == 0;
        if after.rotation == before.rotation {
            match (dx, dy) {
                (-1, 0) => return PositionDelta::Left,
                (1, 0) => return PositionDelta::Right,
                (0, 1) => return PositionDelta::Down,
                _ => {}
            }
        } else if same_place {
            if after.rotation == before.rotation.rotate_cw() {
                return PositionDelta::RotateCw;
            }
            if after.rotation == before.rotation.rotate_ccw() {
                return PositionDelta::RotateCcw;
            }
            return PositionDelta::Rotate180;
        }
        PositionDelta::Absolute(after)
    }

    pub fn apply(self, from: Position) -> Position {
        match self {
            PositionDelta::Left => Position {
                x: from.x - 1,
                ..from
            },
            PositionDelta::Right => Position {
                x: from.x + 1,
                ..from
            },
            PositionDelta::Down => Position {
                y: from.y + 1,
                ..from
            },
            PositionDelta::RotateCw => Position {
                rotation: from.rotation.rotate_cw(),
                ..from
            },
            PositionDelta::RotateCcw => Position {
                rotation: from.rotation.rotate_ccw(),
                ..from
            },
            PositionDelta::Rotate180 => Position {
                rotation: from.rotation.rotate_cw().rotate_cw(),
                ..from
            },
            PositionDelta::Absolute(position) => position,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PositionDelta::Left => 0,
            PositionDelta::Right => 1,
            PositionDelta::Down => 2,
            PositionDelta::RotateCw => 3,
            PositionDelta::RotateCcw => 4,
            PositionDelta::Rotate180 => 5,
            PositionDelta::Absolute(_) => POSITION_ABSOLUTE,
        }
    }

    pub fn write(self, writer: &mut BitWriter) -> CodecResult<()> {
        writer.push_bits(self.code() as u32, POSITION_DELTA_BITS);
        if let PositionDelta::Absolute(position) = self {
            push_position(writer, position)?;
        }
        Ok(())
    }

    pub fn read(reader: &mut BitReader<'_>) -> CodecResult<Self> {
        Ok(match reader.pull_u8(POSITION_DELTA_BITS)? {
            0 => PositionDelta::Left,
            1 => PositionDelta::Right,
            2 => PositionDelta::Down,
            3 => PositionDelta::RotateCw,
            4 => PositionDelta::RotateCcw,
            5 => PositionDelta::Rotate180,
            POSITION_ABSOLUTE => PositionDelta::Absolute(pull_position(reader)?),
            code => {
                debug_assert_eq!(code, POSITION_RESERVED);
                return Err(CodecError::InvalidCode {
                    what: "position delta",
                    code: code as u32,
                });
            }
        })
    }
}

/// Write a frame time delta with the smallest tier that holds it.
pub fn push_timestamp(writer: &mut BitWriter, delta: u32) -> CodecResult<()> {
    let (tag, bits) = match delta {
        0..=TIMESTAMP_SMALL_MAX => (0, TIMESTAMP_SMALL_BITS),
        0..=TIMESTAMP_MEDIUM_MAX => (1, TIMESTAMP_MEDIUM_BITS),
        0..=TIMESTAMP_LARGE_MAX => (2, TIMESTAMP_LARGE_BITS),
        _ => {
            return Err(CodecError::ValueOutOfRange {
                field: "frame time delta",
                value: delta as i64,
                bits: TIMESTAMP_LARGE_BITS,
            })
        }
    };
    writer.push_bits(tag, TIMESTAMP_TAG_BITS);
    writer.push_bits(delta, bits);
    Ok(())
}

pub fn pull_timestamp(reader: &mut BitReader<'_>) -> CodecResult<u32> {
    let tag = reader.pull_bits(TIMESTAMP_TAG_BITS)?;
    let (bits, max) = match tag {
        0 => (TIMESTAMP_SMALL_BITS, TIMESTAMP_SMALL_MAX),
        1 => (TIMESTAMP_MEDIUM_BITS, TIMESTAMP_MEDIUM_MAX),
        2 => (TIMESTAMP_LARGE_BITS, TIMESTAMP_LARGE_MAX),
        _ => {
            return Err(CodecError::InvalidCode {
                what: "timestamp tier",
                code: tag,
            })
        }
    };
    let value = reader.pull_bits(bits)?;
    if value > max {
        return Err(CodecError::ValueOutOfRange {
            field: "frame time delta",
            value: value as i64,
            bits,
        });
    }
    Ok(value)
}

/// Replay2 header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replay2Config {
    pub v: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_drop_id: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_start: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_end: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bs: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub se: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub das: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arr: Option<u32>,
}

impl Default for Replay2Config {
    fn default() -> Self {
        Self {
            v: CONFIG_VERSION,
            soft_drop_id: None,
            game_start: None,
            game_end: None,
            seed: None,
            m: None,
            bs: None,
            se: None,
            das: None,
            arr: None,
        }
    }
}
