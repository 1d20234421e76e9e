//! Legacy action stream
//!
//! Each record is a time delta, a 4-bit action code and the action's payload:
//!
//! | Field | Bits |
//! |-------|------|
//! | time delta (4095 escapes to a 24-bit delta) | 12 (+24) |
//! | action code | 4 |
//! | SOFT_DROP_BEGIN_END begin flag | 1 |
//! | GRAVITY_STEP rows | 5 |
//! | GARBAGE_ADD lines, hole column | 5, 4 |
//! | SGARBAGE_ADD lines | 5 |
//! | REDBAR_SET height | 8 |
//! | ARR_MOVE direction (0 left) | 1 |
//! | AUX code | 4 |
//! | AFK away flag | 1 |
//! | BLOCK_SET set id | 4 |
//! | MOVE_TO x+8, y+16, rotation, rotated flag (then kick index) | 5, 6, 2, 1 (+4) |
//! | RANDOMIZER id | 4 |
//! | MATRIX_MOD count, then (cell index, value) | 8, (8, 4)* |
//! | WIDE_GARBAGE_ADD lines, column, width, invert | 5, 4, 4, 1 |
//!
//! Decoding stops once fewer bits than a record header remain.

use serde::{Deserialize, Serialize};

use blockstack_types::{
    ActionCode, ActionKind, AuxAction, AuxCode, Direction, GameMode, PieceSetId, ReplayAction,
};

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{CodecError, CodecResult};
use crate::piece::{pull_position, pull_set, push_position, Position, PIECE_SET_BITS};

pub const TIME_BITS: u32 = 12;
pub const TIME_ESCAPE: u32 = (1 << TIME_BITS) - 1;
pub const LONG_TIME_BITS: u32 = 24;
pub const ACTION_BITS: u32 = 4;
pub const AUX_BITS: u32 = 4;
pub const HEADER_BITS: usize = (TIME_BITS + ACTION_BITS) as usize;

/// Current legacy replay version.
pub const LEGACY_VERSION: u32 = 3;

const LINES_BITS: u32 = 5;
const COLUMN_BITS: u32 = 4;
const RED_BAR_BITS: u32 = 8;
const RANDOMIZER_BITS: u32 = 4;
const MOD_COUNT_BITS: u32 = 8;
const MOD_INDEX_BITS: u32 = 8;
const MOD_VALUE_BITS: u32 = 4;
const WIDTH_BITS: u32 = 4;
const KICK_BITS: u32 = 4;

/// Replay header stored next to the action stream (`c`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayMeta {
    pub v: u32,
    pub soft_drop_id: u8,
    /// Wall clock start, ms since the epoch.
    pub game_start: u64,
    pub game_end: u64,
    pub seed: String,
    /// Mode in the upper 16 bits, submode in the lower.
    pub m: u32,
    /// Piece set.
    pub bs: u8,
    /// Sound effect set.
    pub se: u8,
    pub das: u32,
    pub arr: u32,
    /// Ruleset family.
    pub r: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
}

impl ReplayMeta {
    pub fn new(seed: impl Into<String>, mode: GameMode) -> Self {
        Self {
            v: LEGACY_VERSION,
            soft_drop_id: 0,
            game_start: 0,
            game_end: 0,
            seed: seed.into(),
            m: mode.pack(0),
            bs: 0,
            se: 0,
            das: blockstack_types::DEFAULT_DAS_MS,
            arr: blockstack_types::DEFAULT_ARR_MS,
            r: 0,
            map: None,
        }
    }

    pub fn mode(&self) -> Option<GameMode> {
        GameMode::unpack(self.m).map(|(mode, _)| mode)
    }

    pub fn block_set(&self) -> Option<PieceSetId> {
        PieceSetId::from_id(self.bs)
    }
}

/// A decoded legacy replay.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyReplay {
    pub meta: ReplayMeta,
    pub actions: Vec<ReplayAction>,
}

impl LegacyReplay {
    pub fn new(meta: ReplayMeta, actions: Vec<ReplayAction>) -> Self {
        Self { meta, actions }
    }

    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        encode_actions(&self.actions)
    }

    pub fn decode(meta: ReplayMeta, bytes: &[u8]) -> CodecResult<Self> {
        Ok(Self {
            meta,
            actions: decode_actions(bytes)?,
        })
    }

    /// Game length: the header's wall clock span, or the last action time
    /// when the header carries none.
    pub fn game_time_ms(&self) -> u32 {
        let span = self.meta.game_end.saturating_sub(self.meta.game_start);
        if span > 0 {
            span.min(u32::MAX as u64) as u32
        } else {
            self.actions.last().map_or(0, |a| a.t)
        }
    }

    pub fn has_user_inputs(&self) -> bool {
        self.actions.iter().any(|a| a.kind.is_user_input())
    }
}

/// Append-only legacy encoder.
#[derive(Debug, Clone, Default)]
pub struct LegacyEncoder {
    writer: BitWriter,
    last_t: u32,
    count: usize,
}

impl LegacyEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn push(&mut self, action: &ReplayAction) -> CodecResult<()> {
        if action.t < self.last_t {
            return Err(CodecError::TimeReversed {
                t: action.t,
                previous: self.last_t,
            });
        }
        // A failed action is rolled back so the stream stays decodable.
        let mark = self.writer.len_bits();
        if let Err(err) = self.push_record(action) {
            self.writer.truncate(mark);
            return Err(err);
        }
        self.last_t = action.t;
        self.count += 1;
        Ok(())
    }

    fn push_record(&mut self, action: &ReplayAction) -> CodecResult<()> {
        let delta = action.t - self.last_t;
        if delta >= TIME_ESCAPE {
            self.writer.push_bits(TIME_ESCAPE, TIME_BITS);
            self.writer
                .push_checked("time delta", delta, LONG_TIME_BITS)?;
        } else {
            self.writer.push_bits(delta, TIME_BITS);
        }
        self.writer
            .push_bits(action.kind.code().code() as u32, ACTION_BITS);
        push_payload(&mut self.writer, &action.kind)
    }

    pub fn finish(self) -> Vec<u8> {
        self.writer.into_bytes()
    }
}

pub fn encode_actions(actions: &[ReplayAction]) -> CodecResult<Vec<u8>> {
    let mut encoder = LegacyEncoder::new();
    for action in actions {
        encoder.push(action)?;
    }
    Ok(encoder.finish())
}

pub fn decode_actions(bytes: &[u8]) -> CodecResult<Vec<ReplayAction>> {
    let mut reader = BitReader::new(bytes);
    let mut actions = Vec::new();
    let mut t = 0u32;
    while reader.remaining() >= HEADER_BITS {
        let mut delta = reader.pull_bits(TIME_BITS)?;
        if delta == TIME_ESCAPE {
            delta = reader.pull_bits(LONG_TIME_BITS)?;
        }
        t = t.saturating_add(delta);
        let code = reader.pull_u8(ACTION_BITS)?;
        let code = ActionCode::from_code(code).ok_or(CodecError::InvalidCode {
            what: "action",
            code: code as u32,
        })?;
        let kind = pull_payload(&mut reader, code)?;
        actions.push(ReplayAction::new(t, kind));
    }
    Ok(actions)
}

fn push_payload(writer: &mut BitWriter, kind: &ActionKind) -> CodecResult<()> {
    match kind {
        ActionKind::SoftDrop { begin } => writer.push_bool(*begin),
        ActionKind::GravityStep { rows } => writer.push_checked("rows", *rows as u32, LINES_BITS)?,
        ActionKind::GarbageAdd { lines, column } => {
            writer.push_checked("lines", *lines as u32, LINES_BITS)?;
            writer.push_checked("column", *column as u32, COLUMN_BITS)?;
        }
        ActionKind::SolidGarbageAdd { lines } => {
            writer.push_checked("lines", *lines as u32, LINES_BITS)?
        }
        ActionKind::RedbarSet { height } => writer.push_bits(*height as u32, RED_BAR_BITS),
        ActionKind::ArrMove { direction } => writer.push_bool(*direction == Direction::Right),
        ActionKind::Aux(aux) => {
            writer.push_bits(aux.code().code() as u32, AUX_BITS);
            push_aux(writer, aux)?;
        }
        _ => {}
    }
    Ok(())
}

fn push_aux(writer: &mut BitWriter, aux: &AuxAction) -> CodecResult<()> {
    match aux {
        AuxAction::Afk { away } => writer.push_bool(*away),
        AuxAction::BlockSet { set } => writer.push_bits(set.id() as u32, PIECE_SET_BITS),
        AuxAction::MoveTo {
            x,
            y,
            rotation,
            kick,
        } => {
            push_position(
                writer,
                Position {
                    x: *x,
                    y: *y,
                    rotation: *rotation,
                },
            )?;
            writer.push_bool(kick.is_some());
            if let Some(kick) = kick {
                writer.push_checked("kick", *kick as u32, KICK_BITS)?;
            }
        }
        AuxAction::Randomizer { id } => {
            writer.push_checked("randomizer", *id as u32, RANDOMIZER_BITS)?
        }
        AuxAction::MatrixMod { changes } => {
            writer.push_checked("matrix mod count", changes.len() as u32, MOD_COUNT_BITS)?;
            for &(index, value) in changes {
                writer.push_bits(index as u32, MOD_INDEX_BITS);
                writer.push_checked("cell", value as u32, MOD_VALUE_BITS)?;
            }
        }
        AuxAction::WideGarbageAdd {
            lines,
            column,
            width,
            invert,
        } => {
            writer.push_checked("lines", *lines as u32, LINES_BITS)?;
            writer.push_checked("column", *column as u32, COLUMN_BITS)?;
            writer.push_checked("width", *width as u32, WIDTH_BITS)?;
            writer.push_bool(*invert);
        }
    }
    Ok(())
}

fn pull_payload(reader: &mut BitReader<'_>, code: ActionCode) -> CodecResult<ActionKind> {
    Ok(match code {
        ActionCode::MoveLeft => ActionKind::MoveLeft,
        ActionCode::MoveRight => ActionKind::MoveRight,
        ActionCode::DasLeft => ActionKind::DasLeft,
        ActionCode::DasRight => ActionKind::DasRight,
        ActionCode::RotateLeft => ActionKind::RotateLeft,
        ActionCode::RotateRight => ActionKind::RotateRight,
        ActionCode::Rotate180 => ActionKind::Rotate180,
        ActionCode::HardDrop => ActionKind::HardDrop,
        ActionCode::SoftDropBeginEnd => ActionKind::SoftDrop {
            begin: reader.pull_bool()?,
        },
        ActionCode::GravityStep => ActionKind::GravityStep {
            rows: reader.pull_u8(LINES_BITS)?,
        },
        ActionCode::HoldBlock => ActionKind::HoldBlock,
        ActionCode::GarbageAdd => ActionKind::GarbageAdd {
            lines: reader.pull_u8(LINES_BITS)?,
            column: reader.pull_u8(COLUMN_BITS)?,
        },
        ActionCode::SolidGarbageAdd => ActionKind::SolidGarbageAdd {
            lines: reader.pull_u8(LINES_BITS)?,
        },
        ActionCode::RedbarSet => ActionKind::RedbarSet {
            height: reader.pull_u8(RED_BAR_BITS)?,
        },
        ActionCode::ArrMove => ActionKind::ArrMove {
            direction: if reader.pull_bool()? {
                Direction::Right
            } else {
                Direction::Left
            },
        },
        ActionCode::Aux => ActionKind::Aux(pull_aux(reader)?),
    })
}

fn pull_aux(reader: &mut BitReader<'_>) -> CodecResult<AuxAction> {
    let code = reader.pull_u8(AUX_BITS)?;
    let code = AuxCode::from_code(code).ok_or(CodecError::InvalidCode {
        what: "aux",
        code: code as u32,
    })?;
    Ok(match code {
        AuxCode::Afk => AuxAction::Afk {
            away: reader.pull_bool()?,
        },
        AuxCode::BlockSet => AuxAction::BlockSet {
            set: pull_set(reader)?,
        },
        AuxCode::MoveTo => {
            let Position { x, y, rotation } = pull_position(reader)?;
            let kick = if reader.pull_bool()? {
                Some(reader.pull_u8(KICK_BITS)?)
            } else {
                None
            };
            AuxAction::MoveTo {
                x,
                y,
                rotation,
                kick,
            }
        }
        AuxCode::Randomizer => AuxAction::Randomizer {
            id: reader.pull_u8(RANDOMIZER_BITS)?,
        },
        AuxCode::MatrixMod => {
            let count = reader.pull_bits(MOD_COUNT_BITS)?;
            let mut changes = Vec::with_capacity(count as usize);
            for _ in 0..count {
                changes.push((reader.pull_u8(MOD_INDEX_BITS)?, reader.pull_u8(MOD_VALUE_BITS)?));
            }
            AuxAction::MatrixMod { changes }
        }
        AuxCode::WideGarbageAdd => AuxAction::WideGarbageAdd {
            lines: reader.pull_u8(LINES_BITS)?,
            column: reader.pull_u8(COLUMN_BITS)?,
            width: reader.pull_u8(WIDTH_BITS)?,
            invert: reader.pull_bool()?,
        },
    })
}
