use blockstack_types::{Cell, PieceRef, ScoringAction, BOARD_CELLS};

use super::state::{CurrentBlock, ReplayState};
use super::{
    pull_timestamp, push_timestamp, PositionDelta, Property, FULL_TIMESTAMP_BITS,
    MAX_CAPTION_BYTES, PROPERTY_MASK_BITS,
};
use crate::bitstream::{BitReader, BitWriter};
use crate::error::{CodecError, CodecResult};
use crate::piece::{pull_piece, pull_position, push_piece, push_position};

const CELL_BITS: u32 = 4;
const CHANGE_COUNT_BITS: u32 = 8;
const CHANGE_INDEX_BITS: u32 = 8;
const QUEUE_COUNT_BITS: u32 = 4;
const SKIN_BITS: u32 = 8;
const EVENT_COUNT_BITS: u32 = 4;
const EVENT_TYPE_BITS: u32 = 4;
const SOUND_ID_BITS: u32 = 8;
const CAPTION_POSITION_BITS: u32 = 4;
const CAPTION_LEN_BITS: u32 = 8;
const SCORE_CODE_BITS: u32 = 4;
const SCORE_COUNT_BITS: u32 = 16;

const SOUND_EVENT: u8 = 0;

/// Above this many changed cells a bitmask is smaller than an index list.
pub(crate) const BITMASK_THRESHOLD: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Full,
    Diff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatrixChange {
    pub index: u8,
    pub cell: Cell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RulesetProps {
    pub ghost: bool,
    pub skin_id: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptionChange {
    pub position: u8,
    /// `None` removes the caption.
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScoreEntry {
    pub action: ScoringAction,
    pub count: u16,
}

/// One decoded or to-be-encoded frame.
///
/// Each field maps to one property; `None` (or an empty list for the event
/// properties) means the property is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameType,
    pub timestamp: u32,
    pub matrix: Option<Box<[Cell; BOARD_CELLS]>>,
    pub matrix_changes: Option<Vec<MatrixChange>>,
    pub matrix_bitmask: Option<Vec<MatrixChange>>,
    /// Present with `None` when the board has no current block.
    pub current_block: Option<Option<CurrentBlock>>,
    pub position: Option<PositionDelta>,
    pub hold_block: Option<Option<PieceRef>>,
    pub queue: Option<Vec<PieceRef>>,
    pub queue_shift: Option<PieceRef>,
    pub ruleset: Option<RulesetProps>,
    pub sounds: Vec<u8>,
    pub captions: Vec<CaptionChange>,
    pub score: Vec<ScoreEntry>,
}

impl Frame {
    pub fn new(kind: FrameType, timestamp: u32) -> Self {
        Self {
            kind,
            timestamp,
            matrix: None,
            matrix_changes: None,
            matrix_bitmask: None,
            current_block: None,
            position: None,
            hold_block: None,
            queue: None,
            queue_shift: None,
            ruleset: None,
            sounds: Vec::new(),
            captions: Vec::new(),
            score: Vec::new(),
        }
    }

    /// Keyframe carrying all of `state`.
    pub fn full(timestamp: u32, state: &ReplayState) -> Self {
        let mut frame = Self::new(FrameType::Full, timestamp);
        frame.matrix = Some(Box::new(state.matrix));
        frame.current_block = Some(state.current);
        frame.hold_block = Some(state.hold);
        frame.queue = Some(state.queue.clone());
        frame.ruleset = Some(state.ruleset());
        frame.captions = state
            .captions
            .iter()
            .map(|(&position, text)| CaptionChange {
                position,
                text: Some(text.clone()),
            })
            .collect();
        frame
    }

    /// Frame turning `before` into `after`.
    pub fn diff(timestamp: u32, before: &ReplayState, after: &ReplayState) -> Self {
        let mut frame = Self::new(FrameType::Diff, timestamp);

        let changes: Vec<MatrixChange> = before
            .matrix
            .iter()
            .zip(after.matrix.iter())
            .enumerate()
            .filter(|(_, (old, new))| old != new)
            .map(|(index, (_, &cell))| MatrixChange {
                index: index as u8,
                cell,
            })
            .collect();
        if changes.len() > BITMASK_THRESHOLD {
            frame.matrix_bitmask = Some(changes);
        } else if !changes.is_empty() {
            frame.matrix_changes = Some(changes);
        }

        match (before.current, after.current) {
            (Some(old), Some(new)) if old.piece == new.piece => {
                if old.position != new.position {
                    frame.position = Some(PositionDelta::between(old.position, new.position));
                }
            }
            (old, new) if old != new => frame.current_block = Some(new),
            _ => {}
        }

        if before.hold != after.hold {
            frame.hold_block = Some(after.hold);
        }

        if before.queue != after.queue {
            match shifted_in(&before.queue, &after.queue) {
                Some(piece) => frame.queue_shift = Some(piece),
                None => frame.queue = Some(after.queue.clone()),
            }
        }

        if before.ruleset() != after.ruleset() {
            frame.ruleset = Some(after.ruleset());
        }

        let positions = before.captions.keys().chain(after.captions.keys());
        for &position in positions {
            let text = after.captions.get(&position);
            if before.captions.get(&position) != text
                && !frame.captions.iter().any(|c| c.position == position)
            {
                frame.captions.push(CaptionChange {
                    position,
                    text: text.cloned(),
                });
            }
        }
        frame.captions.sort_by_key(|c| c.position);

        frame
    }

    /// Presence bitmask, bit `n` set for property `n`.
    pub fn properties(&self) -> u16 {
        let flags = [
            (Property::Matrix, self.matrix.is_some()),
            (Property::MatrixChange, self.matrix_changes.is_some()),
            (Property::MatrixBitmask, self.matrix_bitmask.is_some()),
            (Property::CurrentBlock, self.current_block.is_some()),
            (Property::CurrentBlockState, self.position.is_some()),
            (Property::HoldBlock, self.hold_block.is_some()),
            (Property::Queue, self.queue.is_some()),
            (Property::QueueShift, self.queue_shift.is_some()),
            (Property::Ruleset, self.ruleset.is_some()),
            (Property::SoundEffect, !self.sounds.is_empty()),
            (Property::CaptionChange, !self.captions.is_empty()),
            (Property::Score, !self.score.is_empty()),
        ];
        flags
            .iter()
            .filter(|(_, present)| *present)
            .fold(0, |mask, (property, _)| mask | property.bit())
    }

    pub fn has(&self, property: Property) -> bool {
        self.properties() & property.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.properties() == 0
    }

    /// Check the FULL frame property rules.
    pub fn validate(&self) -> CodecResult<()> {
        let invalid = |reason| CodecError::InvalidFrame {
            timestamp: self.timestamp,
            reason,
        };
        if self.kind == FrameType::Full {
            if Property::FULL_REQUIRED.iter().any(|&p| !self.has(p)) {
                return Err(invalid("full frame is missing a required property"));
            }
            if Property::FULL_BANNED.iter().any(|&p| self.has(p)) {
                return Err(invalid("full frame carries a diff-only property"));
            }
        }
        Ok(())
    }

    /// Append this frame. `previous` is the prior frame's timestamp, needed
    /// for DIFF frames.
    pub fn write(&self, writer: &mut BitWriter, previous: Option<u32>) -> CodecResult<()> {
        self.validate()?;
        match self.kind {
            FrameType::Full => {
                writer.push_bits(0, 1);
                writer.push_bits(self.timestamp, FULL_TIMESTAMP_BITS);
            }
            FrameType::Diff => {
                let previous = previous.ok_or(CodecError::InvalidFrame {
                    timestamp: self.timestamp,
                    reason: "diff frame before any full frame",
                })?;
                let delta =
                    self.timestamp
                        .checked_sub(previous)
                        .ok_or(CodecError::TimeReversed {
                            t: self.timestamp,
                            previous,
                        })?;
                writer.push_bits(1, 1);
                push_timestamp(writer, delta)?;
            }
        }
        writer.push_bits(self.properties() as u32, PROPERTY_MASK_BITS);

        if let Some(matrix) = &self.matrix {
            for &cell in matrix.iter() {
                writer.push_checked("cell", cell as u32, CELL_BITS)?;
            }
        }
        if let Some(changes) = &self.matrix_changes {
            writer.push_checked("matrix change count", changes.len() as u32, CHANGE_COUNT_BITS)?;
            for change in changes {
                writer.push_bits(change.index as u32, CHANGE_INDEX_BITS);
                writer.push_checked("cell", change.cell as u32, CELL_BITS)?;
            }
        }
        if let Some(changes) = &self.matrix_bitmask {
            let mut cells = [None; BOARD_CELLS];
            for change in changes {
                if let Some(slot) = cells.get_mut(change.index as usize) {
                    *slot = Some(change.cell);
                }
            }
            for slot in &cells {
                writer.push_bool(slot.is_some());
            }
            for cell in cells.iter().flatten() {
                writer.push_checked("cell", *cell as u32, CELL_BITS)?;
            }
        }
        if let Some(current) = self.current_block {
            writer.push_bool(current.is_some());
            if let Some(block) = current {
                push_piece(writer, block.piece)?;
                push_position(writer, block.position)?;
            }
        }
        if let Some(delta) = self.position {
            delta.write(writer)?;
        }
        if let Some(hold) = self.hold_block {
            writer.push_bool(hold.is_some());
            if let Some(piece) = hold {
                push_piece(writer, piece)?;
            }
        }
        if let Some(queue) = &self.queue {
            writer.push_checked("queue length", queue.len() as u32, QUEUE_COUNT_BITS)?;
            for &piece in queue {
                push_piece(writer, piece)?;
            }
        }
        if let Some(piece) = self.queue_shift {
            push_piece(writer, piece)?;
        }
        if let Some(ruleset) = self.ruleset {
            writer.push_bool(ruleset.ghost);
            writer.push_bits(ruleset.skin_id as u32, SKIN_BITS);
        }
        if !self.sounds.is_empty() {
            writer.push_checked("sound count", self.sounds.len() as u32, EVENT_COUNT_BITS)?;
            for &sound in &self.sounds {
                writer.push_bits(SOUND_EVENT as u32, EVENT_TYPE_BITS);
                writer.push_bits(sound as u32, SOUND_ID_BITS);
            }
        }
        if !self.captions.is_empty() {
            writer.push_checked(
                "caption count",
                self.captions.len() as u32,
                EVENT_COUNT_BITS,
            )?;
            for caption in &self.captions {
                writer.push_checked(
                    "caption position",
                    caption.position as u32,
                    CAPTION_POSITION_BITS,
                )?;
                writer.push_bool(caption.text.is_some());
                if let Some(text) = &caption.text {
                    let text = trim_to_bytes(text, MAX_CAPTION_BYTES);
                    writer.push_bits(text.len() as u32, CAPTION_LEN_BITS);
                    for &byte in text.as_bytes() {
                        writer.push_bits(byte as u32, 8);
                    }
                }
            }
        }
        if !self.score.is_empty() {
            writer.push_checked("score count", self.score.len() as u32, EVENT_COUNT_BITS)?;
            for entry in &self.score {
                writer.push_checked("score code", entry.action.code() as u32, SCORE_CODE_BITS)?;
                if entry.action.has_count() {
                    writer.push_bits(entry.count as u32, SCORE_COUNT_BITS);
                }
            }
        }
        Ok(())
    }

    /// Read one frame. DIFF timestamps are resolved against `previous`.
    pub fn read(reader: &mut BitReader<'_>, previous: Option<u32>) -> CodecResult<Self> {
        let kind = if reader.pull_bool()? {
            FrameType::Diff
        } else {
            FrameType::Full
        };
        let timestamp = match kind {
            FrameType::Full => reader.pull_bits(FULL_TIMESTAMP_BITS)?,
            FrameType::Diff => {
                let delta = pull_timestamp(reader)?;
                let previous = previous.ok_or(CodecError::InvalidFrame {
                    timestamp: delta,
                    reason: "diff frame before any full frame",
                })?;
                previous.saturating_add(delta)
            }
        };
        let mask = reader.pull_bits(PROPERTY_MASK_BITS)? as u16;
        let has = |property: Property| mask & property.bit() != 0;
        let mut frame = Frame::new(kind, timestamp);

        if has(Property::Matrix) {
            let mut matrix = Box::new([0; BOARD_CELLS]);
            for cell in matrix.iter_mut() {
                *cell = reader.pull_u8(CELL_BITS)?;
            }
            frame.matrix = Some(matrix);
        }
        if has(Property::MatrixChange) {
            let count = reader.pull_bits(CHANGE_COUNT_BITS)?;
            let mut changes = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let index = reader.pull_u8(CHANGE_INDEX_BITS)?;
                let cell = reader.pull_u8(CELL_BITS)?;
                changes.push(MatrixChange { index, cell });
            }
            frame.matrix_changes = Some(changes);
        }
        if has(Property::MatrixBitmask) {
            let mut indices = Vec::new();
            for index in 0..BOARD_CELLS {
                if reader.pull_bool()? {
                    indices.push(index as u8);
                }
            }
            let mut changes = Vec::with_capacity(indices.len());
            for index in indices {
                let cell = reader.pull_u8(CELL_BITS)?;
                changes.push(MatrixChange { index, cell });
            }
            frame.matrix_bitmask = Some(changes);
        }
        if has(Property::CurrentBlock) {
            let current = if reader.pull_bool()? {
                let piece = pull_piece(reader)?;
                let position = pull_position(reader)?;
                Some(CurrentBlock { piece, position })
            } else {
                None
            };
            frame.current_block = Some(current);
        }
        if has(Property::CurrentBlockState) {
            frame.position = Some(PositionDelta::read(reader)?);
        }
        if has(Property::HoldBlock) {
            let hold = if reader.pull_bool()? {
                Some(pull_piece(reader)?)
            } else {
                None
            };
            frame.hold_block = Some(hold);
        }
        if has(Property::Queue) {
            let count = reader.pull_bits(QUEUE_COUNT_BITS)?;
            let mut queue = Vec::with_capacity(count as usize);
            for _ in 0..count {
                queue.push(pull_piece(reader)?);
            }
            frame.queue = Some(queue);
        }
        if has(Property::QueueShift) {
            frame.queue_shift = Some(pull_piece(reader)?);
        }
        if has(Property::Ruleset) {
            let ghost = reader.pull_bool()?;
            let skin_id = reader.pull_u8(SKIN_BITS)?;
            frame.ruleset = Some(RulesetProps { ghost, skin_id });
        }
        if has(Property::SoundEffect) {
            let count = reader.pull_bits(EVENT_COUNT_BITS)?;
            for _ in 0..count {
                let kind = reader.pull_u8(EVENT_TYPE_BITS)?;
                if kind != SOUND_EVENT {
                    return Err(CodecError::InvalidCode {
                        what: "sound event type",
                        code: kind as u32,
                    });
                }
                frame.sounds.push(reader.pull_u8(SOUND_ID_BITS)?);
            }
        }
        if has(Property::CaptionChange) {
            let count = reader.pull_bits(EVENT_COUNT_BITS)?;
            for _ in 0..count {
                let position = reader.pull_u8(CAPTION_POSITION_BITS)?;
                let text = if reader.pull_bool()? {
                    let len = reader.pull_bits(CAPTION_LEN_BITS)?;
                    let mut bytes = Vec::with_capacity(len as usize);
                    for _ in 0..len {
                        bytes.push(reader.pull_u8(8)?);
                    }
                    Some(String::from_utf8_lossy(&bytes).into_owned())
                } else {
                    None
                };
                frame.captions.push(CaptionChange { position, text });
            }
        }
        if has(Property::Score) {
            let count = reader.pull_bits(EVENT_COUNT_BITS)?;
            for _ in 0..count {
                let code = reader.pull_u8(SCORE_CODE_BITS)?;
                let action = ScoringAction::from_code(code).ok_or(CodecError::InvalidCode {
                    what: "score event",
                    code: code as u32,
                })?;
                let count = if action.has_count() {
                    reader.pull_bits(SCORE_COUNT_BITS)? as u16
                } else {
                    1
                };
                frame.score.push(ScoreEntry { action, count });
            }
        }

        frame.validate()?;
        Ok(frame)
    }
}

/// The piece pushed when `after` is `before` with its head popped.
fn shifted_in(before: &[PieceRef], after: &[PieceRef]) -> Option<PieceRef> {
    if before.is_empty() || before.len() != after.len() {
        return None;
    }
    let (last, rest) = after.split_last()?;
    (before[1..] == *rest).then_some(*last)
}

/// Cut `text` to at most `max` bytes on a char boundary.
pub(crate) fn trim_to_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::Position;
    use blockstack_types::{PieceKind, Rotation};

    fn piece(kind: PieceKind) -> PieceRef {
        PieceRef::standard(kind)
    }

    fn state() -> ReplayState {
        let mut state = ReplayState::default();
        state.current = Some(CurrentBlock {
            piece: piece(PieceKind::T),
            position: Position {
                x: 3,
                y: 0,
                rotation: Rotation::North,
            },
        });
        state.queue = vec![
            piece(PieceKind::I),
            piece(PieceKind::O),
            piece(PieceKind::S),
        ];
        state
    }

    #[test]
    fn queue_shift_is_detected() {
        let before = state();
        let mut after = before.clone();
        after.queue.remove(0);
        after.queue.push(piece(PieceKind::Z));
        let frame = Frame::diff(10, &before, &after);
        assert_eq!(frame.queue_shift, Some(piece(PieceKind::Z)));
        assert!(frame.queue.is_none());
    }

    #[test]
    fn large_matrix_changes_use_bitmask() {
        let before = state();
        let mut after = before.clone();
        for cell in after.matrix[..BITMASK_THRESHOLD].iter_mut() {
            *cell = 8;
        }
        let small = Frame::diff(1, &before, &after);
        assert!(small.matrix_changes.is_some());
        assert!(small.matrix_bitmask.is_none());

        after.matrix[BITMASK_THRESHOLD] = 8;
        let large = Frame::diff(1, &before, &after);
        assert!(large.matrix_changes.is_none());
        assert_eq!(
            large.matrix_bitmask.as_ref().map(Vec::len),
            Some(BITMASK_THRESHOLD + 1)
        );
    }

    #[test]
    fn same_piece_movement_is_a_position_delta() {
        let before = state();
        let mut after = before.clone();
        if let Some(block) = after.current.as_mut() {
            block.position.x -= 1;
        }
        let frame = Frame::diff(5, &before, &after);
        assert_eq!(frame.position, Some(PositionDelta::Left));
        assert!(frame.current_block.is_none());

        after.current = None;
        let frame = Frame::diff(5, &before, &after);
        assert_eq!(frame.current_block, Some(None));
    }

    #[test]
    fn full_frame_rules_are_enforced() {
        let mut frame = Frame::full(0, &state());
        assert!(frame.validate().is_ok());
        frame.queue_shift = Some(piece(PieceKind::I));
        assert!(matches!(
            frame.validate(),
            Err(CodecError::InvalidFrame { timestamp: 0, .. })
        ));

        let mut missing = Frame::full(0, &state());
        missing.matrix = None;
        assert!(missing.validate().is_err());
    }

    #[test]
    fn frame_survives_the_wire() {
        let before = state();
        let mut after = before.clone();
        after.matrix[200] = 5;
        after.hold = Some(piece(PieceKind::J));
        after.captions.insert(1, "40 lines".into());
        let mut frame = Frame::diff(700, &before, &after);
        frame.sounds.push(3);
        frame.score.push(ScoreEntry {
            action: ScoringAction::Combo,
            count: 4,
        });

        let mut writer = BitWriter::new();
        frame.write(&mut writer, Some(100)).unwrap();
        let bytes = writer.into_bytes();
        let decoded = Frame::read(&mut BitReader::new(&bytes), Some(100)).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn captions_are_trimmed_on_char_boundaries() {
        let text = "é".repeat(200);
        let trimmed = trim_to_bytes(&text, MAX_CAPTION_BYTES);
        assert_eq!(trimmed.len(), 254);
        assert_eq!(trim_to_bytes("short", MAX_CAPTION_BYTES), "short");
    }
}
