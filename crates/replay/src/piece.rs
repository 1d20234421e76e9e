//! Piece identity and position fields shared by both replay formats.

use blockstack_types::{PieceRef, PieceSetId, Rotation};

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{CodecError, CodecResult};

pub const PIECE_ID_BITS: u32 = 5;
pub const PIECE_SET_BITS: u32 = 4;

pub const X_BITS: u32 = 5;
pub const X_BIAS: i32 = 8;
pub const Y_BITS: u32 = 6;
pub const Y_BIAS: i32 = 16;
pub const ROTATION_BITS: u32 = 2;

/// Bits of one absolute `(x, y, rotation)` triple.
pub const POSITION_BITS: u32 = X_BITS + Y_BITS + ROTATION_BITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i8,
    pub y: i8,
    pub rotation: Rotation,
}

pub fn push_piece(writer: &mut BitWriter, piece: PieceRef) -> CodecResult<()> {
    writer.push_checked("piece id", piece.id as u32, PIECE_ID_BITS)?;
    writer.push_bits(piece.set.id() as u32, PIECE_SET_BITS);
    Ok(())
}

pub fn pull_piece(reader: &mut BitReader<'_>) -> CodecResult<PieceRef> {
    let id = reader.pull_u8(PIECE_ID_BITS)?;
    let set = pull_set(reader)?;
    Ok(PieceRef::new(id, set))
}

pub fn pull_set(reader: &mut BitReader<'_>) -> CodecResult<PieceSetId> {
    let code = reader.pull_u8(PIECE_SET_BITS)?;
    PieceSetId::from_id(code).ok_or(CodecError::InvalidCode {
        what: "piece set",
        code: code as u32,
    })
}

pub fn push_position(writer: &mut BitWriter, position: Position) -> CodecResult<()> {
    writer.push_biased("x", position.x as i32, X_BIAS, X_BITS)?;
    writer.push_biased("y", position.y as i32, Y_BIAS, Y_BITS)?;
    writer.push_bits(position.rotation.index() as u32, ROTATION_BITS);
    Ok(())
}

pub fn pull_position(reader: &mut BitReader<'_>) -> CodecResult<Position> {
    let x = reader.pull_biased(X_BIAS, X_BITS)? as i8;
    let y = reader.pull_biased(Y_BIAS, Y_BITS)? as i8;
    let rotation = Rotation::from_index(reader.pull_u8(ROTATION_BITS)?);
    Ok(Position { x, y, rotation })
}
