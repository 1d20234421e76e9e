//! Finesse: the fewest key presses that place a piece.
//!
//! A placement is judged by where the piece would land on an empty board,
//! so two rotations with the same footprint (an I piece standing in either
//! of its vertical states) count as the same target.

use std::collections::{HashSet, VecDeque};

use crate::board::Board;
use crate::catalog::{catalog, try_rotate, Piece};
use crate::types::RotationDelta;

/// Cells of `piece` after a hard drop onto `board`, sorted.
fn footprint(board: &Board, piece: &Piece) -> Vec<(i8, i8)> {
    let mut dropped = *piece;
    while !board.collides(&dropped.moved(0, 1)) {
        dropped = dropped.moved(0, 1);
    }
    let mut cells: Vec<_> = dropped.cells().collect();
    cells.sort_unstable();
    cells
}

/// Presses needed to bring a fresh spawn of `target`'s piece over the
/// footprint `target` drops to.
///
/// Taps, slides to a wall and quarter turns cost one press each; half turns
/// are left out. `None` for pieces outside the catalog or targets no
/// sequence reaches.
pub fn optimal_presses(target: &Piece) -> Option<u32> {
    let board = Board::new();
    let start = catalog().spawn(target.piece_ref())?;
    let goal = footprint(&board, target);
    let step = catalog().set(target.set).step as i8;
    let fits = |p: &Piece| !board.collides(p);
    let slide = |mut p: Piece, dx: i8| {
        while fits(&p.moved(dx, 0)) {
            p = p.moved(dx, 0);
        }
        p
    };

    let mut seen = HashSet::from([(start.x, start.y, start.rotation)]);
    let mut queue = VecDeque::from([(start, 0u32)]);
    while let Some((piece, presses)) = queue.pop_front() {
        if footprint(&board, &piece) == goal {
            return Some(presses);
        }
        let next = [
            Some(piece.moved(-step, 0)).filter(fits),
            Some(piece.moved(step, 0)).filter(fits),
            Some(slide(piece, -step)),
            Some(slide(piece, step)),
            try_rotate(&piece, RotationDelta::Cw, fits).map(|(p, _)| p),
            try_rotate(&piece, RotationDelta::Ccw, fits).map(|(p, _)| p),
        ];
        for moved in next.into_iter().flatten() {
            if seen.insert((moved.x, moved.y, moved.rotation)) {
                queue.push_back((moved, presses + 1));
            }
        }
    }
    None
}
