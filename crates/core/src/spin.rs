//! Spin classification
//!
//! Evaluated once per lock, before the piece is written into the board.
//!
//! - **T-spin**: the last successful move was a rotation and at least three of
//!   the four bounding-box corners are blocked (walls and floor count). Both
//!   front corners blocked, or arriving through the fifth SRS kick, makes it a
//!   full T-spin; otherwise it is a mini.
//! - **All-spin**: for the other pieces of the standard set, when enabled. The
//!   piece must be immobile in all four directions and both cells of its full
//!   point pair (or of one of its mini pairs) must be blocked.

use crate::board::Board;
use crate::catalog::Piece;
use crate::types::{PieceKind, Rotation, SpinKind};

/// Kick index of the last SRS candidate, which always upgrades to a full spin.
const TST_KICK_INDEX: usize = 4;

/// The last action that successfully changed the active piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LastMove {
    #[default]
    None,
    Move,
    Rotate {
        kick: Option<usize>,
    },
    Drop,
}

/// Corners of the 3x3 box, and which two are "front" for each rotation.
const CORNERS: [(i8, i8); 4] = [(0, 0), (2, 0), (0, 2), (2, 2)];

fn front_corners(rotation: Rotation) -> [(i8, i8); 2] {
    match rotation {
        Rotation::North => [(0, 0), (2, 0)],
        Rotation::East => [(2, 0), (2, 2)],
        Rotation::South => [(0, 2), (2, 2)],
        Rotation::West => [(0, 0), (0, 2)],
    }
}

pub fn classify(board: &Board, piece: &Piece, last: LastMove, all_spin: bool) -> SpinKind {
    let LastMove::Rotate { kick } = last else {
        return SpinKind::None;
    };
    let def = piece.def();

    if piece.kind() == Some(PieceKind::T) && def.size == 3 {
        let blocked = |&(cx, cy): &(i8, i8)| board.is_blocked(piece.x + cx, piece.y + cy);
        let corners = CORNERS.iter().filter(|&c| blocked(c)).count();
        if corners < 3 {
            return SpinKind::None;
        }
        let front = front_corners(piece.rotation).iter().all(blocked);
        return if front || kick == Some(TST_KICK_INDEX) {
            SpinKind::TSpin
        } else {
            SpinKind::TSpinMini
        };
    }

    if !all_spin {
        return SpinKind::None;
    }
    let Some(points) = def.all_spin(piece.rotation) else {
        return SpinKind::None;
    };
    if !is_immobile(board, piece) {
        return SpinKind::None;
    }
    let pair_blocked = |pair: &[(i8, i8); 2]| {
        pair.iter()
            .all(|&(px, py)| board.is_blocked(piece.x + px, piece.y + py))
    };
    if pair_blocked(&points.full) {
        SpinKind::AllSpin
    } else if points.mini.iter().any(pair_blocked) {
        SpinKind::AllSpinMini
    } else {
        SpinKind::None
    }
}

/// The piece cannot move one cell in any of the four directions.
pub fn is_immobile(board: &Board, piece: &Piece) -> bool {
    [(-1, 0), (1, 0), (0, 1), (0, -1)]
        .iter()
        .all(|&(dx, dy)| board.collides(&piece.moved(dx, dy)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog;
    use crate::types::{PieceRef, GARBAGE_CELL};

    fn piece(kind: PieceKind, x: i8, y: i8, rotation: Rotation) -> Piece {
        Piece {
            x,
            y,
            rotation,
            ..catalog().spawn(PieceRef::standard(kind)).unwrap()
        }
    }

    fn fill(board: &mut Board, cells: &[(i8, i8)]) {
        for &(x, y) in cells {
            board.set(x, y, GARBAGE_CELL);
        }
    }

    /// T pointing down into a TSD slot at the bottom-left.
    fn tsd_board() -> Board {
        let mut board = Board::new();
        for x in 0..10 {
            if x != 1 {
                board.set(x, 20, GARBAGE_CELL);
            }
            if !(0..=2).contains(&x) {
                board.set(x, 19, GARBAGE_CELL);
            }
        }
        fill(&mut board, &[(0, 18)]);
        board
    }

    #[test]
    fn t_spin_full_needs_rotation() {
        let board = tsd_board();
        let t = piece(PieceKind::T, 0, 18, Rotation::South);
        assert!(!board.collides(&t));
        assert_eq!(
            classify(&board, &t, LastMove::Rotate { kick: Some(0) }, false),
            SpinKind::TSpin
        );
        assert_eq!(classify(&board, &t, LastMove::Move, false), SpinKind::None);
        assert_eq!(classify(&board, &t, LastMove::Drop, false), SpinKind::None);
    }

    #[test]
    fn t_spin_mini_when_one_front_corner_open() {
        let mut board = Board::new();
        // T pointing north on the floor: back corners are the floor.
        fill(&mut board, &[(0, 19)]);
        let t = piece(PieceKind::T, 0, 19, Rotation::North);
        assert!(!board.collides(&t));
        assert_eq!(
            classify(&board, &t, LastMove::Rotate { kick: Some(1) }, false),
            SpinKind::TSpinMini
        );
        // Fifth kick upgrades to full.
        assert_eq!(
            classify(&board, &t, LastMove::Rotate { kick: Some(4) }, false),
            SpinKind::TSpin
        );
    }

    #[test]
    fn two_corners_is_no_spin() {
        let board = Board::new();
        let t = piece(PieceKind::T, 3, 18, Rotation::North);
        assert_eq!(
            classify(&board, &t, LastMove::Rotate { kick: Some(0) }, true),
            SpinKind::None
        );
    }

    #[test]
    fn all_spin_requires_policy_and_immobility() {
        let mut board = Board::new();
        // Fill everything except an L-shaped slot for a north L at (0, 18).
        for y in 17..=20 {
            for x in 0..10 {
                board.set(x, y, GARBAGE_CELL);
            }
        }
        let l = piece(PieceKind::L, 0, 18, Rotation::North);
        for (x, y) in l.cells() {
            board.set(x, y, 0);
        }
        assert!(!board.collides(&l));
        assert!(is_immobile(&board, &l));
        let rotated = LastMove::Rotate { kick: Some(2) };
        assert_eq!(classify(&board, &l, rotated, false), SpinKind::None);
        assert_eq!(classify(&board, &l, rotated, true), SpinKind::AllSpin);
    }

    #[test]
    fn i_spin_full_and_mini_pairs() {
        let mut board = Board::new();
        // Horizontal I buried in a one-high tunnel on row 19.
        for y in 18..=20 {
            for x in 0..10 {
                board.set(x, y, GARBAGE_CELL);
            }
        }
        for x in 0..4 {
            board.set(x, 19, 0);
        }
        let i = piece(PieceKind::I, 0, 18, Rotation::North);
        assert!(!board.collides(&i));
        assert!(is_immobile(&board, &i));
        let rotated = LastMove::Rotate { kick: None };
        // Full pair (0,0),(3,2) probes (0,18) and (3,20).
        assert_eq!(classify(&board, &i, rotated, true), SpinKind::AllSpin);

        // Opening (0,18) breaks the full pair; the lower mini pair still holds.
        board.set(0, 18, 0);
        assert!(is_immobile(&board, &i));
        assert_eq!(classify(&board, &i, rotated, true), SpinKind::AllSpinMini);
    }
}
