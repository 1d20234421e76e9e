use std::collections::{HashMap, HashSet, VecDeque};

use blockstack_core::spin::{self, LastMove};
use blockstack_core::{catalog, try_rotate, AllSpinMode, Board, LiveDriver, Piece, Simulation};
use blockstack_types::{ActionKind, AuxAction, PieceRef, Rotation, RotationDelta, SpinKind};
use log::debug;
use thiserror::Error;

/// Spin the bot says its move produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SpinClaim {
    #[default]
    None,
    Mini,
    Full,
}

impl SpinClaim {
    pub fn of(kind: SpinKind) -> Self {
        match kind {
            SpinKind::None => SpinClaim::None,
            k if k.is_mini() => SpinClaim::Mini,
            _ => SpinClaim::Full,
        }
    }
}

/// A final resting place for a piece, in board coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub piece: PieceRef,
    pub x: i8,
    pub y: i8,
    pub rotation: Rotation,
    pub spin: SpinClaim,
}

impl Placement {
    fn piece_at(&self) -> Piece {
        Piece {
            id: self.piece.id,
            set: self.piece.set,
            x: self.x,
            y: self.y,
            rotation: self.rotation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlaceError {
    #[error("game is not playable")]
    NotPlayable,
    #[error("no active piece")]
    NoActive,
    #[error("hold requested when unavailable")]
    HoldUnavailable,
    #[error("piece is neither the current nor the hold piece")]
    WrongPiece,
    #[error("target overlaps the board")]
    Collides,
    #[error("target is not resting on anything")]
    Floating,
    #[error("target cannot be reached from the spawn position")]
    Unreachable,
    #[error("claimed spin {claimed:?} but the move gives {actual:?}")]
    SpinMismatch {
        claimed: SpinClaim,
        actual: SpinClaim,
    },
}

impl PlaceError {
    /// Stable error code reported back to the bot.
    pub fn code(self) -> &'static str {
        match self {
            PlaceError::HoldUnavailable => "hold_unavailable",
            PlaceError::NotPlayable | PlaceError::NoActive => "not_playable",
            PlaceError::WrongPiece => "wrong_piece",
            PlaceError::Collides
            | PlaceError::Floating
            | PlaceError::Unreachable
            | PlaceError::SpinMismatch { .. } => "invalid_place",
        }
    }
}

/// Lowest y a search may climb to through kicks.
const MIN_SEARCH_Y: i8 = -8;

/// Bit set when a position was entered by a shift or a soft drop. Entering
/// by a rotation through kick `k` sets bit `k + 1`.
const SHIFTED: u32 = 1;

/// Positions a piece can reach from `start` by shifting, soft dropping and
/// rotating, remembering every kick index that entered each one.
#[derive(Debug, Clone, Default)]
pub struct Reachable {
    seen: HashMap<(i8, i8, Rotation), u32>,
}

impl Reachable {
    pub fn search(board: &Board, start: Piece) -> Self {
        let mut seen = HashMap::new();
        if board.collides(&start) {
            return Self { seen };
        }
        let step = catalog().set(start.set).step as i8;
        let mut expanded = HashSet::new();
        let mut queue = VecDeque::from([start]);
        seen.insert(key(&start), SHIFTED);

        while let Some(piece) = queue.pop_front() {
            if !expanded.insert(key(&piece)) {
                continue;
            }
            let shifts = [piece.moved(-step, 0), piece.moved(step, 0), piece.moved(0, 1)];
            let moves = shifts
                .into_iter()
                .filter(|p| !board.collides(p))
                .map(|p| (p, SHIFTED));
            let turns = [RotationDelta::Cw, RotationDelta::Ccw, RotationDelta::Half]
                .into_iter()
                .filter_map(|delta| try_rotate(&piece, delta, |p| !board.collides(p)))
                .filter_map(|(p, kick)| Some((p, 1u32.checked_shl(kick as u32 + 1)?)));
            for (next, arrival) in moves.chain(turns) {
                if next.y < MIN_SEARCH_Y {
                    continue;
                }
                let entry = seen.entry(key(&next)).or_insert(0);
                if *entry & arrival == 0 {
                    *entry |= arrival;
                    queue.push_back(next);
                }
            }
        }
        Self { seen }
    }

    pub fn contains(&self, piece: &Piece) -> bool {
        self.seen.contains_key(&key(piece))
    }

    /// Reachable with a rotation as the last move.
    pub fn via_rotation(&self, piece: &Piece) -> bool {
        self.kicks(piece).next().is_some()
    }

    /// Kick indices of the rotations that enter `piece`'s position.
    pub fn kicks(&self, piece: &Piece) -> impl Iterator<Item = u8> {
        let arrivals = self.seen.get(&key(piece)).copied().unwrap_or(0) >> 1;
        (0..u32::BITS as u8 - 1).filter(move |&kick| arrivals & (1 << kick) != 0)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

fn key(piece: &Piece) -> (i8, i8, Rotation) {
    (piece.x, piece.y, piece.rotation)
}

/// Check `placement` against the current game and play it.
///
/// The move is applied as an optional hold, a `MOVE_TO` and a hard drop, so
/// it records like any other input. A rejected move leaves the game as it
/// was.
pub fn apply_bot_move(
    sim: &mut Simulation<LiveDriver>,
    placement: &Placement,
    t: u32,
) -> Result<(), PlaceError> {
    sim.advance(t);
    if sim.is_ended() {
        return Err(PlaceError::NotPlayable);
    }
    let Some(active) = sim.active() else {
        return Err(PlaceError::NoActive);
    };

    let (start, use_hold) = if placement.piece == active.piece_ref() {
        (active, false)
    } else {
        let swapped = sim.hold_piece().or_else(|| sim.queue().next().copied());
        if swapped != Some(placement.piece) {
            return Err(PlaceError::WrongPiece);
        }
        if !sim.ruleset().hold_enabled || !sim.can_hold() {
            return Err(PlaceError::HoldUnavailable);
        }
        let spawned = catalog()
            .spawn(placement.piece)
            .ok_or(PlaceError::WrongPiece)?;
        (spawned, true)
    };

    let board = sim.board();
    let target = placement.piece_at();
    if board.collides(&target) {
        return Err(PlaceError::Collides);
    }
    if !board.collides(&target.moved(0, 1)) {
        return Err(PlaceError::Floating);
    }
    let reachable = Reachable::search(board, start);
    if !reachable.contains(&target) {
        debug!("bot move {placement:?} is unreachable");
        return Err(PlaceError::Unreachable);
    }
    let mut kick = None;
    if placement.spin != SpinClaim::None {
        let all_spin = sim.ruleset().all_spin() == AllSpinMode::On;
        // Each entering kick may classify differently; any that matches the
        // claim will do.
        let outcomes = reachable.kicks(&target).map(|index| {
            let last = LastMove::Rotate {
                kick: Some(index as usize),
            };
            (index, SpinClaim::of(spin::classify(board, &target, last, all_spin)))
        });
        let mut actual = SpinClaim::None;
        for (index, outcome) in outcomes {
            if outcome == placement.spin {
                kick = Some(index);
                break;
            }
            actual = actual.max(outcome);
        }
        if kick.is_none() {
            debug!("bot move {placement:?} claims a spin it does not get");
            return Err(PlaceError::SpinMismatch {
                claimed: placement.spin,
                actual,
            });
        }
    }

    if use_hold && !sim.submit(t, ActionKind::HoldBlock) {
        return Err(PlaceError::HoldUnavailable);
    }
    let moved = sim.submit(
        t,
        ActionKind::Aux(AuxAction::MoveTo {
            x: target.x,
            y: target.y,
            rotation: target.rotation,
            kick,
        }),
    );
    if !moved || !sim.submit(t, ActionKind::HardDrop) {
        return Err(PlaceError::NotPlayable);
    }
    Ok(())
}
