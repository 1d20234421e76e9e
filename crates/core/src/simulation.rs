//! Simulation - one deterministic game
//!
//! Every state change is a [`ReplayAction`] applied through [`Simulation::apply`].
//! The live driver turns inputs and timers into actions and records the ones
//! that took effect; the playback driver feeds a recorded stream through the
//! same path, so a recorded game always reproduces the same board, score and
//! attack.
//!
//! # Piece lifecycle
//!
//! `Falling -> Grounded (lock delay running) -> Locked`. After a lock the next
//! spawn is deferred by the clear delay (zero for non-clearing locks). A
//! pending spawn happens before any action stamped later than it is due, and
//! before piece actions stamped exactly at it, so garbage recorded at the lock
//! timestamp always lands before the next piece appears.
//!
//! # Timing
//!
//! Timestamps are milliseconds since game start and never go backwards; an
//! earlier timestamp is treated as the latest one seen.

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, info, trace, warn};

use crate::board::{Board, ClearedRows, GarbageRows};
use crate::catalog::{catalog, try_rotate, Piece, RotationSystem};
use crate::driver::{Driver, LiveDriver, PlaybackDriver};
use crate::finesse;
use crate::garbage::GarbageQueue;
use crate::handling::{DasMethod, FocusState, Handling, Shift};
use crate::randomizer::{Randomizer, RandomizerKind};
use crate::rng::Prng;
use crate::ruleset::{AllSpinMode, GarbageBlocking, Gravity, Ruleset, SoftDropSpeed};
use crate::scoring::{self, AttackEvent, AttackTables, ScoreState};
use crate::snapshot::SimSnapshot;
use crate::spin::{self, LastMove};
use crate::types::{
    ActionKind, AuxAction, Direction, GameMode, PieceRef, PieceSetId, ReplayAction, RotationDelta,
    ScoringAction, SpinKind, BOARD_HEIGHT, BOARD_WIDTH,
};

/// Widest payload of a single garbage action.
const MAX_GARBAGE_ACTION_LINES: u8 = 31;

/// Keys a player can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Left,
    Right,
    SoftDrop,
    HardDrop,
    RotateCw,
    RotateCcw,
    Rotate180,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    Press(Key),
    Release(Key),
}

/// Garbage reaching the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GarbageEvent {
    /// Opponent attack; queued and materialized later by the live driver.
    Incoming { lines: u8 },
    /// Rows with an explicit hole, as stored in replays.
    Resolved {
        lines: u8,
        column: u8,
        width: u8,
        invert: bool,
    },
    /// Unclearable rows raised from the floor.
    Solid { lines: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndReason {
    /// The next piece could not spawn.
    BlockOut,
    /// A piece locked above the board.
    LockOut,
    /// Garbage pushed the stack out of the board.
    GarbageOut,
    /// A finite queue ran dry.
    OutOfPieces,
    /// Line goal or time limit reached.
    Completed,
    /// A clear other than a T-spin double under `tsdOnly`.
    TsdOnlyViolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Playing,
    Ended(EndReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    Lines(u32),
    TimeMs(u32),
}

impl Objective {
    /// Default goal of a game mode.
    pub fn for_mode(mode: GameMode) -> Option<Self> {
        match mode {
            GameMode::Sprint => Some(Objective::Lines(40)),
            GameMode::Ultra => Some(Objective::TimeMs(120_000)),
            _ => None,
        }
    }
}

/// Events for presentation layers.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Spawned(Piece),
    Held(PieceRef),
    Locked { piece: Piece, spin: SpinKind },
    Cleared { rows: ClearedRows },
    Scored {
        action: Option<ScoringAction>,
        points: u32,
    },
    /// Generated attack and the part of it left after cancelling garbage.
    Attack { event: AttackEvent, sent: u8 },
    GarbageInserted { lines: u8, solid: bool },
    RedBar(u8),
    /// The same four-wide well has been fed four times in a row.
    FourWide { column: u8 },
    RulesetReplaced,
    Ended(EndReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub score: u32,
    pub lines: u32,
    pub pieces: u32,
    /// Attack generated, before cancellation.
    pub attack: u32,
    pub sent: u32,
    pub received: u32,
    pub holds: u32,
    pub max_combo: u32,
    /// Presses that reached the simulation; DAS and ARR repeats are not counted.
    pub key_presses: u32,
    /// Presses spent beyond the optimum, summed over locked pieces.
    pub finesse: u32,
    /// Cleared rows that held garbage.
    pub garbage_cleared: u32,
    pub perfect_clears: u32,
    /// Pieces locked since the last perfect clear, or since the start.
    pub pieces_since_pc: u32,
    /// Lines cleared since the last perfect clear, or since the start.
    pub lines_since_pc: u32,
}

impl Stats {
    /// Pieces per second over `elapsed_ms`.
    pub fn pps(&self, elapsed_ms: u32) -> f64 {
        rate(self.pieces, 1000.0, elapsed_ms)
    }

    /// Attack sent per minute.
    pub fn apm(&self, elapsed_ms: u32) -> f64 {
        rate(self.sent, 60_000.0, elapsed_ms)
    }

    /// Key presses per piece.
    pub fn kpp(&self) -> f64 {
        if self.pieces == 0 {
            return 0.0;
        }
        self.key_presses as f64 / self.pieces as f64
    }

    /// Versus score: sent attack plus cleared garbage, per 100 seconds.
    pub fn vs(&self, elapsed_ms: u32) -> f64 {
        rate(self.sent + self.garbage_cleared, 100_000.0, elapsed_ms)
    }
}

/// `count` per `unit_ms`, zero before any time has passed.
fn rate(count: u32, unit_ms: f64, elapsed_ms: u32) -> f64 {
    if elapsed_ms == 0 {
        return 0.0;
    }
    count as f64 * unit_ms / elapsed_ms as f64
}

#[derive(Debug, Clone)]
pub struct SimOptions {
    pub seed: String,
    pub mode: GameMode,
    /// Replay `softDropId`.
    pub soft_drop_id: u8,
    pub das_method: DasMethod,
    pub objective: Option<Objective>,
    /// Overrides the ruleset randomizer, e.g. a scripted queue.
    pub randomizer: Option<Randomizer>,
}

impl SimOptions {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            mode: GameMode::default(),
            soft_drop_id: 0,
            das_method: DasMethod::default(),
            objective: None,
            randomizer: None,
        }
    }

    pub fn with_mode(mut self, mode: GameMode) -> Self {
        self.mode = mode;
        self.objective = Objective::for_mode(mode);
        self
    }

    pub fn with_randomizer(mut self, randomizer: Randomizer) -> Self {
        self.randomizer = Some(randomizer);
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LockTimer {
    spawned_at: u32,
    /// Last time the piece touched down or was moved while grounded.
    grounded_at: Option<u32>,
    first_grounded_at: Option<u32>,
}

#[derive(Debug)]
pub struct Simulation<D: Driver> {
    ruleset: Arc<Ruleset>,
    seed: String,
    mode: GameMode,
    objective: Option<Objective>,
    soft_drop: SoftDropSpeed,
    das_method: DasMethod,
    board: Board,
    randomizer: Randomizer,
    randomizer_switches: u32,
    garbage_rng: Prng,
    queue: VecDeque<PieceRef>,
    block_set: Option<PieceSetId>,
    active: Option<Piece>,
    hold: Option<PieceRef>,
    hold_used: bool,
    garbage: GarbageQueue,
    red_bar: u8,
    score: ScoreState,
    stats: Stats,
    /// Well column and how many consecutive single clears fed it.
    four_wide: Option<(u8, u32)>,
    /// Finesse-counted presses spent on the active piece.
    piece_presses: u32,
    /// Soft drops and teleports place pieces no press count can judge.
    finesse_exempt: bool,
    last_move: LastMove,
    soft_dropping: bool,
    lock: LockTimer,
    spawn_due: Option<u32>,
    fall_ref: u32,
    last_hard_drop: Option<u32>,
    solid_rows: usize,
    handling: Handling,
    focus: FocusState,
    status: Status,
    replay_valid: bool,
    clock: u32,
    followups: Vec<ActionKind>,
    driver: D,
}

impl Simulation<LiveDriver> {
    pub fn live(ruleset: Arc<Ruleset>, options: SimOptions) -> Self {
        Self::with_driver(ruleset, options, LiveDriver::new())
    }
}

impl Simulation<PlaybackDriver> {
    pub fn playback(
        ruleset: Arc<Ruleset>,
        options: SimOptions,
        actions: impl IntoIterator<Item = ReplayAction>,
    ) -> Self {
        Self::with_driver(ruleset, options, PlaybackDriver::new(actions))
    }
}

impl<D: Driver> Simulation<D> {
    fn with_driver(ruleset: Arc<Ruleset>, options: SimOptions, driver: D) -> Self {
        let SimOptions {
            seed,
            mode,
            soft_drop_id,
            das_method,
            objective,
            randomizer,
        } = options;
        let randomizer = randomizer.unwrap_or_else(|| {
            Randomizer::from_kind(ruleset.randomizer(), &seed, ruleset.block_set())
        });
        let soft_drop = SoftDropSpeed::from_id(soft_drop_id).unwrap_or_else(|| {
            warn!("unknown soft drop id {soft_drop_id}, using the default speed");
            SoftDropSpeed::Interval(50)
        });

        let mut sim = Self {
            handling: Handling::new(ruleset.das, ruleset.arr, das_method),
            garbage_rng: Prng::fork(&seed, "garbage"),
            ruleset,
            seed,
            mode,
            objective,
            soft_drop,
            das_method,
            board: Board::new(),
            randomizer,
            randomizer_switches: 0,
            queue: VecDeque::new(),
            block_set: None,
            active: None,
            hold: None,
            hold_used: false,
            garbage: GarbageQueue::new(),
            red_bar: 0,
            score: ScoreState::default(),
            stats: Stats::default(),
            four_wide: None,
            piece_presses: 0,
            finesse_exempt: false,
            last_move: LastMove::None,
            soft_dropping: false,
            lock: LockTimer::default(),
            spawn_due: None,
            fall_ref: 0,
            last_hard_drop: None,
            solid_rows: 0,
            focus: FocusState::Focused,
            status: Status::Playing,
            replay_valid: true,
            clock: 0,
            followups: Vec::new(),
            driver,
        };
        sim.refill_queue();
        sim.spawn_next(0);
        sim
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn ruleset(&self) -> &Arc<Ruleset> {
        &self.ruleset
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Game mode this simulation runs, for both live and playback games.
    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn is_pc_mode(&self) -> bool {
        self.mode == GameMode::PcMode
    }

    pub fn objective(&self) -> Option<Objective> {
        self.objective
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn active(&self) -> Option<Piece> {
        self.active
    }

    /// Where the active piece would land.
    pub fn ghost(&self) -> Option<Piece> {
        self.active
            .map(|piece| piece.moved(0, self.drop_distance(&piece)))
    }

    pub fn hold_piece(&self) -> Option<PieceRef> {
        self.hold
    }

    pub fn can_hold(&self) -> bool {
        self.ruleset.hold_enabled && !self.hold_used
    }

    pub fn queue(&self) -> impl Iterator<Item = &PieceRef> {
        self.queue.iter()
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn combo(&self) -> u32 {
        self.score.combo
    }

    pub fn back_to_back(&self) -> bool {
        self.score.b2b
    }

    pub fn pending_garbage(&self) -> &GarbageQueue {
        &self.garbage
    }

    pub fn red_bar(&self) -> u8 {
        self.red_bar
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.status, Status::Ended(_))
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        match self.status {
            Status::Ended(reason) => Some(reason),
            Status::Playing => None,
        }
    }

    /// False once the ruleset was replaced mid-game.
    pub fn replay_valid(&self) -> bool {
        self.replay_valid
    }

    pub fn soft_dropping(&self) -> bool {
        self.soft_dropping
    }

    pub fn focus(&self) -> FocusState {
        self.focus
    }

    pub fn das_method(&self) -> DasMethod {
        self.das_method
    }

    /// Latest timestamp processed.
    pub fn clock(&self) -> u32 {
        self.clock
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.driver.drain_events()
    }

    pub fn snapshot(&self) -> SimSnapshot {
        let mut snapshot = SimSnapshot::default();
        self.snapshot_into(&mut snapshot);
        snapshot
    }

    pub fn snapshot_into(&self, out: &mut SimSnapshot) {
        out.board = *self.board.cells();
        out.active = self.active;
        out.ghost_y = self.ghost().map(|p| p.y);
        out.hold = self.hold;
        let capacity = out.queue.capacity();
        out.queue.clear();
        out.queue
            .extend(self.queue.iter().copied().take(capacity));
        out.can_hold = self.can_hold();
        out.end_reason = self.end_reason();
        out.score = self.stats.score;
        out.lines = self.stats.lines;
        out.combo = self.score.combo;
        out.b2b = self.score.b2b;
        out.red_bar = self.red_bar;
        out.clock = self.clock;
    }

    // ---------------------------------------------------------------------
    // Canonical mutation path
    // ---------------------------------------------------------------------

    /// Apply one action. Returns false when it had no effect (rejected moves,
    /// actions after the game ended); only applied actions are recorded.
    pub fn apply(&mut self, action: &ReplayAction) -> bool {
        let applied = self.apply_action(action);
        if applied {
            self.count_press(&action.kind);
            self.driver
                .record(&ReplayAction::new(self.clock, action.kind.clone()));
        }
        for kind in std::mem::take(&mut self.followups) {
            let followup = ReplayAction::new(self.clock, kind);
            self.apply(&followup);
        }
        applied
    }

    fn count_press(&mut self, kind: &ActionKind) {
        match kind {
            ActionKind::MoveLeft
            | ActionKind::MoveRight
            | ActionKind::RotateLeft
            | ActionKind::RotateRight
            | ActionKind::Rotate180 => {
                self.piece_presses += 1;
                self.stats.key_presses += 1;
            }
            ActionKind::HardDrop | ActionKind::HoldBlock => self.stats.key_presses += 1,
            ActionKind::SoftDrop { begin: true } => {
                self.stats.key_presses += 1;
                self.finesse_exempt = true;
            }
            ActionKind::Aux(AuxAction::MoveTo { .. }) => self.finesse_exempt = true,
            _ => {}
        }
    }

    fn apply_action(&mut self, action: &ReplayAction) -> bool {
        if self.is_ended() {
            return false;
        }
        let t = action.t.max(self.clock);
        self.clock = t;

        if let Some(due) = self.spawn_due {
            if due < t || (due == t && is_piece_action(&action.kind)) {
                self.spawn_next(t);
                if self.is_ended() {
                    return false;
                }
            }
        }

        match &action.kind {
            ActionKind::MoveLeft => self.shift(Direction::Left, t),
            ActionKind::MoveRight => self.shift(Direction::Right, t),
            ActionKind::ArrMove { direction } => self.shift(*direction, t),
            ActionKind::DasLeft => self.shift_to_wall(Direction::Left, t),
            ActionKind::DasRight => self.shift_to_wall(Direction::Right, t),
            ActionKind::RotateLeft => self.rotate(RotationDelta::Ccw, t),
            ActionKind::RotateRight => self.rotate(RotationDelta::Cw, t),
            ActionKind::Rotate180 => self.rotate(RotationDelta::Half, t),
            ActionKind::HardDrop => self.hard_drop(t),
            ActionKind::SoftDrop { begin } => {
                if self.soft_dropping == *begin {
                    return false;
                }
                self.soft_dropping = *begin;
                true
            }
            ActionKind::GravityStep { rows } => self.fall(*rows, t),
            ActionKind::HoldBlock => self.hold_active(t),
            ActionKind::GarbageAdd { lines, column } => {
                self.insert_garbage(*lines, *column, 1, false)
            }
            ActionKind::SolidGarbageAdd { lines } => self.insert_solid(*lines),
            ActionKind::RedbarSet { height } => {
                self.red_bar = *height;
                self.driver.emit(SimEvent::RedBar(*height));
                true
            }
            ActionKind::Aux(aux) => self.apply_aux(aux, t),
        }
    }

    fn apply_aux(&mut self, aux: &AuxAction, t: u32) -> bool {
        match aux {
            AuxAction::Afk { away } => {
                self.focus = if *away {
                    FocusState::Unfocused
                } else {
                    FocusState::Focused
                };
                true
            }
            AuxAction::BlockSet { set } => {
                self.block_set = Some(*set);
                true
            }
            AuxAction::MoveTo {
                x,
                y,
                rotation,
                kick,
            } => {
                let Some(active) = self.active else {
                    return false;
                };
                let target = Piece {
                    x: *x,
                    y: *y,
                    rotation: *rotation,
                    ..active
                };
                if self.board.collides(&target) {
                    return false;
                }
                self.active = Some(target);
                self.last_move = match kick {
                    Some(kick) => LastMove::Rotate {
                        kick: Some(*kick as usize),
                    },
                    None => LastMove::Move,
                };
                self.touch(t);
                true
            }
            AuxAction::Randomizer { id } => {
                let Some(kind) = RandomizerKind::from_id(*id) else {
                    return false;
                };
                self.switch_randomizer(kind);
                true
            }
            AuxAction::MatrixMod { changes } => {
                self.board.apply_mods(changes);
                true
            }
            AuxAction::WideGarbageAdd {
                lines,
                column,
                width,
                invert,
            } => self.insert_garbage(*lines, *column, *width, *invert),
        }
    }

    /// Single entry point for garbage, whatever its origin.
    pub fn add_garbage(&mut self, event: GarbageEvent, t: u32) -> bool {
        match event {
            GarbageEvent::Incoming { lines } => {
                if !self.driver.materializes_garbage() {
                    trace!("playback ignores incoming garbage ({lines} lines)");
                    return false;
                }
                if self.is_ended() || lines == 0 {
                    return false;
                }
                self.garbage.push(lines, t.max(self.clock));
                self.sync_red_bar(t);
                true
            }
            GarbageEvent::Resolved {
                lines,
                column,
                width,
                invert,
            } => {
                let kind = if width == 1 && !invert {
                    ActionKind::GarbageAdd { lines, column }
                } else {
                    ActionKind::Aux(AuxAction::WideGarbageAdd {
                        lines,
                        column,
                        width,
                        invert,
                    })
                };
                self.apply(&ReplayAction::new(t, kind))
            }
            GarbageEvent::Solid { lines } => {
                self.apply(&ReplayAction::new(t, ActionKind::SolidGarbageAdd { lines }))
            }
        }
    }

    /// Swap in a new ruleset. The running game keeps going but its replay is
    /// no longer valid.
    pub fn replace_ruleset(&mut self, ruleset: Ruleset) {
        info!("ruleset replaced mid-game; replay invalidated");
        self.ruleset = Arc::new(ruleset);
        self.handling = Handling::new(self.ruleset.das, self.ruleset.arr, self.das_method);
        self.replay_valid = false;
        self.driver.emit(SimEvent::RulesetReplaced);
    }

    // ---------------------------------------------------------------------
    // Piece handling
    // ---------------------------------------------------------------------

    fn refill_queue(&mut self) {
        let wanted = (self.ruleset.show_previews as usize).max(1);
        while self.queue.len() < wanted {
            match self.randomizer.next_piece() {
                Some(piece) => self.queue.push_back(piece),
                None => break,
            }
        }
    }

    fn switch_randomizer(&mut self, kind: RandomizerKind) {
        self.randomizer_switches += 1;
        let seed = format!("{}#{}", self.seed, self.randomizer_switches);
        let set = self.block_set.unwrap_or(self.ruleset.block_set());
        self.randomizer = Randomizer::from_kind(kind, &seed, set);
        self.queue.clear();
        self.refill_queue();
    }

    fn spawn_next(&mut self, t: u32) {
        self.spawn_due = None;
        let Some(next) = self.queue.pop_front() else {
            self.end(EndReason::OutOfPieces);
            return;
        };
        self.refill_queue();
        let next = match self.block_set {
            Some(set) if catalog().get(PieceRef::new(next.id, set)).is_some() => {
                PieceRef::new(next.id, set)
            }
            _ => next,
        };
        self.spawn_piece(next, t);
    }

    fn spawn_piece(&mut self, piece_ref: PieceRef, t: u32) {
        let Some(piece) = catalog().spawn(piece_ref) else {
            warn!("randomizer produced unknown piece {piece_ref:?}");
            self.end(EndReason::OutOfPieces);
            return;
        };
        if self.board.collides(&piece) {
            self.active = None;
            self.end(EndReason::BlockOut);
            return;
        }
        self.active = Some(piece);
        self.last_move = LastMove::None;
        self.piece_presses = 0;
        self.finesse_exempt = self.soft_dropping;
        self.lock = LockTimer {
            spawned_at: t,
            ..LockTimer::default()
        };
        self.fall_ref = t;
        self.touch(t);
        self.handling.on_spawn(t);
        self.driver.emit(SimEvent::Spawned(piece));
    }

    fn is_grounded(&self, piece: &Piece) -> bool {
        self.board.collides(&piece.moved(0, 1))
    }

    fn drop_distance(&self, piece: &Piece) -> i8 {
        let mut distance = 0;
        while !self.board.collides(&piece.moved(0, distance + 1)) {
            distance += 1;
        }
        distance
    }

    /// Refresh lock delay bookkeeping after the active piece changed.
    fn touch(&mut self, t: u32) {
        let Some(piece) = self.active else {
            return;
        };
        if self.is_grounded(&piece) {
            self.lock.grounded_at = Some(t);
            self.lock.first_grounded_at.get_or_insert(t);
        } else {
            self.lock.grounded_at = None;
        }
    }

    fn shift(&mut self, direction: Direction, t: u32) -> bool {
        let Some(active) = self.active else {
            return false;
        };
        let step = catalog().set(active.set).step as i8;
        let moved = active.moved(direction.dx() * step, 0);
        if self.board.collides(&moved) {
            return false;
        }
        self.active = Some(moved);
        self.last_move = LastMove::Move;
        self.touch(t);
        true
    }

    fn shift_to_wall(&mut self, direction: Direction, t: u32) -> bool {
        let mut moved = false;
        while self.shift(direction, t) {
            moved = true;
        }
        moved
    }

    fn rotate(&mut self, delta: RotationDelta, t: u32) -> bool {
        let Some(active) = self.active else {
            return false;
        };
        let board = &self.board;
        let Some((rotated, kick)) = try_rotate(&active, delta, |p| !board.collides(p)) else {
            return false;
        };
        self.active = Some(rotated);
        let srs = rotated.def().rotation_system == RotationSystem::Srs;
        self.last_move = LastMove::Rotate {
            kick: srs.then_some(kick),
        };
        self.touch(t);
        true
    }

    fn fall(&mut self, rows: u8, t: u32) -> bool {
        let Some(active) = self.active else {
            return false;
        };
        let rows = (rows.min(BOARD_HEIGHT) as i8).min(self.drop_distance(&active));
        if rows <= 0 {
            return false;
        }
        self.active = Some(active.moved(0, rows));
        self.last_move = LastMove::Drop;
        if self.soft_dropping {
            self.add_points(ScoringAction::SoftDrop.points() * rows as u32);
        }
        self.touch(t);
        true
    }

    fn hard_drop(&mut self, t: u32) -> bool {
        let Some(active) = self.active else {
            return false;
        };
        let rows = self.drop_distance(&active);
        if rows > 0 {
            self.active = Some(active.moved(0, rows));
            self.last_move = LastMove::Drop;
            self.add_points(ScoringAction::HardDrop.points() * rows as u32);
        }
        self.lock_active(t);
        true
    }

    fn hold_active(&mut self, t: u32) -> bool {
        if !self.can_hold() {
            return false;
        }
        let Some(active) = self.active.take() else {
            return false;
        };
        let current = active.piece_ref();
        self.hold_used = true;
        self.stats.holds += 1;
        self.driver.emit(SimEvent::Held(current));
        match self.hold.replace(current) {
            Some(held) => self.spawn_piece(held, t),
            None => self.spawn_next(t),
        }
        true
    }

    fn add_points(&mut self, points: u32) {
        let scaled = (points as f64 * self.ruleset.score_mult).round() as u32;
        self.stats.score = self.stats.score.saturating_add(scaled);
    }

    // ---------------------------------------------------------------------
    // Locking
    // ---------------------------------------------------------------------

    fn lock_active(&mut self, t: u32) {
        let Some(piece) = self.active.take() else {
            return;
        };
        let all_spin = self.ruleset.all_spin() == AllSpinMode::On;
        let spin = spin::classify(&self.board, &piece, self.last_move, all_spin);
        let above_visible = piece.cells().all(|(_, y)| y <= 0);
        let outcome = self.board.lock(&piece, self.ruleset.clear_lines);

        self.hold_used = false;
        self.last_move = LastMove::None;
        self.stats.pieces += 1;
        self.stats.garbage_cleared += outcome.garbage_rows as u32;
        if !self.finesse_exempt {
            if let Some(optimal) = finesse::optimal_presses(&piece) {
                self.stats.finesse += self.piece_presses.saturating_sub(optimal);
            }
        }
        self.driver.emit(SimEvent::Locked { piece, spin });

        let scale = catalog().set(piece.set).scale;
        let lines = (outcome.cleared.len() as u8).div_ceil(scale);
        let perfect_clear = lines > 0 && self.board.is_empty();
        let tables = AttackTables {
            lines: &self.ruleset.lines_attack,
            combo: &self.ruleset.combo_attack,
        };
        let mut result = scoring::evaluate_lock(
            &mut self.score,
            lines,
            spin,
            perfect_clear,
            self.ruleset.score_mult,
            tables,
        );

        let well = match outcome.cleared.as_slice() {
            [row] => self.board.four_wide_well(*row as usize),
            _ => None,
        };
        if self.track_four_wide(well) && self.ruleset.no_four_wide {
            if let Some(event) = result.attack.as_mut() {
                debug!("four-wide combo attack {} stripped", event.combo_attack);
                event.attack = event.attack.saturating_sub(event.combo_attack);
                event.combo_attack = 0;
            }
        }

        self.stats.score = self.stats.score.saturating_add(result.points);
        self.stats.lines += lines as u32;
        self.stats.max_combo = self.stats.max_combo.max(self.score.combo);
        self.stats.pieces_since_pc += 1;
        self.stats.lines_since_pc += lines as u32;
        if perfect_clear {
            self.stats.perfect_clears += 1;
            self.stats.pieces_since_pc = 0;
            self.stats.lines_since_pc = 0;
        }
        if !outcome.cleared.is_empty() {
            self.driver.emit(SimEvent::Cleared {
                rows: outcome.cleared.clone(),
            });
        }
        self.driver.emit(SimEvent::Scored {
            action: result.action,
            points: result.points,
        });

        if let Some(event) = result.attack {
            self.stats.attack += event.attack as u32;
            let sent = self.send_attack(event.attack, t);
            self.stats.sent += sent as u32;
            self.driver.emit(SimEvent::Attack { event, sent });
        }

        if outcome.topped_out || above_visible {
            self.end(EndReason::LockOut);
            return;
        }
        if self.ruleset.tsd_only && lines > 0 && result.action != Some(ScoringAction::TSpinDouble)
        {
            self.end(EndReason::TsdOnlyViolation);
            return;
        }
        if let Some(Objective::Lines(goal)) = self.objective {
            if self.stats.lines >= goal {
                self.end(EndReason::Completed);
                return;
            }
        }

        if lines == 0 && self.driver.materializes_garbage() {
            self.materialize_garbage(t);
        }

        let delay = if lines > 0 {
            self.ruleset.clear_delay
        } else {
            0
        };
        self.spawn_due = Some(t + delay);
    }

    /// Follow the well fed by single clears; true once the same well has
    /// been fed four or more times in a row.
    fn track_four_wide(&mut self, well: Option<u8>) -> bool {
        let streak = match (well, self.four_wide) {
            (Some(column), Some((last, count))) if column == last => count + 1,
            (Some(_), _) => 1,
            (None, _) => 0,
        };
        self.four_wide = well.map(|column| (column, streak));
        if streak == 4 {
            if let Some(column) = well {
                self.driver.emit(SimEvent::FourWide { column });
            }
        }
        streak >= 4
    }

    /// Cancel pending garbage with outgoing attack; returns what is sent.
    fn send_attack(&mut self, attack: u8, t: u32) -> u8 {
        let sent = match self.ruleset.blocking() {
            GarbageBlocking::Full => self.garbage.cancel(attack),
            GarbageBlocking::Limited => {
                let was_pending = !self.garbage.is_empty();
                let left = self.garbage.cancel(attack);
                if was_pending {
                    0
                } else {
                    left
                }
            }
            GarbageBlocking::None => attack,
        };
        self.sync_red_bar(t);
        sent
    }

    /// Queue a red bar update when the pending total changed.
    fn sync_red_bar(&mut self, t: u32) {
        if !self.driver.materializes_garbage() {
            return;
        }
        let height = self.garbage.total().min(u8::MAX as u32) as u8;
        if height == self.red_bar {
            return;
        }
        let kind = ActionKind::RedbarSet { height };
        if self.active.is_none() && self.spawn_due.is_none() {
            // Inside a lock: recorded right after the lock itself.
            self.followups.push(kind);
        } else {
            self.apply(&ReplayAction::new(t, kind));
        }
    }

    /// Turn ready garbage into recorded rows (live only).
    fn materialize_garbage(&mut self, t: u32) {
        let ready = self.garbage.pop_ready(t, self.ruleset.g_delay);
        if ready.is_empty() {
            return;
        }
        let width = self.ruleset.gap_w;
        let invert = self.ruleset.g_inv;
        let columns = (BOARD_WIDTH - width + 1) as u32;

        for segment in ready {
            if self.ruleset.solid_attack {
                self.followups.push(ActionKind::SolidGarbageAdd {
                    lines: segment.lines,
                });
                continue;
            }
            // One hole column per segment, rerolled per row by messiness.
            let mut runs: Vec<(u8, u8)> = Vec::new();
            for row in 0..segment.lines {
                let column = match runs.last() {
                    Some(&(column, _))
                        if row > 0 && !self.garbage_rng.chance(self.ruleset.mess) =>
                    {
                        column
                    }
                    _ => self.garbage_rng.next_below(columns) as u8,
                };
                match runs.last_mut() {
                    Some((last, count)) if *last == column && *count < MAX_GARBAGE_ACTION_LINES => {
                        *count += 1
                    }
                    _ => runs.push((column, 1)),
                }
            }
            trace!("materializing {} garbage lines in {} runs", segment.lines, runs.len());
            for (column, lines) in runs {
                let kind = if width == 1 && !invert {
                    ActionKind::GarbageAdd { lines, column }
                } else {
                    ActionKind::Aux(AuxAction::WideGarbageAdd {
                        lines,
                        column,
                        width,
                        invert,
                    })
                };
                self.followups.push(kind);
            }
        }
        let height = self.garbage.total().min(u8::MAX as u32) as u8;
        if height != self.red_bar {
            self.followups.push(ActionKind::RedbarSet { height });
        }
    }

    fn insert_garbage(&mut self, lines: u8, column: u8, width: u8, invert: bool) -> bool {
        if lines == 0 || width == 0 || column as u32 + width as u32 > BOARD_WIDTH as u32 {
            return false;
        }
        let holes = [column; BOARD_HEIGHT as usize];
        let n = (lines as usize).min(holes.len());
        let topped_out = self.board.insert_garbage(GarbageRows {
            holes: &holes[..n],
            width,
            invert,
        });
        self.after_rows_inserted(lines, false, topped_out);
        true
    }

    fn insert_solid(&mut self, lines: u8) -> bool {
        if lines == 0 {
            return false;
        }
        let topped_out = self.board.insert_solid(lines);
        self.after_rows_inserted(lines, true, topped_out);
        true
    }

    fn after_rows_inserted(&mut self, lines: u8, solid: bool, topped_out: bool) {
        self.stats.received += lines as u32;
        self.driver.emit(SimEvent::GarbageInserted { lines, solid });
        if let Some(active) = self.active {
            // Lift the falling piece out of the new rows.
            let lifted = (0..=lines as i8)
                .map(|dy| active.moved(0, -dy))
                .find(|p| !self.board.collides(p));
            match lifted {
                Some(piece) => {
                    self.active = Some(piece);
                    self.touch(self.clock);
                }
                None => {
                    self.end(EndReason::GarbageOut);
                    return;
                }
            }
        }
        if topped_out {
            self.end(EndReason::GarbageOut);
        }
    }

    fn end(&mut self, reason: EndReason) {
        if self.is_ended() {
            return;
        }
        debug!("game ended at {} ms: {reason:?}", self.clock);
        self.status = Status::Ended(reason);
        self.spawn_due = None;
        self.handling.release_all();
        self.driver.emit(SimEvent::Ended(reason));
    }

    fn check_time_objective(&mut self, now: u32) {
        if let Some(Objective::TimeMs(limit)) = self.objective {
            if now >= limit {
                self.clock = self.clock.max(limit);
                self.end(EndReason::Completed);
            }
        }
    }
}

/// Actions that need an active piece; a spawn due at their timestamp happens
/// first.
fn is_piece_action(kind: &ActionKind) -> bool {
    matches!(
        kind,
        ActionKind::MoveLeft
            | ActionKind::MoveRight
            | ActionKind::DasLeft
            | ActionKind::DasRight
            | ActionKind::RotateLeft
            | ActionKind::RotateRight
            | ActionKind::Rotate180
            | ActionKind::HardDrop
            | ActionKind::GravityStep { .. }
            | ActionKind::HoldBlock
            | ActionKind::ArrMove { .. }
            | ActionKind::Aux(AuxAction::MoveTo { .. })
    )
}

impl Simulation<LiveDriver> {
    /// Feed one key event. Timers are advanced to `t` first.
    ///
    /// Returns whether the input changed anything.
    pub fn input(&mut self, input: Input, t: u32) -> bool {
        if self.is_ended() {
            return false;
        }
        let t = t.max(self.clock);
        self.advance(t);
        if self.is_ended() {
            return false;
        }
        match input {
            Input::Press(Key::Left) => self.press_horizontal(Direction::Left, t),
            Input::Press(Key::Right) => self.press_horizontal(Direction::Right, t),
            Input::Release(Key::Left) => {
                self.handling.release(Direction::Left, t);
                true
            }
            Input::Release(Key::Right) => {
                self.handling.release(Direction::Right, t);
                true
            }
            Input::Press(Key::SoftDrop) => {
                let applied = self.submit(t, ActionKind::SoftDrop { begin: true });
                if applied {
                    self.fall_ref = t;
                }
                applied
            }
            Input::Release(Key::SoftDrop) => {
                let applied = self.submit(t, ActionKind::SoftDrop { begin: false });
                if applied {
                    self.fall_ref = t;
                }
                applied
            }
            Input::Press(Key::HardDrop) => {
                if let (Some(min), Some(last)) =
                    (self.ruleset.min_drop_interval_ms(), self.last_hard_drop)
                {
                    if t.saturating_sub(last) < min {
                        debug!("hard drop at {t} ms rejected by the speed limit");
                        return false;
                    }
                }
                let applied = self.submit(t, ActionKind::HardDrop);
                if applied {
                    self.last_hard_drop = Some(t);
                }
                applied
            }
            Input::Press(Key::RotateCw) => self.submit(t, ActionKind::RotateRight),
            Input::Press(Key::RotateCcw) => self.submit(t, ActionKind::RotateLeft),
            Input::Press(Key::Rotate180) => self.submit(t, ActionKind::Rotate180),
            Input::Press(Key::Hold) => self.submit(t, ActionKind::HoldBlock),
            Input::Release(_) => false,
        }
    }

    fn press_horizontal(&mut self, direction: Direction, t: u32) -> bool {
        if !self.handling.press(direction, t) {
            return false;
        }
        let kind = match direction {
            Direction::Left => ActionKind::MoveLeft,
            Direction::Right => ActionKind::MoveRight,
        };
        self.submit(t, kind)
    }

    /// Apply an action stamped `t`; recorded when it took effect.
    pub fn submit(&mut self, t: u32, kind: ActionKind) -> bool {
        self.apply(&ReplayAction::new(t, kind))
    }

    /// Run timers up to `now`: solid garbage, time limit, pending spawn,
    /// DAS/ARR, gravity and soft drop, then lock delay.
    pub fn advance(&mut self, now: u32) {
        if self.is_ended() {
            return;
        }
        let now = now.max(self.clock);

        while let Some(at) = self.ruleset.solid_garbage_at(self.solid_rows) {
            if at > now {
                break;
            }
            self.solid_rows += 1;
            self.add_garbage(GarbageEvent::Solid { lines: 1 }, at);
            if self.is_ended() {
                return;
            }
        }

        self.check_time_objective(now);
        if self.is_ended() {
            return;
        }

        if let Some(due) = self.spawn_due {
            if due <= now {
                self.clock = self.clock.max(due);
                self.spawn_next(self.clock);
            }
        }
        if self.is_ended() || self.active.is_none() {
            return;
        }

        while let Some((at, shift)) = self.handling.poll(now) {
            let (kind, repeat) = match shift {
                Shift::Das(Direction::Left) => (ActionKind::DasLeft, false),
                Shift::Das(Direction::Right) => (ActionKind::DasRight, false),
                Shift::Arr(direction) => (ActionKind::ArrMove { direction }, true),
            };
            if !self.submit(at, kind) && repeat {
                self.handling.skip_to(now);
                break;
            }
        }

        self.apply_gravity(now);
        if self.is_ended() {
            return;
        }

        if let Some(due) = self.lock_due() {
            if due <= now {
                self.submit(due, ActionKind::HardDrop);
            }
        }
    }

    fn apply_gravity(&mut self, now: u32) {
        let Some(active) = self.active else {
            return;
        };
        if self.is_grounded(&active) {
            self.fall_ref = now;
            return;
        }

        let max_rows = BOARD_HEIGHT as u32;
        let gravity = self.ruleset.gravity();
        let rows = match (self.soft_dropping, self.soft_drop, gravity) {
            (_, _, Gravity::Instant) => max_rows,
            (true, SoftDropSpeed::RowsPerStep(rows), _) => rows as u32,
            (true, SoftDropSpeed::Interval(soft), Gravity::Interval(ms)) => {
                self.rows_due(now, soft.min(ms))
            }
            (true, SoftDropSpeed::Interval(soft), Gravity::Off) => self.rows_due(now, soft),
            (false, _, Gravity::Interval(ms)) => self.rows_due(now, ms),
            (false, _, Gravity::Off) => 0,
        };
        if rows > 0 {
            let rows = rows.min(max_rows) as u8;
            self.submit(now, ActionKind::GravityStep { rows });
        }
    }

    fn rows_due(&mut self, now: u32, interval: u32) -> u32 {
        let interval = interval.max(1);
        let rows = now.saturating_sub(self.fall_ref) / interval;
        self.fall_ref += rows * interval;
        rows
    }

    fn lock_due(&self) -> Option<u32> {
        let piece = self.active?;
        let ceiling = self.lock.spawned_at + self.ruleset.max_without_lock();
        if !self.is_grounded(&piece) {
            return Some(ceiling);
        }
        let grounded = self
            .lock
            .grounded_at
            .map_or(ceiling, |t| t + self.ruleset.lock_delay());
        let capped = self
            .lock
            .first_grounded_at
            .map_or(ceiling, |t| t + self.ruleset.max_lock_delay());
        Some(grounded.min(capped).min(ceiling))
    }

    /// Focus changes release every held key and are recorded as AFK markers.
    pub fn set_focus(&mut self, focus: FocusState, t: u32) {
        if focus == self.focus || self.is_ended() {
            return;
        }
        if focus == FocusState::Unfocused {
            self.handling.release_all();
            if self.soft_dropping {
                self.submit(t, ActionKind::SoftDrop { begin: false });
            }
        }
        let away = focus == FocusState::Unfocused;
        self.submit(t, ActionKind::Aux(AuxAction::Afk { away }));
    }

    pub fn set_block_set(&mut self, set: PieceSetId, t: u32) -> bool {
        self.submit(t, ActionKind::Aux(AuxAction::BlockSet { set }))
    }

    pub fn set_randomizer(&mut self, kind: RandomizerKind, t: u32) -> bool {
        self.submit(t, ActionKind::Aux(AuxAction::Randomizer { id: kind.id() }))
    }

    pub fn modify_matrix(&mut self, changes: Vec<(u8, u8)>, t: u32) -> bool {
        self.submit(t, ActionKind::Aux(AuxAction::MatrixMod { changes }))
    }

    pub fn actions(&self) -> &[ReplayAction] {
        self.driver.actions()
    }
}

impl Simulation<PlaybackDriver> {
    /// Apply every recorded action stamped at or before `t`.
    ///
    /// Returns how many actions took effect.
    pub fn play_until(&mut self, t: u32) -> usize {
        let mut applied = 0;
        while let Some(action) = self.driver.pop_due(t) {
            if self.apply(&action) {
                applied += 1;
            }
        }
        if !self.is_ended() {
            self.check_time_objective(t);
        }
        if let Some(due) = self.spawn_due {
            if due <= t && !self.is_ended() {
                self.clock = self.clock.max(due);
                self.spawn_next(self.clock);
            }
        }
        applied
    }

    /// Apply the whole recording.
    pub fn play_to_end(&mut self) -> usize {
        let end = self.driver.end_time().max(self.clock);
        self.play_until(end)
    }

    pub fn remaining(&self) -> usize {
        self.driver.remaining()
    }
}
