//! Core game logic - pure, deterministic, and testable
//!
//! This crate contains the rules of the game and the simulation that drives
//! them. It has no dependencies on networking, rendering or I/O; the same seed
//! and the same action stream always produce the same game.
//!
//! # Module Structure
//!
//! - [`catalog`]: piece sets, rotation states, kick tables and all-spin points
//! - [`board`]: 10x21 matrix with collision checks, line clears and garbage
//! - [`rng`] / [`randomizer`]: seeded generator and the piece queue strategies
//! - [`spin`]: T-spin and all-spin detection
//! - [`scoring`]: points, back-to-back, combo and attack
//! - [`finesse`]: fewest presses for a placement
//! - [`ruleset`]: validated game rules
//! - [`garbage`]: pending garbage queue and cancellation
//! - [`handling`]: DAS/ARR timing
//! - [`simulation`] / [`driver`]: one game, fed live or from a recording
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use blockstack_core::{Input, Key, Ruleset, SimOptions, Simulation};
//!
//! let mut sim = Simulation::live(Arc::new(Ruleset::default()), SimOptions::new("seed"));
//! sim.input(Input::Press(Key::HardDrop), 0);
//! assert_eq!(sim.stats().pieces, 1);
//!
//! // Replaying the recorded actions gives the same board.
//! let mut replay = Simulation::playback(
//!     Arc::new(Ruleset::default()),
//!     SimOptions::new("seed"),
//!     sim.actions().to_vec(),
//! );
//! replay.play_to_end();
//! assert_eq!(replay.board(), sim.board());
//! ```

pub mod board;
pub mod catalog;
pub mod driver;
pub mod finesse;
pub mod garbage;
pub mod handling;
pub mod randomizer;
pub mod rng;
pub mod ruleset;
pub mod scoring;
pub mod simulation;
pub mod snapshot;
pub mod spin;

pub use blockstack_types as types;

pub use board::{Board, ClearedRows, GarbageRows, LockOutcome};
pub use catalog::{catalog, try_rotate, Piece, PieceCatalog, PieceDef, PieceSet, RotationSystem};
pub use driver::{Driver, LiveDriver, PlaybackDriver};
pub use garbage::{GarbageQueue, GarbageSegment};
pub use handling::{DasMethod, FocusState, Handling};
pub use randomizer::{Randomizer, RandomizerKind};
pub use rng::Prng;
pub use ruleset::{
    AllSpinMode, GarbageBlocking, Gravity, Ruleset, RulesetConfig, RulesetError, SoftDropSpeed,
};
pub use scoring::{AttackEvent, AttackTables, LockScore, ScoreState};
pub use simulation::{
    EndReason, GarbageEvent, Input, Key, Objective, SimEvent, SimOptions, Simulation, Stats, Status,
};
pub use snapshot::SimSnapshot;
pub use spin::LastMove;
