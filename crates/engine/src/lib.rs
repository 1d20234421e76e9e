//! Game glue above the core rules
//!
//! - [`place`]: validating and playing bot placements
//! - [`recorder`]: a live game recorded into both replay formats
//! - [`playback`]: re-simulating a legacy replay

pub mod place;
pub mod playback;
pub mod recorder;

pub use place::{apply_bot_move, PlaceError, Placement, Reachable, SpinClaim};
pub use playback::{PlaybackSession, PlaybackSummary};
pub use recorder::{replay_meta, GameRecorder, RecordError, Recording};
