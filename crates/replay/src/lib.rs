//! Replay codecs
//!
//! Two formats are supported:
//!
//! - [`legacy`]: the recorded [`ReplayAction`](blockstack_types::ReplayAction)
//!   stream, enough to re-simulate a game bit for bit
//! - [`replay2`]: FULL/DIFF frames of the visible state, for viewers that do
//!   not run the simulation
//!
//! Both are MSB-first bit streams ([`bitstream`]); [`export`] wraps a finished
//! stream in Base64 with a SHA-256 content hash.

pub mod bitstream;
pub mod error;
pub mod export;
pub mod legacy;
pub mod piece;
pub mod replay2;

pub use bitstream::{BitReader, BitWriter};
pub use error::{CodecError, CodecResult};
pub use export::{content_hash, decode_blob, ReplayExport, ReplayInfo};
pub use legacy::{decode_actions, encode_actions, LegacyEncoder, LegacyReplay, ReplayMeta};
pub use piece::Position;
pub use replay2::{
    Frame, FrameType, Replay2Config, Replay2Decoder, Replay2Encoder, ReplayState,
};
