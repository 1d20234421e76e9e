//! Adapter - the game's outside collaborators
//!
//! # Bot protocol
//!
//! A move-suggestion bot speaks tagged JSON messages (see [`protocol`]):
//!
//! ```text
//! Game -> Bot: {"type":"rules"}
//! Game -> Bot: {"type":"start","hold":null,"queue":["T","I","O","S","Z","L"],"combo":0,"back_to_back":false,"board":[...]}
//! Bot -> Game: {"type":"ready"}
//! Game -> Bot: {"type":"suggest"}
//! Bot -> Game: {"type":"suggestion","moves":[{"location":{"orientation":"north","type":"T","x":3,"y":1},"spin":"none"}]}
//! Game -> Bot: {"type":"play","move":{...}}
//! Game -> Bot: {"type":"new_piece","piece":"J"}
//! ```
//!
//! [`BotBridge`] drives that exchange over tokio channels, bounding every
//! wait with a timeout. A suggested move is validated by the engine before
//! it is played; illegal moves are rejected, never corrected.
//!
//! # Live transport
//!
//! [`live`] holds the shapes exchanged with opponents: packed board
//! snapshots, attack notices and inbound garbage.
//!
//! # Environment Variables
//!
//! - `BLOCKSTACK_BOT_TIMEOUT_MS`: suggestion timeout (default: 1000)
//! - `BLOCKSTACK_BOT_RETRIES`: extra requests before a piece is forfeited (default: 1)
//! - `BLOCKSTACK_BOT_DISABLED`: Set to "1" or "true" to disable bots entirely

pub mod bot;
pub mod config;
pub mod live;
pub mod protocol;

pub use blockstack_core as core;
pub use blockstack_types as types;

pub use bot::{take_turn, BotBridge, BotEndpoint, BotError, Turn};
pub use config::BotConfig;
pub use live::{
    parse_binary_matrix, row_to_binary, AttackMessage, LiveError, LiveInbound, LiveSnapshot,
};
pub use protocol::*;
