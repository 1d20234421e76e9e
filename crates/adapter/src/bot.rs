//! Bot bridge
//!
//! The bot runs outside the game (a worker task or a child process) and is
//! reached through a pair of channels. Every wait on it is bounded by
//! [`BotConfig::timeout`]; a bot that stays silent through all retries
//! forfeits the piece.

use std::process::Stdio;

use anyhow::Context;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::timeout;

use blockstack_engine::{GameRecorder, PlaceError, RecordError};
use blockstack_types::PieceSetId;

use crate::config::BotConfig;
use crate::protocol::{piece_letter, BotCommand, BotMessage, BotState, Move};

/// Messages buffered in each direction.
const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BotError {
    #[error("bots are disabled")]
    Disabled,
    #[error("bot disconnected")]
    Disconnected,
    #[error("bot is not ready (state {0:?})")]
    NotReady(BotState),
    #[error("bot did not become ready in time")]
    StartTimeout,
    #[error("bot reported an error: {0}")]
    Bot(String),
}

/// Bot side of a bridge.
#[derive(Debug)]
pub struct BotEndpoint {
    pub commands: mpsc::Receiver<BotCommand>,
    pub replies: mpsc::Sender<BotMessage>,
}

#[derive(Debug)]
pub struct BotBridge {
    config: BotConfig,
    to_bot: mpsc::Sender<BotCommand>,
    from_bot: mpsc::Receiver<BotMessage>,
    state: BotState,
    name: Option<String>,
    forfeits: u32,
}

impl BotBridge {
    pub fn channel(config: BotConfig) -> (Self, BotEndpoint) {
        let (to_bot, commands) = mpsc::channel(CHANNEL_CAPACITY);
        let (replies, from_bot) = mpsc::channel(CHANNEL_CAPACITY);
        let bridge = Self {
            config,
            to_bot,
            from_bot,
            state: BotState::NoInfo,
            name: None,
            forfeits: 0,
        };
        (bridge, BotEndpoint { commands, replies })
    }

    /// Run `program` as a bot speaking line-delimited JSON on stdin/stdout.
    pub fn spawn_process(
        config: BotConfig,
        program: &str,
        args: &[String],
    ) -> anyhow::Result<(Self, Child)> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start bot {program}"))?;
        let mut stdin = child.stdin.take().context("bot stdin unavailable")?;
        let stdout = child.stdout.take().context("bot stdout unavailable")?;
        let (bridge, mut endpoint) = Self::channel(config);

        tokio::spawn(async move {
            while let Some(command) = endpoint.commands.recv().await {
                let Ok(mut line) = serde_json::to_string(&command) else {
                    continue;
                };
                line.push('\n');
                if stdin.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });
        let replies = endpoint.replies;
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match serde_json::from_str::<BotMessage>(&line) {
                    Ok(message) => {
                        if replies.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!("ignoring bot output {line:?}: {err}"),
                }
            }
        });

        Ok((bridge, child))
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Pieces given up because the bot did not answer.
    pub fn forfeits(&self) -> u32 {
        self.forfeits
    }

    async fn send(&mut self, command: BotCommand) -> Result<(), BotError> {
        if self.to_bot.send(command).await.is_err() {
            self.state = BotState::Stopped;
            return Err(BotError::Disconnected);
        }
        Ok(())
    }

    /// Absorb `info` and `error`; anything else is handed back.
    fn handle(&mut self, message: BotMessage) -> Result<Option<BotMessage>, BotError> {
        match message {
            BotMessage::Info { name, version } => {
                info!("bot {name} {version}");
                self.name = Some(name);
                Ok(None)
            }
            BotMessage::Error { reason } => {
                self.state = BotState::Stopped;
                Err(BotError::Bot(reason))
            }
            other => Ok(Some(other)),
        }
    }

    async fn recv(&mut self) -> Result<BotMessage, BotError> {
        loop {
            let Some(message) = self.from_bot.recv().await else {
                self.state = BotState::Stopped;
                return Err(BotError::Disconnected);
            };
            if let Some(message) = self.handle(message)? {
                return Ok(message);
            }
        }
    }

    /// Discard replies already queued, so the next suggestion read answers
    /// the request about to be sent.
    fn drain_stale(&mut self) -> Result<(), BotError> {
        loop {
            match self.from_bot.try_recv() {
                Ok(message) => {
                    if let Some(stale) = self.handle(message)? {
                        debug!("dropping stale bot reply {stale:?}");
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => return Ok(()),
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.state = BotState::Stopped;
                    return Err(BotError::Disconnected);
                }
            }
        }
    }

    async fn wait_ready(&mut self) -> Result<(), BotError> {
        loop {
            if let BotMessage::Ready = self.recv().await? {
                return Ok(());
            }
        }
    }

    async fn wait_suggestion(&mut self) -> Result<Vec<Move>, BotError> {
        loop {
            if let BotMessage::Suggestion { moves } = self.recv().await? {
                return Ok(moves);
            }
        }
    }

    /// Send the rules and the game start, then wait for `ready`.
    pub async fn start(&mut self, start: BotCommand) -> Result<(), BotError> {
        if self.config.disabled {
            return Err(BotError::Disabled);
        }
        self.state = BotState::Initializing;
        self.send(BotCommand::Rules).await?;
        self.send(start).await?;
        match timeout(self.config.timeout, self.wait_ready()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("bot did not become ready within {:?}", self.config.timeout);
                self.state = BotState::Stopped;
                return Err(BotError::StartTimeout);
            }
        }
        self.state = BotState::Ready;
        Ok(())
    }

    /// Ask for a move. `None` means the bot forfeits this piece, either by
    /// suggesting nothing or by timing out on every attempt.
    pub async fn request_move(&mut self) -> Result<Option<Move>, BotError> {
        if self.state != BotState::Ready {
            return Err(BotError::NotReady(self.state));
        }
        let attempts = self.config.retries + 1;
        for attempt in 1..=attempts {
            self.state = BotState::SendingMove;
            self.drain_stale()?;
            self.send(BotCommand::Suggest).await?;
            match timeout(self.config.timeout, self.wait_suggestion()).await {
                Ok(result) => {
                    let moves = result?;
                    self.state = BotState::Ready;
                    return Ok(moves.into_iter().next());
                }
                Err(_) => warn!("bot suggestion timed out (attempt {attempt}/{attempts})"),
            }
        }
        self.state = BotState::Ready;
        self.forfeits += 1;
        Ok(None)
    }

    pub async fn play(&mut self, mv: Move) -> Result<(), BotError> {
        self.send(BotCommand::Play { mv }).await
    }

    pub async fn new_piece(&mut self, piece: char) -> Result<(), BotError> {
        self.send(BotCommand::NewPiece { piece }).await
    }

    pub async fn stop(&mut self) -> Result<(), BotError> {
        let result = self.send(BotCommand::Stop).await;
        self.state = BotState::Stopped;
        result
    }
}

/// What happened to one bot turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    Played(Move),
    Rejected(PlaceError),
    Forfeit,
}

/// Ask the bot for a move and play it in `recorder`.
///
/// Illegal moves are reported, never corrected. After a played move the bot
/// is told about the piece that entered the preview.
pub async fn take_turn(
    bridge: &mut BotBridge,
    recorder: &mut GameRecorder,
    t: u32,
) -> anyhow::Result<Turn> {
    let Some(mv) = bridge.request_move().await? else {
        return Ok(Turn::Forfeit);
    };
    let set = recorder
        .sim()
        .active()
        .map_or(PieceSetId::Standard, |piece| piece.set);
    let Some(placement) = mv.to_placement(set) else {
        return Ok(Turn::Rejected(PlaceError::WrongPiece));
    };
    match recorder.play(&placement, t) {
        Ok(()) => {}
        Err(RecordError::Place(err)) => {
            debug!("bot move rejected: {err}");
            return Ok(Turn::Rejected(err));
        }
        Err(err) => return Err(err.into()),
    }
    // Spawn the next piece so the preview has moved on.
    recorder.advance(t)?;
    bridge.play(mv).await?;

    let previews = recorder.sim().ruleset().show_previews as usize;
    let entered = recorder
        .sim()
        .queue()
        .nth(previews.saturating_sub(1))
        .and_then(|&p| piece_letter(p));
    if let Some(piece) = entered {
        bridge.new_piece(piece).await?;
    }
    Ok(Turn::Played(mv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(retries: u32) -> BotConfig {
        BotConfig {
            timeout: Duration::from_millis(50),
            retries,
            disabled: false,
        }
    }

    fn start_command() -> BotCommand {
        BotCommand::Start {
            hold: None,
            queue: vec!['T'],
            combo: 0,
            back_to_back: false,
            board: Vec::new(),
        }
    }

    #[tokio::test]
    async fn start_waits_for_ready() {
        let (mut bridge, mut bot) = BotBridge::channel(config(0));
        let handle = tokio::spawn(async move {
            assert_eq!(bot.commands.recv().await, Some(BotCommand::Rules));
            assert!(matches!(
                bot.commands.recv().await,
                Some(BotCommand::Start { .. })
            ));
            bot.replies
                .send(BotMessage::Info {
                    name: "stub".into(),
                    version: "1".into(),
                })
                .await
                .unwrap();
            bot.replies.send(BotMessage::Ready).await.unwrap();
            bot
        });
        tokio_test::assert_ok!(bridge.start(start_command()).await);
        assert_eq!(bridge.state(), BotState::Ready);
        assert_eq!(bridge.name(), Some("stub"));
        drop(handle.await.unwrap());
    }

    #[tokio::test]
    async fn silent_bot_forfeits_after_retries() {
        let (mut bridge, mut bot) = BotBridge::channel(config(2));
        bot.replies.send(BotMessage::Ready).await.unwrap();
        bridge.start(start_command()).await.unwrap();

        assert_eq!(bridge.request_move().await, Ok(None));
        assert_eq!(bridge.forfeits(), 1);
        assert_eq!(bridge.state(), BotState::Ready);

        let mut suggests = 0;
        while let Ok(command) = bot.commands.try_recv() {
            if command == BotCommand::Suggest {
                suggests += 1;
            }
        }
        assert_eq!(suggests, 3);
    }

    fn drop_at(x: i8) -> Move {
        Move {
            location: crate::protocol::Location {
                orientation: crate::protocol::Orientation(blockstack_types::Rotation::North),
                piece: 'T',
                x,
                y: 1,
            },
            spin: crate::protocol::Spin::None,
        }
    }

    #[tokio::test]
    async fn queued_suggestion_is_not_taken_for_the_new_request() {
        let (mut bridge, mut bot) = BotBridge::channel(config(0));
        bot.replies.send(BotMessage::Ready).await.unwrap();
        bridge.start(start_command()).await.unwrap();

        // Reply to a request the bridge already gave up on.
        bot.replies
            .send(BotMessage::Suggestion {
                moves: vec![drop_at(0)],
            })
            .await
            .unwrap();
        let handle = tokio::spawn(async move {
            while let Some(command) = bot.commands.recv().await {
                if command == BotCommand::Suggest {
                    let moves = vec![drop_at(5)];
                    bot.replies
                        .send(BotMessage::Suggestion { moves })
                        .await
                        .unwrap();
                    break;
                }
            }
            bot
        });

        assert_eq!(bridge.request_move().await, Ok(Some(drop_at(5))));
        drop(handle.await.unwrap());
    }

    #[tokio::test]
    async fn unanswered_request_does_not_shadow_the_next_reply() {
        let (mut bridge, mut bot) = BotBridge::channel(config(0));
        bot.replies.send(BotMessage::Ready).await.unwrap();
        bridge.start(start_command()).await.unwrap();

        // The bot never answers the first request.
        assert_eq!(bridge.request_move().await, Ok(None));
        assert_eq!(bridge.forfeits(), 1);

        let handle = tokio::spawn(async move {
            let mut suggests = 0;
            while let Some(command) = bot.commands.recv().await {
                if command == BotCommand::Suggest {
                    suggests += 1;
                    if suggests == 2 {
                        let moves = vec![drop_at(2)];
                        bot.replies
                            .send(BotMessage::Suggestion { moves })
                            .await
                            .unwrap();
                        break;
                    }
                }
            }
            bot
        });

        assert_eq!(bridge.request_move().await, Ok(Some(drop_at(2))));
        assert_eq!(bridge.forfeits(), 1);
        drop(handle.await.unwrap());
    }

    #[tokio::test]
    async fn disconnected_bot_is_an_error() {
        let (mut bridge, bot) = BotBridge::channel(config(0));
        drop(bot);
        assert_eq!(
            bridge.start(start_command()).await,
            Err(BotError::Disconnected)
        );
        assert_eq!(bridge.state(), BotState::Stopped);
    }

    #[tokio::test]
    async fn request_before_start_is_refused() {
        let (mut bridge, _bot) = BotBridge::channel(config(0));
        assert_eq!(
            bridge.request_move().await,
            Err(BotError::NotReady(BotState::NoInfo))
        );
    }

    #[tokio::test]
    async fn disabled_config_refuses_to_start() {
        let mut disabled = config(0);
        disabled.disabled = true;
        let (mut bridge, _bot) = BotBridge::channel(disabled);
        assert_eq!(
            bridge.start(start_command()).await,
            Err(BotError::Disabled)
        );
    }
}
