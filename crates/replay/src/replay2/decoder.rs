use log::trace;

use super::frame::{Frame, FrameType};
use super::state::ReplayState;
use super::DIFF_FRAME_MAX_TIME;
use crate::bitstream::BitReader;
use crate::error::{CodecError, CodecResult};

/// Streams are byte padded; fewer bits than this cannot start a frame.
const MIN_FRAME_BITS: usize = 8;

/// Incremental frame reader.
#[derive(Debug, Clone)]
pub struct Replay2Decoder<'a> {
    reader: BitReader<'a>,
    last_t: Option<u32>,
    last_full: Option<u32>,
}

impl<'a> Replay2Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            reader: BitReader::new(bytes),
            last_t: None,
            last_full: None,
        }
    }

    /// Next frame, or `None` at the end of the stream.
    pub fn next_frame(&mut self) -> CodecResult<Option<Frame>> {
        if self.reader.remaining() < MIN_FRAME_BITS {
            return Ok(None);
        }
        let frame = Frame::read(&mut self.reader, self.last_t)?;
        match frame.kind {
            FrameType::Full => {
                if let Some(previous) = self.last_t.filter(|&p| frame.timestamp < p) {
                    return Err(CodecError::TimeReversed {
                        t: frame.timestamp,
                        previous,
                    });
                }
                self.last_full = Some(frame.timestamp);
            }
            FrameType::Diff => {
                let last_full = self.last_full.ok_or(CodecError::InvalidFrame {
                    timestamp: frame.timestamp,
                    reason: "diff frame before any full frame",
                })?;
                if frame.timestamp - last_full > DIFF_FRAME_MAX_TIME {
                    return Err(CodecError::InvalidFrame {
                        timestamp: frame.timestamp,
                        reason: "diff frame too far from its full frame",
                    });
                }
            }
        }
        trace!("replay2 {:?} frame at {} ms", frame.kind, frame.timestamp);
        self.last_t = Some(frame.timestamp);
        Ok(Some(frame))
    }
}

impl Iterator for Replay2Decoder<'_> {
    type Item = CodecResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

/// Decode every frame of a stream.
pub fn decode(bytes: &[u8]) -> CodecResult<Vec<Frame>> {
    Replay2Decoder::new(bytes).collect()
}

/// The state after each frame.
pub fn states(frames: &[Frame]) -> CodecResult<Vec<(u32, ReplayState)>> {
    let mut state = ReplayState::default();
    frames
        .iter()
        .map(|frame| {
            state.apply(frame)?;
            Ok((frame.timestamp, state.clone()))
        })
        .collect()
}

/// State at time `t`, starting from the last FULL frame at or before it.
pub fn seek(frames: &[Frame], t: u32) -> CodecResult<ReplayState> {
    let end = frames.partition_point(|f| f.timestamp <= t);
    let start = frames[..end]
        .iter()
        .rposition(|f| f.kind == FrameType::Full)
        .unwrap_or(0);
    let mut state = ReplayState::default();
    for frame in &frames[start..end] {
        state.apply(frame)?;
    }
    Ok(state)
}
