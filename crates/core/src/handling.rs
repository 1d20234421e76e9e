//! DAS/ARR handling for horizontal movement.
//!
//! Works on absolute timestamps so that the shifts it produces can be
//! recorded and replayed. The initial tap is applied by the caller on press;
//! after `das` ms of holding, the handler yields one shift every `arr` ms, or
//! a single move-to-wall when `arr` is zero. The most recently pressed
//! direction wins; releasing it hands control back to the other direction if
//! that one is still held, with a fresh DAS charge.

use crate::types::{Direction, FRAME_RATE};

/// How DAS and ARR durations are evaluated.
///
/// Replays store this as `0` for [`DasMethod::TimeBased`] and `1` for
/// [`DasMethod::FrameBased`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DasMethod {
    /// Durations are used as given, in milliseconds.
    #[default]
    TimeBased,
    /// Durations are rounded up to whole 60 Hz frames.
    FrameBased,
}

impl DasMethod {
    pub fn from_id(id: u8) -> Self {
        if id == 1 {
            DasMethod::FrameBased
        } else {
            DasMethod::TimeBased
        }
    }

    pub fn id(self) -> u8 {
        match self {
            DasMethod::TimeBased => 0,
            DasMethod::FrameBased => 1,
        }
    }

    pub fn effective_ms(self, ms: u32) -> u32 {
        match self {
            DasMethod::TimeBased => ms,
            DasMethod::FrameBased => {
                let frames = (ms * FRAME_RATE).div_ceil(1000);
                frames * 1000 / FRAME_RATE
            }
        }
    }
}

/// Window focus. `0` is [`FocusState::Focused`], `1` is
/// [`FocusState::Unfocused`]; losing focus releases every held key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusState {
    #[default]
    Focused,
    Unfocused,
}

impl FocusState {
    pub fn id(self) -> u8 {
        match self {
            FocusState::Focused => 0,
            FocusState::Unfocused => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    /// Move as far as possible in one step (ARR 0).
    Das(Direction),
    /// Move one column.
    Arr(Direction),
}

#[derive(Debug, Clone)]
pub struct Handling {
    das: u32,
    arr: u32,
    horizontal: Option<Direction>,
    left_held: bool,
    right_held: bool,
    /// Time of the next shift, while one is scheduled.
    next_due: Option<u32>,
    /// DAS is charged with ARR 0; every new piece gets a move-to-wall.
    charged: bool,
}

impl Handling {
    pub fn new(das: u32, arr: u32, method: DasMethod) -> Self {
        Self {
            das: method.effective_ms(das),
            arr: method.effective_ms(arr),
            horizontal: None,
            left_held: false,
            right_held: false,
            next_due: None,
            charged: false,
        }
    }

    pub fn das(&self) -> u32 {
        self.das
    }

    pub fn arr(&self) -> u32 {
        self.arr
    }

    pub fn direction(&self) -> Option<Direction> {
        self.horizontal
    }

    fn held(&mut self, direction: Direction) -> &mut bool {
        match direction {
            Direction::Left => &mut self.left_held,
            Direction::Right => &mut self.right_held,
        }
    }

    fn charge(&mut self, direction: Direction, t: u32) {
        self.horizontal = Some(direction);
        self.next_due = Some(t.saturating_add(self.das));
        self.charged = false;
    }

    /// Returns false when the key was already held (key repeat).
    pub fn press(&mut self, direction: Direction, t: u32) -> bool {
        let held = self.held(direction);
        if *held {
            return false;
        }
        *held = true;
        self.charge(direction, t);
        true
    }

    pub fn release(&mut self, direction: Direction, t: u32) {
        *self.held(direction) = false;
        if self.horizontal != Some(direction) {
            return;
        }
        let other = match direction {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        };
        if *self.held(other) {
            self.charge(other, t);
        } else {
            self.release_all();
        }
    }

    pub fn release_all(&mut self) {
        self.horizontal = None;
        self.left_held = false;
        self.right_held = false;
        self.next_due = None;
        self.charged = false;
    }

    /// Next shift due at or before `now`, with its timestamp.
    pub fn poll(&mut self, now: u32) -> Option<(u32, Shift)> {
        let direction = self.horizontal?;
        let due = self.next_due?;
        if due > now {
            return None;
        }
        if self.arr == 0 {
            self.next_due = None;
            self.charged = true;
            Some((due, Shift::Das(direction)))
        } else {
            self.next_due = Some(due + self.arr);
            Some((due, Shift::Arr(direction)))
        }
    }

    /// A blocked repeat: skip the backlog up to `now`.
    pub fn skip_to(&mut self, now: u32) {
        if let Some(due) = self.next_due {
            if due <= now && self.arr > 0 {
                let missed = (now - due) / self.arr + 1;
                self.next_due = Some(due + missed * self.arr);
            }
        }
    }

    /// New piece: a charged ARR-0 direction shifts it to the wall right away.
    pub fn on_spawn(&mut self, t: u32) {
        if self.charged && self.horizontal.is_some() {
            self.next_due = Some(t);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_based_rounds_up_to_frames() {
        assert_eq!(DasMethod::TimeBased.effective_ms(90), 90);
        assert_eq!(DasMethod::FrameBased.effective_ms(90), 100);
        assert_eq!(DasMethod::FrameBased.effective_ms(133), 133);
        assert_eq!(DasMethod::FrameBased.effective_ms(0), 0);
        assert_eq!(DasMethod::from_id(1), DasMethod::FrameBased);
        assert_eq!(DasMethod::from_id(0).id(), 0);
    }

    #[test]
    fn das_then_arr_repeats() {
        let mut handling = Handling::new(133, 10, DasMethod::TimeBased);
        assert!(handling.press(Direction::Left, 0));
        assert!(!handling.press(Direction::Left, 5));
        assert_eq!(handling.poll(132), None);
        assert_eq!(handling.poll(150), Some((133, Shift::Arr(Direction::Left))));
        assert_eq!(handling.poll(150), Some((143, Shift::Arr(Direction::Left))));
        assert_eq!(handling.poll(150), None);
    }

    #[test]
    fn zero_arr_moves_to_wall_once_per_piece() {
        let mut handling = Handling::new(100, 0, DasMethod::TimeBased);
        handling.press(Direction::Right, 0);
        assert_eq!(handling.poll(100), Some((100, Shift::Das(Direction::Right))));
        assert_eq!(handling.poll(500), None);
        handling.on_spawn(600);
        assert_eq!(handling.poll(600), Some((600, Shift::Das(Direction::Right))));
    }

    #[test]
    fn release_hands_over_to_other_direction() {
        let mut handling = Handling::new(100, 10, DasMethod::TimeBased);
        handling.press(Direction::Left, 0);
        handling.press(Direction::Right, 20);
        assert_eq!(handling.direction(), Some(Direction::Right));
        handling.release(Direction::Right, 50);
        assert_eq!(handling.direction(), Some(Direction::Left));
        assert_eq!(handling.poll(149), None);
        assert_eq!(handling.poll(150), Some((150, Shift::Arr(Direction::Left))));
        handling.release(Direction::Left, 160);
        assert_eq!(handling.direction(), None);
        assert_eq!(handling.poll(1_000), None);
    }

    #[test]
    fn skip_drops_backlog() {
        let mut handling = Handling::new(100, 10, DasMethod::TimeBased);
        handling.press(Direction::Left, 0);
        handling.skip_to(1_000);
        assert_eq!(handling.poll(1_000), None);
        assert_eq!(handling.poll(1_010), Some((1_010, Shift::Arr(Direction::Left))));
    }
}
