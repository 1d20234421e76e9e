//! Pending garbage queue
//!
//! Incoming attack is queued as `(lines, received_at)` segments in arrival
//! order. Outgoing attack cancels from the front; a segment only becomes
//! eligible to materialize once the garbage delay has elapsed since it arrived.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GarbageSegment {
    pub lines: u8,
    pub received_at: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GarbageQueue {
    segments: VecDeque<GarbageSegment>,
}

impl GarbageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, lines: u8, received_at: u32) {
        if lines > 0 {
            self.segments.push_back(GarbageSegment { lines, received_at });
        }
    }

    /// Cancel pending garbage with `attack` lines, oldest first.
    ///
    /// Returns the attack left over once the queue is empty.
    pub fn cancel(&mut self, mut attack: u8) -> u8 {
        while attack > 0 {
            let Some(front) = self.segments.front_mut() else {
                break;
            };
            if front.lines > attack {
                front.lines -= attack;
                return 0;
            }
            attack -= front.lines;
            self.segments.pop_front();
        }
        attack
    }

    /// Remove and return every segment received at least `delay` ms before `now`.
    pub fn pop_ready(&mut self, now: u32, delay: u32) -> Vec<GarbageSegment> {
        let mut ready = Vec::new();
        while let Some(front) = self.segments.front() {
            if now.saturating_sub(front.received_at) < delay {
                break;
            }
            ready.extend(self.segments.pop_front());
        }
        ready
    }

    /// Total pending lines (red bar height).
    pub fn total(&self) -> u32 {
        self.segments.iter().map(|s| s.lines as u32).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &GarbageSegment> {
        self.segments.iter()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }
}
