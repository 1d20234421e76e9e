//! Piece randomizers
//!
//! Every variant draws from its own [`Prng`], so the same seed and the same
//! number of `next_piece` calls always produce the same sequence.
//!
//! | Ruleset `rnd` | Randomizer |
//! |---------------|------------|
//! | 0 | 7-bag |
//! | 1 | 14-bag (two copies of each piece) |
//! | 2 | Classic uniform |
//! | 3 | One-block |
//! | 4 | Two-block |
//! | 5 | C2 simulation |

use std::collections::VecDeque;

use crate::catalog::catalog;
use crate::rng::Prng;
use crate::types::{PieceRef, PieceSetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RandomizerKind {
    Bag7,
    Bag14,
    Classic,
    OneBlock,
    TwoBlock,
    C2Sim,
}

impl RandomizerKind {
    pub const ALL: [RandomizerKind; 6] = [
        RandomizerKind::Bag7,
        RandomizerKind::Bag14,
        RandomizerKind::Classic,
        RandomizerKind::OneBlock,
        RandomizerKind::TwoBlock,
        RandomizerKind::C2Sim,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }
}

/// Shuffled pool of ids `0..pool`, each present `repeats` times.
#[derive(Debug, Clone)]
pub struct Bag {
    rng: Prng,
    pool: u8,
    repeats: u8,
    bag: Vec<u8>,
    index: usize,
}

impl Bag {
    pub fn new(seed: &str, pool: u8, repeats: u8) -> Self {
        Self::with_rng(Prng::new(seed), pool, repeats)
    }

    fn with_rng(rng: Prng, pool: u8, repeats: u8) -> Self {
        Self {
            rng,
            pool,
            repeats: repeats.max(1),
            bag: Vec::new(),
            index: 0,
        }
    }

    fn refill(&mut self) {
        self.bag.clear();
        for _ in 0..self.repeats {
            self.bag.extend(0..self.pool);
        }
        self.rng.shuffle(&mut self.bag);
        self.index = 0;
    }

    pub fn next_id(&mut self) -> Option<u8> {
        if self.pool == 0 {
            return None;
        }
        if self.index >= self.bag.len() {
            self.refill();
        }
        let id = self.bag[self.index];
        self.index += 1;
        Some(id)
    }
}

/// Uniform draw, no memory.
#[derive(Debug, Clone)]
pub struct Classic {
    rng: Prng,
    pool: u8,
}

impl Classic {
    pub fn new(seed: &str, pool: u8) -> Self {
        Self {
            rng: Prng::new(seed),
            pool,
        }
    }

    pub fn next_id(&mut self) -> Option<u8> {
        (self.pool > 0).then(|| self.rng.next_below(self.pool as u32) as u8)
    }
}

/// Uniform draw that never repeats the immediately preceding id.
#[derive(Debug, Clone)]
pub struct C2Sim {
    rng: Prng,
    pool: u8,
    previous: Option<u8>,
}

impl C2Sim {
    pub fn new(seed: &str, pool: u8) -> Self {
        Self {
            rng: Prng::new(seed),
            pool,
            previous: None,
        }
    }

    pub fn next_id(&mut self) -> Option<u8> {
        let id = match (self.pool, self.previous) {
            (0, _) => return None,
            (1, _) => 0,
            (pool, None) => self.rng.next_below(pool as u32) as u8,
            (pool, Some(prev)) => {
                let id = self.rng.next_below(pool as u32 - 1) as u8;
                if id >= prev {
                    id + 1
                } else {
                    id
                }
            }
        };
        self.previous = Some(id);
        Some(id)
    }
}

/// Bag draw restricted to a caller-supplied subset of ids.
#[derive(Debug, Clone)]
pub struct BsBlock {
    bag: Bag,
    ids: Vec<u8>,
}

impl BsBlock {
    pub fn new(seed: &str, ids: Vec<u8>) -> Self {
        Self::with_rng(Prng::new(seed), ids)
    }

    fn with_rng(rng: Prng, ids: Vec<u8>) -> Self {
        Self {
            bag: Bag::with_rng(rng, ids.len() as u8, 1),
            ids,
        }
    }

    pub fn next_id(&mut self) -> Option<u8> {
        let slot = self.bag.next_id()?;
        self.ids.get(slot as usize).copied()
    }
}

/// A few kinds picked once per game, then dealt out of a bag.
///
/// `roll` shuffles are discarded before picking, `pick` kinds are kept; with
/// `pick == 1` the game is a single kind repeated forever.
#[derive(Debug, Clone)]
pub struct OneBlock {
    inner: BsBlock,
}

impl OneBlock {
    pub fn new(seed: &str, pool: u8, pick: u8, roll: u8) -> Self {
        let mut rng = Prng::new(seed);
        let mut ids: Vec<u8> = (0..pool).collect();
        for _ in 0..=roll {
            rng.shuffle(&mut ids);
        }
        ids.truncate(pick.clamp(1, pool.max(1)) as usize);
        Self {
            inner: BsBlock::with_rng(rng, ids),
        }
    }

    pub fn picked(&self) -> &[u8] {
        &self.inner.ids
    }

    pub fn next_id(&mut self) -> Option<u8> {
        self.inner.next_id()
    }
}

/// Repeats one segment drawn from a bag.
#[derive(Debug, Clone)]
pub struct Repeated {
    source: Bag,
    length: usize,
    segment: Vec<u8>,
    index: usize,
}

impl Repeated {
    pub fn new(source: Bag, length: usize) -> Self {
        let mut repeated = Self {
            source,
            length: length.max(1),
            segment: Vec::new(),
            index: 0,
        };
        repeated.next_segment();
        repeated
    }

    /// Replace the repeating segment with fresh draws from the bag.
    pub fn next_segment(&mut self) {
        self.segment.clear();
        for _ in 0..self.length {
            match self.source.next_id() {
                Some(id) => self.segment.push(id),
                None => break,
            }
        }
        self.index = 0;
    }

    pub fn segment(&self) -> &[u8] {
        &self.segment
    }

    pub fn next_id(&mut self) -> Option<u8> {
        if self.segment.is_empty() {
            return None;
        }
        let id = self.segment[self.index % self.segment.len()];
        self.index += 1;
        Some(id)
    }
}

#[derive(Debug, Clone)]
pub enum Randomizer {
    Bag(Bag, PieceSetId),
    Classic(Classic, PieceSetId),
    OneBlock(OneBlock, PieceSetId),
    C2Sim(C2Sim, PieceSetId),
    Repeated(Repeated, PieceSetId),
    BsBlock(BsBlock, PieceSetId),
    /// Subset bag whose pieces are dealt from the Big set.
    BigBlockRand(BsBlock),
    ConstBlock(PieceRef),
    /// Finite scripted queue; exhausting it ends the round.
    Fixed(VecDeque<PieceRef>),
}

impl Randomizer {
    /// Randomizer selected by the ruleset's `rnd` id over a piece set.
    pub fn from_kind(kind: RandomizerKind, seed: &str, set: PieceSetId) -> Self {
        let pool = catalog().set(set).len() as u8;
        match kind {
            RandomizerKind::Bag7 => Randomizer::Bag(Bag::new(seed, pool, 1), set),
            RandomizerKind::Bag14 => Randomizer::Bag(Bag::new(seed, pool, 2), set),
            RandomizerKind::Classic => Randomizer::Classic(Classic::new(seed, pool), set),
            RandomizerKind::OneBlock => {
                Randomizer::OneBlock(OneBlock::new(seed, pool, 1, 0), set)
            }
            RandomizerKind::TwoBlock => {
                Randomizer::OneBlock(OneBlock::new(seed, pool, 2, 0), set)
            }
            RandomizerKind::C2Sim => Randomizer::C2Sim(C2Sim::new(seed, pool), set),
        }
    }

    pub fn big_block_rand(seed: &str, ids: Vec<u8>) -> Self {
        Randomizer::BigBlockRand(BsBlock::new(seed, ids))
    }

    pub fn fixed(pieces: impl IntoIterator<Item = PieceRef>) -> Self {
        Randomizer::Fixed(pieces.into_iter().collect())
    }

    /// Next piece, or `None` once a finite queue runs dry.
    pub fn next_piece(&mut self) -> Option<PieceRef> {
        match self {
            Randomizer::Bag(bag, set) => bag.next_id().map(|id| PieceRef::new(id, *set)),
            Randomizer::Classic(classic, set) => {
                classic.next_id().map(|id| PieceRef::new(id, *set))
            }
            Randomizer::OneBlock(one, set) => one.next_id().map(|id| PieceRef::new(id, *set)),
            Randomizer::C2Sim(c2, set) => c2.next_id().map(|id| PieceRef::new(id, *set)),
            Randomizer::Repeated(rep, set) => rep.next_id().map(|id| PieceRef::new(id, *set)),
            Randomizer::BsBlock(bs, set) => bs.next_id().map(|id| PieceRef::new(id, *set)),
            Randomizer::BigBlockRand(bs) => {
                bs.next_id().map(|id| PieceRef::new(id, PieceSetId::Big))
            }
            Randomizer::ConstBlock(piece) => Some(*piece),
            Randomizer::Fixed(queue) => queue.pop_front(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(randomizer: &mut Randomizer, n: usize) -> Vec<u8> {
        (0..n)
            .map(|_| randomizer.next_piece().map(|p| p.id).unwrap())
            .collect()
    }

    #[test]
    fn bag_is_reproducible_for_a_seed() {
        let seq = |seed| {
            let mut r = Randomizer::Bag(Bag::new(seed, 7, 1), PieceSetId::Standard);
            draw(&mut r, 14)
        };
        assert_eq!(seq("abc123"), seq("abc123"));
    }

    #[test]
    fn seven_bag_sequence_is_pinned() {
        let mut r = Randomizer::from_kind(RandomizerKind::Bag7, "abc123", PieceSetId::Standard);
        assert_eq!(
            draw(&mut r, 14),
            [1, 6, 5, 0, 4, 2, 3, 1, 4, 2, 3, 6, 5, 0]
        );
    }

    #[test]
    fn bag_deals_each_piece_once_per_bag() {
        let mut bag = Bag::new("bags", 7, 1);
        for _ in 0..3 {
            let mut ids: Vec<u8> = (0..7).map(|_| bag.next_id().unwrap()).collect();
            ids.sort();
            assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 6]);
        }
    }

    #[test]
    fn fourteen_bag_has_two_copies() {
        let mut bag = Bag::new("double", 7, 2);
        let mut counts = [0u8; 7];
        for _ in 0..14 {
            counts[bag.next_id().unwrap() as usize] += 1;
        }
        assert_eq!(counts, [2; 7]);
    }

    #[test]
    fn c2_never_repeats_previous() {
        let mut c2 = C2Sim::new("c2", 7);
        let mut prev = c2.next_id().unwrap();
        for _ in 0..500 {
            let next = c2.next_id().unwrap();
            assert_ne!(next, prev);
            assert!(next < 7);
            prev = next;
        }
    }

    #[test]
    fn one_block_repeats_a_single_kind() {
        let mut one = OneBlock::new("solo", 7, 1, 3);
        let first = one.next_id().unwrap();
        assert_eq!(one.picked(), &[first]);
        for _ in 0..20 {
            assert_eq!(one.next_id(), Some(first));
        }
    }

    #[test]
    fn bs_block_only_deals_subset() {
        let mut bs = BsBlock::new("subset", vec![2, 5]);
        for _ in 0..20 {
            let id = bs.next_id().unwrap();
            assert!(id == 2 || id == 5);
        }
    }

    #[test]
    fn big_block_rand_uses_big_set() {
        let mut r = Randomizer::big_block_rand("big", vec![0, 1]);
        assert_eq!(r.next_piece().unwrap().set, PieceSetId::Big);
    }

    #[test]
    fn repeated_cycles_segment() {
        let mut rep = Repeated::new(Bag::new("rep", 7, 1), 3);
        let segment = rep.segment().to_vec();
        let drawn: Vec<u8> = (0..9).map(|_| rep.next_id().unwrap()).collect();
        assert_eq!(drawn[..3], segment[..]);
        assert_eq!(drawn[3..6], segment[..]);
        assert_eq!(drawn[6..], segment[..]);
    }

    #[test]
    fn fixed_queue_runs_out() {
        let mut r = Randomizer::fixed([PieceRef::new(2, PieceSetId::Standard)]);
        assert!(r.next_piece().is_some());
        assert!(r.next_piece().is_none());
    }

    #[test]
    fn const_block_always_same() {
        let piece = PieceRef::new(4, PieceSetId::Standard);
        let mut r = Randomizer::ConstBlock(piece);
        assert_eq!(draw(&mut r, 5), vec![4; 5]);
    }
}
