//! Ruleset - validated, immutable game configuration
//!
//! [`RulesetConfig`] is the wire/settings form and keeps the short field names
//! used by exported replays (`clearDelay`, `gDelay`, `DAS`, ...). A
//! [`Ruleset`] can only be obtained through validation, so the simulation
//! never sees an out-of-range value. Simulations hold it behind an `Arc` and
//! replace it whole when settings change.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::randomizer::RandomizerKind;
use crate::types::{
    PieceSetId, DEFAULT_ARR_MS, DEFAULT_ATTACK_TABLE, DEFAULT_COMBO_TABLE, DEFAULT_DAS_MS,
    DEFAULT_GARBAGE_DELAY_MS, DEFAULT_LOCK_DELAY_MS,
};

/// Gravity interval in milliseconds per row for levels 1..=19.
const GRAVITY_MS: [u32; 19] = [
    1000, 793, 618, 473, 355, 262, 190, 135, 94, 64, 43, 28, 18, 11, 7, 4, 3, 2, 1,
];

/// Highest gravity level; drops the piece to the floor every step.
pub const MAX_GRAVITY_LEVEL: u8 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RulesetConfig {
    /// Delay between a clearing lock and the next spawn.
    pub clear_delay: u32,
    /// Randomizer id, see [`RandomizerKind`].
    pub rnd: u8,
    pub show_previews: u8,
    pub hold_enabled: bool,
    pub base_block_set: u8,
    pub gravity_lvl: u8,
    /// `[lockDelay, maxLockDelayWithoutLock, maxWithoutLock]` in ms.
    pub lock_delay: [u32; 3],
    /// Percent chance that the garbage hole moves between rows.
    pub mess: u8,
    pub gap_w: u8,
    pub g_inv: bool,
    pub g_delay: u32,
    pub gblock: u8,
    pub tsd_only: bool,
    /// Strip combo attack once a four-wide well has been fed four times in a row.
    pub no_four_wide: bool,
    pub all_spin: u8,
    /// Maximum pieces per second; 0 disables the limit.
    pub speed_limit: f64,
    pub score_mult: f64,
    pub ghost: bool,
    #[serde(rename = "DAS")]
    pub das: u32,
    #[serde(rename = "ARR")]
    pub arr: u32,
    pub clear_lines: bool,
    pub solid_attack: bool,
    /// Seconds between solid garbage rows; the last entry repeats.
    pub sg_profile: Vec<f64>,
    pub lines_attack: [u8; 11],
    pub combo_attack: [u8; 13],
}

impl Default for RulesetConfig {
    fn default() -> Self {
        Self {
            clear_delay: 0,
            rnd: 0,
            show_previews: 5,
            hold_enabled: true,
            base_block_set: 0,
            gravity_lvl: 1,
            lock_delay: DEFAULT_LOCK_DELAY_MS,
            mess: 0,
            gap_w: 1,
            g_inv: false,
            g_delay: DEFAULT_GARBAGE_DELAY_MS,
            gblock: 0,
            tsd_only: false,
            no_four_wide: false,
            all_spin: 0,
            speed_limit: 0.0,
            score_mult: 1.0,
            ghost: true,
            das: DEFAULT_DAS_MS,
            arr: DEFAULT_ARR_MS,
            clear_lines: true,
            solid_attack: false,
            sg_profile: Vec::new(),
            lines_attack: DEFAULT_ATTACK_TABLE,
            combo_attack: DEFAULT_COMBO_TABLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RulesetError {
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: String },
    #[error("lock delay triple must satisfy lockDelay <= maxLockDelayWithoutLock <= maxWithoutLock, got {0:?}")]
    LockDelayOrder([u32; 3]),
    #[error("invalid ruleset json: {0}")]
    Json(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllSpinMode {
    Off,
    On,
}

/// How outgoing attack interacts with pending garbage (`gblock`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GarbageBlocking {
    /// Attack cancels pending garbage; the remainder is sent.
    Full,
    /// Attack cancels pending garbage but nothing is sent while garbage was pending.
    Limited,
    /// Attack never cancels; everything is sent.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    Off,
    /// Milliseconds per row.
    Interval(u32),
    /// Piece falls to the floor every step.
    Instant,
}

/// Validated configuration.
///
/// Dereferences to the [`RulesetConfig`] it was built from; there is no
/// mutable access.
#[derive(Debug, Clone, PartialEq)]
pub struct Ruleset {
    config: RulesetConfig,
    block_set: PieceSetId,
    randomizer: RandomizerKind,
    spin_mode: AllSpinMode,
    blocking: GarbageBlocking,
    gravity: Gravity,
}

fn check<T: PartialOrd + ToString>(
    field: &'static str,
    value: T,
    ok: impl FnOnce(&T) -> bool,
) -> Result<(), RulesetError> {
    if ok(&value) {
        Ok(())
    } else {
        Err(RulesetError::OutOfRange {
            field,
            value: value.to_string(),
        })
    }
}

impl Ruleset {
    pub fn new(config: RulesetConfig) -> Result<Self, RulesetError> {
        check("clearDelay", config.clear_delay, |v| *v <= 5_000)?;
        check("showPreviews", config.show_previews, |v| *v <= 10)?;
        check("gravityLvl", config.gravity_lvl, |v| *v <= MAX_GRAVITY_LEVEL)?;
        check("mess", config.mess, |v| *v <= 100)?;
        check("gapW", config.gap_w, |v| (1..=9).contains(v))?;
        check("gDelay", config.g_delay, |v| *v <= 60_000)?;
        check("speedLimit", config.speed_limit, |v| v.is_finite() && *v >= 0.0)?;
        check("scoreMult", config.score_mult, |v| v.is_finite() && *v > 0.0)?;
        check("DAS", config.das, |v| *v <= 5_000)?;
        check("ARR", config.arr, |v| *v <= 5_000)?;
        for &entry in &config.sg_profile {
            check("sgProfile", entry, |v| v.is_finite() && *v > 0.0)?;
        }

        let [lock, max_lock, max_total] = config.lock_delay;
        if !(lock <= max_lock && max_lock <= max_total && max_total > 0) {
            return Err(RulesetError::LockDelayOrder(config.lock_delay));
        }

        let out_of_range = |field: &'static str, value: u8| RulesetError::OutOfRange {
            field,
            value: value.to_string(),
        };
        let randomizer =
            RandomizerKind::from_id(config.rnd).ok_or_else(|| out_of_range("rnd", config.rnd))?;
        let block_set = PieceSetId::from_id(config.base_block_set)
            .ok_or_else(|| out_of_range("baseBlockSet", config.base_block_set))?;
        let spin_mode = match config.all_spin {
            0 => AllSpinMode::Off,
            1 => AllSpinMode::On,
            other => return Err(out_of_range("allSpin", other)),
        };
        let blocking = match config.gblock {
            0 => GarbageBlocking::Full,
            1 => GarbageBlocking::Limited,
            2 => GarbageBlocking::None,
            other => return Err(out_of_range("gblock", other)),
        };
        let gravity = match config.gravity_lvl {
            0 => Gravity::Off,
            MAX_GRAVITY_LEVEL => Gravity::Instant,
            level => Gravity::Interval(GRAVITY_MS[level as usize - 1]),
        };

        Ok(Self {
            config,
            block_set,
            randomizer,
            spin_mode,
            blocking,
            gravity,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, RulesetError> {
        let config: RulesetConfig =
            serde_json::from_str(json).map_err(|e| RulesetError::Json(e.to_string()))?;
        Self::new(config)
    }

    pub fn config(&self) -> &RulesetConfig {
        &self.config
    }

    pub fn block_set(&self) -> PieceSetId {
        self.block_set
    }

    pub fn randomizer(&self) -> RandomizerKind {
        self.randomizer
    }

    pub fn all_spin(&self) -> AllSpinMode {
        self.spin_mode
    }

    pub fn blocking(&self) -> GarbageBlocking {
        self.blocking
    }

    pub fn gravity(&self) -> Gravity {
        self.gravity
    }

    pub fn lock_delay(&self) -> u32 {
        self.config.lock_delay[0]
    }

    pub fn max_lock_delay(&self) -> u32 {
        self.config.lock_delay[1]
    }

    pub fn max_without_lock(&self) -> u32 {
        self.config.lock_delay[2]
    }

    /// Minimum time between hard drops, if a speed limit is set.
    pub fn min_drop_interval_ms(&self) -> Option<u32> {
        (self.config.speed_limit > 0.0).then(|| (1000.0 / self.config.speed_limit) as u32)
    }

    /// Time of the `n`-th (0-based) solid garbage row, in ms since start.
    pub fn solid_garbage_at(&self, n: usize) -> Option<u32> {
        let profile = &self.config.sg_profile;
        let last = *profile.last()?;
        let listed: f64 = profile.iter().take(n + 1).sum();
        let repeats = (n + 1).saturating_sub(profile.len()) as f64;
        Some(((listed + repeats * last) * 1000.0).round() as u32)
    }
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            config: RulesetConfig::default(),
            block_set: PieceSetId::Standard,
            randomizer: RandomizerKind::Bag7,
            spin_mode: AllSpinMode::Off,
            blocking: GarbageBlocking::Full,
            gravity: Gravity::Interval(GRAVITY_MS[0]),
        }
    }
}

impl std::ops::Deref for Ruleset {
    type Target = RulesetConfig;

    fn deref(&self) -> &RulesetConfig {
        &self.config
    }
}

/// Soft drop speed, by replay `softDropId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftDropSpeed {
    /// Milliseconds per row.
    Interval(u32),
    /// Rows moved on every simulation step.
    RowsPerStep(u8),
}

impl SoftDropSpeed {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(SoftDropSpeed::Interval(50)),
            1 => Some(SoftDropSpeed::Interval(8)),
            2 => Some(SoftDropSpeed::RowsPerStep(1)),
            3 => Some(SoftDropSpeed::RowsPerStep(2)),
            4 => Some(SoftDropSpeed::RowsPerStep(20)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let ruleset = Ruleset::new(RulesetConfig::default()).unwrap();
        assert_eq!(ruleset, Ruleset::default());
        assert_eq!(ruleset.gravity(), Gravity::Interval(1000));
        assert_eq!(ruleset.das, 133);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let bad = [
            RulesetConfig {
                gap_w: 0,
                ..Default::default()
            },
            RulesetConfig {
                gap_w: 10,
                ..Default::default()
            },
            RulesetConfig {
                rnd: 6,
                ..Default::default()
            },
            RulesetConfig {
                score_mult: 0.0,
                ..Default::default()
            },
            RulesetConfig {
                speed_limit: f64::NAN,
                ..Default::default()
            },
            RulesetConfig {
                gravity_lvl: 21,
                ..Default::default()
            },
            RulesetConfig {
                gblock: 3,
                ..Default::default()
            },
            RulesetConfig {
                base_block_set: 9,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(
                matches!(Ruleset::new(config.clone()), Err(RulesetError::OutOfRange { .. })),
                "{config:?}"
            );
        }
    }

    #[test]
    fn rejects_unordered_lock_delay() {
        let config = RulesetConfig {
            lock_delay: [600, 500, 20_000],
            ..Default::default()
        };
        assert_eq!(
            Ruleset::new(config),
            Err(RulesetError::LockDelayOrder([600, 500, 20_000]))
        );
    }

    #[test]
    fn parses_short_field_names() {
        let json = r#"{"DAS": 100, "ARR": 0, "gDelay": 1000, "allSpin": 1,
            "gravityLvl": 20, "noFourWide": true}"#;
        let ruleset = Ruleset::from_json(json).unwrap();
        assert!(ruleset.no_four_wide);
        assert_eq!(ruleset.das, 100);
        assert_eq!(ruleset.arr, 0);
        assert_eq!(ruleset.g_delay, 1000);
        assert_eq!(ruleset.all_spin(), AllSpinMode::On);
        assert_eq!(ruleset.gravity(), Gravity::Instant);
        assert!(Ruleset::from_json("{").is_err());
    }

    #[test]
    fn solid_garbage_profile_repeats_last_entry() {
        let ruleset = Ruleset::new(RulesetConfig {
            sg_profile: vec![10.0, 5.0],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(ruleset.solid_garbage_at(0), Some(10_000));
        assert_eq!(ruleset.solid_garbage_at(1), Some(15_000));
        assert_eq!(ruleset.solid_garbage_at(2), Some(20_000));
        assert_eq!(Ruleset::default().solid_garbage_at(0), None);
    }

    #[test]
    fn speed_limit_interval() {
        let ruleset = Ruleset::new(RulesetConfig {
            speed_limit: 4.0,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(ruleset.min_drop_interval_ms(), Some(250));
        assert_eq!(Ruleset::default().min_drop_interval_ms(), None);
    }
}
