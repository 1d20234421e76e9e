//! Scoring module - clear types, points, attack and back-to-back tracking
//!
//! Rules:
//! - Points come from [`ScoringAction::points`], plus the action's back-to-back
//!   bonus when the previous clear was also eligible.
//! - Combo bonus is `50 * (combo - 1)` points, where `combo` counts consecutive
//!   clearing placements (1 after the first).
//! - Line attack is the ruleset attack table entry for the clear type; a
//!   perfect clear replaces it with entry 9. Back-to-back adds entry 10 and the
//!   combo table adds `combo_attack[min(combo - 1, 12)]`.
//! - Back-to-back becomes the clear's eligibility on every clearing lock and is
//!   left alone by zero-line locks. Combo resets only on zero-line locks.

use crate::types::{ScoringAction, SpinKind};

/// Attack table index of the back-to-back bonus.
const B2B_ATTACK_INDEX: usize = 10;

/// Clear type for a lock, or `None` for a plain placement.
///
/// `lines` is in logical rows (already divided by the piece set scale).
/// A spin clearing four or more rows scores as the plain clear.
pub fn clear_type(lines: u8, spin: SpinKind) -> Option<ScoringAction> {
    let mini = spin.is_mini();
    let spun = spin.is_spin();
    let action = match lines {
        0 if !spun => return None,
        0 if mini => ScoringAction::TSpinMini,
        0 => ScoringAction::TSpin,
        1 if mini => ScoringAction::TSpinMiniSingle,
        1 if spun => ScoringAction::TSpinSingle,
        1 => ScoringAction::Clear1,
        2 if spun => ScoringAction::TSpinDouble,
        2 => ScoringAction::Clear2,
        3 if spun => ScoringAction::TSpinTriple,
        3 => ScoringAction::Clear3,
        4 => ScoringAction::Clear4,
        _ => ScoringAction::Clear5,
    };
    Some(action)
}

/// Base points plus the back-to-back bonus when the chain continues.
pub fn score(action: ScoringAction, was_b2b: bool) -> u32 {
    let bonus = match action.b2b_bonus() {
        Some(bonus) if was_b2b => bonus,
        _ => 0,
    };
    action.points() + bonus
}

pub fn combo_bonus(combo: u32) -> u32 {
    ScoringAction::Combo.points() * combo.saturating_sub(1)
}

/// New back-to-back flag after a lock.
pub fn update_b2b(was_b2b: bool, lines: u8, action: Option<ScoringAction>) -> bool {
    if lines == 0 {
        return was_b2b;
    }
    action.is_some_and(ScoringAction::is_b2b_eligible)
}

/// Attack and combo tables of a ruleset.
#[derive(Debug, Clone, Copy)]
pub struct AttackTables<'a> {
    pub lines: &'a [u8; 11],
    pub combo: &'a [u8; 13],
}

/// Attack generated by a single lock, before cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackEvent {
    /// Line attack plus back-to-back bonus plus combo attack.
    pub attack: u8,
    pub combo_attack: u8,
    pub kind: ScoringAction,
    pub b2b: bool,
    pub combo: u32,
}

pub fn line_attack(
    action: ScoringAction,
    perfect_clear: bool,
    combo: u32,
    b2b_applied: bool,
    tables: AttackTables<'_>,
) -> AttackEvent {
    let base = if perfect_clear {
        tables.lines[ScoringAction::PerfectClear.attack_index().unwrap_or(9)]
    } else {
        action.attack_index().map_or(0, |i| tables.lines[i])
    };
    let b2b = if b2b_applied {
        tables.lines[B2B_ATTACK_INDEX]
    } else {
        0
    };
    let combo_index = (combo.saturating_sub(1) as usize).min(tables.combo.len() - 1);
    let combo_attack = if combo == 0 {
        0
    } else {
        tables.combo[combo_index]
    };
    AttackEvent {
        attack: base.saturating_add(b2b).saturating_add(combo_attack),
        combo_attack,
        kind: action,
        b2b: b2b_applied,
        combo,
    }
}

/// Running combo / back-to-back state of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreState {
    pub b2b: bool,
    pub combo: u32,
}

/// Everything a single lock contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockScore {
    pub action: Option<ScoringAction>,
    pub points: u32,
    pub b2b_applied: bool,
    pub attack: Option<AttackEvent>,
}

/// Score a lock and advance the combo/back-to-back state.
///
/// `multiplier` is the ruleset score multiplier; the rounded product is kept.
pub fn evaluate_lock(
    state: &mut ScoreState,
    lines: u8,
    spin: SpinKind,
    perfect_clear: bool,
    multiplier: f64,
    tables: AttackTables<'_>,
) -> LockScore {
    let action = clear_type(lines, spin);
    let was_b2b = state.b2b;
    let b2b_applied = lines > 0 && was_b2b && action.is_some_and(ScoringAction::is_b2b_eligible);

    if lines > 0 {
        state.combo += 1;
    } else {
        state.combo = 0;
    }
    state.b2b = update_b2b(was_b2b, lines, action);

    let mut points = action.map_or(0, |a| score(a, was_b2b && lines > 0));
    if lines > 0 {
        points += combo_bonus(state.combo);
    }
    if perfect_clear {
        points += ScoringAction::PerfectClear.points();
    }
    let points = (points as f64 * multiplier).round() as u32;

    let attack = match action {
        Some(action) if lines > 0 => Some(line_attack(
            action,
            perfect_clear,
            state.combo,
            b2b_applied,
            tables,
        )),
        _ => None,
    };

    LockScore {
        action,
        points,
        b2b_applied,
        attack,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DEFAULT_ATTACK_TABLE, DEFAULT_COMBO_TABLE};

    fn tables() -> AttackTables<'static> {
        AttackTables {
            lines: &DEFAULT_ATTACK_TABLE,
            combo: &DEFAULT_COMBO_TABLE,
        }
    }

    #[test]
    fn clear_types() {
        assert_eq!(clear_type(0, SpinKind::None), None);
        assert_eq!(clear_type(0, SpinKind::TSpin), Some(ScoringAction::TSpin));
        assert_eq!(clear_type(0, SpinKind::TSpinMini), Some(ScoringAction::TSpinMini));
        assert_eq!(clear_type(1, SpinKind::None), Some(ScoringAction::Clear1));
        assert_eq!(clear_type(1, SpinKind::TSpinMini), Some(ScoringAction::TSpinMiniSingle));
        assert_eq!(clear_type(2, SpinKind::TSpinMini), Some(ScoringAction::TSpinDouble));
        assert_eq!(clear_type(3, SpinKind::TSpin), Some(ScoringAction::TSpinTriple));
        assert_eq!(clear_type(2, SpinKind::AllSpin), Some(ScoringAction::TSpinDouble));
        assert_eq!(clear_type(4, SpinKind::None), Some(ScoringAction::Clear4));
        assert_eq!(clear_type(5, SpinKind::None), Some(ScoringAction::Clear5));
    }

    #[test]
    fn b2b_bonus_only_for_eligible_clears() {
        assert_eq!(score(ScoringAction::Clear4, false), 800);
        assert_eq!(score(ScoringAction::Clear4, true), 1200);
        assert_eq!(score(ScoringAction::Clear2, true), 300);
        assert_eq!(score(ScoringAction::TSpinTriple, true), 2400);
    }

    #[test]
    fn combo_bonus_grows_after_first_clear() {
        assert_eq!(combo_bonus(0), 0);
        assert_eq!(combo_bonus(1), 0);
        assert_eq!(combo_bonus(2), 50);
        assert_eq!(combo_bonus(5), 200);
    }

    #[test]
    fn single_clear_starts_combo_and_leaves_b2b() {
        let mut state = ScoreState {
            b2b: true,
            combo: 0,
        };
        let result = evaluate_lock(&mut state, 1, SpinKind::None, false, 1.0, tables());
        assert_eq!(result.action, Some(ScoringAction::Clear1));
        assert_eq!(result.points, 100);
        assert_eq!(state.combo, 1);
        // Singles are not eligible, so the chain breaks on a clearing lock.
        assert!(!state.b2b);
        assert_eq!(result.attack.unwrap().attack, 0);
    }

    #[test]
    fn zero_line_lock_resets_combo_only() {
        let mut state = ScoreState {
            b2b: true,
            combo: 4,
        };
        let result = evaluate_lock(&mut state, 0, SpinKind::None, false, 1.0, tables());
        assert_eq!(result.action, None);
        assert_eq!(result.points, 0);
        assert!(result.attack.is_none());
        assert_eq!(state.combo, 0);
        assert!(state.b2b);
    }

    #[test]
    fn tst_chain_applies_b2b_on_second_lock() {
        let mut state = ScoreState::default();
        let first = evaluate_lock(&mut state, 3, SpinKind::TSpin, false, 1.0, tables());
        assert_eq!(first.action, Some(ScoringAction::TSpinTriple));
        assert!(!first.b2b_applied);
        assert_eq!(first.points, 1600);
        assert_eq!(first.attack.unwrap().attack, 6);

        let second = evaluate_lock(&mut state, 3, SpinKind::TSpin, false, 1.0, tables());
        assert!(second.b2b_applied);
        // 1600 + 800 back-to-back + 50 combo bonus
        assert_eq!(second.points, 2450);
        // 6 lines + 1 b2b + combo_attack[1] = 0
        assert_eq!(second.attack.unwrap().attack, 7);
        assert!(state.b2b);

        let third = evaluate_lock(&mut state, 1, SpinKind::None, false, 1.0, tables());
        assert_eq!(third.action, Some(ScoringAction::Clear1));
        assert!(!third.b2b_applied);
        assert!(!state.b2b);
        assert_eq!(state.combo, 3);
    }

    #[test]
    fn perfect_clear_replaces_line_attack() {
        let mut state = ScoreState::default();
        let result = evaluate_lock(&mut state, 2, SpinKind::None, true, 1.0, tables());
        let attack = result.attack.unwrap();
        assert_eq!(attack.attack, 10);
        assert_eq!(result.points, 300 + 300);
    }

    #[test]
    fn combo_attack_uses_capped_table() {
        let mut state = ScoreState {
            b2b: false,
            combo: 20,
        };
        let result = evaluate_lock(&mut state, 1, SpinKind::None, false, 1.0, tables());
        assert_eq!(result.attack.unwrap().combo_attack, 5);
    }

    #[test]
    fn first_clear_takes_the_first_combo_entry() {
        let mut state = ScoreState::default();
        let sent: Vec<u8> = (0..3)
            .map(|_| {
                let result = evaluate_lock(&mut state, 1, SpinKind::None, false, 1.0, tables());
                result.attack.unwrap().combo_attack
            })
            .collect();
        assert_eq!(sent, DEFAULT_COMBO_TABLE[..3]);
        assert_eq!(state.combo, 3);
    }

    #[test]
    fn score_multiplier_rounds() {
        let mut state = ScoreState::default();
        let result = evaluate_lock(&mut state, 4, SpinKind::None, false, 1.5, tables());
        assert_eq!(result.points, 1200);
    }
}
