//! Point rules for placements and completion.

use crate::state::model::GameState;

/// Base points for a correct placement.
pub const POINTS_CORRECT: i32 = 10;
/// Points removed for a wrong placement (score never drops below zero).
pub const POINTS_WRONG_PENALTY: i32 = 2;
/// Bonus added per full group of three consecutive correct quotes.
pub const STREAK_BONUS: i32 = 5;
/// Percentage of the remaining seconds granted as a completion bonus.
pub const TIME_BONUS_PERCENT: u64 = 10;

/// Effect of one scored placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredPlacement {
    /// The placement was right.
    pub correct: bool,
    /// Signed score change actually applied.
    pub delta: i32,
    /// Streak bonus included in `delta`.
    pub streak_bonus: i32,
    /// The streak just reached a multiple of three.
    pub combo: bool,
}

/// Streak bonus earned by a correct quote once the streak reached `streak`.
pub fn streak_bonus(streak: u32) -> i32 {
    if streak >= 3 {
        STREAK_BONUS * i32::try_from(streak / 3).unwrap_or(i32::MAX / STREAK_BONUS)
    } else {
        0
    }
}

/// Completion bonus for `remaining` whole seconds; none without a running timer.
pub fn time_bonus(remaining: Option<u64>) -> i32 {
    match remaining {
        Some(secs) if secs > 0 => i32::try_from(secs * TIME_BONUS_PERCENT / 100).unwrap_or(i32::MAX),
        _ => 0,
    }
}

/// Score a quote placement into `state`.
pub fn score_quote(state: &mut GameState, correct: bool, multiplier: i32) -> ScoredPlacement {
    if !correct {
        return score_wrong(state);
    }
    state.streak += 1;
    let bonus = streak_bonus(state.streak);
    let delta = (POINTS_CORRECT + bonus) * multiplier;
    state.score += delta;
    ScoredPlacement {
        correct,
        delta,
        streak_bonus: bonus,
        combo: state.streak >= 3 && state.streak % 3 == 0,
    }
}

/// Score a title placement into `state`: titles earn a flat amount, no streak bonus.
pub fn score_title(state: &mut GameState, correct: bool, multiplier: i32) -> ScoredPlacement {
    if !correct {
        return score_wrong(state);
    }
    state.streak += 1;
    let delta = POINTS_CORRECT * multiplier;
    state.score += delta;
    ScoredPlacement {
        correct,
        delta,
        streak_bonus: 0,
        combo: false,
    }
}

fn score_wrong(state: &mut GameState) -> ScoredPlacement {
    let before = state.score;
    state.streak = 0;
    state.wrong_attempts += 1;
    state.score = (state.score - POINTS_WRONG_PENALTY).max(0);
    ScoredPlacement {
        correct: false,
        delta: state.score - before,
        streak_bonus: 0,
        combo: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_correct_quotes_earn_growing_bonus() {
        let mut state = GameState::default();
        let deltas: Vec<i32> = (0..6)
            .map(|_| score_quote(&mut state, true, 1).delta)
            .collect();
        assert_eq!(deltas, vec![10, 10, 15, 15, 15, 20]);
        assert_eq!(state.score, 85);
        assert_eq!(state.streak, 6);
    }

    #[test]
    fn double_points_doubles_bonus_too() {
        let mut state = GameState::default();
        let deltas: Vec<i32> = (0..3)
            .map(|_| score_quote(&mut state, true, 2).delta)
            .collect();
        assert_eq!(deltas, vec![20, 20, 30]);
    }

    #[test]
    fn wrong_placements_never_push_score_below_zero() {
        let mut state = GameState {
            score: 3,
            streak: 4,
            ..GameState::default()
        };
        let first = score_quote(&mut state, false, 2);
        assert_eq!(first.delta, -2);
        assert_eq!(state.streak, 0);
        for _ in 0..5 {
            score_title(&mut state, false, 1);
        }
        assert_eq!(state.score, 0);
        assert_eq!(state.wrong_attempts, 6);
    }

    #[test]
    fn combo_flag_marks_every_third_correct_quote() {
        let mut state = GameState::default();
        let combos: Vec<bool> = (0..6)
            .map(|_| score_quote(&mut state, true, 1).combo)
            .collect();
        assert_eq!(combos, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn title_with_double_points_adds_flat_twenty() {
        let mut state = GameState {
            score: 12,
            ..GameState::default()
        };
        let placement = score_title(&mut state, true, 2);
        assert_eq!(placement.delta, 20);
        assert_eq!(state.score, 32);
    }

    #[test]
    fn time_bonus_is_a_tenth_of_remaining_seconds() {
        assert_eq!(time_bonus(Some(50)), 5);
        assert_eq!(time_bonus(Some(59)), 5);
        assert_eq!(time_bonus(Some(0)), 0);
        assert_eq!(time_bonus(None), 0);
    }
}
