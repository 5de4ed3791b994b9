use crate::{
    dto::{
        leaderboard::{RevealStage, RevealStep, RevealView},
        player::PlayerSummary,
    },
    state::model::ActivePlayer,
};

const COUNTDOWN_MS: u64 = 3_000;
const TIMESUP_MS: u64 = 2_000;
const RUNNER_UP_MS: u64 = 2_500;
const WINNER_MS: u64 = 3_000;

/// Stages of the podium animation for a podium of `podium` players.
///
/// Third and second place are only shown when that many players finished.
pub fn reveal_steps(podium: usize) -> Vec<RevealStep> {
    let mut steps = vec![
        RevealStep {
            stage: RevealStage::Countdown,
            duration_ms: COUNTDOWN_MS,
        },
        RevealStep {
            stage: RevealStage::Timesup,
            duration_ms: TIMESUP_MS,
        },
    ];
    if podium >= 3 {
        steps.push(RevealStep {
            stage: RevealStage::Third,
            duration_ms: RUNNER_UP_MS,
        });
    }
    if podium >= 2 {
        steps.push(RevealStep {
            stage: RevealStage::Second,
            duration_ms: RUNNER_UP_MS,
        });
    }
    steps.push(RevealStep {
        stage: RevealStage::First,
        duration_ms: WINNER_MS,
    });
    steps.push(RevealStep {
        stage: RevealStage::Full,
        duration_ms: 0,
    });
    steps
}

/// Final standings sorted by score with the reveal schedule attached.
pub fn reveal_view(players: &[ActivePlayer]) -> RevealView {
    let mut sorted: Vec<&ActivePlayer> = players.iter().collect();
    sorted.sort_by(|a, b| b.score.cmp(&a.score));
    let players: Vec<PlayerSummary> = sorted.into_iter().map(PlayerSummary::from).collect();
    let podium: Vec<PlayerSummary> = players.iter().take(3).cloned().collect();
    RevealView {
        steps: reveal_steps(podium.len()),
        podium,
        players,
    }
}
