use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dto::player::PlayerSummary, state::model::SavedLeaderboard};

/// Archived roster of a finished round.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SavedLeaderboardView {
    /// Archive id.
    pub id: Uuid,
    /// Session the roster was taken from.
    pub session_id: Option<Uuid>,
    /// Name the facilitator gave the round.
    pub game_name: String,
    /// RFC 3339 archive time.
    pub saved_at: String,
    /// Roster, highest score first.
    pub players: Vec<PlayerSummary>,
    /// Top player, absent for a scoreless roster.
    pub winner_name: Option<String>,
    /// Score of the top player.
    pub winner_score: Option<i32>,
}

impl From<&SavedLeaderboard> for SavedLeaderboardView {
    fn from(board: &SavedLeaderboard) -> Self {
        Self {
            id: board.id,
            session_id: board.session_id,
            game_name: board.game_name.clone(),
            saved_at: board.saved_at.to_rfc3339(),
            players: board.players.iter().map(PlayerSummary::from).collect(),
            winner_name: board.winner_name.clone(),
            winner_score: board.winner_score,
        }
    }
}

/// Step of the podium animation played when the round ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RevealStage {
    /// Countdown before the results.
    Countdown,
    /// "Time's up" banner.
    Timesup,
    /// Third place revealed.
    Third,
    /// Second place revealed.
    Second,
    /// Winner revealed.
    First,
    /// Full standings.
    Full,
}

/// One scheduled stage of the reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct RevealStep {
    /// Stage shown.
    pub stage: RevealStage,
    /// How long the stage stays on screen; zero for the final stage.
    pub duration_ms: u64,
}

/// Final standings pushed to players when the reveal starts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RevealView {
    /// Stages in playing order.
    pub steps: Vec<RevealStep>,
    /// Up to three podium players, highest score first.
    pub podium: Vec<PlayerSummary>,
    /// Complete standings.
    pub players: Vec<PlayerSummary>,
}
