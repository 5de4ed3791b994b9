use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;

use crate::{
    dao::timestamp::Timestamp,
    state::model::{AvatarKind, CLASSIC_THEME, Difficulty, Phase},
};

/// Row of the `game_sessions` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionEntity {
    /// Primary key.
    pub id: Uuid,
    /// The countdown is running.
    pub is_active: bool,
    /// Quote theme of the round.
    pub theme: String,
    /// Difficulty label.
    pub difficulty: Difficulty,
    /// Round duration.
    pub timer_seconds: u32,
    /// Start of the running timer; `None` while stopped.
    pub timer_started_at: Option<Timestamp>,
    /// Placements score double.
    pub double_points_active: bool,
    /// Hint broadcast to players.
    pub current_hint: Option<String>,
    /// End of the round, once ended.
    pub game_ended_at: Option<Timestamp>,
    /// Number of quotes served to players, `None` for the whole catalog.
    #[serde(default)]
    pub quote_count: Option<usize>,
    /// Insertion time.
    pub created_at: Timestamp,
    /// Time of the last write.
    pub updated_at: Timestamp,
}

impl SessionEntity {
    /// Idle session created when the deployment has none yet.
    pub fn idle(difficulty: Difficulty, timer_seconds: u32) -> Self {
        let now = Timestamp::now();
        Self {
            id: Uuid::new_v4(),
            is_active: false,
            theme: CLASSIC_THEME.into(),
            difficulty,
            timer_seconds,
            timer_started_at: None,
            double_points_active: false,
            current_hint: None,
            game_ended_at: None,
            quote_count: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update in place, bumping `updated_at`.
    pub fn apply(&mut self, patch: &SessionPatch) {
        if let Some(value) = patch.is_active {
            self.is_active = value;
        }
        if let Some(value) = patch.difficulty {
            self.difficulty = value;
        }
        if let Some(value) = patch.timer_seconds {
            self.timer_seconds = value;
        }
        if let Some(value) = patch.timer_started_at {
            self.timer_started_at = value;
        }
        if let Some(value) = patch.double_points_active {
            self.double_points_active = value;
        }
        if let Some(value) = &patch.current_hint {
            self.current_hint = value.clone();
        }
        if let Some(value) = patch.game_ended_at {
            self.game_ended_at = value;
        }
        if let Some(value) = patch.quote_count {
            self.quote_count = value;
        }
        self.updated_at = Timestamp::now();
    }
}

/// Partial update of a session row. `Some(None)` writes an explicit null.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SessionPatch {
    /// New active flag.
    pub is_active: Option<bool>,
    /// New difficulty label.
    pub difficulty: Option<Difficulty>,
    /// New round duration.
    pub timer_seconds: Option<u32>,
    #[serde(with = "::serde_with::rust::double_option")]
    /// Start or clear the timer.
    pub timer_started_at: Option<Option<Timestamp>>,
    /// New double points flag.
    pub double_points_active: Option<bool>,
    #[serde(with = "::serde_with::rust::double_option")]
    /// Set or clear the hint.
    pub current_hint: Option<Option<String>>,
    #[serde(with = "::serde_with::rust::double_option")]
    /// Set or clear the end of the round.
    pub game_ended_at: Option<Option<Timestamp>>,
    #[serde(with = "::serde_with::rust::double_option")]
    /// Set or clear the quote count.
    pub quote_count: Option<Option<usize>>,
}

/// Row of the `active_players` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerEntity {
    /// Primary key.
    pub id: Uuid,
    /// Session the player joined.
    pub session_id: Uuid,
    /// Display name, unique per session.
    pub player_name: String,
    /// Current score.
    pub score: i32,
    /// Consecutive correct drops.
    pub streak: u32,
    /// Wrong drops so far.
    pub wrong_attempts: u32,
    #[serde(default)]
    /// Item id to the zone it was last dropped on.
    pub placements: IndexMap<String, Phase>,
    /// The puzzle was finished.
    pub is_completed: bool,
    /// Avatar kind; `None` on rows written before avatars existed.
    pub avatar_type: Option<AvatarKind>,
    /// Preset id or image URL.
    pub avatar_value: Option<String>,
    /// Insertion time.
    pub joined_at: Timestamp,
    /// Time of the last write.
    pub updated_at: Timestamp,
}

impl PlayerEntity {
    /// Zeroed player row for a first join.
    pub fn joining(
        session_id: Uuid,
        player_name: String,
        avatar_type: AvatarKind,
        avatar_value: Option<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: Uuid::new_v4(),
            session_id,
            player_name,
            score: 0,
            streak: 0,
            wrong_attempts: 0,
            placements: IndexMap::new(),
            is_completed: false,
            avatar_type: Some(avatar_type),
            avatar_value,
            joined_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update in place, bumping `updated_at`.
    pub fn apply(&mut self, patch: &PlayerPatch) {
        if let Some(value) = patch.score {
            self.score = value;
        }
        if let Some(value) = patch.streak {
            self.streak = value;
        }
        if let Some(value) = patch.wrong_attempts {
            self.wrong_attempts = value;
        }
        if let Some(value) = &patch.placements {
            self.placements = value.clone();
        }
        if let Some(value) = patch.is_completed {
            self.is_completed = value;
        }
        if let Some(value) = patch.avatar_type {
            self.avatar_type = Some(value);
        }
        if let Some(value) = &patch.avatar_value {
            self.avatar_value = value.clone();
        }
        self.updated_at = Timestamp::now();
    }
}

/// Partial update of a player row.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PlayerPatch {
    /// New score.
    pub score: Option<i32>,
    /// New streak.
    pub streak: Option<u32>,
    /// New wrong-drop count.
    pub wrong_attempts: Option<u32>,
    /// Replacement placement map.
    pub placements: Option<IndexMap<String, Phase>>,
    /// New completion flag.
    pub is_completed: Option<bool>,
    /// New avatar kind.
    pub avatar_type: Option<AvatarKind>,
    #[serde(with = "::serde_with::rust::double_option")]
    /// Set or clear the avatar value.
    pub avatar_value: Option<Option<String>>,
}

/// Row of the `custom_quotes` catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuoteEntity {
    /// Primary key.
    pub id: Uuid,
    /// Theme the quote belongs to.
    pub theme: String,
    /// Phase the quote illustrates.
    pub phase: Phase,
    /// Quote body.
    pub text: String,
    /// Attributed author.
    pub author: String,
    /// Served to players when set.
    pub is_active: bool,
    /// Insertion time.
    pub created_at: Timestamp,
}

/// Row of the append-only `leaderboard` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntity {
    /// Primary key.
    pub id: Uuid,
    /// Session the completion belongs to.
    pub session_id: Option<Uuid>,
    /// Display name at completion.
    pub player_name: String,
    /// Final score.
    pub score: i32,
    /// Wall time between join and completion.
    pub time_ms: u64,
    /// Theme of the round.
    pub theme: String,
    /// Insertion time.
    pub created_at: Timestamp,
}

impl LeaderboardEntity {
    /// Completion record for the classic theme.
    pub fn completion(session_id: Uuid, player_name: String, score: i32, time_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: Some(session_id),
            player_name,
            score,
            time_ms,
            theme: CLASSIC_THEME.into(),
            created_at: Timestamp::now(),
        }
    }
}

/// Row of the append-only `saved_leaderboards` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedLeaderboardEntity {
    /// Primary key.
    pub id: Uuid,
    /// Session the roster was taken from.
    pub session_id: Option<Uuid>,
    /// Label given by the facilitator.
    pub game_name: String,
    /// Archive time.
    pub saved_at: Timestamp,
    /// Full roster at the time of saving.
    #[serde(default)]
    pub players: Vec<PlayerEntity>,
    /// Top player, if any.
    pub winner_name: Option<String>,
    /// Score of the top player.
    pub winner_score: Option<i32>,
}
