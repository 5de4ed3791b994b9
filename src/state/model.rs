//! Shared vocabulary of the game: phases, catalog items, sessions and players.

use std::{fmt, time::Duration};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::{
    models::{PlayerEntity, QuoteEntity, SavedLeaderboardEntity, SessionEntity},
    timestamp::Timestamp,
};

/// Theme served to players; the game ships a single creativity theme.
pub const CLASSIC_THEME: &str = "classic";

/// One of the four stages of the creativity model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Gathering information and resources.
    Preparation,
    /// Letting ideas develop subconsciously.
    Incubation,
    /// The "Eureka!" moment of insight.
    Illumination,
    /// Testing and refining ideas.
    Verification,
}

impl Phase {
    /// Every phase in model order.
    pub const ALL: [Phase; 4] = [
        Phase::Preparation,
        Phase::Incubation,
        Phase::Illumination,
        Phase::Verification,
    ];

    /// Lowercase identifier used in storage rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Preparation => "preparation",
            Phase::Incubation => "incubation",
            Phase::Illumination => "illumination",
            Phase::Verification => "verification",
        }
    }

    /// Display title of the phase.
    pub fn title(&self) -> &'static str {
        match self {
            Phase::Preparation => "Preparation",
            Phase::Incubation => "Incubation",
            Phase::Illumination => "Illumination",
            Phase::Verification => "Verification",
        }
    }

    /// One-line description shown next to the phase zone.
    pub fn description(&self) -> &'static str {
        match self {
            Phase::Preparation => "Gathering information and resources",
            Phase::Incubation => "Letting ideas develop subconsciously",
            Phase::Illumination => "The 'Eureka!' moment of insight",
            Phase::Verification => "Testing and refining ideas",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Draggable phase title card; exactly one exists per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTitle {
    /// Stable identifier (`title-<phase>`).
    pub id: &'static str,
    /// Text printed on the card.
    pub title: &'static str,
    /// Zone the title belongs to.
    pub phase: Phase,
}

/// Static title catalog held in-process.
pub const PHASE_TITLES: [PhaseTitle; 4] = [
    PhaseTitle {
        id: "title-preparation",
        title: "Preparation",
        phase: Phase::Preparation,
    },
    PhaseTitle {
        id: "title-incubation",
        title: "Incubation",
        phase: Phase::Incubation,
    },
    PhaseTitle {
        id: "title-illumination",
        title: "Illumination",
        phase: Phase::Illumination,
    },
    PhaseTitle {
        id: "title-verification",
        title: "Verification",
        phase: Phase::Verification,
    },
];

/// Look up a title card by identifier.
pub fn find_title(id: &str) -> Option<PhaseTitle> {
    PHASE_TITLES.iter().copied().find(|title| title.id == id)
}

/// Catalog quote to be matched with its phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// Catalog id.
    pub id: Uuid,
    /// Quote body.
    pub text: String,
    /// Attributed author.
    pub author: String,
    /// Correct placement target.
    pub phase: Phase,
    /// Theme of the catalog row.
    pub theme: Option<String>,
}

impl From<QuoteEntity> for Quote {
    fn from(value: QuoteEntity) -> Self {
        Self {
            id: value.id,
            text: value.text,
            author: value.author,
            phase: value.phase,
            theme: Some(value.theme),
        }
    }
}

/// Round difficulty chosen by the facilitator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Long timer, few quotes.
    Easy,
    /// Default preset.
    Medium,
    /// Short timer, many quotes.
    Hard,
}

/// Timer and quote count attached to a difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DifficultyPreset {
    /// Round duration.
    pub timer_seconds: u32,
    /// Quotes dealt to each player.
    pub quote_count: usize,
}

impl Difficulty {
    /// Every level, easiest first.
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Built-in preset used when the configuration does not override it.
    pub fn default_preset(&self) -> DifficultyPreset {
        match self {
            Difficulty::Easy => DifficultyPreset {
                timer_seconds: 900,
                quote_count: 8,
            },
            Difficulty::Medium => DifficultyPreset {
                timer_seconds: 600,
                quote_count: 16,
            },
            Difficulty::Hard => DifficultyPreset {
                timer_seconds: 300,
                quote_count: 24,
            },
        }
    }

    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

/// Storage discriminant of an avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AvatarKind {
    /// Letter avatar.
    Initial,
    /// Bundled preset.
    Preset,
    /// Uploaded image.
    Custom,
}

/// Avatar displayed next to a player name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Avatar {
    /// First letter of the player name.
    Initial,
    /// One of the bundled preset avatars, by identifier.
    Preset(String),
    /// Public URL of an uploaded image.
    Custom(String),
}

impl Avatar {
    /// Rebuild an avatar from its stored columns, degrading to [`Avatar::Initial`]
    /// when a preset or custom row lost its value.
    pub fn from_parts(kind: Option<AvatarKind>, value: Option<String>) -> Self {
        match (kind, value) {
            (Some(AvatarKind::Preset), Some(value)) => Avatar::Preset(value),
            (Some(AvatarKind::Custom), Some(value)) => Avatar::Custom(value),
            _ => Avatar::Initial,
        }
    }

    /// Storage discriminant.
    pub fn kind(&self) -> AvatarKind {
        match self {
            Avatar::Initial => AvatarKind::Initial,
            Avatar::Preset(_) => AvatarKind::Preset,
            Avatar::Custom(_) => AvatarKind::Custom,
        }
    }

    /// Preset id or image URL; `None` for initials.
    pub fn value(&self) -> Option<&str> {
        match self {
            Avatar::Initial => None,
            Avatar::Preset(value) | Avatar::Custom(value) => Some(value),
        }
    }
}

/// The single shared round controlled by the facilitator.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSession {
    /// Session id.
    pub id: Uuid,
    /// The countdown is running.
    pub is_active: bool,
    /// Quote theme of the round.
    pub theme: String,
    /// Difficulty label.
    pub difficulty: Difficulty,
    /// Round duration.
    pub timer_seconds: u32,
    /// Start of the running timer.
    pub timer_started_at: Option<Timestamp>,
    /// Placements score double.
    pub double_points_active: bool,
    /// Hint currently broadcast.
    pub current_hint: Option<String>,
    /// End of the round, once ended.
    pub game_ended_at: Option<Timestamp>,
    /// Number of quotes served to players; `None` serves the whole catalog.
    pub quote_count: Option<usize>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Time of the last write.
    pub updated_at: Timestamp,
}

impl GameSession {
    /// Remaining round time at `now`, or `None` while the timer is stopped.
    pub fn remaining_at(&self, now: Timestamp) -> Option<Duration> {
        let started = self.timer_started_at?;
        let total = Duration::from_secs(u64::from(self.timer_seconds));
        Some(total.saturating_sub(now.saturating_since(started)))
    }

    /// Remaining whole seconds (rounded up, as the countdown displays them).
    pub fn remaining_seconds(&self, now: Timestamp) -> Option<u64> {
        self.remaining_at(now).map(|remaining| {
            let secs = remaining.as_secs();
            if remaining.subsec_nanos() > 0 {
                secs + 1
            } else {
                secs
            }
        })
    }

    /// Multiplier applied to correct placements.
    pub fn multiplier(&self) -> i32 {
        if self.double_points_active { 2 } else { 1 }
    }

    /// Whether the facilitator concluded the round.
    pub fn has_ended(&self) -> bool {
        self.game_ended_at.is_some()
    }
}

impl From<SessionEntity> for GameSession {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.id,
            is_active: value.is_active,
            theme: value.theme,
            difficulty: value.difficulty,
            timer_seconds: value.timer_seconds,
            timer_started_at: value.timer_started_at,
            double_points_active: value.double_points_active,
            current_hint: value.current_hint,
            game_ended_at: value.game_ended_at,
            quote_count: value.quote_count,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// A participant row scoped to one session.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivePlayer {
    /// Player row id.
    pub id: Uuid,
    /// Session the player joined.
    pub session_id: Uuid,
    /// Display name.
    pub player_name: String,
    /// Current score.
    pub score: i32,
    /// Consecutive correct drops.
    pub streak: u32,
    /// Wrong drops so far.
    pub wrong_attempts: u32,
    /// Last phase each quote or title was dropped on, wrong drops included.
    pub placements: IndexMap<String, Phase>,
    /// The puzzle was finished.
    pub is_completed: bool,
    /// Avatar shown next to the name.
    pub avatar: Avatar,
    /// Join time.
    pub joined_at: Timestamp,
    /// Time of the last write.
    pub updated_at: Timestamp,
}

impl From<PlayerEntity> for ActivePlayer {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            player_name: value.player_name,
            score: value.score,
            streak: value.streak,
            wrong_attempts: value.wrong_attempts,
            placements: value.placements,
            is_completed: value.is_completed,
            avatar: Avatar::from_parts(value.avatar_type, value.avatar_value),
            joined_at: value.joined_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<ActivePlayer> for PlayerEntity {
    fn from(value: ActivePlayer) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            player_name: value.player_name,
            score: value.score,
            streak: value.streak,
            wrong_attempts: value.wrong_attempts,
            placements: value.placements,
            is_completed: value.is_completed,
            avatar_type: Some(value.avatar.kind()),
            avatar_value: value.avatar.value().map(str::to_owned),
            joined_at: value.joined_at,
            updated_at: value.updated_at,
        }
    }
}

/// Device-local progress of one player. Never persisted as a row of its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameState {
    /// The player joined a round.
    pub is_started: bool,
    /// The puzzle was finished; never reset.
    pub is_completed: bool,
    /// Join time of this device.
    pub start_time: Option<Timestamp>,
    /// Completion time.
    pub end_time: Option<Timestamp>,
    /// Quote id to the phase it was last dropped on.
    pub placements: IndexMap<String, Phase>,
    /// Title id to the phase it was last dropped on.
    pub title_placements: IndexMap<String, Phase>,
    /// Score, time bonus included once completed.
    pub score: i32,
    /// Score before the time bonus.
    pub base_score: i32,
    /// Bonus granted at completion.
    pub time_bonus: i32,
    /// Consecutive correct drops.
    pub streak: u32,
    /// Wrong drops so far.
    pub wrong_attempts: u32,
    /// Whole seconds between join and completion.
    pub elapsed_time: u64,
}

impl GameState {
    /// Fresh state for a player joining at `now`.
    pub fn started(now: Timestamp) -> Self {
        Self {
            is_started: true,
            start_time: Some(now),
            ..Self::default()
        }
    }

    /// Resume a persisted player, splitting title drops from quote drops.
    /// A completed row stays completed.
    pub fn resumed(player: &ActivePlayer, now: Timestamp) -> Self {
        let (title_placements, placements): (IndexMap<_, _>, IndexMap<_, _>) = player
            .placements
            .iter()
            .map(|(id, phase)| (id.clone(), *phase))
            .partition(|(id, _)| find_title(id).is_some());

        Self {
            is_started: true,
            start_time: Some(now),
            placements,
            title_placements,
            score: player.score,
            base_score: if player.is_completed { player.score } else { 0 },
            streak: player.streak,
            wrong_attempts: player.wrong_attempts,
            is_completed: player.is_completed,
            ..Self::default()
        }
    }

    /// Quote and title drops merged into the single persisted map.
    pub fn persisted_placements(&self) -> IndexMap<String, Phase> {
        self.placements
            .iter()
            .chain(self.title_placements.iter())
            .map(|(id, phase)| (id.clone(), *phase))
            .collect()
    }
}

/// Facilitator-archived snapshot of a finished roster.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedLeaderboard {
    /// Archive id.
    pub id: Uuid,
    /// Session the roster was taken from.
    pub session_id: Option<Uuid>,
    /// Label given by the facilitator.
    pub game_name: String,
    /// Archive time.
    pub saved_at: Timestamp,
    /// Roster sorted by score, highest first.
    pub players: Vec<ActivePlayer>,
    /// Top player, if any.
    pub winner_name: Option<String>,
    /// Score of the top player.
    pub winner_score: Option<i32>,
}

impl SavedLeaderboard {
    /// Snapshot `players` under `game_name`, deriving the winner from the top score.
    pub fn from_roster(
        game_name: String,
        session_id: Option<Uuid>,
        mut players: Vec<ActivePlayer>,
    ) -> Self {
        players.sort_by(|a, b| b.score.cmp(&a.score));
        let winner = players.first();
        Self {
            id: Uuid::new_v4(),
            session_id,
            game_name,
            saved_at: Timestamp::now(),
            winner_name: winner.map(|p| p.player_name.clone()),
            winner_score: winner.map(|p| p.score),
            players,
        }
    }
}

impl From<SavedLeaderboardEntity> for SavedLeaderboard {
    fn from(value: SavedLeaderboardEntity) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            game_name: value.game_name,
            saved_at: value.saved_at,
            players: value.players.into_iter().map(Into::into).collect(),
            winner_name: value.winner_name,
            winner_score: value.winner_score,
        }
    }
}

impl From<SavedLeaderboard> for SavedLeaderboardEntity {
    fn from(value: SavedLeaderboard) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            game_name: value.game_name,
            saved_at: value.saved_at,
            players: value.players.into_iter().map(Into::into).collect(),
            winner_name: value.winner_name,
            winner_score: value.winner_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_timer(started: Option<Timestamp>, seconds: u32) -> GameSession {
        let now = Timestamp::now();
        GameSession {
            id: Uuid::new_v4(),
            is_active: started.is_some(),
            theme: CLASSIC_THEME.into(),
            difficulty: Difficulty::Medium,
            timer_seconds: seconds,
            timer_started_at: started,
            double_points_active: false,
            current_hint: None,
            game_ended_at: None,
            quote_count: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn player(name: &str, score: i32) -> ActivePlayer {
        let now = Timestamp::now();
        ActivePlayer {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            player_name: name.into(),
            score,
            streak: 0,
            wrong_attempts: 0,
            placements: IndexMap::new(),
            is_completed: false,
            avatar: Avatar::Initial,
            joined_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn remaining_time_counts_down_and_floors_at_zero() {
        let now = Timestamp::now();
        let session = session_with_timer(Some(now.minus(Duration::from_secs(100))), 600);
        assert_eq!(session.remaining_seconds(now), Some(500));

        let expired = session_with_timer(Some(now.minus(Duration::from_secs(700))), 600);
        assert_eq!(expired.remaining_seconds(now), Some(0));

        let stopped = session_with_timer(None, 600);
        assert_eq!(stopped.remaining_seconds(now), None);
    }

    #[test]
    fn remaining_seconds_round_up_partial_seconds() {
        let now = Timestamp::now();
        let session = session_with_timer(Some(now.minus(Duration::from_millis(1_500))), 10);
        assert_eq!(session.remaining_seconds(now), Some(9));
    }

    #[test]
    fn resumed_state_splits_title_and_quote_placements() {
        let mut resumed = player("ada", 24);
        resumed.streak = 2;
        resumed.wrong_attempts = 3;
        resumed
            .placements
            .insert("title-incubation".into(), Phase::Incubation);
        resumed
            .placements
            .insert(Uuid::nil().to_string(), Phase::Preparation);

        let state = GameState::resumed(&resumed, Timestamp::now());
        assert_eq!(state.score, 24);
        assert_eq!(state.streak, 2);
        assert_eq!(state.wrong_attempts, 3);
        assert_eq!(
            state.title_placements.get("title-incubation"),
            Some(&Phase::Incubation)
        );
        assert_eq!(state.placements.len(), 1);
        assert_eq!(state.persisted_placements().len(), 2);
    }

    #[test]
    fn saved_leaderboard_derives_winner_from_top_score() {
        let board = SavedLeaderboard::from_roster(
            "Period 3".into(),
            None,
            vec![player("bea", 40), player("cy", 75), player("dee", 12)],
        );
        assert_eq!(board.winner_name.as_deref(), Some("cy"));
        assert_eq!(board.winner_score, Some(75));
        assert_eq!(board.players[2].player_name, "dee");

        let empty = SavedLeaderboard::from_roster("Empty".into(), None, Vec::new());
        assert!(empty.winner_name.is_none());
        assert!(empty.winner_score.is_none());
    }

    #[test]
    fn avatar_without_value_degrades_to_initial() {
        assert_eq!(
            Avatar::from_parts(Some(AvatarKind::Preset), None),
            Avatar::Initial
        );
        assert_eq!(
            Avatar::from_parts(Some(AvatarKind::Custom), Some("https://x/y.png".into())).kind(),
            AvatarKind::Custom
        );
    }
}
