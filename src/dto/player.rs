//! DTO definitions for the player REST API.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        format_optional,
        session::{QuoteView, SessionView},
        validation::{validate_avatar_url, validate_player_name},
    },
    error::ServiceError,
    state::{
        board::{ItemRef, PuzzleBoard},
        model::{ActivePlayer, AvatarKind, GameState, Phase, PhaseTitle},
        player_phase::PlayerPhase,
    },
};

/// Request to bind this device to a player row of the current session.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinRequest {
    /// Display name; joining again under it resumes the same row.
    pub player_name: String,
    /// Defaults to `initial` when omitted.
    #[serde(default)]
    pub avatar_type: Option<AvatarKind>,
    /// Preset identifier or custom image URL.
    #[serde(default)]
    pub avatar_value: Option<String>,
}

impl Validate for JoinRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_player_name(&self.player_name) {
            errors.add("player_name", e);
        }

        if let (Some(AvatarKind::Custom), Some(url)) = (self.avatar_type, &self.avatar_value) {
            if let Err(e) = validate_avatar_url(url) {
                errors.add("avatar_value", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Kind of card carried by a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A catalog quote.
    Quote,
    /// A phase title.
    Title,
}

/// Card dropped onto a phase zone.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DropRequest {
    /// Kind of card dropped.
    pub item_kind: ItemKind,
    /// Quote UUID or title identifier (`title-<phase>`).
    pub item_id: String,
    /// Target zone.
    pub phase: Phase,
}

/// Card moved from a phase zone back to its pool.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveRequest {
    /// Kind of card moved.
    pub item_kind: ItemKind,
    /// Quote UUID or title identifier.
    pub item_id: String,
    /// Zone the card currently sits on.
    pub phase: Phase,
}

/// Build the board reference of a card from its wire representation.
pub fn item_ref(kind: ItemKind, id: &str) -> Result<ItemRef, ServiceError> {
    match kind {
        ItemKind::Quote => id
            .parse::<Uuid>()
            .map(ItemRef::Quote)
            .map_err(|_| ServiceError::Validation(format!("`{id}` is not a quote id"))),
        ItemKind::Title => Ok(ItemRef::Title(id.to_owned())),
    }
}

/// Result of one drop, as shown on the player device.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DropResponse {
    /// The card went to its own zone.
    pub correct: bool,
    /// Signed score change applied by this drop.
    pub delta: i32,
    /// Score after the drop.
    pub score: i32,
    /// Consecutive correct drops.
    pub streak: u32,
    /// Streak bonus included in `delta`.
    pub streak_bonus: i32,
    /// The streak just reached a multiple of three.
    pub combo: bool,
    /// Consecutive wrong drops of this card.
    pub item_misses: u32,
    /// Zone highlighted after repeated misses of the same card.
    pub hint_zone: Option<Phase>,
    /// This drop finished the puzzle.
    pub completed: bool,
}

/// Player row as listed on the roster and leaderboards.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    /// Player row id.
    pub id: Uuid,
    /// Display name.
    pub player_name: String,
    /// Current score.
    pub score: i32,
    /// Consecutive correct drops.
    pub streak: u32,
    /// Wrong drops so far.
    pub wrong_attempts: u32,
    /// The puzzle was finished.
    pub is_completed: bool,
    /// How the avatar is rendered.
    pub avatar_type: AvatarKind,
    /// Preset id or image URL.
    pub avatar_value: Option<String>,
    /// Number of cards recorded in the placement projection.
    pub placements: usize,
    /// RFC 3339 join time.
    pub joined_at: String,
    /// RFC 3339 time of the last write.
    pub updated_at: String,
}

impl From<&ActivePlayer> for PlayerSummary {
    fn from(player: &ActivePlayer) -> Self {
        Self {
            id: player.id,
            player_name: player.player_name.clone(),
            score: player.score,
            streak: player.streak,
            wrong_attempts: player.wrong_attempts,
            is_completed: player.is_completed,
            avatar_type: player.avatar.kind(),
            avatar_value: player.avatar.value().map(str::to_owned),
            placements: player.placements.len(),
            joined_at: player.joined_at.to_rfc3339(),
            updated_at: player.updated_at.to_rfc3339(),
        }
    }
}

/// Device-local progress of the player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameStateView {
    /// The player joined a round.
    pub is_started: bool,
    /// The puzzle was finished.
    pub is_completed: bool,
    /// RFC 3339 join time of this device.
    pub start_time: Option<String>,
    /// RFC 3339 completion time.
    pub end_time: Option<String>,
    #[schema(value_type = Object)]
    /// Quote id to the zone it was last dropped on.
    pub placements: IndexMap<String, Phase>,
    #[schema(value_type = Object)]
    /// Title id to the zone it was last dropped on.
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
    /// Seconds between join and completion.
    pub elapsed_time: u64,
}

impl From<&GameState> for GameStateView {
    fn from(state: &GameState) -> Self {
        Self {
            is_started: state.is_started,
            is_completed: state.is_completed,
            start_time: format_optional(state.start_time),
            end_time: format_optional(state.end_time),
            placements: state.placements.clone(),
            title_placements: state.title_placements.clone(),
            score: state.score,
            base_score: state.base_score,
            time_bonus: state.time_bonus,
            streak: state.streak,
            wrong_attempts: state.wrong_attempts,
            elapsed_time: state.elapsed_time,
        }
    }
}

/// Title card as shown in the pool or on a zone.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TitleView {
    /// `title-<phase>` identifier.
    pub id: String,
    /// Label printed on the card.
    pub title: String,
    /// Zone the title belongs to.
    pub phase: Phase,
}

impl From<&PhaseTitle> for TitleView {
    fn from(title: &PhaseTitle) -> Self {
        Self {
            id: title.id.to_owned(),
            title: title.title.to_owned(),
            phase: title.phase,
        }
    }
}

/// One drop zone of the shared image.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ZoneView {
    /// Phase of the zone.
    pub phase: Phase,
    /// Phase name.
    pub title: String,
    /// Short explanation of the phase.
    pub description: String,
    /// Title placed on the zone.
    pub placed_title: Option<TitleView>,
    /// Quotes placed on the zone, in drop order.
    pub placed_quotes: Vec<QuoteView>,
}

/// Pools and zones of the player's puzzle.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BoardView {
    /// Quotes still to place.
    pub available_quotes: Vec<QuoteView>,
    /// Titles still to place.
    pub available_titles: Vec<TitleView>,
    /// The four zones in phase order.
    pub zones: Vec<ZoneView>,
    /// Zone currently highlighted.
    pub hint_zone: Option<Phase>,
    /// Cards placed so far.
    pub placed_count: usize,
    /// Dealt quotes plus the four titles.
    pub total_items: usize,
}

impl BoardView {
    /// Project `board` with the highlight active at render time.
    pub fn new(board: &PuzzleBoard, hint_zone: Option<Phase>) -> Self {
        let zones = Phase::ALL
            .iter()
            .map(|phase| ZoneView {
                phase: *phase,
                title: phase.title().to_owned(),
                description: phase.description().to_owned(),
                placed_title: board.placed_title(*phase).map(TitleView::from),
                placed_quotes: board
                    .placed_quotes(*phase)
                    .iter()
                    .map(QuoteView::from)
                    .collect(),
            })
            .collect();
        Self {
            available_quotes: board.available_quotes().iter().map(QuoteView::from).collect(),
            available_titles: board.available_titles().iter().map(TitleView::from).collect(),
            zones,
            hint_zone,
            placed_count: board.placed_count(),
            total_items: board.total_items(),
        }
    }
}

/// Everything a player device needs to render its screen.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerStateView {
    /// Engine id used by the `/play/{engine}` routes.
    pub engine_id: Uuid,
    /// Lifecycle phase of the device.
    pub phase: PlayerPhase,
    /// Incremented on every phase transition.
    pub phase_version: usize,
    /// The leaderboard reveal should be shown.
    pub show_leaderboard_reveal: bool,
    /// Persisted player row.
    pub player: PlayerSummary,
    /// Session as last observed.
    pub session: SessionView,
    /// Local progress.
    pub game: GameStateView,
    /// Puzzle board.
    pub board: BoardView,
}

/// Post-game reflection prompts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReflectionView {
    /// Display name.
    pub player_name: String,
    /// Final score.
    pub score: i32,
    /// Streak at completion.
    pub streak: u32,
    /// Wrong drops during the round.
    pub wrong_attempts: u32,
    /// Phase the prompts focus on.
    pub focus_phase: Phase,
    /// Name of `focus_phase`.
    pub focus_title: String,
    /// Whether `focus_phase` was derived from this player's misses.
    pub from_misses: bool,
    /// Question about `focus_phase`.
    pub phase_prompt: String,
    /// Question about the creative process as a whole.
    pub general_prompt: String,
}

/// Locator of an uploaded custom avatar, ready to be passed to `/play/join`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AvatarUploadResponse {
    /// Always `custom`.
    pub avatar_type: AvatarKind,
    /// Public URL of the stored image.
    pub avatar_value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_request_checks_name_and_custom_url() {
        let ok = JoinRequest {
            player_name: " Ada ".into(),
            avatar_type: Some(AvatarKind::Custom),
            avatar_value: Some("https://cdn.example.org/a.png".into()),
        };
        assert!(ok.validate().is_ok());

        let bad = JoinRequest {
            player_name: "".into(),
            avatar_type: Some(AvatarKind::Custom),
            avatar_value: Some("not a url".into()),
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("player_name"));
        assert!(fields.contains_key("avatar_value"));
    }

    #[test]
    fn quote_items_need_a_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(
            item_ref(ItemKind::Quote, &id.to_string()).unwrap(),
            ItemRef::Quote(id)
        );
        assert!(matches!(
            item_ref(ItemKind::Quote, "title-incubation"),
            Err(ServiceError::Validation(_))
        ));
        assert_eq!(
            item_ref(ItemKind::Title, "title-incubation").unwrap(),
            ItemRef::Title("title-incubation".into())
        );
    }
}
