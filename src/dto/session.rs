//! DTO definitions for the facilitator REST API and the shared session view.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::timestamp::Timestamp,
    dto::{format_optional, validation::validate_not_blank},
    state::model::{Difficulty, GameSession, Phase, Quote},
};

/// Snapshot of the shared session as seen at a given instant.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionView {
    /// Session id.
    pub id: Uuid,
    /// The countdown is running.
    pub is_active: bool,
    /// Quote theme served to players.
    pub theme: String,
    /// Current difficulty label.
    pub difficulty: Difficulty,
    /// Round duration.
    pub timer_seconds: u32,
    /// RFC 3339 start of the running timer.
    pub timer_started_at: Option<String>,
    /// Seconds left on the running timer; `timer_seconds` while stopped.
    pub remaining_seconds: u64,
    /// Placements currently score double.
    pub double_points_active: bool,
    /// Hint currently broadcast to players.
    pub current_hint: Option<String>,
    /// RFC 3339 end of the round, once ended.
    pub game_ended_at: Option<String>,
    /// Number of quotes served to players; absent when the whole catalog is served.
    pub quote_count: Option<usize>,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 time of the last write.
    pub updated_at: String,
}

impl SessionView {
    /// Project `session` with the remaining time computed at `now`.
    pub fn at(session: &GameSession, now: Timestamp) -> Self {
        Self {
            id: session.id,
            is_active: session.is_active,
            theme: session.theme.clone(),
            difficulty: session.difficulty,
            timer_seconds: session.timer_seconds,
            timer_started_at: format_optional(session.timer_started_at),
            remaining_seconds: session
                .remaining_seconds(now)
                .unwrap_or(u64::from(session.timer_seconds)),
            double_points_active: session.double_points_active,
            current_hint: session.current_hint.clone(),
            game_ended_at: format_optional(session.game_ended_at),
            quote_count: session.quote_count,
            created_at: session.created_at.to_rfc3339(),
            updated_at: session.updated_at.to_rfc3339(),
        }
    }
}

impl From<&GameSession> for SessionView {
    fn from(session: &GameSession) -> Self {
        Self::at(session, Timestamp::now())
    }
}

/// Request to change the round duration.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TimerRequest {
    #[validate(range(min = 60, max = 3600))]
    /// Round duration in seconds.
    pub seconds: u32,
}

/// Request to switch to a difficulty preset.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DifficultyRequest {
    /// Preset to apply.
    pub difficulty: Difficulty,
}

/// Explicit quote count and duration chosen by the facilitator.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CustomSettingsRequest {
    #[validate(range(min = 4, max = 100))]
    /// Quotes dealt to each player.
    pub quote_count: usize,
    #[validate(range(min = 1, max = 60))]
    /// Round duration in minutes.
    pub minutes: u32,
}

/// Hint broadcast to every player for a limited time.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct HintRequest {
    #[validate(length(min = 1, max = 280), custom(function = "validate_not_blank"))]
    /// Hint shown to players.
    pub text: String,
}

/// Name under which the current roster is archived.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SaveLeaderboardRequest {
    #[validate(length(min = 1, max = 120), custom(function = "validate_not_blank"))]
    /// Label of the archived round.
    pub game_name: String,
}

/// Catalog quote as listed to the facilitator.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuoteView {
    /// Quote id.
    pub id: Uuid,
    /// Quote body.
    pub text: String,
    /// Attributed author.
    pub author: String,
    /// Phase the quote belongs to.
    pub phase: Phase,
}

impl From<&Quote> for QuoteView {
    fn from(quote: &Quote) -> Self {
        Self {
            id: quote.id,
            text: quote.text.clone(),
            author: quote.author.clone(),
            phase: quote.phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use validator::Validate;

    use super::*;
    use crate::state::model::CLASSIC_THEME;

    fn session(started: Option<Timestamp>) -> GameSession {
        let now = Timestamp::now();
        GameSession {
            id: Uuid::new_v4(),
            is_active: started.is_some(),
            theme: CLASSIC_THEME.into(),
            difficulty: Difficulty::Hard,
            timer_seconds: 300,
            timer_started_at: started,
            double_points_active: false,
            current_hint: None,
            game_ended_at: None,
            quote_count: Some(24),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn stopped_timer_reports_full_duration() {
        let view = SessionView::at(&session(None), Timestamp::now());
        assert_eq!(view.remaining_seconds, 300);
        assert!(view.timer_started_at.is_none());
    }

    #[test]
    fn running_timer_reports_time_left() {
        let now = Timestamp::now();
        let view = SessionView::at(&session(Some(now.minus(Duration::from_secs(60)))), now);
        assert_eq!(view.remaining_seconds, 240);
    }

    #[test]
    fn request_bounds_are_enforced() {
        assert!(TimerRequest { seconds: 59 }.validate().is_err());
        assert!(TimerRequest { seconds: 600 }.validate().is_ok());
        assert!(
            CustomSettingsRequest {
                quote_count: 3,
                minutes: 10
            }
            .validate()
            .is_err()
        );
        assert!(
            CustomSettingsRequest {
                quote_count: 12,
                minutes: 61
            }
            .validate()
            .is_err()
        );
        assert!(HintRequest { text: "   ".into() }.validate().is_err());
        assert!(
            HintRequest {
                text: "Think about sleep".into()
            }
            .validate()
            .is_ok()
        );
        assert!(
            SaveLeaderboardRequest {
                game_name: "".into()
            }
            .validate()
            .is_err()
        );
    }
}
