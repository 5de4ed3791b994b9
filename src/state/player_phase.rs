//! Phase machine of one player device.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle of one player device within the shared session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlayerPhase {
    /// No player row is bound to the device yet.
    Unjoined,
    /// Joined while the session is inactive; waiting for the facilitator.
    Waiting,
    /// Placing items on the board.
    Playing,
    /// Puzzle finished; final score recorded.
    Completed,
    /// Leaderboard reveal is shown.
    Revealed,
}

impl PlayerPhase {
    /// Whether drops are accepted in this phase.
    pub fn accepts_drops(&self) -> bool {
        matches!(self, PlayerPhase::Playing)
    }
}

/// Events that can be applied to the player state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// A player row was bound; `session_active` decides between waiting and playing.
    Joined {
        /// Whether the session's countdown is running.
        session_active: bool,
    },
    /// A fresh session snapshot was observed.
    SessionObserved {
        /// Whether the session's countdown is running.
        active: bool,
    },
    /// The puzzle was completed (all items placed, time up or session ended).
    Completed,
    /// The leaderboard reveal was triggered.
    Revealed,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// The phase the machine was in when the event was received.
    pub from: PlayerPhase,
    /// The event that cannot be applied from this phase.
    pub event: PhaseEvent,
}

/// State machine of the `unjoined -> waiting -> playing -> completed -> revealed` flow.
#[derive(Debug, Clone)]
pub struct PlayerStateMachine {
    phase: PlayerPhase,
    version: usize,
}

impl Default for PlayerStateMachine {
    fn default() -> Self {
        Self {
            phase: PlayerPhase::Unjoined,
            version: 0,
        }
    }
}

impl PlayerStateMachine {
    /// Machine in the `Unjoined` phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> PlayerPhase {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Apply `event`, returning the new phase.
    ///
    /// Observing a session never fails: it only moves a waiting player to
    /// playing when the session became active. Pausing keeps players in
    /// `Playing`.
    pub fn apply(&mut self, event: PhaseEvent) -> Result<PlayerPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        if next != self.phase {
            self.phase = next;
            self.version += 1;
        }
        Ok(self.phase)
    }

    fn compute_transition(&self, event: PhaseEvent) -> Result<PlayerPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (PlayerPhase::Unjoined, PhaseEvent::Joined { session_active }) => {
                if session_active {
                    PlayerPhase::Playing
                } else {
                    PlayerPhase::Waiting
                }
            }
            (PlayerPhase::Waiting, PhaseEvent::SessionObserved { active: true }) => {
                PlayerPhase::Playing
            }
            (phase, PhaseEvent::SessionObserved { .. }) => phase,
            (PlayerPhase::Waiting | PlayerPhase::Playing, PhaseEvent::Completed) => {
                PlayerPhase::Completed
            }
            (PlayerPhase::Completed | PlayerPhase::Revealed, PhaseEvent::Revealed) => {
                PlayerPhase::Revealed
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
