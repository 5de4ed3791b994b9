//! Per-player puzzle: card pools, placed cards per phase, miss counters and the hint zone.

use std::{
    collections::{BTreeMap, HashMap},
    time::{Duration, Instant},
};

use indexmap::IndexMap;
use rand::{Rng, seq::SliceRandom};
use thiserror::Error;
use uuid::Uuid;

use crate::state::model::{PHASE_TITLES, Phase, PhaseTitle, Quote, find_title};

/// Reference to a draggable card.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemRef {
    /// Catalog quote by id.
    Quote(Uuid),
    /// Phase title by id.
    Title(String),
}

impl ItemRef {
    /// Key used in persisted placements and miss counters.
    pub fn key(&self) -> String {
        match self {
            ItemRef::Quote(id) => id.to_string(),
            ItemRef::Title(id) => id.clone(),
        }
    }
}

/// A card picked up by the interaction layer and carried to a drop zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    item: ItemRef,
}

impl DragSession {
    /// Start dragging `item`.
    pub fn pick_up(item: ItemRef) -> Self {
        Self { item }
    }

    /// Card being dragged.
    pub fn item(&self) -> &ItemRef {
        &self.item
    }
}

/// Tunables of the hint-zone behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardSettings {
    /// Wrong drops of the same card before its correct zone is highlighted.
    pub wrong_attempts_for_hint: u32,
    /// How long a highlighted zone stays lit.
    pub hint_zone_duration: Duration,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            wrong_attempts_for_hint: 2,
            hint_zone_duration: Duration::from_secs(3),
        }
    }
}

/// Rejected board moves.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    /// The card was never dealt to this board.
    #[error("`{0}` is not a card of this puzzle")]
    UnknownItem(String),
    /// The card was already placed.
    #[error("`{0}` is not waiting in the pool")]
    NotAvailable(String),
    /// A removal named the wrong zone.
    #[error("`{item}` is not placed on {phase}")]
    NotPlaced {
        /// Key of the card.
        item: String,
        /// Zone the removal named.
        phase: Phase,
    },
}

/// Result of one drop attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropOutcome {
    /// Card that was dropped.
    pub item: ItemRef,
    /// Zone it was dropped on.
    pub target: Phase,
    /// Zone the card belongs to.
    pub correct_phase: Phase,
    /// `target` was the right zone.
    pub correct: bool,
    /// Consecutive wrong drops of this card (0 after a correct drop).
    pub item_misses: u32,
    /// Zone highlighted by this drop, if the hint threshold was reached.
    pub hint_zone: Option<Phase>,
    /// This drop placed the last card; reported once per board.
    pub completed: bool,
}

#[derive(Debug, Clone, Copy)]
struct HintZone {
    phase: Phase,
    expires_at: Instant,
}

/// Shuffle the catalog and keep at most `quote_count` quotes.
///
/// Quotes already named in `placements` are dealt first so a resumed player
/// gets back the cards it had placed.
pub fn deal<R: Rng + ?Sized>(
    quotes: Vec<Quote>,
    quote_count: Option<usize>,
    placements: &IndexMap<String, Phase>,
    rng: &mut R,
) -> Vec<Quote> {
    let (mut dealt, mut rest): (Vec<Quote>, Vec<Quote>) = quotes
        .into_iter()
        .partition(|quote| placements.contains_key(&quote.id.to_string()));
    dealt.shuffle(rng);
    rest.shuffle(rng);
    dealt.append(&mut rest);
    if let Some(count) = quote_count {
        dealt.truncate(count);
    }
    dealt
}

/// Puzzle state of one device.
#[derive(Debug, Clone)]
pub struct PuzzleBoard {
    settings: BoardSettings,
    quote_total: usize,
    available_quotes: Vec<Quote>,
    available_titles: Vec<PhaseTitle>,
    placed_quotes: BTreeMap<Phase, Vec<Quote>>,
    placed_titles: BTreeMap<Phase, PhaseTitle>,
    item_misses: HashMap<String, u32>,
    phase_misses: BTreeMap<Phase, u32>,
    hint_zone: Option<HintZone>,
    completion_reported: bool,
}

impl PuzzleBoard {
    /// Board holding `quotes` (already dealt) and the four phase titles.
    pub fn new(quotes: Vec<Quote>, settings: BoardSettings) -> Self {
        Self {
            settings,
            quote_total: quotes.len(),
            available_quotes: quotes,
            available_titles: PHASE_TITLES.to_vec(),
            placed_quotes: BTreeMap::new(),
            placed_titles: BTreeMap::new(),
            item_misses: HashMap::new(),
            phase_misses: BTreeMap::new(),
            hint_zone: None,
            completion_reported: false,
        }
    }

    /// Replay persisted placements that are still correct, without scoring.
    /// Returns the number of cards moved onto the board.
    pub fn restore(&mut self, placements: &IndexMap<String, Phase>) -> usize {
        let mut restored = 0;
        for (key, phase) in placements {
            let moved = match key.parse::<Uuid>() {
                Ok(id) => self.take_quote_if(id, *phase),
                Err(_) => self.take_title_if(key, *phase),
            };
            if moved {
                restored += 1;
            }
        }
        if self.is_complete() {
            self.completion_reported = true;
        }
        restored
    }

    fn take_quote_if(&mut self, id: Uuid, phase: Phase) -> bool {
        let Some(index) = self
            .available_quotes
            .iter()
            .position(|quote| quote.id == id && quote.phase == phase)
        else {
            return false;
        };
        let quote = self.available_quotes.remove(index);
        self.placed_quotes.entry(phase).or_default().push(quote);
        true
    }

    fn take_title_if(&mut self, id: &str, phase: Phase) -> bool {
        let Some(index) = self
            .available_titles
            .iter()
            .position(|title| title.id == id && title.phase == phase)
        else {
            return false;
        };
        let title = self.available_titles.remove(index);
        self.placed_titles.insert(phase, title);
        true
    }

    /// Correct phase of a card of this board (placed or not).
    pub fn correct_phase(&self, item: &ItemRef) -> Option<Phase> {
        match item {
            ItemRef::Quote(id) => self
                .available_quotes
                .iter()
                .chain(self.placed_quotes.values().flatten())
                .find(|quote| quote.id == *id)
                .map(|quote| quote.phase),
            ItemRef::Title(id) => find_title(id).map(|title| title.phase),
        }
    }

    /// Drop the dragged card on `target`.
    ///
    /// Any drop clears the previous hint zone. A wrong drop leaves the card in
    /// its pool; reaching the miss threshold highlights the correct zone until
    /// `now + hint_zone_duration`.
    pub fn attempt_drop(
        &mut self,
        drag: DragSession,
        target: Phase,
        now: Instant,
    ) -> Result<DropOutcome, BoardError> {
        let item = drag.item;
        let key = item.key();
        let correct_phase = self
            .correct_phase(&item)
            .ok_or_else(|| BoardError::UnknownItem(key.clone()))?;
        if !self.is_available(&item) {
            return Err(BoardError::NotAvailable(key));
        }

        self.hint_zone = None;
        let correct = target == correct_phase;
        let mut hint_zone = None;

        let item_misses = if correct {
            let moved = match &item {
                ItemRef::Quote(id) => self.take_quote_if(*id, target),
                ItemRef::Title(id) => self.take_title_if(id, target),
            };
            debug_assert!(moved);
            self.item_misses.insert(key, 0);
            0
        } else {
            let misses = self.item_misses.entry(key).or_insert(0);
            *misses += 1;
            *self.phase_misses.entry(correct_phase).or_insert(0) += 1;
            if *misses >= self.settings.wrong_attempts_for_hint {
                self.hint_zone = Some(HintZone {
                    phase: correct_phase,
                    expires_at: now + self.settings.hint_zone_duration,
                });
                hint_zone = Some(correct_phase);
            }
            *misses
        };

        let completed = correct && self.is_complete() && !self.completion_reported;
        if completed {
            self.completion_reported = true;
        }

        Ok(DropOutcome {
            item,
            target,
            correct_phase,
            correct,
            item_misses,
            hint_zone,
            completed,
        })
    }

    /// Move a placed card back to its pool. Scores are not reverted.
    pub fn remove_item(&mut self, item: &ItemRef, from: Phase) -> Result<(), BoardError> {
        let not_placed = || BoardError::NotPlaced {
            item: item.key(),
            phase: from,
        };
        match item {
            ItemRef::Quote(id) => {
                let placed = self.placed_quotes.get_mut(&from).ok_or_else(not_placed)?;
                let index = placed
                    .iter()
                    .position(|quote| quote.id == *id)
                    .ok_or_else(not_placed)?;
                let quote = placed.remove(index);
                self.available_quotes.push(quote);
            }
            ItemRef::Title(id) => {
                match self.placed_titles.get(&from) {
                    Some(title) if title.id == id.as_str() => {}
                    _ => return Err(not_placed()),
                }
                if let Some(title) = self.placed_titles.remove(&from) {
                    self.available_titles.push(title);
                }
            }
        }
        Ok(())
    }

    fn is_available(&self, item: &ItemRef) -> bool {
        match item {
            ItemRef::Quote(id) => self.available_quotes.iter().any(|quote| quote.id == *id),
            ItemRef::Title(id) => self
                .available_titles
                .iter()
                .any(|title| title.id == id.as_str()),
        }
    }

    /// Zone currently highlighted, if its hint has not expired at `now`.
    pub fn hint_zone(&self, now: Instant) -> Option<Phase> {
        self.hint_zone
            .filter(|zone| now < zone.expires_at)
            .map(|zone| zone.phase)
    }

    /// Cards on the board, quotes and titles.
    pub fn placed_count(&self) -> usize {
        self.placed_quotes.values().map(Vec::len).sum::<usize>() + self.placed_titles.len()
    }

    /// Quotes dealt to this board plus the four titles.
    pub fn total_items(&self) -> usize {
        self.quote_total + PHASE_TITLES.len()
    }

    /// Every dealt card is placed.
    pub fn is_complete(&self) -> bool {
        self.placed_count() == self.total_items()
    }

    /// Quotes still in the pool.
    pub fn available_quotes(&self) -> &[Quote] {
        &self.available_quotes
    }

    /// Titles still in the pool.
    pub fn available_titles(&self) -> &[PhaseTitle] {
        &self.available_titles
    }

    /// Quotes placed on `phase`, in drop order.
    pub fn placed_quotes(&self, phase: Phase) -> &[Quote] {
        self.placed_quotes
            .get(&phase)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Title placed on `phase`, if any.
    pub fn placed_title(&self, phase: Phase) -> Option<&PhaseTitle> {
        self.placed_titles.get(&phase)
    }

    /// Consecutive wrong drops of `item`.
    pub fn item_misses(&self, item: &ItemRef) -> u32 {
        self.item_misses.get(&item.key()).copied().unwrap_or(0)
    }

    /// Wrong drops grouped by the correct phase of the missed card.
    pub fn phase_misses(&self) -> &BTreeMap<Phase, u32> {
        &self.phase_misses
    }

    /// Phase with strictly the most misses; `None` on ties or a clean run.
    pub fn most_missed_phase(&self) -> Option<Phase> {
        let top = self.phase_misses.values().copied().max().filter(|n| *n > 0)?;
        let mut leaders = self
            .phase_misses
            .iter()
            .filter(|(_, misses)| **misses == top)
            .map(|(phase, _)| *phase);
        let leader = leaders.next()?;
        leaders.next().is_none().then_some(leader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn quote(phase: Phase) -> Quote {
        Quote {
            id: Uuid::new_v4(),
            text: format!("a {phase} quote"),
            author: "Someone".into(),
            phase,
            theme: None,
        }
    }

    fn drag_quote(quote: &Quote) -> DragSession {
        DragSession::pick_up(ItemRef::Quote(quote.id))
    }

    fn drag_title(phase: Phase) -> DragSession {
        DragSession::pick_up(ItemRef::Title(format!("title-{phase}")))
    }

    #[test]
    fn incubation_quote_lights_hint_zone_on_second_miss() {
        let incubation = quote(Phase::Incubation);
        let mut board = PuzzleBoard::new(vec![incubation.clone()], BoardSettings::default());
        let now = Instant::now();

        let first = board
            .attempt_drop(drag_quote(&incubation), Phase::Preparation, now)
            .unwrap();
        assert!(!first.correct);
        assert_eq!(first.item_misses, 1);
        assert_eq!(first.hint_zone, None);

        let second = board
            .attempt_drop(drag_quote(&incubation), Phase::Preparation, now)
            .unwrap();
        assert_eq!(second.item_misses, 2);
        assert_eq!(second.hint_zone, Some(Phase::Incubation));
        assert_eq!(board.hint_zone(now), Some(Phase::Incubation));
        assert_eq!(board.hint_zone(now + Duration::from_secs(3)), None);

        let third = board
            .attempt_drop(drag_quote(&incubation), Phase::Incubation, now)
            .unwrap();
        assert!(third.correct);
        assert_eq!(third.item_misses, 0);
        assert_eq!(board.hint_zone(now), None);
        assert_eq!(board.placed_quotes(Phase::Incubation).len(), 1);
        assert!(board.available_quotes().is_empty());
    }

    #[test]
    fn completion_is_reported_once_when_every_card_is_placed() {
        let only = quote(Phase::Verification);
        let mut board = PuzzleBoard::new(vec![only.clone()], BoardSettings::default());
        let now = Instant::now();
        for phase in Phase::ALL {
            let outcome = board.attempt_drop(drag_title(phase), phase, now).unwrap();
            assert!(!outcome.completed);
        }
        let last = board
            .attempt_drop(drag_quote(&only), Phase::Verification, now)
            .unwrap();
        assert!(last.completed);
        assert_eq!(board.placed_count(), 5);

        board
            .remove_item(&ItemRef::Quote(only.id), Phase::Verification)
            .unwrap();
        let again = board
            .attempt_drop(drag_quote(&only), Phase::Verification, now)
            .unwrap();
        assert!(!again.completed);
    }

    #[test]
    fn wrong_title_on_filled_slot_is_a_plain_miss() {
        let mut board = PuzzleBoard::new(Vec::new(), BoardSettings::default());
        let now = Instant::now();
        board
            .attempt_drop(drag_title(Phase::Preparation), Phase::Preparation, now)
            .unwrap();
        let outcome = board
            .attempt_drop(drag_title(Phase::Incubation), Phase::Preparation, now)
            .unwrap();
        assert!(!outcome.correct);
        assert_eq!(
            board.placed_title(Phase::Preparation).map(|t| t.id),
            Some("title-preparation")
        );
        assert_eq!(board.available_titles().len(), 3);
    }

    #[test]
    fn removed_cards_return_to_their_pool() {
        let prep = quote(Phase::Preparation);
        let mut board = PuzzleBoard::new(vec![prep.clone()], BoardSettings::default());
        let now = Instant::now();
        board
            .attempt_drop(drag_quote(&prep), Phase::Preparation, now)
            .unwrap();
        assert!(matches!(
            board.remove_item(&ItemRef::Quote(prep.id), Phase::Incubation),
            Err(BoardError::NotPlaced { .. })
        ));
        board
            .remove_item(&ItemRef::Quote(prep.id), Phase::Preparation)
            .unwrap();
        assert_eq!(board.available_quotes().len(), 1);
        assert_eq!(board.placed_count(), 0);
    }

    #[test]
    fn unknown_and_placed_cards_are_rejected() {
        let prep = quote(Phase::Preparation);
        let mut board = PuzzleBoard::new(vec![prep.clone()], BoardSettings::default());
        let now = Instant::now();
        assert!(matches!(
            board.attempt_drop(
                DragSession::pick_up(ItemRef::Title("title-nope".into())),
                Phase::Preparation,
                now
            ),
            Err(BoardError::UnknownItem(_))
        ));
        board
            .attempt_drop(drag_quote(&prep), Phase::Preparation, now)
            .unwrap();
        assert_eq!(
            board.attempt_drop(drag_quote(&prep), Phase::Preparation, now),
            Err(BoardError::NotAvailable(prep.id.to_string()))
        );
    }

    #[test]
    fn restore_replays_only_correct_placements() {
        let prep = quote(Phase::Preparation);
        let illum = quote(Phase::Illumination);
        let mut board =
            PuzzleBoard::new(vec![prep.clone(), illum.clone()], BoardSettings::default());
        let placements: IndexMap<String, Phase> = [
            (prep.id.to_string(), Phase::Preparation),
            (illum.id.to_string(), Phase::Verification),
            ("title-incubation".to_string(), Phase::Incubation),
        ]
        .into_iter()
        .collect();

        assert_eq!(board.restore(&placements), 2);
        assert_eq!(board.available_quotes(), &[illum]);
        assert!(board.placed_title(Phase::Incubation).is_some());
    }

    #[test]
    fn most_missed_phase_requires_a_clear_leader() {
        let prep = quote(Phase::Preparation);
        let verif = quote(Phase::Verification);
        let mut board =
            PuzzleBoard::new(vec![prep.clone(), verif.clone()], BoardSettings::default());
        let now = Instant::now();
        assert_eq!(board.most_missed_phase(), None);

        board
            .attempt_drop(drag_quote(&prep), Phase::Incubation, now)
            .unwrap();
        board
            .attempt_drop(drag_quote(&verif), Phase::Incubation, now)
            .unwrap();
        assert_eq!(board.most_missed_phase(), None);

        board
            .attempt_drop(drag_quote(&verif), Phase::Illumination, now)
            .unwrap();
        assert_eq!(board.most_missed_phase(), Some(Phase::Verification));
    }

    #[test]
    fn deal_truncates_to_quote_count() {
        let catalog: Vec<Quote> = Phase::ALL.iter().map(|phase| quote(*phase)).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let none = IndexMap::new();
        assert_eq!(deal(catalog.clone(), Some(2), &none, &mut rng).len(), 2);
        assert_eq!(deal(catalog.clone(), None, &none, &mut rng).len(), 4);
        assert_eq!(deal(catalog, Some(40), &none, &mut rng).len(), 4);
    }

    #[test]
    fn deal_keeps_previously_placed_quotes() {
        let catalog: Vec<Quote> = (0..10)
            .map(|i| quote(Phase::ALL[i % Phase::ALL.len()]))
            .collect();
        let placed: IndexMap<String, Phase> = catalog[6..9]
            .iter()
            .map(|quote| (quote.id.to_string(), quote.phase))
            .collect();

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let dealt = deal(catalog.clone(), Some(4), &placed, &mut rng);
            assert_eq!(dealt.len(), 4);
            for quote in &catalog[6..9] {
                assert!(dealt.iter().any(|dealt| dealt.id == quote.id));
            }

            let mut board = PuzzleBoard::new(dealt, BoardSettings::default());
            assert_eq!(board.restore(&placed), 3);
        }
    }
}
