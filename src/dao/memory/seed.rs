use uuid::Uuid;

use crate::{
    dao::{models::QuoteEntity, timestamp::Timestamp},
    state::model::{CLASSIC_THEME, Phase},
};

const CLASSIC_QUOTES: [(Phase, &str, &str); 24] = [
    (
        Phase::Preparation,
        "Chance favors only the prepared mind.",
        "Louis Pasteur",
    ),
    (
        Phase::Preparation,
        "Give me six hours to chop down a tree and I will spend the first four sharpening the axe.",
        "Abraham Lincoln",
    ),
    (
        Phase::Preparation,
        "If I have seen further it is by standing on the shoulders of giants.",
        "Isaac Newton",
    ),
    (
        Phase::Preparation,
        "An investment in knowledge pays the best interest.",
        "Benjamin Franklin",
    ),
    (
        Phase::Preparation,
        "Before anything else, preparation is the key to success.",
        "Alexander Graham Bell",
    ),
    (
        Phase::Preparation,
        "Research is to see what everybody else has seen, and to think what nobody else has thought.",
        "Albert Szent-Gyorgyi",
    ),
    (
        Phase::Incubation,
        "Creativity is the residue of time wasted.",
        "Albert Einstein",
    ),
    (
        Phase::Incubation,
        "Rest is not idleness.",
        "John Lubbock",
    ),
    (
        Phase::Incubation,
        "It is a common experience that a problem difficult at night is resolved in the morning after the committee of sleep has worked on it.",
        "John Steinbeck",
    ),
    (
        Phase::Incubation,
        "Sometimes the best way to solve a problem is to stop thinking about it.",
        "Unknown",
    ),
    (
        Phase::Incubation,
        "Ideas come from the subconscious when you are not looking for them.",
        "Graham Wallas",
    ),
    (
        Phase::Incubation,
        "Almost everything will work again if you unplug it for a few minutes, including you.",
        "Anne Lamott",
    ),
    (
        Phase::Illumination,
        "Eureka! I have found it!",
        "Archimedes",
    ),
    (
        Phase::Illumination,
        "I did not think. I investigated, and the answer came.",
        "Wilhelm Rontgen",
    ),
    (
        Phase::Illumination,
        "The moment of truth arrives suddenly, like a flash of lightning.",
        "Henri Poincare",
    ),
    (
        Phase::Illumination,
        "Creativity is just connecting things.",
        "Steve Jobs",
    ),
    (
        Phase::Illumination,
        "The intuitive mind is a sacred gift.",
        "Albert Einstein",
    ),
    (
        Phase::Illumination,
        "Inspiration exists, but it has to find you working.",
        "Pablo Picasso",
    ),
    (
        Phase::Verification,
        "I have not failed. I've just found 10,000 ways that won't work.",
        "Thomas Edison",
    ),
    (
        Phase::Verification,
        "It doesn't matter how beautiful your theory is. If it doesn't agree with experiment, it's wrong.",
        "Richard Feynman",
    ),
    (
        Phase::Verification,
        "Trust, but verify.",
        "Russian proverb",
    ),
    (
        Phase::Verification,
        "Without data, you're just another person with an opinion.",
        "W. Edwards Deming",
    ),
    (
        Phase::Verification,
        "Good writing is rewriting.",
        "Truman Capote",
    ),
    (
        Phase::Verification,
        "Measure twice, cut once.",
        "Carpenter's proverb",
    ),
];

/// Built-in classic catalog seeded into the in-memory store, six quotes per phase.
pub fn classic_catalog() -> Vec<QuoteEntity> {
    let created_at = Timestamp::now();
    CLASSIC_QUOTES
        .iter()
        .map(|(phase, text, author)| QuoteEntity {
            id: Uuid::new_v4(),
            theme: CLASSIC_THEME.into(),
            phase: *phase,
            text: (*text).into(),
            author: (*author).into(),
            is_active: true,
            created_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_holds_six_active_quotes_per_phase() {
        let catalog = classic_catalog();
        assert_eq!(catalog.len(), 24);
        for phase in Phase::ALL {
            assert_eq!(catalog.iter().filter(|q| q.phase == phase).count(), 6);
        }
        assert!(catalog.iter().all(|q| q.is_active && q.theme == CLASSIC_THEME));
    }
}
