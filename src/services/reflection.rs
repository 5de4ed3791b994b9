//! Post-game reflection prompts.

use rand::{Rng, seq::IndexedRandom};

use crate::state::model::Phase;

const PREPARATION_PROMPTS: [&str; 3] = [
    "What resources did you find most helpful during the preparation phase?",
    "How do you typically gather information before starting a creative project?",
    "What surprised you about the quotes in the Preparation phase?",
];

const INCUBATION_PROMPTS: [&str; 3] = [
    "How do you give your mind space to incubate ideas?",
    "Do you find stepping away from a problem helps you solve it?",
    "What activities help you let ideas simmer subconsciously?",
];

const ILLUMINATION_PROMPTS: [&str; 3] = [
    "Can you recall a 'Eureka!' moment in your own life?",
    "What conditions seem to trigger your best insights?",
    "How do you recognize when you've had a breakthrough?",
];

const VERIFICATION_PROMPTS: [&str; 3] = [
    "How do you typically test and refine your ideas?",
    "What role does feedback play in your creative process?",
    "How do you know when an idea is ready to share?",
];

const GENERAL_PROMPTS: [&str; 5] = [
    "Which phase of creativity do you find most challenging?",
    "How might understanding these phases help your future creative work?",
    "What new insight did you gain about the creative process today?",
    "How can you apply these phases to a current project?",
    "Which quote resonated with you the most and why?",
];

fn phase_prompts(phase: Phase) -> &'static [&'static str] {
    match phase {
        Phase::Preparation => &PREPARATION_PROMPTS,
        Phase::Incubation => &INCUBATION_PROMPTS,
        Phase::Illumination => &ILLUMINATION_PROMPTS,
        Phase::Verification => &VERIFICATION_PROMPTS,
    }
}

/// Prompts picked for one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reflection {
    /// Phase the prompts focus on.
    pub phase: Phase,
    /// `phase` is the player's most missed phase rather than a random pick.
    pub from_misses: bool,
    /// Question about `phase`.
    pub phase_prompt: &'static str,
    /// Question about the creative process as a whole.
    pub general_prompt: &'static str,
}

/// Focus on `most_missed` when the player had a clear weak spot, otherwise on a random phase.
pub fn reflect<R: Rng + ?Sized>(most_missed: Option<Phase>, rng: &mut R) -> Reflection {
    let (phase, from_misses) = match most_missed {
        Some(phase) => (phase, true),
        None => (Phase::ALL[rng.random_range(0..Phase::ALL.len())], false),
    };
    Reflection {
        phase,
        from_misses,
        phase_prompt: phase_prompts(phase).choose(rng).copied().unwrap_or_default(),
        general_prompt: GENERAL_PROMPTS.choose(rng).copied().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn most_missed_phase_drives_the_focus() {
        let mut rng = StdRng::seed_from_u64(3);
        let reflection = reflect(Some(Phase::Incubation), &mut rng);
        assert_eq!(reflection.phase, Phase::Incubation);
        assert!(reflection.from_misses);
        assert!(INCUBATION_PROMPTS.contains(&reflection.phase_prompt));
        assert!(GENERAL_PROMPTS.contains(&reflection.general_prompt));
    }

    #[test]
    fn clean_runs_fall_back_to_a_random_phase() {
        let mut rng = StdRng::seed_from_u64(11);
        let reflection = reflect(None, &mut rng);
        assert!(!reflection.from_misses);
        assert!(phase_prompts(reflection.phase).contains(&reflection.phase_prompt));
    }
}
