use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};

use crate::error::LearnError;
use crate::knowledge::KnowledgeBase;
use crate::math;
use crate::mealy::{MealyMachine, StateId};
use crate::teacher::Teacher;
use crate::word::Word;

/// The outcome of an equivalence query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Equivalence {
    /// No disagreement between hypothesis and target was found.
    Equivalent,
    /// An input word on which hypothesis and target emit different outputs.
    Counterexample(Word),
}

/// Strategy for answering equivalence queries against a black-box target.
///
/// An oracle may only observe the target through membership queries, which it
/// issues through the knowledge base so that everything it learns also feeds
/// the table later on.
pub trait EquivalenceOracle {
    fn check<T: Teacher>(
        &mut self,
        hypothesis: &MealyMachine,
        knowledge: &mut KnowledgeBase<T>,
    ) -> Result<Equivalence, LearnError>;
}

/// Chow's W-method conformance test.
///
/// Builds the suite `P · Σ^{≤ m−n} · W` where `P` is the transition cover of
/// the hypothesis, `Σ^{≤ k}` pads for up to `m − n` extra target states and
/// `W` is a characterization set telling all hypothesis states apart. Under
/// the assumption that the target has at most `max_states` states, an
/// exhausted suite proves equivalence. The suite is exponential in `m − n`,
/// so the bound should be close to the hypothesis size.
#[derive(Debug, Clone, Copy)]
pub struct WMethod {
    max_states: usize,
}

impl WMethod {
    pub fn new(max_states: usize) -> Self {
        assert!(max_states > 0, "state bound must be positive");
        Self { max_states }
    }

    /// One shortest access word per state, found by BFS; the initial state
    /// gets `ε`.
    fn access_words(hypothesis: &MealyMachine) -> Vec<Word> {
        let mut access: Vec<Option<Word>> = vec![None; hypothesis.size()];
        access[hypothesis.initial().index()] = Some(Word::epsilon());
        let mut queue = VecDeque::from([hypothesis.initial()]);
        while let Some(state) = queue.pop_front() {
            let prefix = access[state.index()].clone().expect("queued states have access words");
            for transition in hypothesis.transitions_from(state) {
                if access[transition.target.index()].is_none() {
                    access[transition.target.index()] =
                        Some(prefix.extended(transition.input.clone()));
                    queue.push_back(transition.target);
                }
            }
        }
        access
            .into_iter()
            .map(|word| word.expect("every hypothesis state is reachable"))
            .collect()
    }

    /// The transition cover: every access word together with all its
    /// one-letter extensions, so each transition of the hypothesis is
    /// exercised by some prefix.
    fn transition_cover(hypothesis: &MealyMachine) -> Vec<Word> {
        let mut cover: math::Set<Word> = math::Set::default();
        for word in Self::access_words(hypothesis) {
            for a in hypothesis.alphabet().iter() {
                cover.insert(word.extended(a.clone()));
            }
            cover.insert(word);
        }
        let mut cover: Vec<Word> = cover.into_iter().collect();
        cover.sort_by_key(Word::len);
        cover
    }

    /// Finds a shortest word on which the two states emit different output
    /// words, searching words in increasing length and alphabet order. In a
    /// minimal machine any two distinct states are separated by a word of at
    /// most `n` letters, so the search never extends words beyond that.
    fn distinguishing_word(
        hypothesis: &MealyMachine,
        left: StateId,
        right: StateId,
    ) -> Result<Word, LearnError> {
        let mut queue: VecDeque<Word> = hypothesis
            .alphabet()
            .iter()
            .cloned()
            .map(Word::letter)
            .collect();
        while let Some(word) = queue.pop_front() {
            if hypothesis.run_from(left, &word)? != hypothesis.run_from(right, &word)? {
                return Ok(word);
            }
            if word.len() < hypothesis.size() {
                for a in hypothesis.alphabet().iter() {
                    queue.push_back(word.extended(a.clone()));
                }
            }
        }
        Err(LearnError::InvariantViolation(format!(
            "states {left} and {right} of the hypothesis are not distinguishable"
        )))
    }

    /// The characterization set: a shortest distinguishing word per state
    /// pair. A single-state hypothesis has no pairs; the single-letter words
    /// keep the suite non-empty so wrong outputs still show.
    fn characterization_set(hypothesis: &MealyMachine) -> Result<Vec<Word>, LearnError> {
        if hypothesis.size() == 1 {
            return Ok(hypothesis
                .alphabet()
                .iter()
                .cloned()
                .map(Word::letter)
                .collect());
        }
        let mut distinguishers: math::Set<Word> = math::Set::default();
        for left in 0..hypothesis.size() {
            for right in left + 1..hypothesis.size() {
                distinguishers.insert(Self::distinguishing_word(
                    hypothesis,
                    StateId(left as u32),
                    StateId(right as u32),
                )?);
            }
        }
        Ok(distinguishers.into_iter().collect())
    }

    /// All words over the alphabet of length at most `depth`, including `ε`.
    fn padding(hypothesis: &MealyMachine, depth: usize) -> Vec<Word> {
        let mut words = vec![Word::epsilon()];
        let mut layer = vec![Word::epsilon()];
        for _ in 0..depth {
            layer = layer
                .iter()
                .flat_map(|word| {
                    hypothesis
                        .alphabet()
                        .iter()
                        .map(move |a| word.extended(a.clone()))
                })
                .collect();
            words.extend(layer.iter().cloned());
        }
        words
    }

    fn test_suite(&self, hypothesis: &MealyMachine) -> Result<Vec<Word>, LearnError> {
        let depth = self.max_states.saturating_sub(hypothesis.size());
        let cover = Self::transition_cover(hypothesis);
        let padding = Self::padding(hypothesis, depth);
        let distinguishers = Self::characterization_set(hypothesis)?;

        let mut suite: math::Set<Word> = math::Set::default();
        for prefix in &cover {
            for middle in &padding {
                for suffix in &distinguishers {
                    suite.insert(prefix.concat(middle).concat(suffix));
                }
            }
        }
        let mut suite: Vec<Word> = suite.into_iter().collect();
        // shortest counterexample first
        suite.sort_by_key(Word::len);
        Ok(suite)
    }
}

impl EquivalenceOracle for WMethod {
    fn check<T: Teacher>(
        &mut self,
        hypothesis: &MealyMachine,
        knowledge: &mut KnowledgeBase<T>,
    ) -> Result<Equivalence, LearnError> {
        let suite = self.test_suite(hypothesis)?;
        debug!(
            "running a W-method suite of {} words against a hypothesis with {} states",
            suite.len(),
            hypothesis.size()
        );
        for word in suite {
            trace!("testing {word}");
            let expected = knowledge.resolve(&word)?;
            let produced = hypothesis.run(&word)?;
            if expected != produced {
                info!("counterexample {word}: target emits {expected}, hypothesis {produced}");
                return Ok(Equivalence::Counterexample(word));
            }
        }
        Ok(Equivalence::Equivalent)
    }
}

/// A randomized walk over the hypothesis, as a cheap alternative to
/// [`WMethod`].
///
/// Each step either restarts both machines with the configured probability
/// or applies a uniformly drawn letter, comparing the hypothesis output with
/// the target's answer on the accumulated word. Gives no conformance
/// guarantee whatsoever; exhausting the step budget merely means no
/// disagreement was stumbled upon. Deterministic for a fixed seed.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    max_steps: usize,
    restart_probability: f64,
    rng: StdRng,
}

impl RandomWalk {
    pub fn new(max_steps: usize, restart_probability: f64, seed: u64) -> Self {
        assert!(
            0.0 < restart_probability && restart_probability < 1.0,
            "restart probability must lie in (0, 1)"
        );
        Self {
            max_steps,
            restart_probability,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl EquivalenceOracle for RandomWalk {
    fn check<T: Teacher>(
        &mut self,
        hypothesis: &MealyMachine,
        knowledge: &mut KnowledgeBase<T>,
    ) -> Result<Equivalence, LearnError> {
        let letters: Vec<_> = hypothesis.alphabet().iter().cloned().collect();
        let mut current = hypothesis.initial();
        let mut input = Word::epsilon();
        let mut produced = Word::epsilon();

        for _ in 0..self.max_steps {
            if !input.is_empty() && self.rng.gen_bool(self.restart_probability) {
                current = hypothesis.initial();
                input = Word::epsilon();
                produced = Word::epsilon();
                continue;
            }

            let letter = letters[self.rng.gen_range(0..letters.len())].clone();
            let transition = hypothesis.successor(current, &letter).ok_or_else(|| {
                LearnError::InvariantViolation(format!(
                    "hypothesis is not total, no transition for {letter}"
                ))
            })?;
            produced.push(transition.output.clone());
            current = transition.target;
            input.push(letter);

            let expected = knowledge.resolve(&input)?;
            if expected != produced {
                info!("random walk found counterexample {input}");
                return Ok(Equivalence::Counterexample(input));
            }
        }
        Ok(Equivalence::Equivalent)
    }
}
