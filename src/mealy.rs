use std::collections::VecDeque;
use std::fmt;

use crate::alphabet::{Alphabet, Letter};
use crate::error::LearnError;
use crate::math;
use crate::word::Word;

/// Index of a state in the arena of a [`MealyMachine`].
///
/// State identity is the index; the name a state carries is metadata for
/// rendering only. The initial state is index 0 by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub(crate) u32);

impl StateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// A transition of a Mealy machine: reading `input` emits `output` and moves
/// to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub input: Letter,
    pub output: Letter,
    pub target: StateId,
}

#[derive(Debug, Clone)]
struct MealyState {
    name: String,
    transitions: Vec<Transition>,
}

/// A deterministic Mealy machine over a fixed input alphabet.
///
/// States live in an arena and transitions refer to their target by
/// [`StateId`], so the cyclic transition graph needs no reference chasing.
/// Running a word produces one output letter per input letter; the empty word
/// produces the empty output word.
#[derive(Debug, Clone)]
pub struct MealyMachine {
    alphabet: Alphabet,
    states: Vec<MealyState>,
}

impl MealyMachine {
    pub fn new(alphabet: Alphabet) -> Self {
        Self {
            alphabet,
            states: Vec::new(),
        }
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Adds a state with the given display name and returns its index. The
    /// first state added becomes the initial state.
    pub fn add_state(&mut self, name: impl Into<String>) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.states.push(MealyState {
            name: name.into(),
            transitions: Vec::new(),
        });
        id
    }

    /// Attaches a transition to `source`. Panics if a transition for `input`
    /// already exists at `source`, if `input` is not an alphabet letter or if
    /// either endpoint is out of bounds.
    pub fn add_transition(&mut self, source: StateId, input: Letter, output: Letter, target: StateId) {
        assert!(
            source.index() < self.states.len() && target.index() < self.states.len(),
            "transition endpoints must be states of this machine"
        );
        assert!(
            self.alphabet.contains(&input),
            "input letter {input} does not belong to the alphabet"
        );
        assert!(
            self.successor(source, &input).is_none(),
            "state {} already has a transition for {input}",
            self.states[source.index()].name
        );
        self.states[source.index()].transitions.push(Transition {
            input,
            output,
            target,
        });
    }

    /// The initial state, index 0.
    pub fn initial(&self) -> StateId {
        assert!(!self.states.is_empty(), "machine has no states");
        StateId(0)
    }

    /// Returns the number of states.
    pub fn size(&self) -> usize {
        self.states.len()
    }

    pub fn state_name(&self, state: StateId) -> &str {
        &self.states[state.index()].name
    }

    /// Iterates over the outgoing transitions of `state` in insertion order.
    pub fn transitions_from(&self, state: StateId) -> std::slice::Iter<'_, Transition> {
        self.states[state.index()].transitions.iter()
    }

    /// Looks up the unique transition of `state` for `input`, if present.
    pub fn successor(&self, state: StateId, input: &Letter) -> Option<&Transition> {
        self.states[state.index()]
            .transitions
            .iter()
            .find(|t| t.input == *input)
    }

    /// Runs `word` starting in `source` and returns the emitted output word.
    ///
    /// Fails with [`LearnError::InvariantViolation`] if a reached state has no
    /// transition for the next input letter; a machine handed to the learner
    /// or an oracle must be total on its alphabet.
    pub fn run_from(&self, source: StateId, word: &Word) -> Result<Word, LearnError> {
        let mut current = source;
        let mut outputs = Word::epsilon();
        for letter in word.letters() {
            let transition = self.successor(current, letter).ok_or_else(|| {
                LearnError::InvariantViolation(format!(
                    "state {} has no transition for input {letter}",
                    self.states[current.index()].name
                ))
            })?;
            outputs.push(transition.output.clone());
            current = transition.target;
        }
        Ok(outputs)
    }

    /// Runs `word` from the initial state.
    pub fn run(&self, word: &Word) -> Result<Word, LearnError> {
        self.run_from(self.initial(), word)
    }

    /// Returns the states reachable from the initial state in BFS order,
    /// exploring transitions in insertion order.
    pub fn reachable_states(&self) -> Vec<StateId> {
        if self.states.is_empty() {
            return Vec::new();
        }
        let mut seen = vec![false; self.states.len()];
        seen[0] = true;
        let mut order = vec![self.initial()];
        let mut queue = VecDeque::from([self.initial()]);
        while let Some(state) = queue.pop_front() {
            for transition in self.transitions_from(state) {
                if !seen[transition.target.index()] {
                    seen[transition.target.index()] = true;
                    order.push(transition.target);
                    queue.push_back(transition.target);
                }
            }
        }
        order
    }

    /// Returns true if every reachable state has a transition for every
    /// alphabet letter.
    pub fn is_total(&self) -> bool {
        self.reachable_states()
            .into_iter()
            .all(|state| self.alphabet.iter().all(|a| self.successor(state, a).is_some()))
    }

    /// Returns true if both machines produce the same output word for every
    /// input word, checked by exploring the product of their state spaces.
    pub fn bisimilar(&self, other: &MealyMachine) -> bool {
        if self.alphabet != other.alphabet {
            return false;
        }
        let mut seen: math::Set<(StateId, StateId)> = math::Set::default();
        seen.insert((self.initial(), other.initial()));
        let mut queue = VecDeque::from([(self.initial(), other.initial())]);
        while let Some((left, right)) = queue.pop_front() {
            for a in self.alphabet.iter() {
                match (self.successor(left, a), other.successor(right, a)) {
                    (Some(ours), Some(theirs)) => {
                        if ours.output != theirs.output {
                            return false;
                        }
                        if seen.insert((ours.target, theirs.target)) {
                            queue.push_back((ours.target, theirs.target));
                        }
                    }
                    (None, None) => {}
                    _ => return false,
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flip_flop() -> MealyMachine {
        let mut machine = MealyMachine::new(Alphabet::new(['t']));
        let q0 = machine.add_state("q0");
        let q1 = machine.add_state("q1");
        machine.add_transition(q0, Letter::from('t'), Letter::int(0), q1);
        machine.add_transition(q1, Letter::from('t'), Letter::int(1), q0);
        machine
    }

    #[test]
    fn running_a_word_emits_one_letter_per_input() {
        let machine = flip_flop();
        assert_eq!(machine.run(&Word::epsilon()).unwrap(), Word::epsilon());
        assert_eq!(
            machine.run(&Word::from_letters(['t', 't', 't'])).unwrap(),
            Word::from_letters([0, 1, 0])
        );
    }

    #[test]
    fn running_into_a_missing_transition_fails() {
        let mut machine = MealyMachine::new(Alphabet::new(['a', 'b']));
        let q0 = machine.add_state("q0");
        machine.add_transition(q0, Letter::from('a'), Letter::int(0), q0);
        assert!(!machine.is_total());
        assert!(matches!(
            machine.run(&Word::letter('b')),
            Err(LearnError::InvariantViolation(_))
        ));
    }

    #[test]
    #[should_panic(expected = "already has a transition")]
    fn duplicate_transitions_are_rejected() {
        let mut machine = MealyMachine::new(Alphabet::new(['a']));
        let q0 = machine.add_state("q0");
        machine.add_transition(q0, Letter::from('a'), Letter::int(0), q0);
        machine.add_transition(q0, Letter::from('a'), Letter::int(1), q0);
    }

    #[test]
    fn bisimilarity_ignores_state_names() {
        let machine = flip_flop();
        let mut relabeled = MealyMachine::new(Alphabet::new(['t']));
        let even = relabeled.add_state("even");
        let odd = relabeled.add_state("odd");
        relabeled.add_transition(even, Letter::from('t'), Letter::int(0), odd);
        relabeled.add_transition(odd, Letter::from('t'), Letter::int(1), even);
        assert!(machine.bisimilar(&relabeled));

        let mut constant = MealyMachine::new(Alphabet::new(['t']));
        let q0 = constant.add_state("q0");
        constant.add_transition(q0, Letter::from('t'), Letter::int(0), q0);
        assert!(!machine.bisimilar(&constant));
    }

    #[test]
    fn reachable_states_follow_bfs_order() {
        let mut machine = MealyMachine::new(Alphabet::new(['a', 'b']));
        let q0 = machine.add_state("q0");
        let q1 = machine.add_state("q1");
        let q2 = machine.add_state("q2");
        machine.add_transition(q0, Letter::from('a'), Letter::int(0), q2);
        machine.add_transition(q0, Letter::from('b'), Letter::int(0), q1);
        machine.add_transition(q1, Letter::from('a'), Letter::int(0), q1);
        machine.add_transition(q1, Letter::from('b'), Letter::int(0), q1);
        machine.add_transition(q2, Letter::from('a'), Letter::int(0), q0);
        machine.add_transition(q2, Letter::from('b'), Letter::int(0), q0);
        assert_eq!(machine.reachable_states(), [q0, q2, q1]);
    }
}
