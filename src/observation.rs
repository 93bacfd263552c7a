use std::fmt;

use owo_colors::OwoColorize;
use tracing::{debug, trace};

use crate::alphabet::{Alphabet, Letter};
use crate::error::LearnError;
use crate::knowledge::KnowledgeBase;
use crate::math;
use crate::mealy::{MealyMachine, StateId};
use crate::teacher::Teacher;
use crate::word::Word;

/// Witness of a consistency defect: `left` and `right` sit in the upper part
/// with equal rows, yet extending both with `letter` makes them disagree in
/// the `suffix` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inconsistency {
    pub left: Word,
    pub right: Word,
    pub letter: Letter,
    pub suffix: Word,
}

/// The bookkeeping structure behind the L* learner.
///
/// Rows are indexed by prefixes, split into the upper part `S` (the access
/// sequences, prefix-closed, starting at `ε`) and the lower part `SA` (the
/// frontier of one-letter extensions of `S`). Columns are indexed by the
/// suffix-closed experiment set `E`, which starts out as the single-letter
/// words of the alphabet; the empty suffix is never an experiment since its
/// zero-length output cannot tell states apart.
///
/// The cell at `(u, e)` holds the last `|e|` letters of the teacher's answer
/// on `u · e`. A row is the tuple of cells in `E` order; two prefixes are
/// behaviorally indistinguishable, as far as the table knows, exactly if
/// their rows are equal. Rows are compared as vectors of output words, never
/// through rendered strings.
pub struct ObservationTable {
    alphabet: Alphabet,
    suffixes: Vec<Word>,
    upper: Vec<Word>,
    lower: Vec<Word>,
    rows: math::Map<Word, Vec<Word>>,
}

impl ObservationTable {
    /// Creates the table for the given alphabet. No queries are issued until
    /// [`initialize`](Self::initialize).
    pub fn new(alphabet: Alphabet) -> Self {
        debug_assert!(!alphabet.is_empty(), "alphabet cannot be empty");
        let suffixes = alphabet.iter().cloned().map(Word::letter).collect();
        Self {
            alphabet,
            suffixes,
            upper: vec![Word::epsilon()],
            lower: Vec::new(),
            rows: math::Map::default(),
        }
    }

    /// Populates the frontier of `ε` and fills all cells with membership
    /// queries.
    pub fn initialize<T: Teacher>(
        &mut self,
        knowledge: &mut KnowledgeBase<T>,
    ) -> Result<(), LearnError> {
        debug_assert!(self.rows.is_empty(), "table is already initialized");
        for extension in self.one_letter_extensions(&Word::epsilon()) {
            if !self.upper.contains(&extension) && !self.lower.contains(&extension) {
                self.lower.push(extension);
            }
        }
        self.fill(knowledge)?;
        debug!("initialized observation table\n{self:?}");
        Ok(())
    }

    /// The upper part `S`, in insertion order.
    pub fn upper(&self) -> &[Word] {
        &self.upper
    }

    /// The frontier `SA`, in insertion order.
    pub fn lower(&self) -> &[Word] {
        &self.lower
    }

    /// The experiments `E`, in insertion order.
    pub fn suffixes(&self) -> &[Word] {
        &self.suffixes
    }

    /// The cell at `(word, suffix)`, if both are present.
    pub fn cell(&self, word: &Word, suffix: &Word) -> Option<&Word> {
        let column = self.suffixes.iter().position(|e| e == suffix)?;
        self.rows.get(word)?.get(column)
    }

    fn one_letter_extensions(&self, word: &Word) -> Vec<Word> {
        self.alphabet
            .iter()
            .map(|a| word.extended(a.clone()))
            .collect()
    }

    /// Issues membership queries for every missing cell.
    fn fill<T: Teacher>(&mut self, knowledge: &mut KnowledgeBase<T>) -> Result<(), LearnError> {
        let words: Vec<Word> = self.upper.iter().chain(self.lower.iter()).cloned().collect();
        for word in words {
            let present = self.rows.get(&word).map(Vec::len).unwrap_or(0);
            for column in present..self.suffixes.len() {
                let suffix = self.suffixes[column].clone();
                let response = knowledge.resolve(&word.concat(&suffix))?;
                let cell = response.suffix(suffix.len());
                debug_assert_eq!(cell.len(), suffix.len());
                self.rows.entry(word.clone()).or_default().push(cell);
            }
            debug_assert_eq!(self.rows[&word].len(), self.suffixes.len());
        }
        Ok(())
    }

    fn row(&self, word: &Word) -> &[Word] {
        self.rows
            .get(word)
            .map(Vec::as_slice)
            .expect("every row must be filled before it is inspected")
    }

    /// Returns a frontier word whose row matches no upper row, or `None` if
    /// the table is closed.
    pub fn closedness_witness(&self) -> Option<Word> {
        let known: math::Set<&[Word]> = self.upper.iter().map(|s| self.row(s)).collect();
        self.lower
            .iter()
            .find(|t| !known.contains(self.row(t)))
            .cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.closedness_witness().is_none()
    }

    /// Moves the witness from the frontier into the upper part, extends the
    /// frontier with its one-letter extensions and fills the new cells.
    pub fn close<T: Teacher>(
        &mut self,
        witness: &Word,
        knowledge: &mut KnowledgeBase<T>,
    ) -> Result<(), LearnError> {
        let Some(position) = self.lower.iter().position(|w| w == witness) else {
            return Err(LearnError::InvariantViolation(format!(
                "close witness {witness} is not a frontier word"
            )));
        };
        trace!("promoting frontier word {witness}");
        let word = self.lower.remove(position);
        self.promote(word);
        self.fill(knowledge)
    }

    fn promote(&mut self, word: Word) {
        for extension in self.one_letter_extensions(&word) {
            if !self.upper.contains(&extension) && !self.lower.contains(&extension) {
                self.lower.push(extension);
            }
        }
        self.upper.push(word);
    }

    /// Returns the first pair of equal upper rows that a one-letter extension
    /// tells apart, or `None` if the table is consistent.
    pub fn consistency_witness(&self) -> Option<Inconsistency> {
        for (position, left) in self.upper.iter().enumerate() {
            for right in self.upper.iter().skip(position + 1) {
                if self.row(left) != self.row(right) {
                    continue;
                }
                for a in self.alphabet.iter() {
                    let left_row = self.row(&left.extended(a.clone()));
                    let right_row = self.row(&right.extended(a.clone()));
                    if left_row == right_row {
                        continue;
                    }
                    for (column, suffix) in self.suffixes.iter().enumerate() {
                        if left_row[column] != right_row[column] {
                            return Some(Inconsistency {
                                left: left.clone(),
                                right: right.clone(),
                                letter: a.clone(),
                                suffix: suffix.clone(),
                            });
                        }
                    }
                }
            }
        }
        None
    }

    pub fn is_consistent(&self) -> bool {
        self.consistency_witness().is_none()
    }

    /// Repairs the inconsistency by adding the experiment `letter · suffix`,
    /// a suffix-closed extension of `E`, and fills the new column.
    pub fn make_consistent<T: Teacher>(
        &mut self,
        witness: &Inconsistency,
        knowledge: &mut KnowledgeBase<T>,
    ) -> Result<(), LearnError> {
        let column = Word::letter(witness.letter.clone()).concat(&witness.suffix);
        if self.suffixes.contains(&column) {
            return Err(LearnError::InvariantViolation(format!(
                "experiment {column} is already present"
            )));
        }
        debug!("extending experiments with {column}");
        self.suffixes.push(column);
        self.fill(knowledge)
    }

    /// Integrates a counterexample the Angluin way: every prefix of `word`
    /// becomes an access sequence, moving out of the frontier where needed,
    /// and the frontier is rebuilt around the grown upper part.
    pub fn integrate_counterexample<T: Teacher>(
        &mut self,
        word: &Word,
        knowledge: &mut KnowledgeBase<T>,
    ) -> Result<(), LearnError> {
        if word.is_empty() {
            return Err(LearnError::InvariantViolation(
                "counterexample cannot be empty".to_string(),
            ));
        }
        for prefix in word.prefixes() {
            if self.upper.contains(&prefix) {
                continue;
            }
            if let Some(position) = self.lower.iter().position(|w| *w == prefix) {
                self.lower.remove(position);
            }
            self.promote(prefix);
        }
        self.fill(knowledge)
    }

    /// Derives the hypothesis machine from a closed and consistent table.
    ///
    /// One state per distinct upper row; the representative of a row is its
    /// shortest access sequence, earliest first on equal length, so the class
    /// of `ε` becomes state 0 and the initial state. The transition of a
    /// state on `a` targets the class of `row(rep · a)`, which closedness
    /// guarantees to exist, and emits the single letter observed under the
    /// experiment `a`. Distinct states have distinguishable rows, so the
    /// machine is minimal.
    pub fn hypothesis(&self) -> Result<MealyMachine, LearnError> {
        if let Some(witness) = self.closedness_witness() {
            return Err(LearnError::InvariantViolation(format!(
                "cannot build a hypothesis from a non-closed table, row of {witness} has no representative"
            )));
        }
        if let Some(witness) = self.consistency_witness() {
            return Err(LearnError::InvariantViolation(format!(
                "cannot build a hypothesis from an inconsistent table, {} and {} disagree after {}",
                witness.left, witness.right, witness.letter
            )));
        }

        let mut machine = MealyMachine::new(self.alphabet.clone());
        let mut class_of: math::Map<&[Word], StateId> = math::Map::default();
        let mut representatives: Vec<&Word> = Vec::new();

        let mut ordered: Vec<&Word> = self.upper.iter().collect();
        ordered.sort_by_key(|word| word.len());
        for word in ordered {
            let row = self.row(word);
            if !class_of.contains_key(row) {
                let state = machine.add_state(word.to_string());
                class_of.insert(row, state);
                representatives.push(word);
            }
        }

        for (index, representative) in representatives.iter().enumerate() {
            for a in self.alphabet.iter() {
                let target_row = self.row(&representative.extended(a.clone()));
                let target = *class_of
                    .get(target_row)
                    .expect("closedness puts every successor row in some class");
                let column = self
                    .suffixes
                    .iter()
                    .position(|e| e.len() == 1 && e.first() == Some(a))
                    .expect("single-letter experiments are present from initialization on");
                let output = self.row(representative)[column]
                    .last()
                    .expect("cells of single-letter experiments hold exactly one letter")
                    .clone();
                machine.add_transition(StateId(index as u32), a.clone(), output, target);
            }
        }

        debug!("built hypothesis with {} states", machine.size());
        Ok(machine)
    }
}

impl fmt::Debug for ObservationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = tabled::builder::Builder::default();
        let mut header = vec![String::new()];
        header.extend(self.suffixes.iter().map(Word::to_string));
        builder.push_record(header);
        for word in self.upper.iter().chain(self.lower.iter()) {
            let mut record = vec![if self.upper.contains(word) {
                word.to_string().blue().to_string()
            } else {
                word.to_string()
            }];
            record.extend(
                self.rows
                    .get(word)
                    .into_iter()
                    .flatten()
                    .map(Word::to_string),
            );
            builder.push_record(record);
        }
        write!(f, "{}", builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mealy::MealyMachine;
    use crate::teacher::MealyTeacher;

    /// Two states, both answering `a` with 1; only `b` tells them apart.
    fn two_state_target() -> KnowledgeBase<MealyTeacher> {
        let mut machine = MealyMachine::new(Alphabet::new(['a', 'b']));
        let s0 = machine.add_state("s0");
        let s1 = machine.add_state("s1");
        machine.add_transition(s0, Letter::from('a'), Letter::int(1), s0);
        machine.add_transition(s0, Letter::from('b'), Letter::int(2), s1);
        machine.add_transition(s1, Letter::from('a'), Letter::int(1), s1);
        machine.add_transition(s1, Letter::from('b'), Letter::int(3), s0);
        KnowledgeBase::new(MealyTeacher::new(machine))
    }

    /// Emits 0 on the first three presses of `t` and 1 on the fourth.
    fn four_state_counter() -> KnowledgeBase<MealyTeacher> {
        let mut machine = MealyMachine::new(Alphabet::new(['t']));
        let states: Vec<_> = (0..4).map(|i| machine.add_state(format!("q{i}"))).collect();
        for i in 0..4 {
            let output = if i == 3 { 1 } else { 0 };
            machine.add_transition(
                states[i],
                Letter::from('t'),
                Letter::int(output),
                states[(i + 1) % 4],
            );
        }
        KnowledgeBase::new(MealyTeacher::new(machine))
    }

    fn stabilize(
        table: &mut ObservationTable,
        knowledge: &mut KnowledgeBase<MealyTeacher>,
    ) {
        loop {
            while let Some(witness) = table.closedness_witness() {
                table.close(&witness, knowledge).unwrap();
            }
            match table.consistency_witness() {
                Some(witness) => table.make_consistent(&witness, knowledge).unwrap(),
                None => break,
            }
        }
    }

    #[test]
    fn initialization_fills_every_cell() {
        let mut knowledge = two_state_target();
        let mut table = ObservationTable::new(Alphabet::new(['a', 'b']));
        table.initialize(&mut knowledge).unwrap();

        assert_eq!(table.upper(), [Word::epsilon()]);
        assert_eq!(table.lower(), [Word::letter('a'), Word::letter('b')]);
        for word in table.upper().iter().chain(table.lower()) {
            for suffix in [Word::letter('a'), Word::letter('b')] {
                let cell = table.cell(word, &suffix).unwrap();
                assert_eq!(cell.len(), suffix.len());
            }
        }
        assert_eq!(
            table.cell(&Word::epsilon(), &Word::letter('b')).unwrap(),
            &Word::letter(2)
        );
    }

    #[test]
    fn closing_promotes_the_distinguished_frontier_word() {
        let mut knowledge = two_state_target();
        let mut table = ObservationTable::new(Alphabet::new(['a', 'b']));
        table.initialize(&mut knowledge).unwrap();

        // row(a) matches row(ε), row(b) answers 3 under the experiment b
        let witness = table.closedness_witness().unwrap();
        assert_eq!(witness, Word::letter('b'));
        table.close(&witness, &mut knowledge).unwrap();

        assert!(table.is_closed());
        assert_eq!(table.upper(), [Word::epsilon(), Word::letter('b')]);
        assert_eq!(
            table.lower(),
            [
                Word::letter('a'),
                Word::from_letters(['b', 'a']),
                Word::from_letters(['b', 'b'])
            ]
        );

        let hypothesis = table.hypothesis().unwrap();
        assert_eq!(hypothesis.size(), 2);
        assert_eq!(
            hypothesis.run(&Word::from_letters(['b', 'b'])).unwrap(),
            Word::from_letters([2, 3])
        );
    }

    #[test]
    fn hypothesis_requires_a_closed_table() {
        let mut knowledge = two_state_target();
        let mut table = ObservationTable::new(Alphabet::new(['a', 'b']));
        table.initialize(&mut knowledge).unwrap();
        assert!(matches!(
            table.hypothesis(),
            Err(LearnError::InvariantViolation(_))
        ));
    }

    #[test]
    fn counterexample_prefixes_become_access_sequences() {
        let mut knowledge = four_state_counter();
        let mut table = ObservationTable::new(Alphabet::new(['t']));
        table.initialize(&mut knowledge).unwrap();

        // a single press looks the same from everywhere, one state suffices
        stabilize(&mut table, &mut knowledge);
        assert_eq!(table.hypothesis().unwrap().size(), 1);

        let counterexample = Word::from_letters(['t', 't', 't', 't']);
        table
            .integrate_counterexample(&counterexample, &mut knowledge)
            .unwrap();
        for prefix in counterexample.prefixes() {
            assert!(table.upper().contains(&prefix));
        }

        let witness = table.consistency_witness().unwrap();
        assert_eq!(witness.left, Word::epsilon());
        assert_eq!(witness.right, Word::from_letters(['t', 't']));
        assert_eq!(witness.letter, Letter::from('t'));
        assert_eq!(witness.suffix, Word::letter('t'));

        stabilize(&mut table, &mut knowledge);
        assert_eq!(table.hypothesis().unwrap().size(), 4);
    }

    #[test]
    fn hypothesis_reproduces_every_row() {
        let mut knowledge = four_state_counter();
        let mut table = ObservationTable::new(Alphabet::new(['t']));
        table.initialize(&mut knowledge).unwrap();
        table
            .integrate_counterexample(&Word::from_letters(['t', 't', 't', 't']), &mut knowledge)
            .unwrap();
        stabilize(&mut table, &mut knowledge);

        let hypothesis = table.hypothesis().unwrap();
        for word in table.upper() {
            for suffix in table.suffixes() {
                let outputs = hypothesis.run(&word.concat(suffix)).unwrap();
                assert_eq!(
                    &outputs.suffix(suffix.len()),
                    table.cell(word, suffix).unwrap()
                );
            }
        }
    }

    #[test]
    fn empty_counterexamples_are_rejected() {
        let mut knowledge = four_state_counter();
        let mut table = ObservationTable::new(Alphabet::new(['t']));
        table.initialize(&mut knowledge).unwrap();
        assert!(matches!(
            table.integrate_counterexample(&Word::epsilon(), &mut knowledge),
            Err(LearnError::InvariantViolation(_))
        ));
    }

    #[test]
    fn suffix_set_stays_suffix_closed() {
        let mut knowledge = four_state_counter();
        let mut table = ObservationTable::new(Alphabet::new(['t']));
        table.initialize(&mut knowledge).unwrap();
        table
            .integrate_counterexample(&Word::from_letters(['t', 't', 't', 't']), &mut knowledge)
            .unwrap();
        stabilize(&mut table, &mut knowledge);

        for suffix in table.suffixes() {
            for shorter in 1..suffix.len() {
                assert!(table.suffixes().contains(&suffix.suffix(shorter)));
            }
        }
    }
}
