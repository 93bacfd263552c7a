use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, trace};

use crate::alphabet::Alphabet;
use crate::error::LearnError;
use crate::knowledge::KnowledgeBase;
use crate::mealy::MealyMachine;
use crate::observation::ObservationTable;
use crate::oracle::{Equivalence, EquivalenceOracle, WMethod};
use crate::teacher::Teacher;

/// An implementation of Angluin's L* algorithm for Mealy machines.
///
/// The learner grows an [`ObservationTable`] through membership queries until
/// it is closed and consistent, derives a hypothesis machine, submits it to
/// the equivalence oracle and integrates the counterexample, repeating until
/// the oracle agrees. With the [`WMethod`] oracle and a target of at most
/// `max_states` states, the returned machine is behaviorally equivalent to
/// the target and minimal.
pub struct LStar<T: Teacher, O: EquivalenceOracle = WMethod> {
    knowledge: KnowledgeBase<T>,
    table: ObservationTable,
    oracle: O,
    max_states: usize,
    cancelled: Arc<AtomicBool>,
}

impl<T: Teacher> LStar<T, WMethod> {
    /// Creates a learner with the sound default oracle, a [`WMethod`] bounded
    /// by `max_states`.
    pub fn new(alphabet: Alphabet, teacher: T, max_states: usize) -> Self {
        Self::with_oracle(alphabet, teacher, max_states, WMethod::new(max_states))
    }
}

impl<T: Teacher, O: EquivalenceOracle> LStar<T, O> {
    pub fn with_oracle(alphabet: Alphabet, teacher: T, max_states: usize, oracle: O) -> Self {
        assert!(!alphabet.is_empty(), "input alphabet cannot be empty");
        assert!(max_states > 0, "state bound must be positive");
        let knowledge = KnowledgeBase::new(teacher);
        let cancelled = knowledge.cancel_flag();
        Self {
            table: ObservationTable::new(alphabet),
            knowledge,
            oracle,
            max_states,
            cancelled,
        }
    }

    /// A handle for cooperative cancellation. It is checked at the top of
    /// every refinement round and before every membership query; once set,
    /// [`learn`](Self::learn) unwinds with [`LearnError::Cancelled`].
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn knowledge(&self) -> &KnowledgeBase<T> {
        &self.knowledge
    }

    /// Hands back the knowledge base, cache included, for reuse in a later
    /// session.
    pub fn into_knowledge(self) -> KnowledgeBase<T> {
        self.knowledge
    }

    /// Runs the learning session to the fixpoint and returns the inferred
    /// machine.
    pub fn learn(&mut self) -> Result<MealyMachine, LearnError> {
        let start = Instant::now();
        info!("starting an L* session bounded by {} states", self.max_states);
        self.table.initialize(&mut self.knowledge)?;

        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                return Err(LearnError::Cancelled);
            }
            self.stabilize()?;

            let hypothesis = self.table.hypothesis()?;
            if hypothesis.size() > self.max_states {
                return Err(LearnError::StateBoundExceeded {
                    states: hypothesis.size(),
                    bound: self.max_states,
                });
            }

            match self.oracle.check(&hypothesis, &mut self.knowledge)? {
                Equivalence::Equivalent => {
                    let duration = start.elapsed().as_millis();
                    info!(
                        "learning finished with {} states after {duration}ms, {:?}",
                        hypothesis.size(),
                        self.knowledge.stats()
                    );
                    return Ok(hypothesis);
                }
                Equivalence::Counterexample(word) => {
                    let expected = self.knowledge.resolve(&word)?;
                    let produced = hypothesis.run(&word)?;
                    if expected == produced {
                        return Err(LearnError::OracleMisbehavior(format!(
                            "{word} is not a counterexample, both machines emit {expected}"
                        )));
                    }
                    debug!("integrating counterexample {word}");
                    self.table
                        .integrate_counterexample(&word, &mut self.knowledge)?;
                }
            }
        }
    }

    /// Drives the table to a closed and consistent state. Closure is pursued
    /// to completion first; repairing an inconsistency adds an experiment
    /// that can re-open closure, so both are rechecked until neither finds a
    /// witness.
    fn stabilize(&mut self) -> Result<(), LearnError> {
        loop {
            while let Some(witness) = self.table.closedness_witness() {
                trace!("table is not closed, promoting {witness}");
                self.table.close(&witness, &mut self.knowledge)?;
            }
            match self.table.consistency_witness() {
                Some(witness) => {
                    trace!(
                        "table is not consistent, {} and {} disagree after {}",
                        witness.left,
                        witness.right,
                        witness.letter
                    );
                    self.table.make_consistent(&witness, &mut self.knowledge)?;
                }
                None => break,
            }
        }
        trace!("table is closed and consistent\n{:?}", self.table);
        Ok(())
    }
}
