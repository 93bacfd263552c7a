use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::error::LearnError;
use crate::mealy::MealyMachine;
use crate::word::Word;

/// The membership side of a minimally adequate teacher.
///
/// A teacher answers membership queries for some deterministic reactive
/// target: submitting an input word yields the output word the target emits,
/// letter for letter. Within one learning session the same input word must
/// always produce the same output word; the [`KnowledgeBase`](crate::knowledge::KnowledgeBase)
/// aborts the session when it observes otherwise.
pub trait Teacher {
    /// Answers a membership query. The returned word must have the same
    /// length as `word`.
    fn submit(&mut self, word: &Word) -> Result<Word, LearnError>;

    /// Brings the target up. The learner never calls this; see
    /// [`TargetSession`].
    fn start(&mut self) -> Result<(), LearnError> {
        Ok(())
    }

    /// Tears the target down.
    fn stop(&mut self) {}
}

/// Scoped target lifecycle: [`Teacher::start`] on acquisition,
/// [`Teacher::stop`] on drop, on every exit path.
///
/// The learner core issues queries only; whoever owns the teacher decides
/// when the target runs. Dereferences to the wrapped teacher.
pub struct TargetSession<'a, T: Teacher> {
    teacher: &'a mut T,
}

impl<'a, T: Teacher> TargetSession<'a, T> {
    pub fn begin(teacher: &'a mut T) -> Result<Self, LearnError> {
        teacher.start()?;
        Ok(Self { teacher })
    }
}

impl<T: Teacher> Deref for TargetSession<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.teacher
    }
}

impl<T: Teacher> DerefMut for TargetSession<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.teacher
    }
}

impl<T: Teacher> Drop for TargetSession<'_, T> {
    fn drop(&mut self) {
        self.teacher.stop();
    }
}

/// A teacher backed by a [`MealyMachine`].
///
/// Answers every query by running the word on the machine. This is the
/// fixture behind most tests and the natural teacher for re-learning an
/// already inferred machine.
#[derive(Debug, Clone)]
pub struct MealyTeacher {
    machine: MealyMachine,
}

impl MealyTeacher {
    pub fn new(machine: MealyMachine) -> Self {
        Self { machine }
    }

    pub fn machine(&self) -> &MealyMachine {
        &self.machine
    }
}

impl Teacher for MealyTeacher {
    fn submit(&mut self, word: &Word) -> Result<Word, LearnError> {
        debug!("submitting {word} to the mealy target");
        self.machine.run(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::{Alphabet, Letter};

    struct Tracked {
        started: usize,
        stopped: usize,
    }

    impl Teacher for Tracked {
        fn submit(&mut self, word: &Word) -> Result<Word, LearnError> {
            Ok(word.clone())
        }

        fn start(&mut self) -> Result<(), LearnError> {
            self.started += 1;
            Ok(())
        }

        fn stop(&mut self) {
            self.stopped += 1;
        }
    }

    #[test]
    fn target_session_starts_and_stops() {
        let mut teacher = Tracked {
            started: 0,
            stopped: 0,
        };
        {
            let mut session = TargetSession::begin(&mut teacher).unwrap();
            let echoed = session.submit(&Word::letter('a')).unwrap();
            assert_eq!(echoed, Word::letter('a'));
        }
        assert_eq!(teacher.started, 1);
        assert_eq!(teacher.stopped, 1);
    }

    #[test]
    fn mealy_teacher_replays_its_machine() {
        let mut machine = MealyMachine::new(Alphabet::new(['t']));
        let q0 = machine.add_state("q0");
        let q1 = machine.add_state("q1");
        machine.add_transition(q0, Letter::from('t'), Letter::int(0), q1);
        machine.add_transition(q1, Letter::from('t'), Letter::int(1), q0);

        let mut teacher = MealyTeacher::new(machine);
        assert_eq!(
            teacher.submit(&Word::from_letters(['t', 't'])).unwrap(),
            Word::from_letters([0, 1])
        );
    }
}
