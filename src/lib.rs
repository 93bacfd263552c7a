//! Active inference of deterministic Mealy machines with Angluin's L*
//! algorithm.
//!
//! Given a finite input [`Alphabet`](alphabet::Alphabet) and a
//! [`Teacher`](teacher::Teacher) answering membership queries for some
//! reactive black box, [`LStar`] infers a minimal [`MealyMachine`](mealy::MealyMachine)
//! consistent with the target's observable behavior. Equivalence queries are
//! answered by a pluggable [`EquivalenceOracle`](oracle::EquivalenceOracle):
//! either the sound [`WMethod`](oracle::WMethod) conformance test, bounded by
//! the assumed target size, or a fast but guarantee-free
//! [`RandomWalk`](oracle::RandomWalk).
//!
//! # Example
//!
//! Learning a two-state flip-flop from a teacher that is itself a Mealy
//! machine:
//!
//! ```
//! use lstar::prelude::*;
//!
//! let mut target = MealyMachine::new(Alphabet::new(['t']));
//! let q0 = target.add_state("q0");
//! let q1 = target.add_state("q1");
//! target.add_transition(q0, Letter::from('t'), Letter::int(0), q1);
//! target.add_transition(q1, Letter::from('t'), Letter::int(1), q0);
//!
//! let alphabet = target.alphabet().clone();
//! let mut learner = LStar::new(alphabet, MealyTeacher::new(target), 2);
//! let learned = learner.learn().unwrap();
//! assert_eq!(learned.size(), 2);
//! ```

pub mod alphabet;
pub mod dot;
mod error;
pub mod knowledge;
mod lstar;
pub mod math;
pub mod mealy;
pub mod net;
pub mod observation;
pub mod oracle;
pub mod teacher;
pub mod word;

pub use error::LearnError;
pub use lstar::LStar;

pub mod prelude {
    pub use crate::alphabet::{Alphabet, Letter};
    pub use crate::dot::Dottable;
    pub use crate::knowledge::{KnowledgeBase, QueryStats};
    pub use crate::mealy::{MealyMachine, StateId, Transition};
    pub use crate::net::TcpTeacher;
    pub use crate::observation::{Inconsistency, ObservationTable};
    pub use crate::oracle::{Equivalence, EquivalenceOracle, RandomWalk, WMethod};
    pub use crate::teacher::{MealyTeacher, TargetSession, Teacher};
    pub use crate::word::Word;
    pub use crate::{LStar, LearnError};
}
