use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::alphabet::Letter;
use crate::error::LearnError;
use crate::math;
use crate::teacher::Teacher;
use crate::word::Word;

/// Counters describing the query traffic a [`KnowledgeBase`] has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Words resolved, including cache hits.
    pub resolved: usize,
    /// Words actually submitted to the teacher.
    pub submitted: usize,
    /// Words answered from the cache alone.
    pub cache_hits: usize,
    /// Letters contained in submitted words.
    pub letters_submitted: usize,
}

#[derive(Debug)]
struct Node {
    output: Letter,
    children: math::Map<Letter, Node>,
}

/// The memoizing proxy between the learner and the teacher.
///
/// Observed (input word, output word) pairs are stored in a prefix tree with
/// one node per (input letter, output letter) step. Resolving a word walks
/// the tree first and only submits to the teacher on a miss; the response is
/// merged back in. Because every stored word shares its path with all its
/// prefixes, a teacher that answers the same input differently across a
/// session is caught during the merge and aborts the session with
/// [`LearnError::OracleMisbehavior`].
///
/// The cache belongs to the knowledge base, not to a session: after a failed
/// run (say, [`LearnError::StateBoundExceeded`]) it can be reused with a
/// larger bound without touching the target again.
#[derive(Debug)]
pub struct KnowledgeBase<T: Teacher> {
    teacher: T,
    roots: math::Map<Letter, Node>,
    stats: QueryStats,
    cancelled: Arc<AtomicBool>,
}

impl<T: Teacher> KnowledgeBase<T> {
    pub fn new(teacher: T) -> Self {
        Self {
            teacher,
            roots: math::Map::default(),
            stats: QueryStats::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle for cooperative cancellation. Once set, the next resolution
    /// that would query the teacher fails with [`LearnError::Cancelled`].
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn stats(&self) -> QueryStats {
        self.stats
    }

    pub fn teacher(&self) -> &T {
        &self.teacher
    }

    /// Hands the wrapped teacher back to the caller.
    pub fn into_teacher(self) -> T {
        self.teacher
    }

    /// Answers a membership query, consulting the cache before the teacher.
    /// The empty word resolves to the empty word without any query.
    pub fn resolve(&mut self, word: &Word) -> Result<Word, LearnError> {
        self.stats.resolved += 1;
        if word.is_empty() {
            return Ok(Word::epsilon());
        }
        if let Some(cached) = self.lookup(word) {
            trace!("cache answers {word} with {cached}");
            self.stats.cache_hits += 1;
            return Ok(cached);
        }
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(LearnError::Cancelled);
        }

        let output = self.teacher.submit(word)?;
        if output.len() != word.len() {
            return Err(LearnError::OracleMisbehavior(format!(
                "teacher answered {word} ({} letters) with {output} ({} letters)",
                word.len(),
                output.len()
            )));
        }
        self.stats.submitted += 1;
        self.stats.letters_submitted += word.len();
        self.record(word, &output)?;
        Ok(output)
    }

    fn lookup(&self, word: &Word) -> Option<Word> {
        let mut outputs = Word::epsilon();
        let mut children = &self.roots;
        for letter in word.letters() {
            let node = children.get(letter)?;
            outputs.push(node.output.clone());
            children = &node.children;
        }
        Some(outputs)
    }

    fn record(&mut self, word: &Word, output: &Word) -> Result<(), LearnError> {
        let mut children = &mut self.roots;
        for (input, observed) in word.letters().zip(output.letters()) {
            let node = children.entry(input.clone()).or_insert_with(|| Node {
                output: observed.clone(),
                children: math::Map::default(),
            });
            if node.output != *observed {
                return Err(LearnError::OracleMisbehavior(format!(
                    "teacher emitted {observed} on a path where {} was recorded earlier (input {word})",
                    node.output
                )));
            }
            children = &mut node.children;
        }
        Ok(())
    }
}
