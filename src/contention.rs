use crossbeam_utils::Backoff;
use std::hint;
use tracing::trace;

/// Number of failed CAS rounds after which an operation is reported as
/// contended when it finally completes.
const CONTENDED_RETRIES: usize = if cfg!(test) { 16 } else { 256 };

/// What a thread does between two CAS attempts that lost a race.
///
/// Neither policy changes the observable semantics of the queue: every
/// operation still retries until it succeeds and no thread ever parks. The
/// choice only trades latency under light load for throughput under heavy
/// contention.
///
/// # Examples
///
/// ```
/// use msqueue::{Contention, queue};
///
/// let q = queue::<u32>().contention(Contention::Backoff).build();
/// q.enqueue(1);
/// assert_eq!(q.dequeue(), Some(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Contention {
    /// Retry immediately after a CPU spin-loop hint.
    #[default]
    Spin,

    /// Exponential backoff between retries using
    /// [`crossbeam_utils::Backoff::spin`].
    ///
    /// The backoff never yields to the scheduler; it only burns a growing
    /// number of spin-loop hints, capped by the backoff itself.
    Backoff,
}

/// Per-operation retry state.
///
/// Created at the top of a CAS loop and consulted after every lost race.
pub(crate) struct Retry {
    op: &'static str,
    backoff: Option<Backoff>,
    attempts: usize,
}

impl Retry {
    pub(crate) fn new(op: &'static str, policy: Contention) -> Self {
        Self {
            op,
            backoff: match policy {
                Contention::Spin => None,
                Contention::Backoff => Some(Backoff::new()),
            },
            attempts: 0,
        }
    }

    /// Pause before the next attempt.
    #[inline]
    pub(crate) fn wait(&mut self) {
        self.attempts += 1;
        match &self.backoff {
            Some(backoff) => backoff.spin(),
            None => hint::spin_loop(),
        }
    }

    #[cfg(test)]
    pub(crate) const fn attempts(&self) -> usize {
        self.attempts
    }
}

impl Drop for Retry {
    fn drop(&mut self) {
        if self.attempts >= CONTENDED_RETRIES {
            trace!(
                op = self.op,
                attempts = self.attempts,
                backoff = self.backoff.is_some(),
                "queue operation completed after a contended CAS run"
            );
        }
    }
}
