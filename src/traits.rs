use crate::QueueError;

/// Trait for queue producers that can push items into a queue.
///
/// Implemented by the producer handles of both [`ConcurrentQueue`] and
/// [`SharedQueue`], so generic code can feed either one.
///
/// [`ConcurrentQueue`]: crate::ConcurrentQueue
/// [`SharedQueue`]: crate::shared::SharedQueue
pub trait QueueProducer<T> {
    /// Append a value at the back of the queue.
    ///
    /// The queue is unbounded, so this always succeeds. It never blocks; under
    /// contention it retries its CAS until the value is linked.
    fn push(&self, value: T);
}

/// Trait for queue consumers that can take items from a queue.
///
/// Every method observes the queue without blocking. Results describing the
/// queue as a whole (`peek`, `is_empty`) are snapshots and may be stale by the
/// time the caller acts on them.
pub trait QueueConsumer<T> {
    /// Remove and return the front value, or `None` if the queue is empty.
    fn pop(&self) -> Option<T>;

    /// Return the front value without removing it.
    ///
    /// # Returns
    /// A clone of the front element, or `None` if the queue is empty
    fn peek(&self) -> Option<T>;

    /// Pop the front value if `predicate` accepts it.
    ///
    /// # Arguments
    /// * `predicate` - Function to test the front element
    ///
    /// # Returns
    /// The popped value, [`QueueError::Empty`] if there was nothing to test,
    /// or [`QueueError::Rejected`] if the predicate declined the front value
    fn pop_if<F>(&self, predicate: F) -> Result<T, QueueError>
    where
        F: FnMut(&T) -> bool;

    /// Pop values and hand them to `consumer` until the queue looks empty or
    /// the closure returns `true` to stop.
    ///
    /// # Returns
    /// Number of elements consumed
    fn consume<F>(&self, consumer: F) -> usize
    where
        F: FnMut(T) -> bool;

    /// Check if the queue appears empty.
    /// Note: In concurrent scenarios, this may race with other operations.
    fn is_empty(&self) -> bool;
}

/// Trait for queues that can create producers and consumers.
pub trait QueueFactory<T> {
    /// The type of producers this queue creates
    type Producer: QueueProducer<T>;

    /// The type of consumers this queue creates
    type Consumer: QueueConsumer<T>;

    /// Create both producer and consumer handles in one call.
    ///
    /// # Returns
    /// A tuple containing `(producer, consumer)` handles
    fn channel(&self) -> (Self::Producer, Self::Consumer) {
        (self.producer(), self.consumer())
    }

    /// Create a new producer handle for this queue.
    fn producer(&self) -> Self::Producer;

    /// Create a new consumer handle for this queue.
    fn consumer(&self) -> Self::Consumer;
}
