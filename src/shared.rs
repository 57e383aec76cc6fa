use crate::{
    QueueError,
    contention::Contention,
    queue::{ConcurrentQueue, QueueBuilder},
    traits::{QueueConsumer, QueueFactory, QueueProducer},
};
use std::{fmt, sync::Arc};

/// A lock-free MPMC queue of `Arc<T>`.
///
/// [`ConcurrentQueue`] hands out clones of its payloads. For payloads that
/// are large or not `Clone` at all, wrapping them in `Arc` makes every
/// dequeue and peek a reference-count bump instead. This type does the
/// wrapping for you:
/// - `push()` accepts either a `T` or an `Arc<T>`
/// - `pop()` and `peek()` return `Arc<T>`
///
/// # Examples
///
/// ```
/// use msqueue::shared::shared_queue;
/// use std::sync::Arc;
///
/// #[derive(Debug, PartialEq)]
/// struct Data {
///     id: u64,
///     payload: Vec<u8>,
/// }
///
/// let q = shared_queue::<Data>().build();
///
/// let data = Arc::new(Data {
///     id: 1,
///     payload: vec![1, 2, 3],
/// });
/// q.push(data.clone());
/// q.push(Data {
///     id: 2,
///     payload: vec![],
/// });
///
/// assert_eq!(q.pop(), Some(data));
/// assert_eq!(q.pop().map(|d| d.id), Some(2));
/// ```
pub struct SharedQueue<T>
where
    T: Send + Sync + 'static,
{
    queue: ConcurrentQueue<Arc<T>>,
}

impl<T> fmt::Debug for SharedQueue<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedQueue")
            .field("contention", &self.queue.contention())
            .field("is_empty", &self.is_empty())
            .finish()
    }
}

/// Builder for shared queues.
///
/// Wraps [`QueueBuilder`] so the configuration surface stays the same as for
/// plain queues.
#[derive(Debug, Clone)]
pub struct SharedQueueBuilder<T>
where
    T: Send + Sync + 'static,
{
    inner: QueueBuilder<Arc<T>>,
}

impl<T> Default for SharedQueueBuilder<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SharedQueueBuilder<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new shared queue builder
    pub const fn new() -> Self {
        Self {
            inner: QueueBuilder::new(),
        }
    }

    /// Set what threads do between lost CAS races
    #[must_use]
    pub const fn contention(mut self, contention: Contention) -> Self {
        self.inner = self.inner.contention(contention);
        self
    }

    /// Build a shared queue behind an `Arc`
    pub fn build(self) -> Arc<SharedQueue<T>> {
        Arc::new(SharedQueue {
            queue: self.inner.build_queue(),
        })
    }

    /// Create producer/consumer pair
    pub fn channels(self) -> (SharedProducer<T>, SharedConsumer<T>) {
        let queue = self.build();
        (queue.producer(), queue.consumer())
    }
}

/// Convenience function for creating shared queues.
///
/// # Examples
///
/// ```
/// use msqueue::{
///     shared::shared_queue,
///     traits::{QueueConsumer, QueueProducer},
/// };
/// use std::sync::Arc;
///
/// struct Task {
///     id: usize,
/// }
///
/// let (producer, consumer) = shared_queue::<Task>().channels();
///
/// producer.push(Arc::new(Task { id: 7 }));
/// assert_eq!(consumer.pop().map(|t| t.id), Some(7));
/// ```
pub const fn shared_queue<T>() -> SharedQueueBuilder<T>
where
    T: Send + Sync + 'static,
{
    SharedQueueBuilder::new()
}

impl<T> SharedQueue<T>
where
    T: Send + Sync + 'static,
{
    /// Create an empty shared queue with the default contention policy
    pub fn new() -> Self {
        Self {
            queue: ConcurrentQueue::new(),
        }
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Push a value, wrapping it in an `Arc` if needed
    pub fn push(&self, value: impl Into<Arc<T>>) {
        self.queue.enqueue(value.into());
    }

    /// Pop the front value
    pub fn pop(&self) -> Option<Arc<T>> {
        self.queue.dequeue()
    }

    /// Peek at the front value without removing it
    pub fn peek(&self) -> Option<Arc<T>> {
        self.queue.peek()
    }

    /// Pop the front value if `predicate` accepts it
    pub fn pop_if<F>(&self, mut predicate: F) -> Result<Arc<T>, QueueError>
    where
        F: FnMut(&T) -> bool,
    {
        self.queue.dequeue_if(|value| predicate(&**value))
    }
}

impl<T> Default for SharedQueue<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Convenient type alias for [`SharedProducerHandle`].
pub type SharedProducer<T> = SharedProducerHandle<T>;

/// Convenient type alias for [`SharedConsumerHandle`].
pub type SharedConsumer<T> = SharedConsumerHandle<T>;

/// Producer handle for the shared queue.
///
/// A lightweight, cloneable handle that allows pushing `Arc<T>` items to the
/// queue.
///
/// # Examples
///
/// ```
/// use msqueue::{shared::shared_queue, traits::QueueProducer};
/// use std::{sync::Arc, thread};
///
/// struct Event {
///     message: String,
/// }
///
/// let (producer, _consumer) = shared_queue::<Event>().channels();
///
/// let producer2 = producer.clone();
/// let handle = thread::spawn(move || {
///     producer2.push(Arc::new(Event {
///         message: "Hello".to_string(),
///     }));
/// });
///
/// handle.join().unwrap();
/// ```
#[derive(Debug)]
pub struct SharedProducerHandle<T>
where
    T: Send + Sync + 'static,
{
    queue: Arc<SharedQueue<T>>,
}

impl<T> Clone for SharedProducerHandle<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<T> QueueProducer<Arc<T>> for SharedProducerHandle<T>
where
    T: Send + Sync + 'static,
{
    fn push(&self, value: Arc<T>) {
        self.queue.push(value);
    }
}

/// Consumer handle for the shared queue.
///
/// Through [`QueueConsumer::pop_if`] the predicate receives `&Arc<T>`, while
/// [`SharedQueue::pop_if`] hands it `&T`. Field access and method calls
/// auto-deref through the `Arc`, so the same closure body works for both.
///
/// # Examples
///
/// ```
/// use msqueue::{
///     shared::shared_queue,
///     traits::{QueueConsumer, QueueProducer},
/// };
/// use std::sync::Arc;
///
/// struct Job {
///     urgent: bool,
/// }
///
/// let (producer, consumer) = shared_queue::<Job>().channels();
/// producer.push(Arc::new(Job { urgent: true }));
///
/// let job = consumer.pop_if(|job: &Arc<Job>| job.urgent);
/// assert!(job.is_ok_and(|job| job.urgent));
/// ```
#[derive(Debug)]
pub struct SharedConsumerHandle<T>
where
    T: Send + Sync + 'static,
{
    queue: Arc<SharedQueue<T>>,
}

impl<T> Clone for SharedConsumerHandle<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<T> QueueConsumer<Arc<T>> for SharedConsumerHandle<T>
where
    T: Send + Sync + 'static,
{
    fn pop(&self) -> Option<Arc<T>> {
        self.queue.pop()
    }

    fn peek(&self) -> Option<Arc<T>> {
        self.queue.peek()
    }

    fn pop_if<F>(&self, predicate: F) -> Result<Arc<T>, QueueError>
    where
        F: FnMut(&Arc<T>) -> bool,
    {
        self.queue.queue.dequeue_if(predicate)
    }

    fn consume<F>(&self, consumer: F) -> usize
    where
        F: FnMut(Arc<T>) -> bool,
    {
        self.queue.queue.drain_with(consumer)
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T> QueueFactory<Arc<T>> for Arc<SharedQueue<T>>
where
    T: Send + Sync + 'static,
{
    type Producer = SharedProducerHandle<T>;
    type Consumer = SharedConsumerHandle<T>;

    fn producer(&self) -> Self::Producer {
        SharedProducerHandle {
            queue: self.clone(),
        }
    }

    fn consumer(&self) -> Self::Consumer {
        SharedConsumerHandle {
            queue: self.clone(),
        }
    }
}
