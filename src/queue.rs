use crate::{
    QueueError,
    contention::{Contention, Retry},
    traits::{QueueConsumer, QueueFactory, QueueProducer},
};
use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use crossbeam_utils::CachePadded;
use std::{
    fmt,
    marker::PhantomData,
    sync::{Arc, atomic::Ordering},
};
use tracing::{debug, trace};

/// A link in the queue's singly linked list.
///
/// `item` is `None` only for the node created at construction. Once a node is
/// linked its `item` is never touched again through a shared reference; `next`
/// goes from null to non-null exactly once.
struct Node<T> {
    item: Option<T>,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn sentinel() -> Self {
        Self {
            item: None,
            next: Atomic::null(),
        }
    }

    fn new(item: T) -> Self {
        Self {
            item: Some(item),
            next: Atomic::null(),
        }
    }
}

/// Unbounded lock-free MPMC FIFO queue (Michael-Scott).
///
/// The queue is a singly linked list with two atomic roots:
///
/// - `head` points at a dummy node whose successor is the front element. The
///   first dummy is the sentinel allocated by [`new`]; afterwards every
///   dequeued node becomes the next dummy.
/// - `tail` points at the last node or one node behind it. It is only a hint
///   that lagging threads help move forward.
///
/// ```text
/// head                         tail
///  |                             |
///  v                             v
/// [dummy] -> [ a ] -> [ b ] -> [ c ] -> null
/// ```
///
/// Every mutation is a `compare_exchange` on `head`, `tail` or a node's
/// `next`; no operation takes a lock, parks or sleeps. Progress is lock-free:
/// a thread may retry any number of times, but each lost race means another
/// thread completed its step.
///
/// # Memory reclamation
///
/// Operations pin the calling thread with [`crossbeam_epoch`]. A node that
/// `head` moves past is handed to the epoch collector and freed only after all
/// threads that could have read a pointer to it have unpinned.
///
/// # Payload ownership
///
/// `peek` may read a payload at the same instant another thread dequeues it,
/// so a payload stays inside its node until the node itself is reclaimed.
/// [`dequeue`] and [`peek`] therefore hand out clones. Store `Arc<T>` (see
/// [`SharedQueue`]) when cloning the payload is expensive or impossible.
/// Owning iteration ([`IntoIterator`]) has exclusive access and moves values
/// out without cloning.
///
/// The stored copy of a dequeued payload is dropped together with its node,
/// at a later epoch and possibly on another thread, which can be after the
/// queue itself is gone. Payloads must therefore be `'static`, and resources
/// they hold are released once the epoch collector gets to them.
///
/// # Examples
///
/// ```
/// use msqueue::ConcurrentQueue;
///
/// let q = ConcurrentQueue::new();
/// assert_eq!(q.peek(), None);
///
/// q.enqueue(3);
/// q.enqueue(2);
/// assert_eq!(q.dequeue(), Some(3));
/// assert_eq!(q.peek(), Some(2));
/// assert_eq!(q.dequeue(), Some(2));
/// assert!(q.is_empty());
/// ```
///
/// [`new`]: ConcurrentQueue::new
/// [`dequeue`]: ConcurrentQueue::dequeue
/// [`peek`]: ConcurrentQueue::peek
/// [`SharedQueue`]: crate::shared::SharedQueue
pub struct ConcurrentQueue<T> {
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
    contention: Contention,
}

impl<T> ConcurrentQueue<T>
where
    T: Send + Sync + 'static,
{
    /// Create an empty queue with the default [`Contention`] policy.
    pub fn new() -> Self {
        Self::with_contention(Contention::default())
    }

    /// Create an empty queue with the given contention policy.
    pub fn with_contention(contention: Contention) -> Self {
        // SAFETY: the queue is not shared yet, nothing else can observe the
        // sentinel before it is published through `head` and `tail`.
        let sentinel = Owned::new(Node::sentinel()).into_shared(unsafe { epoch::unprotected() });

        debug!(?contention, "created concurrent queue");

        Self {
            head: CachePadded::new(Atomic::from(sentinel)),
            tail: CachePadded::new(Atomic::from(sentinel)),
            contention,
        }
    }

    /// Contention policy this queue was built with.
    pub const fn contention(&self) -> Contention {
        self.contention
    }

    /// Append `value` at the back of the queue.
    ///
    /// Always succeeds. The new node is linked by a CAS on the last node's
    /// `next`; the follow-up CAS that swings `tail` onto it is best effort.
    /// When it loses, whichever thread next finds `tail` lagging finishes the
    /// move.
    pub fn enqueue(&self, value: T) {
        let guard = &epoch::pin();
        let node = Owned::new(Node::new(value)).into_shared(guard);
        let mut retry = Retry::new("enqueue", self.contention);

        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            // SAFETY: `tail` is never null and the guard keeps it allocated.
            let tail_ref = unsafe { tail.deref() };
            let next = tail_ref.next.load(Ordering::Acquire, guard);

            if tail == self.tail.load(Ordering::Acquire, guard) {
                if next.is_null() {
                    if tail_ref
                        .next
                        .compare_exchange(
                            Shared::null(),
                            node,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                            guard,
                        )
                        .is_ok()
                    {
                        let _ = self.tail.compare_exchange(
                            tail,
                            node,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                            guard,
                        );
                        return;
                    }
                } else {
                    // Tail is stale: help the thread that linked `next`.
                    let _ = self.tail.compare_exchange(
                        tail,
                        next,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    );
                }
            }

            retry.wait();
        }
    }

    /// Check if the queue is empty.
    ///
    /// True iff one snapshot shows `head == tail` with no successor. Under
    /// concurrency this is a point-in-time observation only.
    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        let head = self.head.load(Ordering::Acquire, guard);
        let tail = self.tail.load(Ordering::Acquire, guard);
        // SAFETY: `head` is never null and the guard keeps it allocated.
        let next = unsafe { head.deref() }.next.load(Ordering::Acquire, guard);
        head == tail && next.is_null()
    }

    /// Run `f` on the front element without removing it.
    ///
    /// Unlike [`peek`](Self::peek) this does not need `T: Clone`. The element
    /// may be dequeued by another thread while `f` runs; it stays valid for the
    /// duration of the call.
    pub fn peek_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&T) -> R,
    {
        let guard = &epoch::pin();
        Self::front(guard, self.head.load(Ordering::Acquire, guard)).map(f)
    }

    /// Payload of the successor of `head`, if any.
    fn front<'g>(guard: &'g Guard, head: Shared<'g, Node<T>>) -> Option<&'g T> {
        // SAFETY: `head` is never null; it and its successor stay allocated
        // while `guard` is pinned.
        unsafe {
            let next = head.deref().next.load(Ordering::Acquire, guard);
            next.as_ref().and_then(|node| node.item.as_ref())
        }
    }

    /// Advance `head` past the front element if `accept` agrees, returning a
    /// reference to the removed payload.
    ///
    /// The payload is inspected before the CAS on `head`; when the CAS loses,
    /// everything read in that round is discarded and the loop starts over.
    fn pop_front<'g, F>(&self, guard: &'g Guard, mut accept: F) -> Result<&'g T, QueueError>
    where
        F: FnMut(&T) -> bool,
    {
        let mut retry = Retry::new("dequeue", self.contention);

        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            let tail = self.tail.load(Ordering::Acquire, guard);
            // SAFETY: `head` is never null and the guard keeps it allocated.
            let next = unsafe { head.deref() }.next.load(Ordering::Acquire, guard);

            if head == self.head.load(Ordering::Acquire, guard) {
                if head == tail {
                    if next.is_null() {
                        return Err(QueueError::Empty);
                    }
                    // Tail lags behind an already linked node.
                    let _ = self.tail.compare_exchange(
                        tail,
                        next,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    );
                } else {
                    // SAFETY: `next` was reached from the live `head` under
                    // `guard`.
                    let front = unsafe { next.as_ref() }.and_then(|node| node.item.as_ref());

                    if let Some(item) = front {
                        if !accept(item) {
                            return Err(QueueError::Rejected);
                        }

                        if self
                            .head
                            .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire, guard)
                            .is_ok()
                        {
                            // SAFETY: `head` is unreachable from both roots now
                            // (`tail` is ahead of it); threads still holding it
                            // are pinned and delay the destruction.
                            unsafe { guard.defer_destroy(head) };
                            return Ok(item);
                        }
                    }
                }
            }

            retry.wait();
        }
    }

    /// Remove and return the front element, or `None` if the queue is empty.
    ///
    /// Empty is a normal outcome, not an error. The returned value is a clone
    /// of the payload; the stored copy is dropped once the node is reclaimed.
    pub fn dequeue(&self) -> Option<T>
    where
        T: Clone,
    {
        let guard = &epoch::pin();
        self.pop_front(guard, |_| true).ok().cloned()
    }

    /// Dequeue the front element only if `predicate` accepts it.
    ///
    /// If the CAS on `head` loses to another consumer the predicate is asked
    /// again about the new front element.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Empty`] if the queue is empty
    /// - [`QueueError::Rejected`] if the predicate declined the front element
    pub fn dequeue_if<F>(&self, predicate: F) -> Result<T, QueueError>
    where
        T: Clone,
        F: FnMut(&T) -> bool,
    {
        let guard = &epoch::pin();
        self.pop_front(guard, predicate).cloned()
    }

    /// Return a clone of the front element without removing it.
    ///
    /// A snapshot: another thread may dequeue the same element right after.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.peek_with(T::clone)
    }

    /// Dequeue elements into `f` until the queue looks empty or `f` returns
    /// `true`.
    ///
    /// Returns how many elements were dequeued, including the one on which
    /// `f` asked to stop.
    pub fn drain_with<F>(&self, mut f: F) -> usize
    where
        T: Clone,
        F: FnMut(T) -> bool,
    {
        let mut count = 0;
        while let Some(value) = self.dequeue() {
            count += 1;
            if f(value) {
                break;
            }
        }
        count
    }
}

impl<T> Default for ConcurrentQueue<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ConcurrentQueue<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentQueue")
            .field("contention", &self.contention)
            .field("is_empty", &self.is_empty())
            .finish_non_exhaustive()
    }
}

impl<T> FromIterator<T> for ConcurrentQueue<T>
where
    T: Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = Self::new();
        queue.extend(iter);
        queue
    }
}

impl<T> Extend<T> for ConcurrentQueue<T>
where
    T: Send + Sync + 'static,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.enqueue(value);
        }
    }
}

impl<T> Drop for ConcurrentQueue<T> {
    fn drop(&mut self) {
        let mut pending = 0usize;

        // SAFETY: `&mut self` rules out concurrent access, and nodes already
        // handed to the collector are no longer reachable from `head`.
        unsafe {
            let guard = epoch::unprotected();
            let head = self.head.load(Ordering::Relaxed, guard);
            let mut node = head.deref().next.load(Ordering::Relaxed, guard);
            drop(head.into_owned());

            while let Some(current) = node.as_ref() {
                let next = current.next.load(Ordering::Relaxed, guard);
                drop(node.into_owned());
                pending += 1;
                node = next;
            }
        }

        // Hand this thread's deferred nodes to the global collector.
        epoch::pin().flush();

        if pending > 0 {
            trace!(pending, "dropped concurrent queue with pending elements");
        }
    }
}

/// Owning iterator over a [`ConcurrentQueue`], front to back.
///
/// Created by [`ConcurrentQueue::into_iter`]. Values are moved out of their
/// nodes without cloning.
pub struct IntoIter<T> {
    queue: ConcurrentQueue<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let queue = &mut self.queue;

        // SAFETY: the iterator owns the queue, so no other thread can hold a
        // pointer into the list and nodes can be freed on the spot.
        unsafe {
            let guard = epoch::unprotected();
            let head = queue.head.load(Ordering::Relaxed, guard);
            let mut next = head.deref().next.load(Ordering::Relaxed, guard);
            if next.is_null() {
                return None;
            }

            if queue.tail.load(Ordering::Relaxed, guard) == head {
                queue.tail.store(next, Ordering::Relaxed);
            }
            queue.head.store(next, Ordering::Relaxed);
            drop(head.into_owned());

            next.deref_mut().item.take()
        }
    }
}

impl<T> fmt::Debug for IntoIter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntoIter").finish_non_exhaustive()
    }
}

impl<T> IntoIterator for ConcurrentQueue<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter { queue: self }
    }
}

/// Builder for creating queues with different configurations.
///
/// # Examples
///
/// ```
/// use msqueue::{
///     Contention, queue,
///     traits::{QueueConsumer, QueueProducer},
/// };
///
/// let (producer, consumer) = queue::<u32>().contention(Contention::Backoff).channels();
///
/// producer.push(100);
/// assert_eq!(consumer.pop(), Some(100));
/// ```
#[derive(Debug, Clone)]
pub struct QueueBuilder<T>
where
    T: Send + Sync + 'static,
{
    contention: Contention,
    _phantom: PhantomData<T>,
}

impl<T> Default for QueueBuilder<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QueueBuilder<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new queue builder
    pub const fn new() -> Self {
        Self {
            contention: Contention::Spin,
            _phantom: PhantomData,
        }
    }

    /// Set what threads do between lost CAS races
    #[must_use]
    pub const fn contention(mut self, contention: Contention) -> Self {
        self.contention = contention;
        self
    }

    /// Build a shared queue
    pub fn build(self) -> Arc<ConcurrentQueue<T>> {
        Arc::new(self.build_queue())
    }

    pub(crate) fn build_queue(self) -> ConcurrentQueue<T> {
        ConcurrentQueue::with_contention(self.contention)
    }

    /// Create producer/consumer pair
    pub fn channels(self) -> (Producer<T>, Consumer<T>)
    where
        T: Clone,
    {
        let queue = self.build();
        (queue.producer(), queue.consumer())
    }
}

/// Convenience function for creating queues.
///
/// This is the primary entry point when the queue is shared through handles.
///
/// # Examples
///
/// ```
/// use msqueue::{queue, traits::QueueProducer};
///
/// let (producer, _consumer) = queue::<u64>().channels();
/// producer.push(42);
/// ```
pub const fn queue<T>() -> QueueBuilder<T>
where
    T: Send + Sync + 'static,
{
    QueueBuilder::new()
}

/// Convenient type alias for [`QueueProducerHandle`].
pub type Producer<T> = QueueProducerHandle<T>;

/// Convenient type alias for [`QueueConsumerHandle`].
pub type Consumer<T> = QueueConsumerHandle<T>;

/// Producer handle for a [`ConcurrentQueue`].
///
/// A lightweight, cloneable handle that allows pushing items to the queue.
/// Each clone shares the same underlying queue via `Arc`.
///
/// # Examples
///
/// ```
/// use msqueue::{queue, traits::QueueProducer};
/// use std::thread;
///
/// let (producer, _consumer) = queue::<u64>().channels();
///
/// let producer2 = producer.clone();
/// let handle = thread::spawn(move || producer2.push(42));
///
/// producer.push(100);
/// handle.join().unwrap();
/// ```
#[derive(Debug)]
pub struct QueueProducerHandle<T>
where
    T: Send + Sync + 'static,
{
    queue: Arc<ConcurrentQueue<T>>,
}

impl<T> Clone for QueueProducerHandle<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<T> QueueProducer<T> for QueueProducerHandle<T>
where
    T: Send + Sync + 'static,
{
    fn push(&self, value: T) {
        self.queue.enqueue(value);
    }
}

/// Consumer handle for a [`ConcurrentQueue`].
///
/// A lightweight, cloneable handle that allows popping items from the queue.
/// Provides conditional popping (`pop_if`), bulk consumption (`consume`), and
/// peeking without removal.
///
/// # Examples
///
/// ```
/// use msqueue::{
///     queue,
///     traits::{QueueConsumer, QueueProducer},
/// };
///
/// let (producer, consumer) = queue::<i32>().channels();
///
/// producer.push(2);
/// producer.push(1);
/// producer.push(3);
///
/// // Conditional pop - only pop even numbers
/// assert_eq!(consumer.pop_if(|&v| v % 2 == 0), Ok(2));
///
/// let mut sum = 0;
/// consumer.consume(|val| {
///     sum += val;
///     false // continue until empty
/// });
/// assert_eq!(sum, 4);
/// ```
#[derive(Debug)]
pub struct QueueConsumerHandle<T>
where
    T: Send + Sync + 'static,
{
    queue: Arc<ConcurrentQueue<T>>,
}

impl<T> Clone for QueueConsumerHandle<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<T> QueueConsumer<T> for QueueConsumerHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn pop(&self) -> Option<T> {
        self.queue.dequeue()
    }

    fn peek(&self) -> Option<T> {
        self.queue.peek()
    }

    fn pop_if<F>(&self, predicate: F) -> Result<T, QueueError>
    where
        F: FnMut(&T) -> bool,
    {
        self.queue.dequeue_if(predicate)
    }

    fn consume<F>(&self, consumer: F) -> usize
    where
        F: FnMut(T) -> bool,
    {
        self.queue.drain_with(consumer)
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T> QueueFactory<T> for Arc<ConcurrentQueue<T>>
where
    T: Clone + Send + Sync + 'static,
{
    type Producer = QueueProducerHandle<T>;
    type Consumer = QueueConsumerHandle<T>;

    fn producer(&self) -> Self::Producer {
        QueueProducerHandle {
            queue: self.clone(),
        }
    }

    fn consumer(&self) -> Self::Consumer {
        QueueConsumerHandle {
            queue: self.clone(),
        }
    }
}
