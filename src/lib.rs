//! # msqueue: Lock-Free Unbounded MPMC Queue
//!
//! `msqueue` implements the Michael-Scott queue: a linked-list FIFO that any
//! number of threads can push to and pop from concurrently without locks.
//! Every mutation is a compare-and-swap; a thread that loses a race simply
//! retries, and threads that find the structure half-updated finish the update
//! for whoever started it.
//!
//! ## Features
//!
//! - **Lock-free algorithm**: no mutex, no parking, no sleeping
//! - **MPMC support**: any number of producers and consumers
//! - **Unbounded**: `enqueue` always succeeds
//! - **Linearizable FIFO**: operations appear to take effect atomically, in a
//!   single order all threads agree on
//! - **Safe reclamation**: removed nodes are freed through
//!   [`crossbeam_epoch`], never while another thread may still read them
//!
//! ## Quick start
//!
//! ```rust
//! use msqueue::ConcurrentQueue;
//!
//! let q = ConcurrentQueue::new();
//! assert_eq!(q.peek(), None);
//!
//! q.enqueue(1);
//! assert_eq!(q.peek(), Some(1));
//! q.enqueue(7);
//!
//! assert_eq!(q.dequeue(), Some(1));
//! assert_eq!(q.dequeue(), Some(7));
//! assert_eq!(q.dequeue(), None);
//! assert!(q.is_empty());
//! ```
//!
//! ## Producer and consumer handles
//!
//! The builder returned by [`queue`] configures the queue and hands out
//! cloneable handles that share it:
//!
//! ```rust
//! use msqueue::{
//!     Contention, queue,
//!     traits::{QueueConsumer, QueueProducer},
//! };
//! use std::thread;
//!
//! let (producer, consumer) = queue::<usize>().contention(Contention::Backoff).channels();
//!
//! let producer_handle = {
//!     let producer = producer.clone();
//!     thread::spawn(move || {
//!         for i in 0..100 {
//!             producer.push(i);
//!         }
//!     })
//! };
//! producer_handle.join().unwrap();
//!
//! let mut sum = 0;
//! let count = consumer.consume(|value| {
//!     sum += value;
//!     false
//! });
//! assert_eq!(count, 100);
//! assert_eq!(sum, 4950);
//! ```
//!
//! ## Payloads
//!
//! A payload stays inside its node until the node is reclaimed, because a
//! concurrent `peek` may be looking at it. `dequeue` and `peek` therefore
//! return clones. For payloads that are expensive to clone, or not `Clone`,
//! use [`shared::SharedQueue`], which stores `Arc<T>`:
//!
//! ```rust
//! use msqueue::shared::shared_queue;
//!
//! struct Job {
//!     name: String,
//! }
//!
//! let q = shared_queue::<Job>().build();
//! q.push(Job {
//!     name: "index".into(),
//! });
//! assert_eq!(q.pop().map(|job| job.name.clone()), Some("index".to_string()));
//! ```
//!
//! ## Consistency of observers
//!
//! `peek` and `is_empty` read a single snapshot. Under concurrency the answer
//! can be stale the moment it is returned; with a single thread it is exact.
//!
//! ## Error Handling
//!
//! An empty queue is reported as `None`, never as an error. [`QueueError`]
//! only appears in conditional dequeues, to tell an empty queue from a front
//! element the predicate declined.
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! msqueue requires Rust 1.88 or later.
#![deny(
    missing_docs,
    unused_imports,
    unused_variables,
    dead_code,
    unreachable_code,
    unused_must_use
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Contention policies applied between CAS retries.
///
/// See [`Contention`].
pub mod contention;

/// The Michael-Scott queue, its builder and producer/consumer handles.
///
/// This module provides [`ConcurrentQueue`] together with [`QueueBuilder`],
/// the handle types and the [`queue`] convenience function.
///
/// [`ConcurrentQueue`]: queue::ConcurrentQueue
/// [`QueueBuilder`]: queue::QueueBuilder
/// [`queue`]: queue::queue
pub mod queue;

/// Queue of `Arc<T>` for payloads that are costly or impossible to clone.
///
/// This module provides [`SharedQueue`], its builder and handles.
///
/// [`SharedQueue`]: shared::SharedQueue
pub mod shared;

/// Common traits for queue producers, consumers, and factories.
///
/// This module defines the abstractions shared by every queue flavour in the
/// crate: [`QueueProducer`], [`QueueConsumer`], and [`QueueFactory`].
///
/// [`QueueProducer`]: traits::QueueProducer
/// [`QueueConsumer`]: traits::QueueConsumer
/// [`QueueFactory`]: traits::QueueFactory
pub mod traits;

pub use contention::Contention;
pub use queue::{ConcurrentQueue, queue};

use thiserror::Error;

/// Errors returned by conditional queue operations.
///
/// Plain `dequeue`/`peek` report an empty queue as `None`; this enum exists
/// for operations that have more than one way of not returning a value.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue contained no elements when the operation looked.
    #[error("queue is empty")]
    Empty,

    /// The front element did not satisfy the caller's predicate and was left
    /// in place.
    #[error("front element rejected by predicate")]
    Rejected,
}
