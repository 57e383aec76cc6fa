//! Records small concurrent histories against the queue and searches each one
//! for a sequential witness that a plain `VecDeque` reproduces.

use msqueue::{ConcurrentQueue, Contention, queue};
use rstest::rstest;
use std::{
    collections::{HashSet, VecDeque},
    sync::{
        Arc, Barrier,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};
use tracing_subscriber::EnvFilter;

const THREADS: usize = 3;
const OPS_PER_THREAD: usize = 4;
const ROUNDS: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Enqueue(u32),
    Dequeue,
    Peek,
    IsEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ret {
    Unit,
    Value(Option<u32>),
    Flag(bool),
}

#[derive(Debug, Clone, Copy)]
struct Event {
    op: Op,
    ret: Ret,
    invoked: usize,
    returned: usize,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn apply(model: &mut VecDeque<u32>, op: Op) -> Ret {
    match op {
        Op::Enqueue(v) => {
            model.push_back(v);
            Ret::Unit
        },
        Op::Dequeue => Ret::Value(model.pop_front()),
        Op::Peek => Ret::Value(model.front().copied()),
        Op::IsEmpty => Ret::Flag(model.is_empty()),
    }
}

/// Wing-Gong style search with memoisation of dead ends.
struct Checker<'a> {
    history: &'a [Event],
    dead_ends: HashSet<(u64, Vec<u32>)>,
}

impl<'a> Checker<'a> {
    fn new(history: &'a [Event]) -> Self {
        assert!(history.len() < 64);
        Self {
            history,
            dead_ends: HashSet::new(),
        }
    }

    fn search(&mut self, done: u64, model: &VecDeque<u32>) -> bool {
        let n = self.history.len();
        if done.count_ones() as usize == n {
            return true;
        }

        let key = (done, model.iter().copied().collect::<Vec<_>>());
        if self.dead_ends.contains(&key) {
            return false;
        }

        // Only an operation invoked before every pending one returned may be
        // linearized next.
        let pending = || (0..n).filter(move |&i| done & (1u64 << i) == 0);
        let horizon = pending()
            .map(|i| self.history[i].returned)
            .min()
            .unwrap_or(usize::MAX);

        for i in pending() {
            let event = self.history[i];
            if event.invoked > horizon {
                continue;
            }
            let mut next = model.clone();
            if apply(&mut next, event.op) == event.ret && self.search(done | (1u64 << i), &next) {
                return true;
            }
        }

        self.dead_ends.insert(key);
        false
    }
}

fn record(queue: &ConcurrentQueue<u32>, clock: &AtomicUsize, script: &[Op]) -> Vec<Event> {
    script
        .iter()
        .map(|&op| {
            let invoked = clock.fetch_add(1, Ordering::SeqCst);
            let ret = match op {
                Op::Enqueue(v) => {
                    queue.enqueue(v);
                    Ret::Unit
                },
                Op::Dequeue => Ret::Value(queue.dequeue()),
                Op::Peek => Ret::Value(queue.peek()),
                Op::IsEmpty => Ret::Flag(queue.is_empty()),
            };
            let returned = clock.fetch_add(1, Ordering::SeqCst);
            Event {
                op,
                ret,
                invoked,
                returned,
            }
        })
        .collect()
}

/// Deterministic mix of operations; values are unique per thread and round.
fn script(round: usize, thread: usize) -> Vec<Op> {
    (0..OPS_PER_THREAD)
        .map(|i| match (round * 7 + thread * 3 + i * 5) % 6 {
            0 | 3 => Op::Enqueue(u32::try_from(thread * 100 + i).unwrap()),
            1 | 4 => Op::Dequeue,
            2 => Op::Peek,
            _ => Op::IsEmpty,
        })
        .collect()
}

fn run_round(round: usize, contention: Contention) {
    let q = queue::<u32>().contention(contention).build();
    let prefill: Vec<u32> = (0..u32::try_from(round % 3).unwrap()).map(|v| 1_000 + v).collect();
    for &v in &prefill {
        q.enqueue(v);
    }

    let clock = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let q = q.clone();
            let clock = clock.clone();
            let barrier = barrier.clone();
            let ops = script(round, t);
            thread::spawn(move || {
                barrier.wait();
                record(&q, &clock, &ops)
            })
        })
        .collect();

    let history: Vec<Event> = workers
        .into_iter()
        .flat_map(|w| w.join().expect("worker join"))
        .collect();

    let start: VecDeque<u32> = prefill.into_iter().collect();
    assert!(
        Checker::new(&history).search(0, &start),
        "round {round}: no sequential witness for history {history:#?}"
    );
}

#[rstest]
#[case::spin(Contention::Spin)]
#[case::backoff(Contention::Backoff)]
fn concurrent_histories_are_linearizable(#[case] contention: Contention) {
    init_tracing();
    for round in 0..ROUNDS {
        run_round(round, contention);
    }
}

#[test]
fn checker_rejects_out_of_order_dequeue() {
    // enqueue(1) completes before enqueue(2) starts, yet 2 is dequeued first.
    let history = [
        Event {
            op: Op::Enqueue(1),
            ret: Ret::Unit,
            invoked: 0,
            returned: 1,
        },
        Event {
            op: Op::Enqueue(2),
            ret: Ret::Unit,
            invoked: 2,
            returned: 3,
        },
        Event {
            op: Op::Dequeue,
            ret: Ret::Value(Some(2)),
            invoked: 4,
            returned: 5,
        },
    ];
    assert!(!Checker::new(&history).search(0, &VecDeque::new()));
}

#[test]
fn checker_accepts_overlapping_reorder() {
    // Overlapping enqueues may linearize in either order.
    let history = [
        Event {
            op: Op::Enqueue(1),
            ret: Ret::Unit,
            invoked: 0,
            returned: 3,
        },
        Event {
            op: Op::Enqueue(2),
            ret: Ret::Unit,
            invoked: 1,
            returned: 2,
        },
        Event {
            op: Op::Dequeue,
            ret: Ret::Value(Some(2)),
            invoked: 4,
            returned: 5,
        },
        Event {
            op: Op::Peek,
            ret: Ret::Value(Some(1)),
            invoked: 6,
            returned: 7,
        },
    ];
    assert!(Checker::new(&history).search(0, &VecDeque::new()));
}
