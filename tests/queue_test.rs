use msqueue::{
    ConcurrentQueue, Contention, queue,
    traits::{QueueConsumer, QueueProducer},
};
use rstest::rstest;
use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

#[test]
fn add_then_peek() {
    let q = ConcurrentQueue::new();
    assert_eq!(q.peek(), None);
    q.enqueue(1);
    assert_eq!(q.peek(), Some(1));
    q.enqueue(7);
    assert_eq!(q.peek(), Some(1));
}

#[test]
fn add_remove() {
    let q = ConcurrentQueue::new();
    q.enqueue(3);
    q.enqueue(2);
    assert_eq!(q.dequeue(), Some(3));
    assert_eq!(q.peek(), Some(2));
    assert_eq!(q.dequeue(), Some(2));
    assert_eq!(q.peek(), None);
    assert!(q.is_empty());
}

#[test]
fn strings_round_trip_in_order() {
    let words = ["alpha", "beta", "gamma", "delta"];
    let q: ConcurrentQueue<String> = words.iter().map(ToString::to_string).collect();

    for word in words {
        assert_eq!(q.dequeue().as_deref(), Some(word));
    }
    assert_eq!(q.dequeue(), None);
}

/// Producers and consumers run at the same time; every value must come out
/// exactly once and per-producer order must hold.
#[rstest]
#[case::spin(Contention::Spin, 4, 4)]
#[case::backoff(Contention::Backoff, 4, 4)]
#[case::many_producers(Contention::Spin, 8, 2)]
#[case::many_consumers(Contention::Backoff, 2, 8)]
fn concurrent_no_loss_no_duplication(
    #[case] contention: Contention,
    #[case] producers: usize,
    #[case] consumers: usize,
) {
    const PER_PRODUCER: usize = 20_000;
    let total = producers * PER_PRODUCER;

    let (producer, consumer) = queue::<usize>().contention(contention).channels();
    let consumed = Arc::new(AtomicUsize::new(0));

    let producer_handles: Vec<_> = (0..producers)
        .map(|pid| {
            let producer = producer.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    producer.push(pid * PER_PRODUCER + i);
                }
            })
        })
        .collect();

    let consumer_handles: Vec<_> = (0..consumers)
        .map(|_| {
            let consumer = consumer.clone();
            let consumed = consumed.clone();
            thread::spawn(move || {
                let mut taken = Vec::new();
                while consumed.load(Ordering::SeqCst) < total {
                    match consumer.pop() {
                        Some(v) => {
                            taken.push(v);
                            consumed.fetch_add(1, Ordering::SeqCst);
                        },
                        None => thread::yield_now(),
                    }
                }
                taken
            })
        })
        .collect();

    for h in producer_handles {
        h.join().expect("producer join");
    }

    let mut seen = HashSet::with_capacity(total);
    for h in consumer_handles {
        let taken = h.join().expect("consumer join");
        // Each consumer sees every producer's values in increasing order.
        let mut last = vec![None; producers];
        for v in taken {
            assert!(seen.insert(v), "duplicate value observed: {v}");
            let pid = v / PER_PRODUCER;
            assert!(last[pid] < Some(v), "producer {pid} reordered at {v}");
            last[pid] = Some(v);
        }
    }

    assert_eq!(seen.len(), total);
    assert!(consumer.is_empty());
    assert_eq!(consumer.pop(), None);
}

#[test]
fn empty_check_matches_following_dequeue_when_quiescent() {
    let q = Arc::new(ConcurrentQueue::new());

    let workers: Vec<_> = (0..4)
        .map(|t| {
            let q = q.clone();
            thread::spawn(move || {
                for i in 0..5_000u32 {
                    q.enqueue(t * 10_000 + i);
                    if i % 3 == 0 {
                        q.dequeue();
                    }
                }
            })
        })
        .collect();
    for w in workers {
        w.join().expect("worker join");
    }

    // Quiescent now: `is_empty` must be exact.
    let mut remaining = 0;
    while !q.is_empty() {
        assert!(q.dequeue().is_some());
        remaining += 1;
    }
    assert_eq!(q.dequeue(), None);
    assert_eq!(remaining, 4 * (5_000 - 1_667));
}
