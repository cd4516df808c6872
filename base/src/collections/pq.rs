//! A keyed queue of due times, soonest first.
//!
//! [`keyed_priority_queue`] provides a max-heap; the scheduler wants
//! the entry with the *earliest* due time, and needs to be able to
//! withdraw an entry by key when a scheduled action is cancelled.
use std::cmp::Ordering;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;
use std::time::Duration;

use keyed_priority_queue::KeyedPriorityQueue;

/// A due time, ordered so that the soonest compares greatest.
#[derive(Debug, Eq, PartialEq)]
struct Soonest(Duration);

impl PartialOrd for Soonest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Soonest {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

pub struct DueQueue<K: Hash + Eq + Ord> {
    items: KeyedPriorityQueue<K, Soonest>,
}

impl<K> DueQueue<K>
where
    K: Hash + Eq + Ord,
{
    pub fn new() -> DueQueue<K> {
        DueQueue {
            items: KeyedPriorityQueue::new(),
        }
    }

    /// The soonest entry, without removing it.
    pub fn peek(&self) -> Option<(&K, Duration)> {
        self.items.peek().map(|(k, due)| (k, due.0))
    }

    /// Remove and return the soonest entry.
    pub fn pop(&mut self) -> Option<(K, Duration)> {
        self.items.pop().map(|(k, due)| (k, due.0))
    }

    /// Insert an entry; if the key was already queued, its previous
    /// due time is replaced and returned.
    pub fn insert(&mut self, key: K, due: Duration) -> Option<Duration> {
        self.items.push(key, Soonest(due)).map(|prev| prev.0)
    }

    /// Withdraw an entry by key.  Returns the due time it had, or
    /// `None` when the key was not queued (for example because the
    /// entry already fired).
    pub fn cancel(&mut self, key: &K) -> Option<Duration> {
        self.items.remove(key).map(|due| due.0)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K> Default for DueQueue<K>
where
    K: Hash + Eq + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Debug for DueQueue<K>
where
    K: Hash + Eq + Ord + Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DueQueue")
            .field("len", &self.items.len())
            .finish()
    }
}

#[test]
fn test_empty() {
    let mut q: DueQueue<usize> = DueQueue::default();
    assert!(q.is_empty());
    assert_eq!(0, q.len());
    assert_eq!(q.peek(), None);
    assert_eq!(q.pop(), None);
}

#[test]
fn test_soonest_first() {
    let mut q: DueQueue<usize> = DueQueue::new();
    assert_eq!(q.insert(1, Duration::from_micros(800)), None);
    assert_eq!(q.insert(0, Duration::from_micros(200)), None);
    assert_eq!(q.pop(), Some((0, Duration::from_micros(200))));
    assert_eq!(q.pop(), Some((1, Duration::from_micros(800))));
    assert!(q.is_empty());
}

#[test]
fn test_repeat_insert_replaces() {
    let mut q: DueQueue<usize> = DueQueue::new();
    assert_eq!(q.insert(0, Duration::from_micros(200)), None);
    assert_eq!(
        q.insert(0, Duration::from_micros(400)),
        Some(Duration::from_micros(200))
    );
    assert_eq!(q.pop(), Some((0, Duration::from_micros(400))));
    assert!(q.is_empty());
}

#[test]
fn test_cancel() {
    let mut q: DueQueue<usize> = DueQueue::new();
    assert_eq!(q.insert(7, Duration::from_millis(100)), None);
    assert_eq!(q.cancel(&7), Some(Duration::from_millis(100)));
    assert_eq!(q.cancel(&7), None);
    assert!(q.is_empty());
}
