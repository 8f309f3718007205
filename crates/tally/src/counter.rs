use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// `normalize` folds a token to the form it is counted under.
pub fn normalize(token: &str) -> String {
    token.to_lowercase()
}

/// `WordCounter` is the shared tally every file task writes into. Clones share
/// the same map; each operation holds the lock for exactly one
/// lookup-and-update and never across an `.await`.
#[derive(Clone, Default, Debug)]
pub struct WordCounter {
    counts: Arc<Mutex<HashMap<String, u64>>>,
}

impl WordCounter {
    pub fn new() -> Self {
        Self::default()
    }

    // No critical section can panic halfway through an update, so a poisoned
    // map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `add` bumps `word` by `delta`, inserting it when absent.
    pub fn add(&self, word: &str, delta: u64) {
        let mut counts = self.lock();
        if let Some(count) = counts.get_mut(word) {
            *count += delta;
        } else {
            counts.insert(word.to_owned(), delta);
        }
    }

    /// `merge` folds a task-local tally in under a single lock acquisition.
    pub fn merge(&self, local_counts: HashMap<String, u64>) {
        let mut counts = self.lock();
        for (word, delta) in local_counts {
            *counts.entry(word).or_insert(0) += delta;
        }
    }

    pub fn get(&self, word: &str) -> Option<u64> {
        self.lock().get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sum of every count, i.e. the number of words added so far.
    pub fn total(&self) -> u64 {
        self.lock().values().sum()
    }

    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.lock().clone()
    }

    /// Words counted at least `min_count` times, highest count first and
    /// alphabetical within a count.
    pub fn repeated(&self, min_count: u64) -> Vec<(String, u64)> {
        repeated_words(&self.lock(), min_count)
    }
}

pub(crate) fn repeated_words(counts: &HashMap<String, u64>, min_count: u64) -> Vec<(String, u64)> {
    let mut words: Vec<(String, u64)> = counts
        .iter()
        .filter(|(_, count)| **count >= min_count)
        .map(|(word, count)| (word.clone(), *count))
        .collect();
    words.sort_by(|(a_word, a_count), (b_word, b_count)| {
        b_count.cmp(a_count).then_with(|| a_word.cmp(b_word))
    });
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_inserts_then_accumulates() {
        let counter = WordCounter::new();
        counter.add("fox", 1);
        counter.add("fox", 2);
        counter.add("dog", 1);

        assert_eq!(counter.get("fox"), Some(3));
        assert_eq!(counter.get("dog"), Some(1));
        assert_eq!(counter.get("cat"), None);
        assert_eq!(counter.len(), 2);
        assert_eq!(counter.total(), 4);
    }

    #[test]
    fn clones_share_the_same_counts() {
        let counter = WordCounter::new();
        let other = counter.clone();

        other.add("the", 1);
        assert_eq!(counter.get("the"), Some(1));
    }

    #[test]
    fn merge_adds_every_local_entry() {
        let counter = WordCounter::new();
        counter.add("the", 1);

        counter.merge(HashMap::from([
            (String::from("the"), 2),
            (String::from("quick"), 1),
        ]));

        assert_eq!(counter.get("the"), Some(3));
        assert_eq!(counter.get("quick"), Some(1));
    }

    #[test]
    fn normalize_folds_case() {
        assert_eq!(normalize("THE"), "the");
        assert_eq!(normalize("Straße"), "straße");
        assert_eq!(normalize("ÉCOLE"), "école");
    }

    #[test]
    fn repeated_filters_and_orders() {
        let counter = WordCounter::new();
        for word in ["b", "b", "a", "a", "c", "c", "c", "d"] {
            counter.add(word, 1);
        }

        assert_eq!(
            counter.repeated(2),
            vec![
                (String::from("c"), 3),
                (String::from("a"), 2),
                (String::from("b"), 2),
            ]
        );
    }

    #[test]
    #[ntest::timeout(10000)]
    fn no_update_is_lost_across_threads() {
        let counter = WordCounter::new();

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.add("shared", 1);
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().expect("counting thread finished");
        }

        assert_eq!(counter.get("shared"), Some(8000));
        assert_eq!(counter.total(), 8000);
    }
}
