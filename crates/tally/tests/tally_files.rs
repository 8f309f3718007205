use std::{collections::HashMap, io::Write, path::PathBuf};

use concur_tally::{TallyError, TallyMode, TallyOrchestrator, WordCounter};
use tokio::sync::broadcast;
use tracing_test::traced_test;

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("should create temp dir"),
        }
    }

    fn file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("should create file");
        file.write_all(content.as_bytes()).expect("should write file");
        path
    }

    fn raw_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("should write file");
        path
    }

    fn missing(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn signal() -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
    broadcast::channel::<()>(1)
}

#[tokio::test]
async fn reports_only_words_seen_more_than_once() {
    let fixture = Fixture::new();
    let a = fixture.file("a.txt", "the quick fox the");
    let b = fixture.file("b.txt", "THE dog");

    let (_cancel, cancel_signal) = signal();
    let report = TallyOrchestrator::new([a, b])
        .run(cancel_signal)
        .await
        .expect("tally should succeed");

    assert_eq!(report.repeated(), vec![(String::from("the"), 3)]);
    assert_eq!(report.to_string(), "the - 3\n");
    assert_eq!(report.count("quick"), Some(1));
    assert_eq!(report.count("dog"), Some(1));
    assert_eq!(report.total_words(), 6);
    assert!(!report.is_partial());
    assert_eq!(report.tallied.len(), 2);
}

#[tokio::test]
async fn strict_mode_fails_on_missing_file_without_report() {
    let fixture = Fixture::new();
    let good = fixture.file("good.txt", "a a b");
    let missing = fixture.missing("nope.txt");

    let (_cancel, cancel_signal) = signal();
    let result = TallyOrchestrator::new([good, missing.clone()])
        .run(cancel_signal)
        .await;

    match result {
        Err(err @ TallyError::Open { .. }) => {
            assert_eq!(err.path(), Some(missing.as_path()));
        }
        other => panic!("expected open failure, got {other:?}"),
    }
}

#[tokio::test]
async fn non_utf8_text_is_tallied_in_strict_mode() {
    let fixture = Fixture::new();
    let latin1 = fixture.raw_file("latin1.txt", b"caf\xe9 caf\xe9 ok ok");

    let (_cancel, cancel_signal) = signal();
    let report = TallyOrchestrator::new([latin1])
        .run(cancel_signal)
        .await
        .expect("undecodable bytes do not fail the tally");

    assert_eq!(report.to_string(), "caf\u{fffd} - 2\nok - 2\n");
    assert!(!report.is_partial());
}

#[tokio::test]
#[traced_test]
async fn lenient_mode_reports_partial_tally_with_failures() {
    let fixture = Fixture::new();
    let good = fixture.file("good.txt", "a a b");
    let missing = fixture.missing("nope.txt");

    let (_cancel, cancel_signal) = signal();
    let report = TallyOrchestrator::new([good, missing])
        .with_mode(TallyMode::Lenient)
        .run(cancel_signal)
        .await
        .expect("lenient tally keeps going");

    assert!(report.is_partial());
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0], TallyError::Open { .. }));
    assert_eq!(report.repeated(), vec![(String::from("a"), 2)]);
    assert!(logs_contain("tally failed"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_tally_matches_sequential_tally() {
    let fixture = Fixture::new();
    let vocabulary = ["alpha", "Beta", "gamma", "DELTA", "alpha", "beta"];
    let paths: Vec<PathBuf> = (0..8)
        .map(|n| {
            let content: Vec<&str> = vocabulary
                .iter()
                .cycle()
                .skip(n)
                .take(50 + n * 7)
                .copied()
                .collect();
            fixture.file(&format!("f{n}.txt"), &content.join(" "))
        })
        .collect();

    let (_cancel, cancel_signal) = signal();
    let concurrent = TallyOrchestrator::new(paths.clone())
        .run(cancel_signal)
        .await
        .expect("concurrent tally");

    // one file at a time, in reverse order
    let mut sequential: HashMap<String, u64> = HashMap::new();
    for path in paths.iter().rev() {
        let (_cancel, cancel_signal) = signal();
        let single = TallyOrchestrator::new([path.clone()])
            .run(cancel_signal)
            .await
            .expect("single tally");
        for (word, count) in single.counts() {
            *sequential.entry(word.clone()).or_insert(0) += count;
        }
    }

    assert_eq!(concurrent.counts(), &sequential);
}

#[tokio::test]
async fn rerunning_on_unchanged_files_is_stable() {
    let fixture = Fixture::new();
    let a = fixture.file("a.txt", "one two two three three three");
    let b = fixture.file("b.txt", "Three two ONE");
    let orchestrator = TallyOrchestrator::new([a, b]);

    let (_cancel, first_signal) = signal();
    let first = orchestrator.run(first_signal).await.expect("first run");
    let (_cancel, second_signal) = signal();
    let second = orchestrator.run(second_signal).await.expect("second run");

    assert_eq!(first.counts(), second.counts());
    assert_eq!(
        first.repeated(),
        vec![
            (String::from("three"), 4),
            (String::from("two"), 3),
            (String::from("one"), 2),
        ]
    );
}

#[tokio::test]
async fn batched_and_per_word_counting_agree() {
    let fixture = Fixture::new();
    let a = fixture.file("a.txt", "x y z x\nY z z");
    let b = fixture.file("b.txt", "z Z x");

    let (_cancel, first_signal) = signal();
    let per_word = TallyOrchestrator::new([a.clone(), b.clone()])
        .run(first_signal)
        .await
        .expect("per-word run");
    let (_cancel, second_signal) = signal();
    let batched = TallyOrchestrator::new([a, b])
        .batched(true)
        .run(second_signal)
        .await
        .expect("batched run");

    assert_eq!(per_word.counts(), batched.counts());
}

#[tokio::test]
async fn min_count_raises_the_threshold() {
    let fixture = Fixture::new();
    let a = fixture.file("a.txt", "a a b b b c");

    let (_cancel, cancel_signal) = signal();
    let report = TallyOrchestrator::new([a])
        .with_min_count(3)
        .run(cancel_signal)
        .await
        .expect("tally");

    assert_eq!(report.repeated(), vec![(String::from("b"), 3)]);
}

#[tokio::test]
async fn cancel_before_start_returns_cancelled() {
    let fixture = Fixture::new();
    let a = fixture.file("a.txt", "words words");

    let (cancel, cancel_signal) = signal();
    cancel.send(()).expect("receiver is alive");

    let result = TallyOrchestrator::new([a]).run(cancel_signal).await;
    assert!(matches!(result, Err(TallyError::Cancelled)));
}

#[test]
#[ntest::timeout(10000)]
fn counter_totals_every_word_from_many_threads() {
    let counter = WordCounter::new();
    let words = ["the", "quick", "fox"];

    std::thread::scope(|scope| {
        for _ in 0..6 {
            scope.spawn(|| {
                for _ in 0..500 {
                    for word in words {
                        counter.add(word, 1);
                    }
                }
            });
        }
    });

    assert_eq!(counter.total(), 6 * 500 * 3);
    for word in words {
        assert_eq!(counter.get(word), Some(3000));
    }
}
