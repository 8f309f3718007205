use std::{collections::HashMap, path::PathBuf};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::{normalize, TallyError, TallyResult, WordCounter};

/// `FileTallyTask` counts the whitespace-separated words of one file into a
/// shared [`WordCounter`].
///
/// By default every word goes through [`WordCounter::add`]. A batched task
/// counts into a local map and merges it once at the end of the file, so a
/// file that fails midway contributes nothing.
///
/// Lines are decoded lossily: bytes that are not valid UTF-8 become U+FFFD and
/// the word they sit in is still counted.
#[derive(Debug, Clone)]
pub struct FileTallyTask {
    path: PathBuf,
    counter: WordCounter,
    batched: bool,
}

impl FileTallyTask {
    pub fn new(path: impl Into<PathBuf>, counter: WordCounter) -> Self {
        Self {
            path: path.into(),
            counter,
            batched: false,
        }
    }

    #[must_use]
    pub fn batched(mut self, batched: bool) -> Self {
        self.batched = batched;
        self
    }

    /// `run` reads the file to the end and returns how many words it counted.
    pub async fn run(self) -> TallyResult<u64> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|source| TallyError::Open {
                path: self.path.clone(),
                source,
            })?;

        let counted = if self.batched {
            let mut local: HashMap<String, u64> = HashMap::new();
            let counted = self
                .read_words(BufReader::new(file), |word| {
                    *local.entry(word).or_insert(0) += 1;
                })
                .await?;
            self.counter.merge(local);
            counted
        } else {
            self.read_words(BufReader::new(file), |word| self.counter.add(&word, 1))
                .await?
        };

        concur_logs::debug!("counted {} words in {}", counted, self.path.display());
        Ok(counted)
    }

    async fn read_words<R, F>(&self, reader: R, mut on_word: F) -> TallyResult<u64>
    where
        R: AsyncBufRead + Unpin,
        F: FnMut(String),
    {
        let mut lines = reader.split(b'\n');
        let mut counted = 0;

        while let Some(line) = lines.next_segment().await.map_err(|source| TallyError::Read {
            path: self.path.clone(),
            source,
        })? {
            for token in String::from_utf8_lossy(&line).split_whitespace() {
                on_word(normalize(token));
                counted += 1;
            }
        }

        Ok(counted)
    }
}
