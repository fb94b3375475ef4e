use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyPoolError {
    #[error("No model API key configured")]
    EmptyKeyPool,
}

/// Round-robin pool of model API keys.
///
/// The pool is an explicit value: whoever owns it decides how it is shared.
/// The pipeline keeps it behind a mutex for the length of a run.
#[derive(Debug, Clone)]
pub struct KeyPool {
    keys: Vec<String>,
    cursor: usize,
}

impl KeyPool {
    /// Builds a pool from raw key strings. Blank entries are dropped and an
    /// empty result is an error.
    pub fn new<I, S>(keys: I) -> Result<Self, KeyPoolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<String> = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if keys.is_empty() {
            return Err(KeyPoolError::EmptyKeyPool);
        }

        Ok(Self { keys, cursor: 0 })
    }

    /// Returns the key under the cursor and advances the cursor.
    pub fn next_key(&mut self) -> &str {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.keys.len();
        &self.keys[index]
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}
