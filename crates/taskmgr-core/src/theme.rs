use super::error::StorageError;
use super::persistence::KeyValueStore;
use super::persistence::TaskStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Theme {
    dark_mode: bool,
}

impl Theme {
    pub fn new(dark_mode: bool) -> Self {
        Self { dark_mode }
    }

    /// Reads the persisted flag once. Missing, unreadable or unparseable
    /// values fall back to light mode.
    pub fn load<S: KeyValueStore>(storage: &mut TaskStorage<S>) -> Self {
        match storage.load_dark_mode() {
            Ok(value) => Self::new(value.unwrap_or(false)),
            Err(err) => {
                tracing::warn!(error = %err, "could not read theme; using light mode");
                Self::default()
            }
        }
    }

    pub fn dark_mode(self) -> bool {
        self.dark_mode
    }

    pub fn label(self) -> &'static str {
        if self.dark_mode {
            "dark"
        } else {
            "light"
        }
    }

    /// Flips the flag and writes it through. The in-memory flag flips even
    /// when the write fails.
    pub fn toggle<S: KeyValueStore>(
        &mut self,
        storage: &mut TaskStorage<S>,
    ) -> Result<bool, StorageError> {
        self.dark_mode = !self.dark_mode;
        storage.save_dark_mode(self.dark_mode)?;
        Ok(self.dark_mode)
    }
}
