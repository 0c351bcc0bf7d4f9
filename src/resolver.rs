use crate::Error;
use std::fs;
use std::path::{Path, PathBuf};

/// Loads grammar files relative to a base directory.
pub struct GrammarResolver {
    base_dir: PathBuf,
}

impl GrammarResolver {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_of(&self, filename: &str) -> PathBuf {
        self.base_dir.join(filename)
    }

    pub fn read(&self, filename: &str) -> Result<String, Error> {
        let path = self.path_of(filename);
        fs::read_to_string(&path).map_err(|source| Error::Io { path, source })
    }
}
