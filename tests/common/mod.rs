#![allow(dead_code)]

use benfy::{Compiled, Error, Generator, Options};
use std::fs;
use std::path::Path;

/// A scratch directory holding grammar files for one test.
pub struct TestEnv {
    temp_dir: tempfile::TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Could not create temp dir");
        Self { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `content` to `<name>` inside the scratch directory.
    pub fn write(&self, name: &str, content: &str) {
        fs::write(self.path().join(name), content).expect("Failed to write grammar file");
    }

    pub fn generator(&self) -> Generator {
        Generator::new(self.path())
    }

    /// Writes the grammar and runs the whole pipeline on it.
    pub fn compile(&self, name: &str, content: &str) -> Result<Compiled, Error> {
        self.write(name, content);
        self.generator().compile_file(name)
    }
}

/// Generator labelled with `label`, rooted at the current directory.
pub fn generator(label: &str) -> Generator {
    Generator::new(".").with_options(Options::new().with_label(label))
}
