#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Path to the store file used by a test, without creating it.
    pub fn store_path(&self) -> PathBuf {
        self.temp_dir.path().join("final-data.json")
    }
}

/// Writes the standard three-source fixture: CarA/CarB with an agreeing,
/// a partially agreeing, and a disagreeing feature plus a missing cell.
pub fn write_standard_sources(ws: &TestWorkspace) -> Vec<PathBuf> {
    vec![
        ws.write(
            "source1.csv",
            "Feature,CarA,CarB\n\
             engine,V6,V8\n\
             seats,5,4\n\
             color,Red,Blue\n",
        ),
        ws.write(
            "source2.csv",
            "Feature,CarA,CarB\n\
             engine,V6,V8\n\
             seats,5,4\n\
             color,Green,Blue\n",
        ),
        ws.write(
            "source3.csv",
            "Feature,CarA,CarB\n\
             engine,V6,V8\n\
             seats,4,4\n\
             color,,Blue\n",
        ),
    ]
}

/// Builds the repeated `-i a -i b -i c` argument vector for a source list.
pub fn input_args(paths: &[PathBuf]) -> Vec<String> {
    let mut args = Vec::new();
    for path in paths {
        args.push("-i".to_string());
        args.push(path.to_str().expect("utf-8 path").to_string());
    }
    args
}
