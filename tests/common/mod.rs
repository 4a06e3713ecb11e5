// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use pantry::recipe::{CommandOutput, CommandRunner, CommandSpec};
use pantry::{BuildPhase, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// `liba`: two versions, a boolean `shared` variant, no dependencies
pub const LIBA: &str = r#"
[package]
name = "liba"
description = "First test library"
license = "MIT"

[[version]]
id = "1.0"
url = "https://example.org/liba-1.0.tar.gz"
sha256 = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"

[[version]]
id = "2.0"
url = "https://example.org/liba-2.0.tar.gz"
sha256 = "60303ae22b998861bce3b28f33eec1be758a213c86c93c076dbe9f558c11c752"

[[variant]]
name = "shared"
default = true
description = "Build shared libraries"
"#;

/// `libb`: needs a shared `liba` of at least 1.0 to build
pub const LIBB: &str = r#"
[package]
name = "libb"
description = "Second test library"
license = "MIT"

[[version]]
id = "1.0"
url = "https://example.org/libb-1.0.tar.gz"

[[depends_on]]
spec = "liba@>=1.0 shared=true"
type = "build"
"#;

/// Create a repository on disk from `(directory, package.toml)` pairs.
///
/// Returns the TempDir; keep it alive for as long as the repository is used.
pub fn write_repo(externals: &[&str], recipes: &[(&str, &str)]) -> TempDir {
    let root = tempfile::tempdir().unwrap();
    let externals: Vec<String> = externals.iter().map(|e| format!("\"{}\"", e)).collect();
    fs::write(
        root.path().join("repo.toml"),
        format!(
            "namespace = \"test\"\nexternals = [{}]\n",
            externals.join(", ")
        ),
    )
    .unwrap();

    for (dir, body) in recipes {
        let dir = root.path().join("packages").join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("package.toml"), body).unwrap();
    }
    root
}

/// Minimal recipe with one version and the given dependency specs
pub fn simple_recipe(name: &str, deps: &[&str]) -> String {
    let mut body = format!(
        "[package]\nname = \"{}\"\n\n[[version]]\nid = \"1.0\"\nurl = \"https://example.org/{}-1.0.tar.gz\"\n",
        name, name
    );
    for dep in deps {
        body.push_str(&format!("\n[[depends_on]]\nspec = \"{}\"\n", dep));
    }
    body
}

/// The recipe repository shipped with the crate
pub fn shipped_repo() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("repo")
}

/// A command runner that records what it was asked to run
///
/// Every command succeeds unless its phase is `fail_phase`, in which case it
/// exits with `fail_status`.
#[derive(Default)]
pub struct RecordingRunner {
    pub commands: Mutex<Vec<(BuildPhase, String)>>,
    pub fail_phase: Option<BuildPhase>,
    pub fail_status: i32,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(phase: BuildPhase, status: i32) -> Self {
        Self {
            fail_phase: Some(phase),
            fail_status: status,
            ..Self::default()
        }
    }

    pub fn recorded(&self) -> Vec<(BuildPhase, String)> {
        self.commands.lock().unwrap().clone()
    }

    pub fn phases(&self) -> Vec<BuildPhase> {
        let mut phases: Vec<BuildPhase> = self.recorded().into_iter().map(|(p, _)| p).collect();
        phases.dedup();
        phases
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec<'_>) -> Result<CommandOutput> {
        self.commands
            .lock()
            .unwrap()
            .push((spec.phase, spec.command.to_string()));

        if self.fail_phase == Some(spec.phase) {
            return Ok(CommandOutput {
                exit_status: Some(self.fail_status),
                output: format!("error: {} failed", spec.phase),
            });
        }
        Ok(CommandOutput {
            exit_status: Some(0),
            output: String::new(),
        })
    }
}
