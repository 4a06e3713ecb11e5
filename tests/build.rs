// tests/build.rs

//! Build tests: phase ordering, install markers and failure cleanup.
//!
//! Tests that go through `/bin/sh` use recipes whose phases are replaced by
//! small shell commands; the rest drive the kitchen with a recording runner.

mod common;

use common::{RecordingRunner, LIBA, LIBB};
use pantry::recipe::{parse_recipe, CommandRunner, PhaseHook, PhaseInput};
use pantry::{
    BuildContext, BuildPhase, Error, InstallManifest, Kitchen, KitchenConfig, PackageRecipe,
    Platform, Result,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A recipe whose phases are plain shell commands
const SHELL_RECIPE: &str = r#"
[package]
name = "hello"

[[version]]
id = "1.0"
url = "https://example.org/hello-1.0.tar.gz"

[[variant]]
name = "greeting"
default = "hi"
values = ["hi", "hello"]

[[phase]]
name = "configure"
action = "replace"
commands = ["echo configured > config.log"]

[[phase]]
name = "compile"
action = "replace"
commands = ["test -f config.log", "echo built > artifact"]

[[phase]]
name = "check"
action = "replace"
commands = ["test -f artifact"]

[[phase]]
name = "install"
action = "replace"
commands = ["mkdir -p %(prefix)s/lib", "cp artifact %(prefix)s/lib/libhello.so"]
"#;

/// Compile writes into the prefix and then fails
const FAILING_RECIPE: &str = r#"
[package]
name = "broken"

[[version]]
id = "1.0"
url = "https://example.org/broken-1.0.tar.gz"

[[phase]]
name = "configure"
action = "replace"
commands = ["true"]

[[phase]]
name = "compile"
action = "replace"
commands = [
    "mkdir -p %(prefix)s/lib",
    "echo partial > %(prefix)s/lib/partial.so",
    "echo 'compile went wrong' >&2; exit 1",
]

[[phase]]
name = "install"
action = "replace"
commands = ["touch %(prefix)s/lib/never"]
"#;

struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("src")).unwrap();
        Self { root }
    }

    fn prefix(&self) -> std::path::PathBuf {
        self.root.path().join("install")
    }

    fn source(&self) -> std::path::PathBuf {
        self.root.path().join("src")
    }

    fn config(&self) -> KitchenConfig {
        KitchenConfig::default()
            .with_jobs(2)
            .with_scratch_root(self.root.path().join("scratch"))
    }

    fn context(&self, recipe: &PackageRecipe) -> BuildContext {
        recipe.default_context(self.prefix(), self.source()).unwrap()
    }
}

fn recording_kitchen(ws: &Workspace, runner: &Arc<RecordingRunner>) -> Kitchen {
    Kitchen::with_runner(ws.config(), runner.clone() as Arc<dyn CommandRunner>)
}

fn scratch_is_empty(ws: &Workspace) -> bool {
    let scratch = ws.root.path().join("scratch");
    !scratch.exists() || fs::read_dir(scratch).unwrap().next().is_none()
}

#[test]
fn test_shell_build_installs_and_marks_prefix() {
    let ws = Workspace::new();
    let recipe = parse_recipe(SHELL_RECIPE).unwrap();
    let context = ws.context(&recipe).with_tests(true);

    let manifest = Kitchen::new(ws.config()).build(&recipe, &context).unwrap();

    assert_eq!(manifest.name, "hello");
    assert_eq!(manifest.version, "1.0");
    assert_eq!(
        manifest.phases,
        vec![
            BuildPhase::Configure,
            BuildPhase::Compile,
            BuildPhase::Check,
            BuildPhase::Install
        ]
    );
    assert_eq!(manifest.fingerprint, recipe.fingerprint());
    assert_eq!(
        fs::read_to_string(ws.prefix().join("lib/libhello.so")).unwrap(),
        "built\n"
    );

    assert!(InstallManifest::is_installed(&ws.prefix()));
    assert_eq!(InstallManifest::load(&ws.prefix()).unwrap(), manifest);
    assert!(ws.prefix().join(".pantry/install.json").is_file());
    assert!(scratch_is_empty(&ws));
}

#[test]
fn test_shell_build_skips_check_without_tests() {
    let ws = Workspace::new();
    let recipe = parse_recipe(SHELL_RECIPE).unwrap();
    let context = ws.context(&recipe);

    let manifest = recipe.build(&context).unwrap();
    assert_eq!(
        manifest.phases,
        vec![BuildPhase::Configure, BuildPhase::Compile, BuildPhase::Install]
    );
}

#[test]
fn test_failing_phase_leaves_no_artifact() {
    let ws = Workspace::new();
    let recipe = parse_recipe(FAILING_RECIPE).unwrap();
    let context = ws.context(&recipe);

    let err = Kitchen::new(ws.config()).build(&recipe, &context).unwrap_err();
    let output = err.captured_output().unwrap_or_default().to_string();
    match err {
        Error::BuildFailure {
            phase, exit_status, ..
        } => {
            assert_eq!(phase, BuildPhase::Compile);
            assert_eq!(exit_status, Some(1));
        }
        other => panic!("expected BuildFailure, got {:?}", other),
    }
    assert!(output.contains("compile went wrong"));

    assert!(!ws.prefix().exists());
    assert!(!InstallManifest::is_installed(&ws.prefix()));
    assert!(scratch_is_empty(&ws));
}

#[test]
fn test_failure_keeps_preexisting_prefix_entries() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.prefix()).unwrap();
    fs::write(ws.prefix().join("README"), "site notes").unwrap();

    let recipe = parse_recipe(FAILING_RECIPE).unwrap();
    let context = ws.context(&recipe);
    assert!(Kitchen::new(ws.config()).build(&recipe, &context).is_err());

    assert!(ws.prefix().join("README").is_file());
    assert!(!ws.prefix().join("lib").exists());
    assert!(!ws.prefix().join(".pantry").exists());
}

#[test]
fn test_failure_removes_files_added_inside_preexisting_dirs() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.prefix().join("lib")).unwrap();
    fs::write(ws.prefix().join("lib/existing.so"), "keep me").unwrap();

    let recipe = parse_recipe(FAILING_RECIPE).unwrap();
    let context = ws.context(&recipe);
    assert!(Kitchen::new(ws.config()).build(&recipe, &context).is_err());

    assert_eq!(
        fs::read_to_string(ws.prefix().join("lib/existing.so")).unwrap(),
        "keep me"
    );
    assert!(!ws.prefix().join("lib/partial.so").exists());
    assert!(!ws.prefix().join(".pantry").exists());
}

/// Patch rewrites the source; compile succeeds only on the patched tree
const PATCHING_RECIPE: &str = r#"
[package]
name = "patched"

[[version]]
id = "1.0"
url = "https://example.org/patched-1.0.tar.gz"

[[phase]]
name = "patch"
action = "replace"
commands = ["grep -q old greeting.txt", "echo new > greeting.txt"]

[[phase]]
name = "configure"
action = "replace"
commands = ["true"]

[[phase]]
name = "compile"
action = "replace"
commands = ["grep -q new %(source_dir)s/greeting.txt", "test -f %(source_dir)s/fail-compile && exit 1; true"]

[[phase]]
name = "install"
action = "replace"
commands = ["mkdir -p %(prefix)s", "cp %(source_dir)s/greeting.txt %(prefix)s/greeting.txt"]
"#;

#[test]
fn test_patches_leave_the_source_tree_untouched() {
    let ws = Workspace::new();
    fs::write(ws.source().join("greeting.txt"), "old\n").unwrap();
    let recipe = parse_recipe(PATCHING_RECIPE).unwrap();
    let context = ws.context(&recipe);

    Kitchen::new(ws.config()).build(&recipe, &context).unwrap();

    assert_eq!(fs::read_to_string(ws.source().join("greeting.txt")).unwrap(), "old\n");
    assert_eq!(fs::read_to_string(ws.prefix().join("greeting.txt")).unwrap(), "new\n");
}

#[test]
fn test_retry_after_failure_patches_again() {
    let ws = Workspace::new();
    fs::write(ws.source().join("greeting.txt"), "old\n").unwrap();
    fs::write(ws.source().join("fail-compile"), "").unwrap();
    let recipe = parse_recipe(PATCHING_RECIPE).unwrap();
    let context = ws.context(&recipe);
    let kitchen = Kitchen::new(ws.config());

    for _ in 0..2 {
        match kitchen.build(&recipe, &context) {
            Err(Error::BuildFailure { phase, .. }) => assert_eq!(phase, BuildPhase::Compile),
            other => panic!("expected a compile failure, got {:?}", other),
        }
        assert_eq!(fs::read_to_string(ws.source().join("greeting.txt")).unwrap(), "old\n");
    }

    fs::remove_file(ws.source().join("fail-compile")).unwrap();
    kitchen.build(&recipe, &context).unwrap();
    assert_eq!(fs::read_to_string(ws.prefix().join("greeting.txt")).unwrap(), "new\n");
}

#[test]
fn test_timed_out_install_leaves_nothing_behind() {
    let body = r#"
[package]
name = "slow"

[[version]]
id = "1.0"
url = "https://example.org/slow-1.0.tar.gz"

[[phase]]
name = "configure"
action = "replace"
commands = ["true"]

[[phase]]
name = "install"
action = "replace"
commands = ['sh -c "sleep 1; mkdir -p %(prefix)s/lib; touch %(prefix)s/lib/late.so"']
"#;
    let ws = Workspace::new();
    let recipe = parse_recipe(body).unwrap();
    let context = ws.context(&recipe);
    let kitchen = Kitchen::new(ws.config().with_timeout(Duration::from_millis(300)));

    match kitchen.build(&recipe, &context) {
        Err(Error::BuildFailure { phase, exit_status, .. }) => {
            assert_eq!(phase, BuildPhase::Install);
            assert_eq!(exit_status, None);
        }
        other => panic!("expected a timeout, got {:?}", other),
    }

    // Give a surviving grandchild time to write
    std::thread::sleep(Duration::from_millis(1500));
    assert!(!ws.prefix().exists());
}

#[test]
fn test_default_cmake_commands() {
    let ws = Workspace::new();
    let recipe = parse_recipe(LIBA).unwrap();
    let runner = Arc::new(RecordingRunner::new());

    recording_kitchen(&ws, &runner)
        .build(&recipe, &ws.context(&recipe))
        .unwrap();

    let recorded = runner.recorded();
    assert_eq!(
        runner.phases(),
        vec![BuildPhase::Configure, BuildPhase::Compile, BuildPhase::Install]
    );
    let (_, configure) = &recorded[0];
    assert!(configure.starts_with("cmake -S "));
    assert!(configure.contains(&format!(
        "-DCMAKE_INSTALL_PREFIX:PATH={}",
        ws.prefix().display()
    )));
    assert!(configure.contains("-DCMAKE_BUILD_TYPE:STRING=Release"));
    assert!(recorded[1].1.starts_with("cmake --build "));
    assert!(recorded[1].1.ends_with(" -j2"));
    assert!(recorded[2].1.starts_with("cmake --install "));
}

#[test]
fn test_configure_args_follow_variants() {
    let body = format!(
        "{}\n[[configure_arg]]\ndefine = \"LIBA_SHARED\"\nfrom_variant = \"shared\"\n",
        LIBA
    );
    let recipe = parse_recipe(&body).unwrap();

    for (setting, expected) in [("true", "-DLIBA_SHARED:BOOL=ON"), ("false", "-DLIBA_SHARED:BOOL=OFF")] {
        let ws = Workspace::new();
        let variants = recipe
            .resolve_variants(&[("shared".to_string(), setting.to_string())])
            .unwrap();
        let context = ws.context(&recipe).with_variants(variants);
        let runner = Arc::new(RecordingRunner::new());

        recording_kitchen(&ws, &runner).build(&recipe, &context).unwrap();
        assert!(runner.recorded()[0].1.contains(expected));
    }
}

#[test]
fn test_configure_value_with_placeholder_survives_quoting() {
    let body = format!(
        "{}\n[[configure_arg]]\ndefine = \"LIBA_LIBDIR\"\nvalue = \"%(prefix)s/lib\"\n",
        LIBA
    );
    let recipe = parse_recipe(&body).unwrap();
    let ws = Workspace::new();
    let prefix = ws.root.path().join("my install");
    let context = recipe.default_context(prefix.clone(), ws.source()).unwrap();
    let runner = Arc::new(RecordingRunner::new());

    recording_kitchen(&ws, &runner).build(&recipe, &context).unwrap();

    let expected = format!("'-DLIBA_LIBDIR:STRING={}/lib'", prefix.display());
    let configure = &runner.recorded()[0].1;
    assert!(configure.contains(&expected), "{} not in {}", expected, configure);
}

#[test]
fn test_missing_dependency_runs_nothing() {
    let ws = Workspace::new();
    let recipe = parse_recipe(LIBB).unwrap();
    let runner = Arc::new(RecordingRunner::new());

    let err = recording_kitchen(&ws, &runner)
        .build(&recipe, &ws.context(&recipe))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MissingDependency { ref recipe, ref dependency }
            if recipe == "libb" && dependency == "liba"
    ));
    assert!(runner.recorded().is_empty());
    assert!(!ws.prefix().exists());
}

#[test]
fn test_dependency_prefix_reaches_the_build() {
    let ws = Workspace::new();
    let liba_prefix = ws.root.path().join("liba");
    fs::create_dir_all(&liba_prefix).unwrap();

    let recipe = parse_recipe(LIBB).unwrap();
    let context = ws.context(&recipe).with_dependency("liba", &liba_prefix);
    let runner = Arc::new(RecordingRunner::new());

    let manifest = recording_kitchen(&ws, &runner).build(&recipe, &context).unwrap();
    assert_eq!(manifest.dependencies.get("liba"), Some(&liba_prefix));
}

#[test]
fn test_check_runs_only_with_tests() {
    let recipe = parse_recipe(LIBA).unwrap();

    let ws = Workspace::new();
    let runner = Arc::new(RecordingRunner::new());
    recording_kitchen(&ws, &runner)
        .build(&recipe, &ws.context(&recipe))
        .unwrap();
    assert!(!runner.phases().contains(&BuildPhase::Check));

    let ws = Workspace::new();
    let runner = Arc::new(RecordingRunner::new());
    let manifest = recording_kitchen(&ws, &runner)
        .build(&recipe, &ws.context(&recipe).with_tests(true))
        .unwrap();
    assert_eq!(
        runner.phases(),
        vec![
            BuildPhase::Configure,
            BuildPhase::Compile,
            BuildPhase::Check,
            BuildPhase::Install
        ]
    );
    assert!(manifest.phases.contains(&BuildPhase::Check));
}

#[test]
fn test_installed_prefix_is_rejected() {
    let ws = Workspace::new();
    let recipe = parse_recipe(LIBA).unwrap();
    let runner = Arc::new(RecordingRunner::new());
    let kitchen = recording_kitchen(&ws, &runner);

    kitchen.build(&recipe, &ws.context(&recipe)).unwrap();
    let before = runner.recorded().len();

    let err = kitchen.build(&recipe, &ws.context(&recipe)).unwrap_err();
    assert!(matches!(err, Error::InvalidContext(_)));
    assert_eq!(runner.recorded().len(), before);
    assert!(InstallManifest::is_installed(&ws.prefix()));
}

#[test]
fn test_runner_failure_stops_the_build() {
    let ws = Workspace::new();
    let recipe = parse_recipe(LIBA).unwrap();
    let runner = Arc::new(RecordingRunner::failing(BuildPhase::Compile, 2));

    let err = recording_kitchen(&ws, &runner)
        .build(&recipe, &ws.context(&recipe))
        .unwrap_err();
    assert_eq!(err.captured_output(), Some("error: compile failed"));
    assert!(matches!(
        err,
        Error::BuildFailure {
            phase: BuildPhase::Compile,
            exit_status: Some(2),
            ..
        }
    ));
    assert!(!runner.phases().contains(&BuildPhase::Install));
    assert!(!InstallManifest::is_installed(&ws.prefix()));
    assert!(!ws.prefix().exists());
}

#[test]
fn test_invalid_context_runs_nothing() {
    let ws = Workspace::new();
    let recipe = parse_recipe(LIBA).unwrap();
    let runner = Arc::new(RecordingRunner::new());
    let kitchen = recording_kitchen(&ws, &runner);

    let undeclared = BuildContext::new("3.0".parse().unwrap(), ws.prefix(), ws.source())
        .with_variants(recipe.default_variants());
    assert!(matches!(
        kitchen.build(&recipe, &undeclared),
        Err(Error::InvalidContext(_))
    ));

    let no_variants = BuildContext::new("1.0".parse().unwrap(), ws.prefix(), ws.source());
    assert!(matches!(
        kitchen.build(&recipe, &no_variants),
        Err(Error::InvalidContext(_))
    ));

    assert!(runner.recorded().is_empty());
    assert!(!ws.prefix().exists());
}

#[test]
fn test_platform_override_extends_install() {
    let body = r#"
[package]
name = "liba"
build_system = "autotools"

[[version]]
id = "1.0"
url = "https://example.org/liba-1.0.tar.gz"

[[phase]]
name = "install"
when = "platform=darwin"
action = "extend"
after = ["install_name_tool -id %(prefix)s/lib/liba.dylib %(prefix)s/lib/liba.dylib"]
"#;
    let recipe = parse_recipe(body).unwrap();

    let installs = |platform: Platform| {
        let ws = Workspace::new();
        let runner = Arc::new(RecordingRunner::new());
        let context = ws.context(&recipe).with_platform(platform);
        recording_kitchen(&ws, &runner).build(&recipe, &context).unwrap();
        runner
            .recorded()
            .into_iter()
            .filter(|(phase, _)| *phase == BuildPhase::Install)
            .map(|(_, command)| command)
            .collect::<Vec<_>>()
    };

    let linux = installs(Platform::new("linux", "x86_64"));
    assert_eq!(linux, vec!["make install"]);

    let darwin = installs(Platform::new("darwin", "aarch64"));
    assert_eq!(darwin.len(), 2);
    assert_eq!(darwin[0], "make install");
    assert!(darwin[1].starts_with("install_name_tool -id "));
}

struct QuietCompile;

impl PhaseHook for QuietCompile {
    fn commands(&self, input: &PhaseInput<'_>, defaults: Vec<String>) -> Result<Vec<String>> {
        assert_eq!(input.phase, BuildPhase::Compile);
        Ok(defaults
            .into_iter()
            .map(|cmd| format!("{} --quiet", cmd))
            .collect())
    }
}

#[test]
fn test_phase_hook_replaces_commands() {
    let ws = Workspace::new();
    let mut recipe: PackageRecipe = parse_recipe(LIBA).unwrap();
    recipe.set_hook(BuildPhase::Compile, Arc::new(QuietCompile));
    let runner = Arc::new(RecordingRunner::new());

    recording_kitchen(&ws, &runner)
        .build(&recipe, &ws.context(&recipe))
        .unwrap();

    let compile: Vec<String> = runner
        .recorded()
        .into_iter()
        .filter(|(phase, _)| *phase == BuildPhase::Compile)
        .map(|(_, command)| command)
        .collect();
    assert_eq!(compile.len(), 1);
    assert!(compile[0].ends_with("-j2 --quiet"));
}

#[test]
fn test_patch_phase_runs_in_source_dir() {
    let ws = Workspace::new();
    let mut recipe = parse_recipe(LIBA).unwrap();
    recipe.set_recipe_dir(Path::new("/recipes/liba"));
    recipe
        .declare_patch(pantry::recipe::Patch::new("fix-install.patch"))
        .unwrap();
    let runner = Arc::new(RecordingRunner::new());

    recording_kitchen(&ws, &runner)
        .build(&recipe, &ws.context(&recipe))
        .unwrap();

    let recorded = runner.recorded();
    assert_eq!(recorded[0].0, BuildPhase::Patch);
    assert_eq!(recorded[0].1, "patch -p1 -i /recipes/liba/fix-install.patch");
}
