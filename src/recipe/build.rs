// src/recipe/build.rs

//! Build procedure: phase sequence, configure arguments and overrides
//!
//! A procedure is composed rather than inherited. The build system supplies
//! default commands for each phase; a recipe adjusts them with declarative
//! [`PhaseOverride`]s or replaces a phase outright with a [`PhaseHook`].
//! For any phase the effective commands come from, in order of precedence:
//!
//! 1. the registered hook, if [`BuildProcedure::has_hook`] says there is one
//! 2. the first override whose condition holds for the build context
//! 3. the build system's defaults
//!
//! Commands are shell snippets with `%(name)s` placeholders that the kitchen
//! fills in just before running them.

use crate::error::{Error, Result};
use crate::recipe::context::BuildContext;
use crate::variant::{Condition, ConditionEnv, VariantValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use strum_macros::{Display, EnumString};

/// A discrete named stage of a build, in execution order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BuildPhase {
    Patch,
    Configure,
    Compile,
    /// Runs only when the build context asks for tests
    Check,
    Install,
}

impl BuildPhase {
    pub const ALL: [BuildPhase; 5] = [
        BuildPhase::Patch,
        BuildPhase::Configure,
        BuildPhase::Compile,
        BuildPhase::Check,
        BuildPhase::Install,
    ];
}

/// Which family of default phase commands a recipe uses
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    #[default]
    CMake,
    Autotools,
}

/// Value of a configure define
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefineValue {
    Bool(bool),
    Text(String),
}

impl From<bool> for DefineValue {
    fn from(b: bool) -> Self {
        DefineValue::Bool(b)
    }
}

impl From<&str> for DefineValue {
    fn from(s: &str) -> Self {
        DefineValue::Text(s.to_string())
    }
}

impl From<&VariantValue> for DefineValue {
    fn from(value: &VariantValue) -> Self {
        match value {
            VariantValue::Bool(b) => DefineValue::Bool(*b),
            VariantValue::Single(s) => DefineValue::Text(s.clone()),
            // CMake list syntax
            VariantValue::Multi(set) => {
                DefineValue::Text(set.iter().cloned().collect::<Vec<_>>().join(";"))
            }
        }
    }
}

impl fmt::Display for DefineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefineValue::Bool(b) => write!(f, "{}", b),
            DefineValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One argument passed to the configure step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigureArg {
    /// A fixed value
    Define { name: String, value: DefineValue },
    /// Mirrors the value of one of the recipe's variants
    FromVariant { name: String, variant: String },
    /// Chooses between two values on a condition over the build context
    Conditional {
        name: String,
        when: Condition,
        then: DefineValue,
        otherwise: DefineValue,
    },
}

impl ConfigureArg {
    pub fn define(name: impl Into<String>, value: impl Into<DefineValue>) -> Self {
        ConfigureArg::Define {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn from_variant(name: impl Into<String>, variant: impl Into<String>) -> Self {
        ConfigureArg::FromVariant {
            name: name.into(),
            variant: variant.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ConfigureArg::Define { name, .. }
            | ConfigureArg::FromVariant { name, .. }
            | ConfigureArg::Conditional { name, .. } => name,
        }
    }

    /// Resolve the value for one build
    pub fn value(&self, env: &ConditionEnv<'_>) -> Result<DefineValue> {
        match self {
            ConfigureArg::Define { value, .. } => Ok(value.clone()),
            ConfigureArg::FromVariant { name, variant } => env
                .variants
                .get(variant)
                .map(DefineValue::from)
                .ok_or_else(|| {
                    Error::InvalidContext(format!(
                        "Configure argument '{}' reads variant '{}', which has no value",
                        name, variant
                    ))
                }),
            ConfigureArg::Conditional {
                when,
                then,
                otherwise,
                ..
            } => Ok(if when.evaluate(env) {
                then.clone()
            } else {
                otherwise.clone()
            }),
        }
    }

    /// Render as a single (unquoted) command-line argument
    pub fn render(&self, system: BuildSystem, env: &ConditionEnv<'_>) -> Result<String> {
        let value = self.value(env)?;
        let name = self.name();
        Ok(match (system, value) {
            (BuildSystem::CMake, DefineValue::Bool(b)) => {
                format!("-D{}:BOOL={}", name, if b { "ON" } else { "OFF" })
            }
            (BuildSystem::CMake, DefineValue::Text(v)) => format!("-D{}:STRING={}", name, v),
            (BuildSystem::Autotools, DefineValue::Bool(true)) => format!("--enable-{}", name),
            (BuildSystem::Autotools, DefineValue::Bool(false)) => format!("--disable-{}", name),
            (BuildSystem::Autotools, DefineValue::Text(v)) => format!("--{}={}", name, v),
        })
    }
}

/// A patch file applied to the source tree before configuring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Path relative to the recipe's directory
    pub file: String,
    pub when: Condition,
    /// Leading path components stripped (`patch -p<level>`)
    pub level: u32,
}

impl Patch {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            when: Condition::Always,
            level: 1,
        }
    }

    pub fn when(mut self, when: Condition) -> Self {
        self.when = when;
        self
    }
}

/// What an override does to a phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseAction {
    Skip,
    Replace(Vec<String>),
    Extend {
        before: Vec<String>,
        after: Vec<String>,
    },
}

/// A condition-gated change to one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOverride {
    pub phase: BuildPhase,
    pub when: Condition,
    pub action: PhaseAction,
}

/// Everything a phase needs to know about the build in progress
#[derive(Debug, Clone, Copy)]
pub struct PhaseInput<'a> {
    pub phase: BuildPhase,
    pub context: &'a BuildContext,
    /// Out-of-tree build directory inside the kitchen's scratch area
    pub build_dir: &'a Path,
    /// Where the recipe's own files (patches) live
    pub recipe_dir: Option<&'a Path>,
    pub jobs: u32,
}

impl<'a> PhaseInput<'a> {
    pub fn condition_env(&self) -> ConditionEnv<'a> {
        self.context.condition_env()
    }
}

/// A programmatic replacement for one phase
///
/// The hook receives the commands the phase would otherwise run (after
/// declarative overrides are ignored) and returns the ones to run instead.
/// Returning an empty list skips the phase.
pub trait PhaseHook: Send + Sync {
    fn commands(&self, input: &PhaseInput<'_>, defaults: Vec<String>) -> Result<Vec<String>>;
}

/// The phase sequence of one recipe
#[derive(Clone, Default)]
pub struct BuildProcedure {
    pub system: BuildSystem,
    pub configure_args: Vec<ConfigureArg>,
    pub patches: Vec<Patch>,
    pub overrides: Vec<PhaseOverride>,
    hooks: BTreeMap<BuildPhase, Arc<dyn PhaseHook>>,
}

impl fmt::Debug for BuildProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildProcedure")
            .field("system", &self.system)
            .field("configure_args", &self.configure_args)
            .field("patches", &self.patches)
            .field("overrides", &self.overrides)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BuildProcedure {
    pub fn new(system: BuildSystem) -> Self {
        Self {
            system,
            ..Self::default()
        }
    }

    pub fn has_hook(&self, phase: BuildPhase) -> bool {
        self.hooks.contains_key(&phase)
    }

    /// Register `hook` for `phase`, replacing any earlier one
    pub fn set_hook(&mut self, phase: BuildPhase, hook: Arc<dyn PhaseHook>) {
        self.hooks.insert(phase, hook);
    }

    /// Rendered configure arguments for one build, in declaration order
    pub fn configure_arguments(&self, env: &ConditionEnv<'_>) -> Result<Vec<String>> {
        self.configure_args
            .iter()
            .map(|arg| arg.render(self.system, env))
            .collect()
    }

    /// Commands the build system runs for `phase` when nothing overrides it
    pub fn default_commands(&self, input: &PhaseInput<'_>) -> Result<Vec<String>> {
        let env = input.condition_env();
        let commands = match (input.phase, self.system) {
            (BuildPhase::Patch, _) => self
                .patches
                .iter()
                .filter(|p| p.when.evaluate(&env))
                .map(|p| {
                    let path = match input.recipe_dir {
                        Some(dir) => dir.join(&p.file),
                        None => Path::new(&p.file).to_path_buf(),
                    };
                    format!(
                        "patch -p{} -i {}",
                        p.level,
                        shell_quote(&path.to_string_lossy())
                    )
                })
                .collect(),
            (BuildPhase::Configure, BuildSystem::CMake) => {
                let mut cmd = String::from(
                    "cmake -S %(source_dir)s -B %(build_dir)s -G \"Unix Makefiles\" \
                     -DCMAKE_INSTALL_PREFIX:PATH=%(prefix)s -DCMAKE_BUILD_TYPE:STRING=Release",
                );
                for arg in self.configure_arguments(&env)? {
                    cmd.push(' ');
                    cmd.push_str(&shell_quote(&arg));
                }
                vec![cmd]
            }
            (BuildPhase::Configure, BuildSystem::Autotools) => {
                let mut cmd = String::from("%(source_dir)s/configure --prefix=%(prefix)s");
                for arg in self.configure_arguments(&env)? {
                    cmd.push(' ');
                    cmd.push_str(&shell_quote(&arg));
                }
                vec![cmd]
            }
            (BuildPhase::Compile, BuildSystem::CMake) => {
                vec!["cmake --build %(build_dir)s -j%(jobs)s".to_string()]
            }
            (BuildPhase::Compile, BuildSystem::Autotools) => vec!["make -j%(jobs)s".to_string()],
            (BuildPhase::Check, BuildSystem::CMake) => {
                vec!["ctest --test-dir %(build_dir)s".to_string()]
            }
            (BuildPhase::Check, BuildSystem::Autotools) => vec!["make check".to_string()],
            (BuildPhase::Install, BuildSystem::CMake) => {
                vec!["cmake --install %(build_dir)s".to_string()]
            }
            (BuildPhase::Install, BuildSystem::Autotools) => vec!["make install".to_string()],
        };
        Ok(commands)
    }

    /// The first declarative override of `input.phase` that applies
    pub fn active_override(&self, input: &PhaseInput<'_>) -> Option<&PhaseOverride> {
        let env = input.condition_env();
        self.overrides
            .iter()
            .find(|o| o.phase == input.phase && o.when.evaluate(&env))
    }

    /// Effective commands for one phase of one build
    pub fn commands_for(&self, input: &PhaseInput<'_>) -> Result<Vec<String>> {
        let defaults = self.default_commands(input)?;

        if let Some(hook) = self.hooks.get(&input.phase) {
            return hook.commands(input, defaults);
        }

        let Some(over) = self.active_override(input) else {
            return Ok(defaults);
        };
        Ok(match &over.action {
            PhaseAction::Skip => Vec::new(),
            PhaseAction::Replace(commands) => commands.clone(),
            PhaseAction::Extend { before, after } => before
                .iter()
                .cloned()
                .chain(defaults)
                .chain(after.iter().cloned())
                .collect(),
        })
    }
}

/// Replace `%(key)s` placeholders with values quoted for where they appear
///
/// A bare placeholder becomes one shell word. Inside `'...'` or `"..."` the
/// value is escaped for that quoting instead, so configure arguments such as
/// `'-DLIBDIR:PATH=%(prefix)s/lib'` stay a single word. The template is read
/// once; inserted values are never scanned for placeholders. Unknown
/// placeholders are left untouched.
pub fn substitute(template: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut quoting = Quoting::None;
    let mut rest = template;

    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix("%(")
            && let Some(end) = after.find(")s")
            && let Some(value) = vars.get(&after[..end])
        {
            out.push_str(&quoting.escape(value));
            rest = &after[end + 2..];
            continue;
        }

        rest = &rest[c.len_utf8()..];
        out.push(c);
        match (quoting, c) {
            (Quoting::None, '\'') => quoting = Quoting::Single,
            (Quoting::Single, '\'') => quoting = Quoting::None,
            (Quoting::None, '"') => quoting = Quoting::Double,
            (Quoting::Double, '"') => quoting = Quoting::None,
            // An escaped character never opens or closes a quote
            (Quoting::None | Quoting::Double, '\\') => {
                if let Some(next) = rest.chars().next() {
                    out.push(next);
                    rest = &rest[next.len_utf8()..];
                }
            }
            _ => {}
        }
    }
    out
}

/// Shell quoting in effect at a point of a command template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quoting {
    None,
    Single,
    Double,
}

impl Quoting {
    fn escape(self, value: &str) -> String {
        match self {
            Quoting::None => shell_quote(value),
            Quoting::Single => value.replace('\'', r"'\''"),
            Quoting::Double => value
                .chars()
                .flat_map(|c| match c {
                    '\\' | '"' | '$' | '`' => vec!['\\', c],
                    c => vec![c],
                })
                .collect(),
        }
    }
}

/// Quote `s` for `/bin/sh` unless it is made only of safe characters
pub fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '=' | '@' | '+' | ',' | '%')
        });
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
