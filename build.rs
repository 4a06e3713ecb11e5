// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: package name
fn package_arg() -> Arg {
    Arg::new("package").required(true).help("Package name")
}

/// Common arguments: version and variant selection
fn selection_args() -> [Arg; 2] {
    [
        Arg::new("version")
            .long("version")
            .value_name("VERSION")
            .help("Version to use (default: the preferred version)"),
        Arg::new("variant")
            .long("variant")
            .value_name("SETTING")
            .action(ArgAction::Append)
            .help("Variant setting: +name, ~name or name=value"),
    ]
}

fn build_cli() -> Command {
    Command::new("pantry")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Pantry Contributors")
        .about("Package recipes for building scientific software from source")
        .arg(
            Arg::new("repo")
                .short('r')
                .long("repo")
                .default_value(".")
                .help("Repository root (the directory holding repo.toml)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Show debug output"),
        )
        .subcommand(
            Command::new("list").about("List all recipes in the repository").arg(
                Arg::new("long")
                    .short('l')
                    .long("long")
                    .action(ArgAction::SetTrue)
                    .help("Also show the preferred version and description"),
            ),
        )
        .subcommand(
            Command::new("info")
                .about("Show the versions, variants and dependencies of a recipe")
                .arg(package_arg()),
        )
        .subcommand(
            Command::new("validate").about("Load the repository and report every validation problem"),
        )
        .subcommand(
            Command::new("deps")
                .about("Show the dependencies active for one version and variant setting")
                .arg(package_arg())
                .args(selection_args())
                .arg(
                    Arg::new("reverse")
                        .long("reverse")
                        .action(ArgAction::SetTrue)
                        .help("List recipes that depend on this package instead"),
                ),
        )
        .subcommand(
            Command::new("cook")
                .about("Build a recipe into an installation prefix")
                .arg(package_arg())
                .arg(Arg::new("prefix").long("prefix").required(true).help("Installation prefix"))
                .arg(Arg::new("source").long("source").required(true).help("Unpacked source tree"))
                .args(selection_args())
                .arg(
                    Arg::new("dep")
                        .long("dep")
                        .value_name("NAME=PATH")
                        .action(ArgAction::Append)
                        .help("Installed dependency"),
                )
                .arg(
                    Arg::new("tests")
                        .long("tests")
                        .action(ArgAction::SetTrue)
                        .help("Run the check phase"),
                )
                .arg(Arg::new("jobs").short('j').long("jobs").help("Number of parallel build jobs"))
                .arg(Arg::new("scratch").long("scratch").help("Directory for scratch build trees"))
                .arg(
                    Arg::new("keep_builddir")
                        .long("keep-builddir")
                        .action(ArgAction::SetTrue)
                        .help("Keep the scratch build tree after the build"),
                )
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Check the context and print the configure arguments without building"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("pantry.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
