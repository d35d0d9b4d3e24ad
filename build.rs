// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Mirror of the runtime CLI, kept flat so the build script has no crate deps
fn build_cli() -> Command {
    Command::new("nsrewrite")
        .version(env!("CARGO_PKG_VERSION"))
        .author("nsrewrite Contributors")
        .about("Rewrite package namespaces across class files, manifests and archives")
        .arg(Arg::new("input").required(true).help("Input file, archive or directory"))
        .arg(Arg::new("output").required(true).help("Output file, archive or directory"))
        .arg(
            Arg::new("rules")
                .short('r')
                .long("rules")
                .value_name("FILE")
                .action(ArgAction::Append)
                .required(true)
                .help("TOML rule file (repeatable, later files override earlier ones)"),
        )
        .arg(
            Arg::new("invert")
                .long("invert")
                .action(ArgAction::SetTrue)
                .help("Reverse the package renames"),
        )
        .arg(
            Arg::new("widen")
                .long("widen")
                .action(ArgAction::SetTrue)
                .help("Allow jar-in-jar and zip-in-any nesting"),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .action(ArgAction::SetTrue)
                .help("Process directory entries in parallel"),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .action(ArgAction::SetTrue)
                .help("Replace an existing output"),
        )
        .arg(
            Arg::new("report_json")
                .long("report-json")
                .value_name("FILE")
                .help("Write the change report as JSON"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
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

    let man_path = man_dir.join("nsrewrite.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
