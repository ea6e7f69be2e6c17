//! Build automation tasks for the steadydb workspace.
//!
//! Run with `cargo xtask <command>`.
//!
//! ## Available Commands
//!
//! - `ci`: Run every check CI runs (format, lint, test, docs)
//! - `fmt`: Check/apply code formatting
//! - `clippy`: Run clippy lints
//! - `test`: Run tests, optionally for one crate
//! - `doc`: Generate documentation
//! - `example`: Run the pool walkthrough against a temporary SQLite file
//! - `machete`: Look for unused dependencies (requires cargo-machete)
//! - `clean`: Clean build artifacts

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

/// Crates of the workspace, in dependency order.
const CRATES: &[&str] = &[
    "steadydb-types",
    "steadydb-client",
    "steadydb-pool",
    "steadydb-derive",
    "steadydb-orm",
    "steadydb-testing",
];

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for steadydb")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all checks (format, lint, test, docs)
    Ci,
    /// Run cargo fmt (--check by default, --fix to apply)
    Fmt {
        /// Apply formatting fixes
        #[arg(long)]
        fix: bool,
    },
    /// Run clippy on every target
    Clippy {
        /// Apply clippy suggestions
        #[arg(long)]
        fix: bool,
    },
    /// Run tests
    Test {
        /// Test a single crate
        #[arg(short, long)]
        package: Option<String>,
        /// Skip the ORM crate's SQLite-backed integration tests
        #[arg(long)]
        no_sqlite: bool,
    },
    /// Generate documentation
    Doc {
        /// Open documentation in browser
        #[arg(long)]
        open: bool,
    },
    /// Run the connection pool example
    Example,
    /// Check for unused dependencies (requires cargo-machete)
    Machete,
    /// Clean build artifacts
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    let workspace_root = workspace_root()?;
    sh.change_dir(&workspace_root);

    match cli.command {
        Command::Ci => {
            println!("Running CI checks...");
            fmt(&sh, false)?;
            clippy(&sh, false)?;
            test(&sh, None, false)?;
            doc(&sh, false)?;
            println!("\n✅ All CI checks passed!");
        }
        Command::Fmt { fix } => fmt(&sh, fix)?,
        Command::Clippy { fix } => clippy(&sh, fix)?,
        Command::Test { package, no_sqlite } => test(&sh, package.as_deref(), no_sqlite)?,
        Command::Doc { open } => doc(&sh, open)?,
        Command::Example => example(&sh)?,
        Command::Machete => machete(&sh)?,
        Command::Clean => clean(&sh)?,
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let output = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("failed to run cargo locate-project")?;

    let path = String::from_utf8(output.stdout)
        .context("invalid UTF-8 in cargo output")?
        .trim()
        .to_string();

    Ok(PathBuf::from(path)
        .parent()
        .context("failed to get workspace root")?
        .to_path_buf())
}

fn fmt(sh: &Shell, fix: bool) -> Result<()> {
    if fix {
        println!("Applying formatting...");
        cmd!(sh, "cargo fmt --all").run()?;
        println!("✅ Formatting applied.");
    } else {
        println!("Checking formatting...");
        cmd!(sh, "cargo fmt --all -- --check").run()?;
        println!("✅ Formatting check passed.");
    }
    Ok(())
}

fn clippy(sh: &Shell, fix: bool) -> Result<()> {
    if fix {
        println!("Applying clippy suggestions...");
        cmd!(
            sh,
            "cargo clippy --workspace --all-features --all-targets --fix --allow-dirty"
        )
        .run()?;
        println!("✅ Clippy suggestions applied.");
    } else {
        println!("Running clippy...");
        cmd!(
            sh,
            "cargo clippy --workspace --all-features --all-targets -- -D warnings"
        )
        .run()?;
        println!("✅ Clippy check passed.");
    }
    Ok(())
}

fn test(sh: &Shell, package: Option<&str>, no_sqlite: bool) -> Result<()> {
    if let Some(pkg) = package {
        if !CRATES.contains(&pkg) {
            bail!("unknown crate `{pkg}`; expected one of: {}", CRATES.join(", "));
        }
        println!("Running tests for {pkg}...");
        cmd!(sh, "cargo test -p {pkg} --all-features").run()?;
        println!("✅ Tests passed.");
        return Ok(());
    }

    println!("Running tests...");
    if no_sqlite {
        // Unit tests everywhere, plus the mock-driven ORM builder tests.
        cmd!(sh, "cargo test --workspace --all-features --exclude steadydb-orm").run()?;
        cmd!(sh, "cargo test -p steadydb-orm --all-features --lib --test builders").run()?;
    } else {
        cmd!(sh, "cargo test --workspace --all-features").run()?;
    }
    println!("✅ All tests passed.");
    Ok(())
}

fn doc(sh: &Shell, open: bool) -> Result<()> {
    println!("Generating documentation...");
    let _warnings = sh.push_env("RUSTDOCFLAGS", "-D warnings");
    if open {
        cmd!(sh, "cargo doc --workspace --all-features --no-deps --open").run()?;
    } else {
        cmd!(sh, "cargo doc --workspace --all-features --no-deps").run()?;
    }
    println!("✅ Documentation generated.");
    Ok(())
}

fn example(sh: &Shell) -> Result<()> {
    println!("Running connection pool example...");
    let _log = sh.push_env("RUST_LOG", "steadydb_pool=debug,info");
    cmd!(sh, "cargo run -p steadydb-pool --example connection_pool").run()?;
    Ok(())
}

fn machete(sh: &Shell) -> Result<()> {
    println!("Checking for unused dependencies...");
    if cmd!(sh, "cargo machete --version").quiet().ignore_stdout().run().is_err() {
        bail!("cargo-machete not found. Install it with `cargo install cargo-machete`.");
    }
    cmd!(sh, "cargo machete").run()?;
    println!("✅ No unused dependencies.");
    Ok(())
}

fn clean(sh: &Shell) -> Result<()> {
    println!("Cleaning build artifacts...");
    cmd!(sh, "cargo clean").run()?;
    println!("✅ Clean complete.");
    Ok(())
}
