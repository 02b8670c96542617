use anyhow::{
    Context,
    Result,
    ensure,
};
use clap::{
    Parser,
    Subcommand,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    process::Command,
};
use wheel_ledger::config::LedgerConfig;

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Wheel ledger helper tasks (clippy, tests, config checks)",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run clippy for the entire workspace with warnings-as-errors
    Clippy,
    /// Run unit tests, then the sled-backed integration tests
    Test {
        /// Only run the wheel-ledger unit tests
        #[arg(long)]
        skip_integration: bool,
    },
    /// Validate a ledger config file and print the prize odds it yields
    CheckConfig {
        /// Path to a JSON ledger config
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = repo_root();

    match cli.command {
        Commands::Clippy => run_clippy(&root)?,
        Commands::Test { skip_integration } => {
            run_unit_tests(&root)?;
            if !skip_integration {
                run_integration_tests(&root)?;
            }
        }
        Commands::CheckConfig { path } => check_config(&path)?,
    }

    Ok(())
}

fn repo_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("xtask has no parent directory")
        .to_path_buf()
}

fn run_clippy(root: &Path) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("clippy")
        .arg("--workspace")
        .arg("--all-targets")
        .arg("--all-features")
        .arg("--")
        .arg("-D")
        .arg("warnings")
        .current_dir(root);
    run_command(cmd, "cargo clippy")?;
    Ok(())
}

fn run_unit_tests(root: &Path) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("test").arg("-p").arg("wheel-ledger").current_dir(root);
    run_command(cmd, "cargo test -p wheel-ledger")?;
    Ok(())
}

fn run_integration_tests(root: &Path) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("test")
        .arg("-p")
        .arg("integration-tests")
        .current_dir(root);
    run_command(cmd, "cargo test -p integration-tests")?;
    Ok(())
}

fn check_config(path: &Path) -> Result<()> {
    let config = LedgerConfig::load(path)?;
    let prizes = config.validate()?;
    println!("{} is valid", path.display());
    for (index, entry) in prizes.entries().iter().enumerate() {
        let odds = prizes.probability(index).unwrap_or_default();
        println!("  {:>8} {:<16} {:>6.2}%", entry.value, entry.label, odds * 100.0);
    }
    for package in &config.packages {
        println!(
            "  package {:<12} {:>4} spins for {}",
            package.id, package.spins, package.price
        );
    }
    Ok(())
}

fn run_command(mut cmd: Command, label: &str) -> Result<()> {
    println!("Running: {}", label);
    let status = cmd
        .status()
        .with_context(|| format!("failed to run {label}"))?;
    ensure!(status.success(), "{label} failed with status {status}");
    Ok(())
}
