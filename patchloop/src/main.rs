//! Plan-then-patch code editing agent.
//!
//! `patchloop run` asks a model for a step plan and one diff per step, applying
//! each diff to the code file. `extract` and `apply` expose the deterministic
//! patch engine on its own; `init` writes a default config.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use patchloop::cancel::CancelToken;
use patchloop::controller::{RunConfig, StepReport, run_agent};
use patchloop::core::apply::apply_patch_detailed;
use patchloop::core::extract::extract_patch;
use patchloop::exit_codes;
use patchloop::io::config::{AgentConfig, load_config, write_config};
use patchloop::io::model::CommandModel;
use patchloop::io::search::PatternSearch;
use tracing::debug;

#[derive(Parser)]
#[command(name = "patchloop", version, about = "Plan-then-patch code editing agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan the instruction and apply one model-written diff per step.
    Run {
        /// File holding the code to edit.
        #[arg(long)]
        code: PathBuf,
        /// What to change.
        #[arg(long)]
        instruction: String,
        /// Agent config (TOML). Missing file means defaults.
        #[arg(long, default_value = "patchloop.toml")]
        config: PathBuf,
        /// Write the final code here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print the full run outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the patch found in a model response (stdin if no file is given).
    Extract {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Write the default agent config.
    Init {
        #[arg(long, default_value = "patchloop.toml")]
        config: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Apply a patch file to a code file and print the result.
    Apply {
        #[arg(long)]
        code: PathBuf,
        #[arg(long)]
        patch: PathBuf,
    },
}

fn main() {
    patchloop::logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            code,
            instruction,
            config,
            output,
            json,
        } => cmd_run(&code, &instruction, &config, output.as_deref(), json),
        Command::Init { config, force } => cmd_init(&config, force),
        Command::Extract { input } => cmd_extract(input.as_deref()),
        Command::Apply { code, patch } => cmd_apply(&code, &patch),
    }
}

fn cmd_run(
    code_path: &Path,
    instruction: &str,
    config_path: &Path,
    output: Option<&Path>,
    json: bool,
) -> Result<i32> {
    let config = load_config(config_path)
        .with_context(|| format!("load config {}", config_path.display()))?;
    let code = read_file(code_path)?;
    let workdir = code_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let model = CommandModel::new(config.model.command.clone()).with_workdir(workdir);

    let outcome = run_agent(
        &model,
        &PatternSearch,
        instruction,
        &code,
        &RunConfig::from(&config),
        &CancelToken::new(),
        print_progress,
    )?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("serialize run outcome")?
        );
    }

    if let Some(error) = &outcome.error {
        eprintln!("run failed: {error}");
        return Ok(exit_codes::RUN_FAILED);
    }

    match output {
        Some(path) => {
            fs::write(path, &outcome.final_code)
                .with_context(|| format!("write {}", path.display()))?;
            eprintln!(
                "applied {} of {} steps to {}",
                outcome.steps_applied(),
                outcome.steps.len(),
                path.display()
            );
        }
        None if !json => println!("{}", outcome.final_code),
        None => {}
    }
    Ok(exit_codes::OK)
}

fn print_progress(report: &StepReport) {
    eprintln!(
        "[{}/{}] {} ({:?})",
        report.index, report.total, report.step, report.tier
    );
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    write_config(config_path, &AgentConfig::default())
        .with_context(|| format!("write config {}", config_path.display()))?;
    eprintln!("wrote {}", config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_extract(input: Option<&Path>) -> Result<i32> {
    let response = match input {
        Some(path) => read_file(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read stdin")?;
            buf
        }
    };
    println!("{}", extract_patch(&response));
    Ok(exit_codes::OK)
}

fn cmd_apply(code_path: &Path, patch_path: &Path) -> Result<i32> {
    let code = read_file(code_path)?;
    let patch = read_file(patch_path)?;
    let applied = apply_patch_detailed(&code, &patch);
    debug!(tier = ?applied.tier, "applied patch");
    println!("{}", applied.code);
    Ok(exit_codes::OK)
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}
