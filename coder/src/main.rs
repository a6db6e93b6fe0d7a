//! `coder` command line: run a goal, critique a file, or write a config.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use coder::agents::Agent;
use coder::core::critic::CodeCritic;
use coder::delegate::summarize;
use coder::exit_codes;
use coder::io::config::{AgentConfig, Backend, default_config_path, load_config, write_config};
use coder::io::gateway::build_gateway;
use coder::logging;
use coder::looping::RunOutcome;
use coder::step::{StepKind, StepReport};

/// Characters of a tool result shown in progress output.
const PROGRESS_EXCERPT: usize = 300;

#[derive(Parser)]
#[command(name = "coder", version, about = "LLM coding agent with a bounded tool loop")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Work on a goal until the model reports DONE or the step budget runs out.
    Run(RunArgs),
    /// Print the code critique report for a file.
    Critique {
        file: PathBuf,
        /// Config file supplying critic thresholds.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write a default `.coder/config.toml`.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
        /// Working directory to initialize.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    goal: String,
    /// Working directory the agent operates in (created if missing).
    #[arg(long, default_value = ".")]
    dir: PathBuf,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    backend: Option<Backend>,
    /// Step budget for the main agent.
    #[arg(long)]
    steps: Option<u32>,
    /// Only print the final result.
    #[arg(short, long)]
    quiet: bool,
    /// Config path; defaults to `<dir>/.coder/config.toml`.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FAILED);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Critique { file, config } => cmd_critique(&file, config.as_deref()),
        Command::Init { force, dir } => cmd_init(&dir, force),
    }
}

fn cmd_run(args: RunArgs) -> Result<i32> {
    fs::create_dir_all(&args.dir)
        .with_context(|| format!("create working directory {}", args.dir.display()))?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| default_config_path(&args.dir));
    let mut config = load_config(&config_path)?;
    apply_overrides(&mut config, &args);
    config.validate().context("validate config overrides")?;

    let gateway = build_gateway(&config.model)?;
    if !gateway.health_check() {
        bail!(
            "model backend {} is not reachable at {}",
            gateway.name(),
            config.model.base_url()
        );
    }

    let quiet = args.quiet;
    let max_steps = config.max_steps;
    let mut agent = Agent::new(gateway.as_ref(), &args.dir, config)?;
    if !quiet {
        println!("Working directory: {}", agent.root().display());
        println!("Model: {}", gateway.name());
        println!("Goal: {}", args.goal.trim());
    }
    let outcome = agent.run_with(&args.goal, |report| {
        if !quiet {
            print_progress(report, max_steps);
        }
    })?;

    println!("Final result: {}", outcome.message());
    Ok(match outcome {
        RunOutcome::Done { .. } => exit_codes::OK,
        RunOutcome::MaxStepsExceeded { .. } => exit_codes::FAILED,
    })
}

fn apply_overrides(config: &mut AgentConfig, args: &RunArgs) {
    if let Some(backend) = args.backend {
        if backend != config.model.backend {
            // Another backend's model id and URL would not resolve.
            config.model.model = None;
            config.model.base_url = None;
        }
        config.model.backend = backend;
    }
    if let Some(model) = &args.model {
        config.model.model = Some(model.clone());
    }
    if let Some(steps) = args.steps {
        config.max_steps = steps;
    }
}

fn print_progress(report: &StepReport, max_steps: u32) {
    let label = match &report.kind {
        StepKind::Tool { name } => format!("tool {name}"),
        StepKind::Done => "done".to_string(),
        StepKind::Sentinel => "completion marker".to_string(),
        StepKind::ParseError => "unparsable response".to_string(),
    };
    println!("\n--- Step {}/{max_steps}: {label}", report.step);
    if let Some(output) = &report.output {
        println!("{}", summarize(output, PROGRESS_EXCERPT));
    }
    if report.reflected {
        println!("(reflection added)");
    }
}

fn cmd_critique(file: &Path, config: Option<&Path>) -> Result<i32> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => AgentConfig::default(),
    };
    let code = fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let critic = CodeCritic::new(config.critic);
    let report = critic.critique(&code, &file.to_string_lossy());
    print!("{}", report.render());
    Ok(exit_codes::OK)
}

fn cmd_init(dir: &Path, force: bool) -> Result<i32> {
    let path = default_config_path(dir);
    if path.exists() && !force {
        println!("Config already exists: {} (use --force to overwrite)", path.display());
        return Ok(exit_codes::OK);
    }
    write_config(&path, &AgentConfig::default())?;
    println!("Wrote {}", path.display());
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "coder",
            "run",
            "add a README",
            "--dir",
            "work",
            "--backend",
            "anthropic",
            "--steps",
            "5",
            "--quiet",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.goal, "add a README");
        assert_eq!(args.dir, PathBuf::from("work"));
        assert_eq!(args.backend, Some(Backend::Anthropic));
        assert_eq!(args.steps, Some(5));
        assert!(args.quiet);
        assert!(args.model.is_none());
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["coder", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true, .. }));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Cli::try_parse_from(["coder", "run", "goal", "--backend", "gpt"]).is_err());
    }

    #[test]
    fn backend_switch_clears_model_and_url() {
        let mut config = AgentConfig::default();
        config.model.model = Some("llama3".to_string());
        config.model.base_url = Some("http://gpu-box:11434".to_string());
        let args = RunArgs {
            goal: "g".to_string(),
            dir: PathBuf::from("."),
            model: None,
            backend: Some(Backend::Anthropic),
            steps: Some(3),
            quiet: false,
            config: None,
        };

        apply_overrides(&mut config, &args);

        assert_eq!(config.model.backend, Backend::Anthropic);
        assert_eq!(config.model.model_id(), Backend::Anthropic.default_model());
        assert_eq!(config.model.base_url(), Backend::Anthropic.default_base_url());
        assert_eq!(config.max_steps, 3);
    }
}
