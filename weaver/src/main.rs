//! Unattended editor automation loop.
//!
//! `weaver run` drives an editor for a bounded session, writing one example
//! file per iteration into the output directory. `weaver preview` lists the
//! topics, `weaver check` validates config and environment without starting a
//! session, and `weaver init-config` writes a default `weaver.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use weaver::core::content::ContentSelector;
use weaver::core::identifier::{IdentifierAllocator, IdentifierRegistry};
use weaver::core::types::{IterationOutcome, SessionReport, TerminationReason, Topic};
use weaver::exit_codes;
use weaver::io::catalog::load_catalog;
use weaver::io::config::{WeaverConfig, load_config, write_config};
use weaver::io::driver::EditorDriver;
use weaver::io::interrupt::{CancelFlag, install_ctrl_c};
use weaver::io::report::{ReportRecord, write_report};
use weaver::io::workspace::{check_environment, existing_artifact_names};
use weaver::logging;
use weaver::session::{SessionConfig, run_session};

#[derive(Parser)]
#[command(
    name = "weaver",
    version,
    about = "Unattended editor automation that writes catalog-driven example files"
)]
struct Cli {
    /// Path to the TOML config file (missing file means defaults).
    #[arg(long, global = true, default_value = "weaver.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a session until the deadline, Ctrl-C, or too many failures.
    Run {
        #[command(flatten)]
        overrides: Overrides,

        /// Write the final report as JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Append logs to this file as well as stderr.
        #[arg(long, default_value = "weaver.log")]
        log_file: PathBuf,

        /// Log to stderr only.
        #[arg(long)]
        no_log_file: bool,
    },
    /// List the topics a session draws from.
    Preview {
        /// Catalog file to preview instead of the configured one.
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Validate config, catalog, editor executable and output directory.
    Check {
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Write a config file populated with defaults.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

/// Command-line overrides applied on top of the config file.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Session length in seconds.
    #[arg(long, conflicts_with = "hours")]
    duration_secs: Option<u64>,

    /// Session length in hours, clamped to 0.1..=24.
    #[arg(long)]
    hours: Option<f64>,

    /// Editor command-line launcher.
    #[arg(long, env = "WEAVER_EDITOR")]
    editor: Option<String>,

    /// Directory artifacts are written to.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// TOML catalog file replacing the built-in topics.
    #[arg(long)]
    catalog: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, cfg: &mut WeaverConfig) {
        if let Some(secs) = self.duration_secs {
            cfg.duration_secs = secs;
        }
        if let Some(hours) = self.hours {
            cfg.set_requested_hours(hours);
        }
        if let Some(editor) = self.editor {
            cfg.editor.executable = editor;
        }
        if let Some(dir) = self.output_dir {
            cfg.output_dir = dir;
        }
        if let Some(catalog) = self.catalog {
            cfg.catalog_path = Some(catalog);
        }
    }
}

fn main() {
    let code = match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Run {
            overrides,
            report,
            log_file,
            no_log_file,
        } => {
            logging::init((!no_log_file).then_some(log_file.as_path()))?;
            let cfg = resolve_config(&cli.config, overrides)?;
            cmd_run(&cfg, report.as_deref())
        }
        Command::Preview { catalog } => {
            logging::init(None)?;
            let mut cfg = load_config(&cli.config)?;
            if catalog.is_some() {
                cfg.catalog_path = catalog;
            }
            cmd_preview(&cfg)
        }
        Command::Check { overrides } => {
            logging::init(None)?;
            let cfg = resolve_config(&cli.config, overrides)?;
            cmd_check(&cfg)
        }
        Command::InitConfig { force } => {
            logging::init(None)?;
            cmd_init_config(&cli.config, force)
        }
    }
}

fn resolve_config(path: &Path, overrides: Overrides) -> Result<WeaverConfig> {
    let mut cfg = load_config(path)?;
    overrides.apply(&mut cfg);
    cfg.validate().context("invalid configuration after overrides")?;
    Ok(cfg)
}

fn cmd_run(cfg: &WeaverConfig, report_path: Option<&Path>) -> Result<i32> {
    check_environment(cfg)?;
    let catalog = load_catalog(cfg.catalog_path.as_deref())?;
    print_catalog(&catalog);

    let mut selector = ContentSelector::from_entropy(catalog, cfg.max_body_bytes)?;
    let output_dir = std::path::absolute(&cfg.output_dir)
        .with_context(|| format!("resolve {}", cfg.output_dir.display()))?;
    let existing = existing_artifact_names(&output_dir, &cfg.identifiers.extension)?;
    if !existing.is_empty() {
        info!(count = existing.len(), "reserving names of existing artifacts");
    }
    let allocator = IdentifierAllocator::new(
        cfg.identifiers.policy(),
        &output_dir,
        IdentifierRegistry::with_existing(existing),
    );

    let cancel = CancelFlag::new();
    install_ctrl_c(cancel.clone())?;
    let driver = EditorDriver::new(&cfg.editor);

    let report = run_session(
        &driver,
        &mut selector,
        allocator,
        &SessionConfig::from_config(cfg),
        &cancel,
        print_progress,
    );
    print_report(&report);

    if let Some(path) = report_path {
        write_report(path, &ReportRecord::new(&report, Local::now()))?;
    }
    Ok(exit_code_for(report.termination_reason))
}

fn cmd_preview(cfg: &WeaverConfig) -> Result<i32> {
    let catalog = load_catalog(cfg.catalog_path.as_deref())?;
    print_catalog(&catalog);
    Ok(exit_codes::OK)
}

fn cmd_check(cfg: &WeaverConfig) -> Result<i32> {
    check_environment(cfg)?;
    let catalog = load_catalog(cfg.catalog_path.as_deref())?;
    println!(
        "check: ok editor={} output_dir={} topics={}",
        cfg.editor.executable,
        cfg.output_dir.display(),
        catalog.len()
    );
    Ok(exit_codes::OK)
}

fn cmd_init_config(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &WeaverConfig::default())?;
    println!("init-config: wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn exit_code_for(reason: TerminationReason) -> i32 {
    match reason {
        TerminationReason::DeadlineReached | TerminationReason::Cancelled => exit_codes::OK,
        TerminationReason::StartupFailed => exit_codes::STARTUP_FAILED,
        TerminationReason::FailureThresholdExceeded => exit_codes::ABORTED,
    }
}

fn print_catalog(catalog: &[Topic]) {
    println!("Available topics:");
    for (idx, topic) in catalog.iter().enumerate() {
        println!("{}. {}: {}", idx + 1, topic.label, topic.description);
    }
}

fn print_progress(outcome: &IterationOutcome) {
    let status = match &outcome.error {
        None => "ok".to_string(),
        Some(err) => format!("failed ({err})"),
    };
    println!(
        "iter: {} topic={} status={} created={} failed={} remaining={}s",
        outcome.iter,
        outcome.label.as_deref().unwrap_or("-"),
        status,
        outcome.success_count,
        outcome.failure_count,
        outcome.remaining.as_secs()
    );
}

fn print_report(report: &SessionReport) {
    println!(
        "report: reason={} created={} failed={} elapsed={:.1}s",
        report.termination_reason.as_str(),
        report.success_count,
        report.failure_count,
        report.elapsed.as_secs_f64()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "weaver",
            "run",
            "--duration-secs",
            "30",
            "--editor",
            "codium",
            "--no-log-file",
        ]);
        let Command::Run {
            overrides,
            no_log_file,
            ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert!(no_log_file);
        let mut cfg = WeaverConfig::default();
        overrides.apply(&mut cfg);
        assert_eq!(cfg.duration_secs, 30);
        assert_eq!(cfg.editor.executable, "codium");
    }

    #[test]
    fn duration_and_hours_conflict() {
        let err = Cli::try_parse_from(["weaver", "run", "--duration-secs", "1", "--hours", "2"]);
        assert!(err.is_err());
    }

    #[test]
    fn hours_are_clamped() {
        let mut cfg = WeaverConfig::default();
        Overrides {
            hours: Some(48.0),
            ..Overrides::default()
        }
        .apply(&mut cfg);
        assert_eq!(cfg.duration_secs, 24 * 60 * 60);
    }

    #[test]
    fn parse_init_config_force() {
        let cli = Cli::parse_from(["weaver", "init-config", "--force"]);
        assert!(matches!(cli.command, Command::InitConfig { force: true }));
        assert_eq!(cli.config, PathBuf::from("weaver.toml"));
    }

    #[test]
    fn exit_codes_follow_termination_reason() {
        assert_eq!(exit_code_for(TerminationReason::DeadlineReached), exit_codes::OK);
        assert_eq!(exit_code_for(TerminationReason::Cancelled), exit_codes::OK);
        assert_eq!(
            exit_code_for(TerminationReason::StartupFailed),
            exit_codes::STARTUP_FAILED
        );
        assert_eq!(
            exit_code_for(TerminationReason::FailureThresholdExceeded),
            exit_codes::ABORTED
        );
    }
}
