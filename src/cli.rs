// src/cli.rs
use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{fs, path::PathBuf};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        config::ProjectConfig,
        models::{BuildConfig, Stage, Variant},
        pipeline::Pipeline,
    },
    infra::{command::SystemExecutor, logging::init_logging},
    reporting::console::Console,
};

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub stage: Stage,
    pub variant: Variant,
    pub preset: Option<String>,
    pub project_dir: PathBuf,
    pub config: Option<PathBuf>,
    pub color: bool,
    pub verbose: bool,
}

pub fn build_cli() -> Command {
    Command::new("findword-pipeline")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Cross-platform build and test runner for findword")
        .arg(
            Arg::new("stage")
                .help("Pipeline stage to run")
                .value_name("STAGE")
                .required(true)
                .value_parser(clap::value_parser!(Stage)),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Use a debug build instead of release")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("preset")
                .long("preset")
                .help("Configure preset to use instead of the variant's default")
                .value_name("PRESET")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("project-dir")
                .long("project-dir")
                .help("Project root the pipeline operates on")
                .value_name("PROJECT_DIR")
                .default_value(".")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Pipeline config file, relative to the project root (default: Pipeline.toml if present)")
                .value_name("CONFIG")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log pipeline decisions to stderr")
                .action(ArgAction::SetTrue),
        )
}

fn args_from_matches(matches: &ArgMatches) -> CliArgs {
    let variant = if matches.get_flag("debug") {
        Variant::Debug
    } else {
        Variant::Release
    };
    CliArgs {
        stage: *matches.get_one::<Stage>("stage").unwrap(), // Required
        variant,
        preset: matches.get_one::<String>("preset").cloned(),
        project_dir: matches
            .get_one::<PathBuf>("project-dir")
            .unwrap() // Has default
            .clone(),
        config: matches.get_one::<PathBuf>("config").cloned(),
        color: !matches.get_flag("no-color"),
        verbose: matches.get_flag("verbose"),
    }
}

/// Parses the process arguments, exiting with a usage message on error.
pub fn parse_args() -> CliArgs {
    args_from_matches(&build_cli().get_matches())
}

/// Parses an explicit argument list. The first item is the program name.
pub fn try_parse_from<I, T>(args: I) -> Result<CliArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    build_cli()
        .try_get_matches_from(args)
        .map(|matches| args_from_matches(&matches))
}

pub async fn process_command(args: CliArgs) -> Result<()> {
    init_logging(args.verbose);
    let console = Console::new(args.color);

    let project_root = fs::canonicalize(&args.project_dir).with_context(|| {
        format!(
            "Project directory not found: {}",
            args.project_dir.display()
        )
    })?;
    let config = ProjectConfig::discover(&project_root, args.config.as_deref())?;

    let stop_token = setup_signal_handler(console);
    let executor = SystemExecutor::new(&project_root, console).with_cancellation(stop_token);
    let build = BuildConfig::new(args.variant).with_preset(args.preset);

    let mut pipeline = Pipeline::new(executor, project_root, config, build, console);
    pipeline.run(args.stage).await?;

    console.success(&format!(
        "Command '{}' completed successfully",
        args.stage
    ));
    Ok(())
}

fn setup_signal_handler(console: Console) -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            console.warning("\nInterrupt received, stopping the running command...");
            token_clone.cancel();
        }
    });

    token
}
