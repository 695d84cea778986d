//! # Stage Pipeline Module
//!
//! Sequences external commands for each pipeline stage.
//!
//! Required steps (environment creation, the final build invocation, the
//! package target, the scenario battery) fail the stage. Optional steps (the
//! preset configure, each harness directory, the integration script) are
//! logged and used to pick the next fallback instead.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::{
    core::{
        config::{ProjectConfig, expand},
        error::{ExecError, PipelineError},
        models::{BuildConfig, CommandResult, CommandSpec, ResolvedTool, Stage, Variant},
        resolver::ToolResolver,
        scenarios::ResultAggregator,
    },
    infra::{command::Executor, fs},
    reporting::{console::Console, json::write_report},
};

/// Marker ctest prints when a directory has no registered tests.
const NO_TESTS_MARKER: &str = "No tests were found";

/// The tools a pipeline resolves at most once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Interpreter,
    BuildTool,
    Harness,
}

impl ToolKind {
    fn label(self) -> &'static str {
        match self {
            ToolKind::Interpreter => "Interpreter",
            ToolKind::BuildTool => "Build tool",
            ToolKind::Harness => "Test harness",
        }
    }
}

/// How a single harness run is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessVerdict {
    Passed,
    /// Exited 0 without running anything. Not accepted as success.
    Empty,
    Failed,
}

impl HarnessVerdict {
    pub fn classify(result: &CommandResult) -> Self {
        if !result.success() {
            HarnessVerdict::Failed
        } else if result.stdout.contains(NO_TESTS_MARKER) || result.stderr.contains(NO_TESTS_MARKER)
        {
            HarnessVerdict::Empty
        } else {
            HarnessVerdict::Passed
        }
    }
}

/// One pipeline run over a project directory.
pub struct Pipeline<E: Executor> {
    executor: E,
    root: PathBuf,
    config: ProjectConfig,
    build: BuildConfig,
    console: Console,
    interpreter: Option<ResolvedTool>,
    build_tool: Option<ResolvedTool>,
    harness: Option<ResolvedTool>,
}

impl<E: Executor> Pipeline<E> {
    pub fn new(
        executor: E,
        root: impl Into<PathBuf>,
        config: ProjectConfig,
        build: BuildConfig,
        console: Console,
    ) -> Self {
        Self {
            executor,
            root: root.into(),
            config,
            build,
            console,
            interpreter: None,
            build_tool: None,
            harness: None,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The tool cached for this run, if it has been resolved.
    pub fn cached_tool(&self, kind: ToolKind) -> Option<&ResolvedTool> {
        self.slot(kind).as_ref()
    }

    /// Runs one stage of the pipeline against the project root.
    ///
    /// # Arguments
    ///
    /// * `stage` - The stage to run. `All` runs setup, build and test in that
    ///   order and stops at the first one that fails.
    ///
    /// # Returns
    ///
    /// `Ok(())` when every required step succeeded. Optional steps that failed
    /// are reported on the console and do not affect the result.
    ///
    /// # Errors
    ///
    /// The first fatal `PipelineError`: an unresolvable tool, a required
    /// command exiting non-zero or timing out, a missing subject executable,
    /// failed scenarios, a filesystem error, or an interruption.
    pub async fn run(&mut self, stage: Stage) -> Result<(), PipelineError> {
        info!(stage = %stage, "starting stage");
        match stage {
            Stage::Setup => self.setup().await,
            Stage::Build => self.build().await,
            Stage::Test => self.test().await,
            Stage::Package => self.package().await,
            Stage::Clean => self.clean(),
            Stage::Info => self.info().await,
            Stage::All => {
                self.setup().await?;
                self.build().await?;
                self.test().await
            }
        }
    }

    /// Creates the interpreter environment and installs the manifest into it.
    pub async fn setup(&mut self) -> Result<(), PipelineError> {
        self.console.progress("Setting up development environment...");
        let env_dir = self.config.environment.dir.clone();
        let manifest = self.config.environment.manifest.clone();

        if self.root.join(&env_dir).exists() {
            debug!(dir = %env_dir, "environment already present");
        } else {
            let python = self.tool(ToolKind::Interpreter).await?;
            self.run_required(CommandSpec::new([
                python.command.as_str(),
                "-m",
                "venv",
                env_dir.as_str(),
            ]))
            .await?;
        }

        if self.root.join(&manifest).is_file() {
            let env_python = env_interpreter(&env_dir);
            self.run_required(CommandSpec::new([
                env_python.as_str(),
                "-m",
                "pip",
                "install",
                "-r",
                manifest.as_str(),
            ]))
            .await?;
        } else {
            debug!(manifest = %manifest, "no dependency manifest, skipping install");
        }

        self.console.success("Environment setup complete");
        Ok(())
    }

    /// Configures (preset first, manual as fallback) and builds.
    pub async fn build(&mut self) -> Result<(), PipelineError> {
        let variant = self.build.variant;
        self.console
            .progress(&format!("Building project ({variant})..."));
        let cmake = self.tool(ToolKind::BuildTool).await?.command;

        let build_dir = if self.root.join(&self.config.build.preset_file).is_file() {
            let preset = self.preset_name();
            let dir = format!("{}/{}", self.config.build.dir, preset);
            let configured = self
                .run_optional(CommandSpec::new([cmake.as_str(), "--preset", preset.as_str()]))
                .await?
                .is_some_and(|result| result.success());
            if !configured {
                self.console.warning(&format!(
                    "Preset '{preset}' could not be configured, falling back to manual configuration"
                ));
                self.configure_manually(&cmake, &dir, variant).await?;
            }
            dir
        } else {
            debug!("no preset descriptor, using manual configuration");
            let dir = self.config.build.dir.clone();
            self.configure_manually(&cmake, &dir, variant).await?;
            dir
        };

        self.run_required(CommandSpec::new([cmake.as_str(), "--build", build_dir.as_str()]))
            .await?;
        self.console.success("Build complete");
        Ok(())
    }

    /// Runs the harness, the integration script and the scenario battery.
    pub async fn test(&mut self) -> Result<(), PipelineError> {
        self.console.progress("Running tests...");
        self.run_harness().await?;
        self.run_integration_script().await?;
        if self.config.test.scenarios {
            self.run_scenarios().await?;
        }
        self.console.success("Tests complete");
        Ok(())
    }

    /// Invokes the packaging target in the first build directory that exists.
    pub async fn package(&mut self) -> Result<(), PipelineError> {
        self.console.progress("Packaging project...");
        let found = fs::first_existing_dir(&self.root, &self.config.package.dirs).map(str::to_string);
        match found {
            Some(dir) => {
                let cmake = self.tool(ToolKind::BuildTool).await?.command;
                let target = self.config.package.target.clone();
                self.run_required(CommandSpec::new([
                    cmake.as_str(),
                    "--build",
                    dir.as_str(),
                    "--target",
                    target.as_str(),
                ]))
                .await?;
            }
            None => self
                .console
                .warning("No build directory found, nothing to package"),
        }
        self.console.success("Packaging complete");
        Ok(())
    }

    /// Removes transient directories and files. Absent paths are skipped.
    pub fn clean(&mut self) -> Result<(), PipelineError> {
        self.console.progress("Cleaning project...");
        for dir in &self.config.clean.dirs {
            if fs::remove_dir(&self.root.join(dir))? {
                self.console.line(&format!("Removed {dir}/"));
            }
        }
        for pattern in &self.config.clean.files {
            for file in fs::matching_files(&self.root, pattern)? {
                if fs::remove_file(&file)? {
                    let shown = file.strip_prefix(&self.root).unwrap_or(&file);
                    self.console.line(&format!("Removed {}", shown.display()));
                }
            }
        }
        self.console.success("Cleaning complete");
        Ok(())
    }

    /// Prints platform and toolchain details. Missing tools are reported, not fatal.
    pub async fn info(&mut self) -> Result<(), PipelineError> {
        self.console.heading("System Information");
        self.console.line(&format!(
            "Platform: {} ({}, {})",
            std::env::consts::OS,
            std::env::consts::ARCH,
            std::env::consts::FAMILY
        ));

        for kind in [ToolKind::Interpreter, ToolKind::BuildTool] {
            match self.tool(kind).await {
                Ok(tool) => self.console.line(&format!("{}: {tool}", kind.label())),
                Err(PipelineError::ToolNotFound { .. }) => {
                    self.console.line(&format!("{}: not found", kind.label()))
                }
                Err(err) => return Err(err),
            }
        }

        let compilers = self.config.tools.compilers.clone();
        if let Some(compiler) = self.resolver().first_available(&compilers).await? {
            self.console
                .line(&format!("C++ Compiler: {}", compiler.command));
        }
        Ok(())
    }

    async fn run_harness(&mut self) -> Result<(), PipelineError> {
        let dirs: Vec<String> = fs::existing_dirs(&self.root, &self.config.test.dirs)
            .into_iter()
            .map(str::to_string)
            .collect();
        if dirs.is_empty() {
            self.console
                .warning("No build directory found, skipping test harness");
            return Ok(());
        }

        let harness = match self.tool(ToolKind::Harness).await {
            Ok(tool) => tool,
            Err(err @ PipelineError::ToolNotFound { .. }) => {
                self.console
                    .warning(&format!("{err}, skipping test harness"));
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let timeout = self.config.test.harness_timeout_secs.map(Duration::from_secs);
        for dir in dirs {
            let argv = std::iter::once(harness.command.clone())
                .chain(self.config.test.harness_args.iter().cloned());
            let mut command = CommandSpec::new(argv).in_dir(&dir).live();
            if let Some(limit) = timeout {
                command = command.with_timeout(limit);
            }

            let Some(result) = self.run_optional(command).await? else {
                self.console
                    .warning(&format!("Test harness could not be run in {dir}"));
                continue;
            };
            match HarnessVerdict::classify(&result) {
                HarnessVerdict::Passed => {
                    self.console.success(&format!("Test harness passed in {dir}"));
                    return Ok(());
                }
                HarnessVerdict::Empty => self
                    .console
                    .warning(&format!("No tests were found in {dir}")),
                HarnessVerdict::Failed => self
                    .console
                    .warning(&format!("Test harness failed in {dir}")),
            }
        }

        self.console
            .warning("No test harness run reported passing tests");
        Ok(())
    }

    async fn run_integration_script(&mut self) -> Result<(), PipelineError> {
        let script = self.config.test.integration_script.clone();
        if script.is_empty() || !self.root.join(&script).is_file() {
            debug!(script = %script, "no integration script");
            return Ok(());
        }

        let python = match self.tool(ToolKind::Interpreter).await {
            Ok(tool) => tool,
            Err(err @ PipelineError::ToolNotFound { .. }) => {
                self.console
                    .warning(&format!("{err}, skipping integration script"));
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        match self
            .run_optional(CommandSpec::new([python.command.as_str(), script.as_str()]))
            .await?
        {
            Some(result) if result.success() => {
                self.console.success("Integration script passed")
            }
            Some(result) => self.console.warning(&format!(
                "Integration script exited with code {}",
                result.exit_code
            )),
            None => self
                .console
                .warning("Integration script could not be run"),
        }
        Ok(())
    }

    async fn run_scenarios(&mut self) -> Result<(), PipelineError> {
        let candidates = self.config.test.expanded_subjects();
        let scenarios = self.config.test.battery();
        let (subject, report) = ResultAggregator::new(&self.executor, self.console)
            .run_all(&self.root, &candidates, &scenarios)
            .await?;

        if let Some(path) = &self.config.test.report {
            let path = self.root.join(expand(path));
            match write_report(&report, &subject, &path) {
                Ok(()) => self
                    .console
                    .line(&format!("Report written to {}", path.display())),
                Err(e) => self
                    .console
                    .warning(&format!("Failed to write test report: {e:#}")),
            }
        }

        if report.exit_code() != 0 {
            return Err(PipelineError::ScenariosFailed {
                failed: report.failed(),
                total: report.total(),
            });
        }
        Ok(())
    }

    async fn configure_manually(
        &self,
        cmake: &str,
        dir: &str,
        variant: Variant,
    ) -> Result<(), PipelineError> {
        fs::ensure_dir(&self.root.join(dir))?;
        let build_type = format!("-DCMAKE_BUILD_TYPE={variant}");
        let argv = [cmake, "-S", ".", "-B", dir, build_type.as_str()]
            .into_iter()
            .map(str::to_string)
            .chain(self.config.build.configure_args.iter().cloned());

        let configured = self
            .run_optional(CommandSpec::new(argv))
            .await?
            .is_some_and(|result| result.success());
        if !configured {
            self.console
                .warning("Manual configuration failed, attempting the build anyway");
        }
        Ok(())
    }

    fn preset_name(&self) -> String {
        self.build.preset.clone().unwrap_or_else(|| match self.build.variant {
            Variant::Release => self.config.build.release_preset.clone(),
            Variant::Debug => self.config.build.debug_preset.clone(),
        })
    }

    fn resolver(&self) -> ToolResolver<'_, E> {
        ToolResolver::new(
            &self.executor,
            Duration::from_secs(self.config.tools.probe_timeout_secs),
        )
    }

    fn slot(&self, kind: ToolKind) -> &Option<ResolvedTool> {
        match kind {
            ToolKind::Interpreter => &self.interpreter,
            ToolKind::BuildTool => &self.build_tool,
            ToolKind::Harness => &self.harness,
        }
    }

    fn slot_mut(&mut self, kind: ToolKind) -> &mut Option<ResolvedTool> {
        match kind {
            ToolKind::Interpreter => &mut self.interpreter,
            ToolKind::BuildTool => &mut self.build_tool,
            ToolKind::Harness => &mut self.harness,
        }
    }

    /// Resolves `kind` on first use and returns the cached tool afterwards.
    async fn tool(&mut self, kind: ToolKind) -> Result<ResolvedTool, PipelineError> {
        if let Some(tool) = self.slot(kind) {
            return Ok(tool.clone());
        }
        let candidates = match kind {
            ToolKind::Interpreter => self.config.tools.interpreter.clone(),
            ToolKind::BuildTool => self.config.tools.build.clone(),
            ToolKind::Harness => self.config.tools.harness.clone(),
        };
        let resolved = self.resolver().resolve(kind.label(), &candidates).await?;
        debug!(tool = kind.label(), command = %resolved.command, "resolved");
        *self.slot_mut(kind) = Some(resolved.clone());
        Ok(resolved)
    }

    /// Runs a step whose failure is fatal to the stage.
    async fn run_required(&self, command: CommandSpec) -> Result<CommandResult, PipelineError> {
        let result = self.executor.execute(&command).await?;
        if !result.success() {
            return Err(PipelineError::ProcessFailure {
                command: command.display(),
                code: result.exit_code,
            });
        }
        Ok(result)
    }

    /// Runs a step whose failure only selects a fallback. Returns `None` when
    /// the command could not run to completion; interruption still propagates.
    async fn run_optional(
        &self,
        command: CommandSpec,
    ) -> Result<Option<CommandResult>, PipelineError> {
        match self.executor.execute(&command).await {
            Ok(result) => Ok(Some(result)),
            Err(err @ ExecError::Interrupted { .. }) => Err(err.into()),
            Err(err) => {
                debug!(command = %command.display(), error = %err, "optional step failed");
                Ok(None)
            }
        }
    }
}

/// The interpreter inside an environment created by `python -m venv`.
fn env_interpreter(env_dir: &str) -> String {
    let path = if cfg!(windows) {
        Path::new(env_dir).join("Scripts").join("python.exe")
    } else {
        Path::new(env_dir).join("bin").join("python")
    };
    path.to_string_lossy().into_owned()
}
