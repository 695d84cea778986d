//! # Pipeline Module Unit Tests
//!
//! Stage sequencing, fallbacks and filesystem effects of `Pipeline`, driven
//! through a scripted executor so no real toolchain is needed.

mod common;

use common::{FakeExecutor, exit, mkdir, not_found, ok, setup_project, touch};
use findword_pipeline::core::config::ProjectConfig;
use findword_pipeline::core::error::{ExecError, PipelineError};
use findword_pipeline::core::models::{BuildConfig, CommandResult, CommandSpec, Stage, Variant};
use findword_pipeline::core::pipeline::{HarnessVerdict, Pipeline, ToolKind};
use findword_pipeline::reporting::console::Console;
use std::path::Path;

fn pipeline(root: &Path, executor: FakeExecutor, config: ProjectConfig) -> Pipeline<FakeExecutor> {
    Pipeline::new(executor, root, config, BuildConfig::default(), Console::plain())
}

fn without_scenarios() -> ProjectConfig {
    let mut config = ProjectConfig::default();
    config.test.scenarios = false;
    config
}

/// A findword stand-in answering the default battery correctly.
fn answer_scenario(cmd: &CommandSpec) -> Result<CommandResult, ExecError> {
    match cmd.args().first().map(String::as_str) {
        Some("TEST") => Ok(ok("TEST\n")),
        Some("LISTEN") => Ok(ok("ENLIST\nSILENT\n")),
        Some("CAT") => Ok(ok("ACT\nCAT\n")),
        Some(other) => Ok(ok(other)),
        None => Ok(exit(1, "", "Usage: findword <word>")),
    }
}

#[cfg(test)]
mod build_stage_tests {
    use super::*;

    #[tokio::test]
    async fn test_build_without_preset_never_tries_preset() {
        let project = setup_project();
        let mut pipeline = pipeline(project.path(), FakeExecutor::succeeding(), without_scenarios());

        pipeline.run(Stage::Build).await.unwrap();

        assert_eq!(
            pipeline.executor().command_lines(),
            vec![
                "cmake --version",
                "cmake -S . -B build -DCMAKE_BUILD_TYPE=Release",
                "cmake --build build",
            ]
        );
        assert!(project.path().join("build").is_dir());
    }

    #[tokio::test]
    async fn test_failing_preset_falls_back_to_manual_configure() {
        let project = setup_project();
        touch(project.path(), "CMakePresets.json");
        let executor = FakeExecutor::new(|cmd| {
            if cmd.args().first().map(String::as_str) == Some("--preset") {
                Ok(exit(1, "", "CMake Error: No such preset"))
            } else {
                Ok(ok(""))
            }
        });
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        pipeline.run(Stage::Build).await.unwrap();

        assert_eq!(
            pipeline.executor().command_lines(),
            vec![
                "cmake --version",
                "cmake --preset default",
                "cmake -S . -B build/default -DCMAKE_BUILD_TYPE=Release",
                "cmake --build build/default",
            ]
        );
        assert!(project.path().join("build/default").is_dir());
    }

    #[tokio::test]
    async fn test_preset_unavailable_tool_also_falls_back() {
        let project = setup_project();
        touch(project.path(), "CMakePresets.json");
        let executor = FakeExecutor::new(|cmd| {
            if cmd.args().first().map(String::as_str) == Some("--preset") {
                Err(ExecError::TimedOut {
                    command: cmd.display(),
                    timeout: std::time::Duration::from_secs(1),
                    partial: CommandResult::default(),
                })
            } else {
                Ok(ok(""))
            }
        });
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        pipeline.run(Stage::Build).await.unwrap();

        assert_eq!(pipeline.executor().count_matching("cmake -S . -B build/default"), 1);
        assert_eq!(pipeline.executor().count_matching("cmake --build build/default"), 1);
    }

    #[tokio::test]
    async fn test_successful_debug_preset_skips_manual_configure() {
        let project = setup_project();
        touch(project.path(), "CMakePresets.json");
        let mut pipeline = Pipeline::new(
            FakeExecutor::succeeding(),
            project.path(),
            without_scenarios(),
            BuildConfig::new(Variant::Debug),
            Console::plain(),
        );

        pipeline.run(Stage::Build).await.unwrap();

        assert_eq!(
            pipeline.executor().command_lines(),
            vec!["cmake --version", "cmake --preset debug", "cmake --build build/debug"]
        );
    }

    #[tokio::test]
    async fn test_preset_override_takes_precedence() {
        let project = setup_project();
        touch(project.path(), "CMakePresets.json");
        let mut pipeline = Pipeline::new(
            FakeExecutor::succeeding(),
            project.path(),
            without_scenarios(),
            BuildConfig::new(Variant::Release).with_preset(Some("ci".to_string())),
            Console::plain(),
        );

        pipeline.run(Stage::Build).await.unwrap();

        assert_eq!(pipeline.executor().count_matching("cmake --preset ci"), 1);
        assert_eq!(pipeline.executor().count_matching("cmake --build build/ci"), 1);
    }

    #[tokio::test]
    async fn test_failed_manual_configure_still_attempts_build() {
        let project = setup_project();
        let executor = FakeExecutor::new(|cmd| {
            if cmd.args().first().map(String::as_str) == Some("-S") {
                Ok(exit(1, "", "configure failed"))
            } else {
                Ok(ok(""))
            }
        });
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        pipeline.run(Stage::Build).await.unwrap();

        assert_eq!(pipeline.executor().count_matching("cmake --build build"), 1);
    }

    #[tokio::test]
    async fn test_failed_build_invocation_is_fatal() {
        let project = setup_project();
        let executor = FakeExecutor::new(|cmd| {
            if cmd.args().first().map(String::as_str) == Some("--build") {
                Ok(exit(2, "", "compile error"))
            } else {
                Ok(ok(""))
            }
        });
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        let err = pipeline.run(Stage::Build).await.unwrap_err();

        match err {
            PipelineError::ProcessFailure { command, code } => {
                assert_eq!(command, "cmake --build build");
                assert_eq!(code, 2);
            }
            other => panic!("expected ProcessFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_build_tool_is_fatal() {
        let project = setup_project();
        let executor = FakeExecutor::new(|cmd| Err(not_found(cmd)));
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        let err = pipeline.run(Stage::Build).await.unwrap_err();

        assert!(matches!(err, PipelineError::ToolNotFound { .. }));
        assert_eq!(pipeline.executor().command_lines(), vec!["cmake --version"]);
    }
}

#[cfg(test)]
mod test_stage_tests {
    use super::*;

    #[tokio::test]
    async fn test_harness_runs_in_only_existing_directory() {
        let project = setup_project();
        mkdir(project.path(), "build");
        let mut pipeline = pipeline(
            project.path(),
            FakeExecutor::new(|_| Ok(ok("100% tests passed, 0 tests failed out of 4"))),
            without_scenarios(),
        );

        pipeline.run(Stage::Test).await.unwrap();

        let calls = pipeline.executor().calls();
        let harness_runs: Vec<_> = calls
            .iter()
            .filter(|c| c.args().first().map(String::as_str) == Some("--output-on-failure"))
            .collect();
        assert_eq!(harness_runs.len(), 1);
        assert_eq!(harness_runs[0].cwd(), Some(Path::new("build")));
        // Streamed to the terminal while still captured for the verdict.
        assert!(harness_runs[0].is_live());
    }

    #[tokio::test]
    async fn test_harness_search_stops_at_first_passing_directory() {
        let project = setup_project();
        mkdir(project.path(), "build/default");
        mkdir(project.path(), "build/release");
        let mut pipeline = pipeline(
            project.path(),
            FakeExecutor::new(|_| Ok(ok("100% tests passed"))),
            without_scenarios(),
        );

        pipeline.run(Stage::Test).await.unwrap();

        let dirs: Vec<_> = pipeline
            .executor()
            .calls()
            .iter()
            .filter_map(|c| c.cwd().map(Path::to_path_buf))
            .collect();
        assert_eq!(dirs, vec![Path::new("build/default").to_path_buf()]);
    }

    #[tokio::test]
    async fn test_harness_failure_moves_to_next_directory() {
        let project = setup_project();
        mkdir(project.path(), "build/default");
        mkdir(project.path(), "build");
        let executor = FakeExecutor::new(|cmd| match cmd.cwd() {
            Some(dir) if dir == Path::new("build/default") => Ok(exit(8, "1 test failed", "")),
            _ => Ok(ok("100% tests passed")),
        });
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        pipeline.run(Stage::Test).await.unwrap();

        let dirs: Vec<_> = pipeline
            .executor()
            .calls()
            .iter()
            .filter_map(|c| c.cwd().map(Path::to_path_buf))
            .collect();
        assert_eq!(
            dirs,
            vec![
                Path::new("build/default").to_path_buf(),
                Path::new("build").to_path_buf()
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_harness_is_not_accepted_as_success() {
        let project = setup_project();
        mkdir(project.path(), "build/release");
        mkdir(project.path(), "build");
        let executor = FakeExecutor::new(|cmd| match cmd.cwd() {
            Some(dir) if dir == Path::new("build/release") => {
                Ok(ok("Test project build/release\nNo tests were found!!!"))
            }
            _ => Ok(ok("100% tests passed")),
        });
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        pipeline.run(Stage::Test).await.unwrap();

        let harness_runs = pipeline
            .executor()
            .calls()
            .iter()
            .filter(|c| c.cwd().is_some())
            .count();
        assert_eq!(harness_runs, 2);
    }

    #[test]
    fn test_harness_verdict_classification() {
        assert_eq!(HarnessVerdict::classify(&ok("100% tests passed")), HarnessVerdict::Passed);
        assert_eq!(
            HarnessVerdict::classify(&ok("No tests were found!!!")),
            HarnessVerdict::Empty
        );
        assert_eq!(
            HarnessVerdict::classify(&exit(8, "", "")),
            HarnessVerdict::Failed
        );
    }

    #[tokio::test]
    async fn test_no_build_directories_skips_harness_silently() {
        let project = setup_project();
        let mut pipeline = pipeline(project.path(), FakeExecutor::succeeding(), without_scenarios());

        pipeline.run(Stage::Test).await.unwrap();

        assert!(pipeline.executor().calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_harness_tool_is_not_fatal() {
        let project = setup_project();
        mkdir(project.path(), "build");
        let executor = FakeExecutor::new(|cmd| Err(not_found(cmd)));
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        pipeline.run(Stage::Test).await.unwrap();

        assert_eq!(pipeline.executor().command_lines(), vec!["ctest --version"]);
    }

    #[tokio::test]
    async fn test_integration_script_failure_is_not_fatal() {
        let project = setup_project();
        touch(project.path(), "tests/test_integration.py");
        let executor = FakeExecutor::new(|cmd| {
            if cmd.args().first().map(String::as_str) == Some("tests/test_integration.py") {
                Ok(exit(1, "", ""))
            } else {
                Ok(ok("Python 3.12.0"))
            }
        });
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        pipeline.run(Stage::Test).await.unwrap();

        assert_eq!(
            pipeline.executor().command_lines(),
            vec!["python3 --version", "python3 tests/test_integration.py"]
        );
    }

    #[tokio::test]
    async fn test_scenarios_require_a_subject() {
        let project = setup_project();
        let mut pipeline = pipeline(
            project.path(),
            FakeExecutor::succeeding(),
            ProjectConfig::default(),
        );

        let err = pipeline.run(Stage::Test).await.unwrap_err();

        assert!(matches!(err, PipelineError::MissingArtifact(_)));
        assert!(err.to_string().contains("No executable found"));
    }

    #[tokio::test]
    async fn test_passing_scenarios_complete_the_stage() {
        let project = setup_project();
        touch(project.path(), &format!("findword{}", std::env::consts::EXE_SUFFIX));
        let mut config = ProjectConfig::default();
        config.test.report = Some("reports/scenarios.json".to_string());
        let mut pipeline = pipeline(project.path(), FakeExecutor::new(answer_scenario), config);

        pipeline.run(Stage::Test).await.unwrap();

        assert_eq!(pipeline.executor().calls().len(), 4);
        let report = std::fs::read_to_string(project.path().join("reports/scenarios.json")).unwrap();
        assert!(report.contains("\"passed\": 4"));
        assert!(report.contains("\"failed\": 0"));
    }

    #[tokio::test]
    async fn test_failing_scenario_fails_the_stage() {
        let project = setup_project();
        touch(project.path(), &format!("findword{}", std::env::consts::EXE_SUFFIX));
        let executor = FakeExecutor::new(|cmd| {
            if cmd.args().first().map(String::as_str) == Some("CAT") {
                Ok(ok("ACT\n"))
            } else {
                answer_scenario(cmd)
            }
        });
        let mut pipeline = pipeline(project.path(), executor, ProjectConfig::default());

        let err = pipeline.run(Stage::Test).await.unwrap_err();

        match err {
            PipelineError::ScenariosFailed { failed, total } => {
                assert_eq!(failed, 1);
                assert_eq!(total, 4);
            }
            other => panic!("expected ScenariosFailed, got {other:?}"),
        }
    }
}

#[cfg(test)]
mod setup_stage_tests {
    use super::*;

    fn env_python() -> &'static str {
        if cfg!(windows) {
            "venv\\Scripts\\python.exe"
        } else {
            "venv/bin/python"
        }
    }

    #[tokio::test]
    async fn test_setup_creates_environment_and_installs_manifest() {
        let project = setup_project();
        touch(project.path(), "requirements.txt.in");
        let mut pipeline = pipeline(project.path(), FakeExecutor::succeeding(), without_scenarios());

        pipeline.run(Stage::Setup).await.unwrap();

        assert_eq!(
            pipeline.executor().command_lines(),
            vec![
                "python3 --version".to_string(),
                "python3 -m venv venv".to_string(),
                format!("{} -m pip install -r requirements.txt.in", env_python()),
            ]
        );
    }

    #[tokio::test]
    async fn test_setup_skips_existing_environment_and_missing_manifest() {
        let project = setup_project();
        mkdir(project.path(), "venv");
        let mut pipeline = pipeline(project.path(), FakeExecutor::succeeding(), without_scenarios());

        pipeline.run(Stage::Setup).await.unwrap();

        assert!(pipeline.executor().calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_environment_creation_is_fatal() {
        let project = setup_project();
        let executor = FakeExecutor::new(|cmd| {
            if cmd.args().first().map(String::as_str) == Some("-m") {
                Ok(exit(1, "", "No module named venv"))
            } else {
                Ok(ok("Python 3.12.0"))
            }
        });
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        let err = pipeline.run(Stage::Setup).await.unwrap_err();

        assert!(matches!(err, PipelineError::ProcessFailure { code: 1, .. }));
    }
}

#[cfg(test)]
mod sequence_tests {
    use super::*;

    #[tokio::test]
    async fn test_all_runs_setup_build_test_in_order() {
        let project = setup_project();
        mkdir(project.path(), "venv");
        let executor = FakeExecutor::new(|_| Ok(ok("100% tests passed")));
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        pipeline.run(Stage::All).await.unwrap();

        assert_eq!(
            pipeline.executor().command_lines(),
            vec![
                "cmake --version",
                "cmake -S . -B build -DCMAKE_BUILD_TYPE=Release",
                "cmake --build build",
                "ctest --version",
                "ctest --output-on-failure",
            ]
        );
    }

    #[tokio::test]
    async fn test_all_stops_at_first_fatal_stage() {
        let project = setup_project();
        mkdir(project.path(), "venv");
        mkdir(project.path(), "build");
        let executor = FakeExecutor::new(|cmd| {
            if cmd.args().first().map(String::as_str) == Some("--build") {
                Ok(exit(1, "", ""))
            } else {
                Ok(ok(""))
            }
        });
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        let result = pipeline.run(Stage::All).await;

        assert!(result.is_err());
        assert_eq!(pipeline.executor().count_matching("ctest"), 0);
    }

    #[tokio::test]
    async fn test_all_stops_when_setup_fails() {
        let project = setup_project();
        let executor = FakeExecutor::new(|cmd| {
            if cmd.args().first().map(String::as_str) == Some("-m") {
                Ok(exit(1, "", ""))
            } else {
                Ok(ok(""))
            }
        });
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        let err = pipeline.run(Stage::All).await.unwrap_err();

        assert!(matches!(err, PipelineError::ProcessFailure { .. }));
        assert_eq!(pipeline.executor().count_matching("cmake"), 0);
    }

    #[tokio::test]
    async fn test_resolved_tool_is_cached_for_the_run() {
        let project = setup_project();
        let executor = FakeExecutor::new(|_| Ok(ok("cmake version 3.28.1")));
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        pipeline.run(Stage::Build).await.unwrap();
        pipeline.run(Stage::Package).await.unwrap();

        assert_eq!(pipeline.executor().count_matching("cmake --version"), 1);
        assert_eq!(
            pipeline.executor().count_matching("cmake --build build --target package"),
            1
        );
        let cached = pipeline.cached_tool(ToolKind::BuildTool).unwrap();
        assert_eq!(cached.command, "cmake");
        assert_eq!(cached.version.as_deref(), Some("cmake version 3.28.1"));
    }

    #[tokio::test]
    async fn test_package_without_build_directory_is_a_noop() {
        let project = setup_project();
        let mut pipeline = pipeline(project.path(), FakeExecutor::succeeding(), without_scenarios());

        pipeline.run(Stage::Package).await.unwrap();

        assert!(pipeline.executor().calls().is_empty());
    }

    #[tokio::test]
    async fn test_package_uses_first_existing_directory() {
        let project = setup_project();
        mkdir(project.path(), "build/release");
        mkdir(project.path(), "build");
        let mut pipeline = pipeline(project.path(), FakeExecutor::succeeding(), without_scenarios());

        pipeline.run(Stage::Package).await.unwrap();

        assert_eq!(
            pipeline.executor().command_lines(),
            vec!["cmake --version", "cmake --build build/release --target package"]
        );
    }

    #[tokio::test]
    async fn test_info_never_fails_when_nothing_resolves() {
        let project = setup_project();
        let executor = FakeExecutor::new(|cmd| Err(not_found(cmd)));
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        pipeline.run(Stage::Info).await.unwrap();

        assert!(pipeline.cached_tool(ToolKind::Interpreter).is_none());
        assert!(pipeline.cached_tool(ToolKind::BuildTool).is_none());
        // python3, python, cmake, then the three compilers
        assert_eq!(pipeline.executor().calls().len(), 6);
    }

    #[tokio::test]
    async fn test_interruption_aborts_an_optional_step() {
        let project = setup_project();
        touch(project.path(), "CMakePresets.json");
        let executor = FakeExecutor::new(|cmd| {
            if cmd.args().first().map(String::as_str) == Some("--preset") {
                Err(ExecError::Interrupted {
                    command: cmd.display(),
                })
            } else {
                Ok(ok(""))
            }
        });
        let mut pipeline = pipeline(project.path(), executor, without_scenarios());

        let err = pipeline.run(Stage::Build).await.unwrap_err();

        assert!(matches!(err, PipelineError::Exec(ExecError::Interrupted { .. })));
        assert_eq!(pipeline.executor().count_matching("cmake --build"), 0);
    }
}

#[cfg(test)]
mod clean_stage_tests {
    use super::*;

    fn populate(root: &Path) {
        mkdir(root, "build/default/bin");
        touch(root, "build/default/bin/findword");
        mkdir(root, "venv/bin");
        touch(root, "permutated_words.txt");
        touch(root, "findword");
        touch(root, "findword.exe");
        touch(root, "keep.txt");
        touch(root, "src/main.cpp");
    }

    fn listing(root: &Path) -> Vec<String> {
        let mut entries: Vec<String> = std::fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        entries
    }

    #[tokio::test]
    async fn test_clean_removes_transient_paths() {
        let project = setup_project();
        populate(project.path());
        let mut pipeline = pipeline(project.path(), FakeExecutor::succeeding(), without_scenarios());

        pipeline.run(Stage::Clean).await.unwrap();

        assert_eq!(listing(project.path()), vec!["keep.txt", "src"]);
        assert!(pipeline.executor().calls().is_empty());
    }

    #[tokio::test]
    async fn test_clean_is_idempotent() {
        let project = setup_project();
        populate(project.path());
        let mut pipeline = pipeline(project.path(), FakeExecutor::succeeding(), without_scenarios());

        pipeline.run(Stage::Clean).await.unwrap();
        let after_first = listing(project.path());
        pipeline.run(Stage::Clean).await.unwrap();

        assert_eq!(listing(project.path()), after_first);
    }

    #[tokio::test]
    async fn test_clean_on_empty_project_succeeds() {
        let project = setup_project();
        let mut pipeline = pipeline(project.path(), FakeExecutor::succeeding(), without_scenarios());

        pipeline.run(Stage::Clean).await.unwrap();

        assert!(listing(project.path()).is_empty());
    }
}
