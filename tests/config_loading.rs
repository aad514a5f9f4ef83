// tests/config_loading.rs

use std::error::Error;
use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use rendertrack::config::{JobKind, load_and_validate, load_from_path, parse_duration};
use rendertrack::errors::RendertrackError;
use rendertrack::types::QueueMode;
use rendertrack_test_utils::builders::{ConfigFileBuilder, JobConfigBuilder};

type TestResult = Result<(), Box<dyn Error>>;

fn config_file(contents: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = NamedTempFile::new()?;
    write!(file, "{contents}")?;
    Ok(file)
}

fn expect_config_error(contents: &str, needle: &str) -> TestResult {
    let file = config_file(contents)?;
    match load_and_validate(file.path()) {
        Err(RendertrackError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "unexpected message: {msg}");
            Ok(())
        }
        Err(e) => panic!("Expected ConfigError, got: {e:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn full_config_is_typed() -> TestResult {
    let file = config_file(
        r#"
[supervisor]
queue_mode = "queued"
max_concurrent = 2
smoothing = 0.25
stale_after = "30s"
refresh_interval = "250ms"
remove_finished = true

[job.beauty]
message = "Beauty pass"
first_frame = 1001
last_frame = 1048
frame_time = "40ms"

[job.comp]
last_frame = 10
cmd = "./render.sh comp"
frame_pattern = "^Rendered frame (\\d+)"
"#,
    )?;

    let cfg = load_and_validate(file.path())?;

    let s = cfg.supervisor;
    assert_eq!(s.queue_mode, QueueMode::Queued);
    assert_eq!(s.max_concurrent, 2);
    assert_eq!(s.estimator.smoothing, 0.25);
    assert_eq!(s.estimator.stale_after, Duration::from_secs(30));
    assert_eq!(s.refresh_interval, Duration::from_millis(250));
    assert!(s.remove_finished);
    assert!(s.registry_options().queue_mode.is_queued());

    let beauty = &cfg.jobs["beauty"];
    assert_eq!(beauty.message, "Beauty pass");
    assert_eq!(beauty.frame_range.frame_count(), 48);
    assert!(matches!(beauty.kind, JobKind::Simulated { frame_time } if frame_time == Duration::from_millis(40)));
    assert!(beauty.capabilities.can_pause);

    let comp = &cfg.jobs["comp"];
    assert_eq!(comp.message, "comp", "message defaults to the job name");
    match &comp.kind {
        JobKind::Command { cmd, frame_pattern } => {
            assert_eq!(cmd, "./render.sh comp");
            assert!(frame_pattern.is_match("Rendered frame 7"));
        }
        other => panic!("expected a command job, got {other:?}"),
    }
    assert!(!comp.capabilities.can_pause, "child processes cannot be paused");
    assert!(comp.capabilities.can_cancel);
    Ok(())
}

#[test]
fn defaults_apply_to_a_minimal_config() -> TestResult {
    let file = config_file("[job.a]\n")?;

    let cfg = load_and_validate(file.path())?;

    let s = cfg.supervisor;
    assert_eq!(s.queue_mode, QueueMode::Parallel);
    assert_eq!(s.max_concurrent, 1);
    assert_eq!(s.estimator.smoothing, 0.5);
    assert_eq!(s.estimator.stale_after, Duration::from_secs(10));
    assert_eq!(s.refresh_interval, Duration::from_millis(500));
    assert!(!s.remove_finished);

    let a = &cfg.jobs["a"];
    assert_eq!(a.frame_range.frame_count(), 1);
    assert!(matches!(a.kind, JobKind::Simulated { frame_time } if frame_time == Duration::from_millis(100)));
    Ok(())
}

#[test]
fn raw_loading_skips_validation() -> TestResult {
    let file = config_file("[supervisor]\nmax_concurrent = 0\n")?;

    let raw = load_from_path(file.path())?;

    assert!(raw.job.is_empty());
    assert_eq!(raw.supervisor.max_concurrent, 0);
    Ok(())
}

#[test]
fn config_without_jobs_is_rejected() -> TestResult {
    expect_config_error("[supervisor]\nqueue_mode = \"queued\"\n", "at least one [job.<name>]")
}

#[test]
fn zero_max_concurrent_is_rejected() -> TestResult {
    expect_config_error("[supervisor]\nmax_concurrent = 0\n[job.a]\n", "max_concurrent")
}

#[test]
fn smoothing_out_of_range_is_rejected() -> TestResult {
    expect_config_error("[supervisor]\nsmoothing = 0.0\n[job.a]\n", "smoothing")?;
    expect_config_error("[supervisor]\nsmoothing = 1.5\n[job.a]\n", "smoothing")
}

#[test]
fn bad_durations_are_rejected() -> TestResult {
    expect_config_error("[supervisor]\nstale_after = \"10\"\n[job.a]\n", "stale_after")?;
    expect_config_error("[job.a]\nframe_time = \"3 weeks\"\n", "frame_time")
}

#[test]
fn bad_frame_patterns_are_rejected() -> TestResult {
    expect_config_error("[job.a]\ncmd = \"true\"\nframe_pattern = \"(\"\n", "invalid frame_pattern")?;
    expect_config_error("[job.a]\ncmd = \"true\"\nframe_pattern = \"frame \\\\d+\"\n", "capture group")?;
    expect_config_error("[job.a]\nframe_pattern = \"(\\\\d+)\"\n", "requires cmd")
}

#[test]
fn zero_frame_step_is_rejected() -> TestResult {
    expect_config_error("[job.a]\nframe_step = 0\n", "frame_step")
}

#[test]
fn unknown_queue_mode_fails_to_parse() -> TestResult {
    let file = config_file("[supervisor]\nqueue_mode = \"sideways\"\n[job.a]\n")?;

    let result = load_and_validate(file.path());

    assert!(matches!(result, Err(RendertrackError::TomlError(_))));
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let result = load_and_validate("/definitely/not/here/Rendertrack.toml");
    assert!(matches!(result, Err(RendertrackError::IoError(_))));
}

#[test]
fn builder_produces_valid_config() {
    let cfg = ConfigFileBuilder::new()
        .queued(1)
        .with_job("a", JobConfigBuilder::new().frames(1, 5).build())
        .with_job(
            "b",
            JobConfigBuilder::new().cmd("echo frame 1").build(),
        )
        .build();

    assert_eq!(cfg.jobs.len(), 2);
    assert_eq!(cfg.supervisor.queue_mode, QueueMode::Queued);
    assert!(cfg.supervisor.supervisor_options(true).exit_when_idle);
}

#[test]
fn durations_parse_with_units() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration(" 3s "), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1500)));
    assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("12").is_err());
    assert!(parse_duration("5d").is_err());
}
