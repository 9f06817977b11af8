use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, NamedTempFile};

fn witokit() -> Command {
    let mut cmd = Command::cargo_bin("witokit").expect("Binary exists");
    cmd.env_remove("WITOKIT_DUMP_URL");
    cmd
}

fn corpus(dir: &Path, lines: usize) -> std::path::PathBuf {
    let path = dir.join("enwiki.txt");
    let body: String = (0..lines).map(|i| format!("line {i}\n")).collect();
    fs::write(&path, body).expect("Writing corpus failed");
    path
}

#[test]
fn sample_writes_the_requested_share_of_lines() {
    let dir = tempdir().unwrap();
    let input = corpus(dir.path(), 10);
    let outdir = dir.path().join("samples");

    witokit()
        .arg("sample")
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&outdir)
        .arg("-p")
        .arg("50")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"kept\": 5"));

    let sampled = fs::read_to_string(outdir.join("enwiki.sample50.txt")).unwrap();
    assert_eq!(sampled.lines().count(), 5);
}

#[test]
fn sample_rejects_out_of_range_percentages() {
    let dir = tempdir().unwrap();
    let input = corpus(dir.path(), 10);

    witokit()
        .arg("sample")
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(dir.path())
        .arg("-p")
        .arg("100")
        .assert()
        .failure()
        .stderr(predicate::str::contains("strictly between 0 and 100"));
}

#[test]
fn process_tokenizes_a_directory_into_one_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("texts");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("b.txt"), "Bye!\n").unwrap();
    fs::write(input.join("a.txt"), "Hello world. Again.\n").unwrap();
    let output = dir.path().join("out/corpus.txt");

    witokit()
        .arg("process")
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("-n")
        .arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"command\": \"process\""));

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "Hello world .\nAgain .\nBye !\n"
    );
    assert!(!dir.path().join("out/tmp").exists());
}

#[test]
fn zero_threads_is_rejected_before_any_work() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("texts");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("a.txt"), "Hello.\n").unwrap();
    let output = dir.path().join("corpus.txt");

    witokit()
        .arg("process")
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("-n")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("num_threads must be at least 1"));

    assert!(!output.exists());
}

#[test]
fn missing_input_directory_fails() {
    let dir = tempdir().unwrap();

    witokit()
        .arg("extract")
        .arg("-i")
        .arg(dir.path().join("nope"))
        .arg("-o")
        .arg(dir.path().join("enwiki.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn config_file_supplies_defaults() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("texts");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("a.txt"), "Hello World.\n").unwrap();
    let output = dir.path().join("corpus.txt");
    let config = NamedTempFile::new().expect("temp file");
    fs::write(config.path(), "lowercase: true\nnum_threads: 2\n").unwrap();

    witokit()
        .arg("process")
        .arg("--config")
        .arg(config.path())
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&output).unwrap(), "hello world .\n");
}

#[test]
fn no_lower_overrides_lowercase_from_config() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("texts");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("a.txt"), "Hello World.\n").unwrap();
    let output = dir.path().join("corpus.txt");
    let config = NamedTempFile::new().expect("temp file");
    fs::write(config.path(), "lowercase: true\n").unwrap();

    witokit()
        .arg("process")
        .arg("--config")
        .arg(config.path())
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--no-lower")
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&output).unwrap(), "Hello World .\n");
}

#[test]
fn help_lists_every_config_key() {
    let assert = witokit().arg("--help").assert().success();
    let help = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    for key in ["dump_url", "num_threads", "language", "lowercase", "keep_archives", "strict"] {
        assert!(help.contains(key), "--help does not mention {key}: {help}");
    }
}

#[test]
fn invalid_config_file_fails() {
    let dir = tempdir().unwrap();
    let input = corpus(dir.path(), 4);
    let config = NamedTempFile::new().expect("temp file");
    fs::write(config.path(), "workers: 4\n").unwrap();

    witokit()
        .arg("sample")
        .arg("--config")
        .arg(config.path())
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(dir.path())
        .arg("-p")
        .arg("50")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config YAML"));
}

use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{value:?}"));
        }
    }
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut msg = String::new();
        event.record(&mut MessageVisitor(&mut msg));
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use witokit::cli::{run, Cli, Commands};

    // The config file does not exist, so the run fails right after the first event.
    let cli = Cli {
        config: Some(std::path::PathBuf::from("dummy.yaml")),
        command: Commands::Sample {
            input: std::path::PathBuf::from("dummy.txt"),
            outdir: std::path::PathBuf::from("."),
            percent: 10.0,
            balance: false,
        },
    };

    let result = run(cli).await;
    assert!(result.is_err());

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
