//! CLI integration tests using assert_cmd.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const FIXTURE: &str = "../readeval-core/tests/fixtures/read_syllable.xml";

fn readeval() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("readeval").unwrap()
}

/// Command run from an empty directory, isolated from user config and credentials.
fn isolated(dir: &TempDir) -> Command {
    let mut cmd = readeval();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("READEVAL_APP_ID")
        .env_remove("READEVAL_API_KEY")
        .env_remove("READEVAL_API_SECRET");
    cmd
}

fn fixture() -> PathBuf {
    std::fs::canonicalize(FIXTURE).unwrap()
}

fn write_audio(dir: &Path, name: &str, bytes: usize) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, vec![0u8; bytes]).unwrap();
    path
}

fn write_wav(dir: &Path, name: &str, sample_rate: u32, samples: usize) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for _ in 0..samples {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
    path
}

#[test]
fn validate_builtin_reference() {
    readeval()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("18 rows"))
        .stdout(predicate::str::contains("Reference set valid."));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ref.toml");
    std::fs::write(
        &path,
        r#"
name = "odd"

[[rows]]
characters = "的 的 一"

[[groups]]
id = "g1"
coefficient = 0.0
characters = "人 口"
"#,
    )
    .unwrap();

    readeval()
        .arg("validate")
        .arg("--reference")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("odd (1 rows, 1 groups)"))
        .stdout(predicate::str::contains("appears more than once"))
        .stdout(predicate::str::contains("2 warning(s) found."));
}

#[test]
fn validate_nonexistent_file() {
    readeval()
        .arg("validate")
        .arg("--reference")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    isolated(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created readeval.toml"))
        .stdout(predicate::str::contains("Created reference.toml"));

    assert!(dir.path().join("readeval.toml").exists());
    assert!(dir.path().join("reference.toml").exists());

    isolated(&dir)
        .arg("validate")
        .arg("--reference")
        .arg("reference.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("Reference set valid."));

    isolated(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists, skipping"));
}

#[test]
fn decode_prints_diagnostics() {
    readeval()
        .arg("decode")
        .arg("--markup")
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("86.40"))
        .stdout(predicate::str::contains("vowel+tone inaccurate"))
        .stdout(predicate::str::contains("read as liao3"));
}

#[test]
fn decode_as_csv() {
    readeval()
        .arg("decode")
        .arg("--markup")
        .arg(fixture())
        .arg("--format")
        .arg("csv")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("index,character,expected_reading"))
        .stdout(predicate::str::contains("1,的,de5,de5,read,correct"));
}

#[test]
fn decode_as_json() {
    let output = readeval()
        .arg("decode")
        .arg("--markup")
        .arg(fixture())
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["result"]["success"], true);
    assert_eq!(record["characters"].as_array().unwrap().len(), 3);
}

#[test]
fn decode_rejects_unknown_category() {
    readeval()
        .arg("decode")
        .arg("--markup")
        .arg(fixture())
        .arg("--category")
        .arg("read_poem")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn evaluate_with_mock_writes_outputs() {
    let dir = TempDir::new().unwrap();
    let audio = write_audio(dir.path(), "child.pcm", 4000);
    let out = dir.path().join("out");

    isolated(&dir)
        .arg("evaluate")
        .arg("--audio")
        .arg(&audio)
        .arg("--text")
        .arg("的 一 了")
        .arg("--output")
        .arg(&out)
        .arg("--format")
        .arg("all")
        .arg("--mock")
        .assert()
        .success()
        .stdout(predicate::str::contains("Outcome:  success"))
        .stdout(predicate::str::contains("90.00"));

    let names: Vec<String> = std::fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n.starts_with("audit-") && n.ends_with(".json")));
    assert!(names.iter().any(|n| n.ends_with(".csv")));
    assert!(names.iter().any(|n| n.starts_with("summary-")));
}

#[test]
fn evaluate_short_audio_fails() {
    let dir = TempDir::new().unwrap();
    let audio = write_audio(dir.path(), "short.pcm", 100);

    isolated(&dir)
        .arg("evaluate")
        .arg("--audio")
        .arg(&audio)
        .arg("--text")
        .arg("的")
        .arg("--output")
        .arg(dir.path().join("out"))
        .arg("--mock")
        .assert()
        .failure()
        .stdout(predicate::str::contains("failed (invalid_request)"))
        .stderr(predicate::str::contains("evaluation failed"));
}

#[test]
fn evaluate_without_credentials_fails() {
    let dir = TempDir::new().unwrap();
    let audio = write_audio(dir.path(), "child.pcm", 4000);

    isolated(&dir)
        .arg("evaluate")
        .arg("--audio")
        .arg(&audio)
        .arg("--text")
        .arg("的")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"))
        .stderr(predicate::str::contains("--mock"));
}

#[test]
fn batch_characters_with_mock() {
    let dir = TempDir::new().unwrap();
    let audio = write_audio(dir.path(), "batch.pcm", 4000);

    isolated(&dir)
        .arg("batch")
        .arg("--audio")
        .arg(&audio)
        .arg("--characters")
        .arg("人,口,手")
        .arg("--mock")
        .assert()
        .success()
        .stdout(predicate::str::contains("人"))
        .stdout(predicate::str::contains("手"))
        .stdout(predicate::str::contains("yes"));
}

#[test]
fn batch_groups_with_mock() {
    let dir = TempDir::new().unwrap();
    let audio = write_audio(dir.path(), "g1.pcm", 4000);
    let reference = dir.path().join("ref.toml");
    std::fs::write(
        &reference,
        r#"
[[groups]]
id = "g1"
coefficient = 2.0
characters = "人 口 手"
"#,
    )
    .unwrap();

    isolated(&dir)
        .arg("batch")
        .arg("--audio")
        .arg(&audio)
        .arg("--group")
        .arg("g1")
        .arg("--reference")
        .arg(&reference)
        .arg("--mock")
        .assert()
        .success()
        .stdout(predicate::str::contains("3/3"))
        .stdout(predicate::str::contains("Literacy score: 6.00"));
}

#[test]
fn batch_unknown_group_fails() {
    let dir = TempDir::new().unwrap();
    let audio = write_audio(dir.path(), "g.pcm", 4000);

    isolated(&dir)
        .arg("batch")
        .arg("--audio")
        .arg(&audio)
        .arg("--group")
        .arg("missing")
        .arg("--mock")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown literacy group: missing"));
}

#[test]
fn fluency_with_mock() {
    let dir = TempDir::new().unwrap();
    let recordings = dir.path().join("rec");
    std::fs::create_dir_all(&recordings).unwrap();
    write_audio(&recordings, "round1-row1.pcm", 4000);
    write_audio(&recordings, "round2-row1.pcm", 4000);
    let out = dir.path().join("out");

    isolated(&dir)
        .arg("fluency")
        .arg("--recordings")
        .arg(&recordings)
        .arg("--output")
        .arg(&out)
        .arg("--mock")
        .assert()
        .success()
        .stdout(predicate::str::contains("Round 1 correct: 10"))
        .stdout(predicate::str::contains("Round 2 correct: 10"))
        .stdout(predicate::str::contains("Average: 10.0"))
        .stdout(predicate::str::contains("recordings 2 | evaluated 2 | failed 0"));

    let mut names: Vec<String> = std::fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("fluency-"));
    assert!(names[1].starts_with("rows-"));
}

#[test]
fn fluency_empty_directory_fails() {
    let dir = TempDir::new().unwrap();

    isolated(&dir)
        .arg("fluency")
        .arg("--recordings")
        .arg(dir.path())
        .arg("--mock")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no round<R>-row<N> recordings"));
}

#[test]
fn fluency_keeps_wav_sample_rate() {
    let dir = TempDir::new().unwrap();
    let recordings = dir.path().join("rec");
    std::fs::create_dir_all(&recordings).unwrap();
    write_wav(&recordings, "round1-row1.wav", 8_000, 2_000);
    write_audio(&recordings, "round2-row1.pcm", 4000);
    let out = dir.path().join("out");

    isolated(&dir)
        .arg("fluency")
        .arg("--recordings")
        .arg(&recordings)
        .arg("--output")
        .arg(&out)
        .arg("--mock")
        .assert()
        .success();

    let rows = std::fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.file_name().unwrap().to_string_lossy().starts_with("rows-"))
        .unwrap();
    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(rows).unwrap()).unwrap();
    let rates: Vec<u64> = report["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["request"]["sample_rate"].as_u64().unwrap())
        .collect();
    assert_eq!(rates, [8_000, 16_000]);
}

#[test]
fn batch_accepts_wav_at_other_rate() {
    let dir = TempDir::new().unwrap();
    let audio = write_wav(dir.path(), "batch.wav", 8_000, 2_000);

    isolated(&dir)
        .arg("batch")
        .arg("--audio")
        .arg(&audio)
        .arg("--characters")
        .arg("人,口")
        .arg("--mock")
        .assert()
        .success()
        .stdout(predicate::str::contains("yes"));
}
