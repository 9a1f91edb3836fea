use std::io::Write;
use std::process::Command;

use serde_json::json;
use tempfile::NamedTempFile;

fn capture(lines: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(lines.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn topicgraph() -> Command {
    Command::new(env!("CARGO_BIN_EXE_topicgraph"))
}

#[test]
fn cli_replays_and_queries() {
    let file = capture(
        "# living room\nhome/livingroom/temperature 22.5\n\nhome/livingroom/light on\n",
    );
    let output = topicgraph()
        .arg("--replay")
        .arg(file.path())
        .arg("--query")
        .arg("{ home { livingroom { temperature light } } }")
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        body,
        json!({"data": {"home": {"livingroom": {"temperature": 22.5, "light": "on"}}}})
    );
}

#[test]
fn cli_prints_schema_by_default() {
    let file = capture("sensor/1/val 10\n");
    let output = topicgraph().arg("--replay").arg(file.path()).output().unwrap();

    assert!(output.status.success());
    let sdl = String::from_utf8(output.stdout).unwrap();
    assert!(sdl.starts_with("scalar JSON\n"));
    assert!(sdl.contains("type Root_sensor {"));
    assert!(sdl.contains("match(pattern: String!): [TopicResult!]"));
}

#[test]
fn cli_reports_invalid_query() {
    let output = topicgraph().arg("--query").arg("{ nope }").output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["data"], serde_json::Value::Null);
    assert_eq!(body["errors"][0]["message"], "Cannot query field 'nope' on type 'Query'");
}

#[test]
fn cli_fails_on_missing_capture() {
    let output = topicgraph()
        .arg("--replay")
        .arg("/definitely/not/here.txt")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to open capture"));
}
