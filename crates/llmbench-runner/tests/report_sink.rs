use chrono::{Local, TimeZone};
use llmbench_core::{BenchmarkReport, PromptAggregate, RunResult};
use llmbench_runner::{JsonReportSink, ReportSink};

fn sample_report() -> BenchmarkReport {
    let mut report = BenchmarkReport::new();
    report.push(
        PromptAggregate::from_runs(
            "Hi.",
            vec![
                RunResult::new("Hi.", "Hello there", 2.0),
                RunResult::new("Hi.", "Hello", 1.0),
            ],
        )
        .unwrap(),
    );
    report
}

#[test]
fn writes_indented_json_named_after_model_and_time() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonReportSink::new(dir.path().join("results"));
    let captured_at = Local.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).single().unwrap();

    let path = sink
        .write(&sample_report(), "deepseek-r1:8b", captured_at)
        .unwrap();

    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "benchmark_results_deepseek-r1:8b_20250314_150926.json"
    );

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.starts_with("[\n  {\n    \"prompt\": \"Hi.\""));

    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let entry = &parsed[0];
    assert_eq!(entry["avg_duration"], 1.5);
    assert_eq!(entry["avg_tokens"], 1.5);
    assert_eq!(entry["runs"].as_array().unwrap().len(), 2);
    assert_eq!(entry["runs"][0]["response"], "Hello there");
}

#[test]
fn unwritable_destination_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();

    let sink = JsonReportSink::new(&blocker);
    let result = sink.write(&sample_report(), "m", Local::now());
    assert!(result.is_err());
}
