mod common;

use common::{run, run_with_env, run_with_stdin, stderr, stdout, write_file};

const GET_EXCHANGE: &str = r#"{
  "method": "GET",
  "url": "https://api.example.com/v1/books/42?page=2",
  "request_headers": {"X-Tenant": ["acme"]},
  "response_headers": {"Content-Type": ["application/json"]},
  "response_body": "{\"id\": 42, \"title\": \"Dune\"}",
  "status": 200
}"#;

// ============================================================================
// version / completions
// ============================================================================

#[test]
fn version_human() {
    let output = run(&["version"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).starts_with("apimock "));
}

#[test]
fn version_json() {
    let output = run(&["version", "--format", "json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("version JSON should be valid");
    assert_eq!(parsed["name"], "apimock");
    assert!(parsed.get("version").is_some());
}

#[test]
fn completions_bash() {
    let output = run(&["completions", "bash"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("apimock"));
}

#[test]
fn unknown_subcommand_fails() {
    let output = run(&["serve"]);
    assert!(!output.status.success());
}

// ============================================================================
// normalize
// ============================================================================

#[test]
fn normalize_from_stdin_yaml() {
    let output = run_with_stdin(&["normalize", "--exchange", "-"], GET_EXCHANGE);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.starts_with("---\n"));
    assert!(text.contains("path: /v1/books/42"));
    assert!(text.contains("NthRequest 1"));
    assert!(text.contains("name: recorded-v1_books_42-200-"));
}

#[test]
fn normalize_array_as_json() {
    let input = format!("[{GET_EXCHANGE}, {GET_EXCHANGE}]");
    let output = run_with_stdin(&["normalize", "-e", "-", "--format", "json"], &input);
    assert!(output.status.success(), "{}", stderr(&output));
    let scenarios: Vec<serde_json::Value> = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(scenarios.len(), 2);
    assert_eq!(scenarios[0]["name"], scenarios[1]["name"]);
    assert_eq!(scenarios[0]["group"], "v1_books_42");
}

#[test]
fn normalize_without_url_exits_with_validation_code() {
    let output = run_with_stdin(&["normalize", "-e", "-"], r#"{"method": "GET"}"#);
    assert_eq!(output.status.code(), Some(5));
    assert!(stderr(&output).contains("no URL"));
}

#[test]
fn normalize_env_override_adds_header_assertion() {
    let dir = tempfile::tempdir().unwrap();
    let exchange = write_file(dir.path(), "exchange.json", GET_EXCHANGE);
    let output = run_with_env(
        &["normalize", "-e", exchange.to_str().unwrap(), "-f", "json"],
        &[("APIMOCK_ASSERT_HEADERS_PATTERN", "tenant")],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    let scenarios: Vec<serde_json::Value> = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(
        scenarios[0]["request"]["assert_headers_pattern"]["X-Tenant"],
        "acme"
    );
}

#[test]
fn normalize_bad_config_exits_with_config_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_file(dir.path(), "config.yaml", "assert_headers_pattern: \"(\"\n");
    let exchange = write_file(dir.path(), "exchange.json", GET_EXCHANGE);
    let output = run(&[
        "normalize",
        "-e",
        exchange.to_str().unwrap(),
        "-c",
        config.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2), "{}", stderr(&output));
}

// ============================================================================
// match
// ============================================================================

fn recorded_scenarios(dir: &std::path::Path, env: &[(&str, &str)]) -> std::path::PathBuf {
    let exchange = write_file(dir, "exchange.json", GET_EXCHANGE);
    let output = run_with_env(&["normalize", "-e", exchange.to_str().unwrap()], env);
    assert!(output.status.success(), "{}", stderr(&output));
    write_file(dir, "recorded.yaml", &stdout(&output))
}

#[test]
fn match_recorded_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let scenarios = recorded_scenarios(dir.path(), &[]);
    let output = run(&[
        "match",
        "-s",
        scenarios.to_str().unwrap(),
        "-p",
        "/v1/books/42",
        "--format",
        "json",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert!(
        report["matched"]
            .as_str()
            .unwrap()
            .starts_with("recorded-v1_books_42-200-")
    );
}

#[test]
fn match_wrong_method_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let scenarios = recorded_scenarios(dir.path(), &[]);
    let output = run(&[
        "match",
        "-s",
        scenarios.to_str().unwrap(),
        "-m",
        "DELETE",
        "-p",
        "/v1/books/42",
    ]);
    assert_eq!(output.status.code(), Some(4), "{}", stderr(&output));
    assert!(stdout(&output).contains("[not_found]"));
}

#[test]
fn match_missing_asserted_header_is_validation() {
    let dir = tempfile::tempdir().unwrap();
    let scenarios = recorded_scenarios(dir.path(), &[("APIMOCK_ASSERT_HEADERS_PATTERN", "tenant")]);
    let path = scenarios.to_str().unwrap();

    let output = run(&["match", "-s", path, "-p", "/v1/books/42"]);
    assert_eq!(output.status.code(), Some(5), "{}", stderr(&output));
    assert!(stderr(&output).contains("X-Tenant"));

    let output = run(&[
        "match",
        "-s",
        path,
        "-p",
        "/v1/books/42",
        "--header",
        "X-Tenant=acme",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
}

#[test]
fn match_template_extracts_variables_via_glob() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "books.yaml",
        "method: GET\nname: get-book\npath: \"/v1/category/{cat}/books/{id}\"\nresponse:\n  status_code: 200\n",
    );
    write_file(
        dir.path(),
        "authors.yaml",
        "method: GET\nname: get-author\npath: \"/v1/authors/{id}\"\n",
    );
    let pattern = format!("{}/*.yaml", dir.path().display());
    let output = run(&["match", "-s", &pattern, "-p", "/v1/category/history/books/101"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("selected get-book"));
    assert!(text.contains("cat = history"));
    assert!(text.contains("id = 101"));
}

#[test]
fn match_predicate_selects_by_request_count() {
    let dir = tempfile::tempdir().unwrap();
    let scenarios = write_file(
        dir.path(),
        "login.yaml",
        r#"
- method: POST
  name: login-fails
  path: /login
  predicate: "{{NthRequest 2}}"
  response:
    status_code: 401
- method: POST
  name: login-ok
  path: /login
  predicate: "{{NthRequest 1}}"
  response:
    status_code: 200
"#,
    );
    let path = scenarios.to_str().unwrap();
    let first = run(&["match", "-s", path, "-m", "POST", "-p", "/login", "--request-count", "1"]);
    assert!(stdout(&first).contains("selected login-ok"), "{}", stdout(&first));
    let second = run(&["match", "-s", path, "-m", "POST", "-p", "/login", "--request-count", "2"]);
    assert!(stdout(&second).contains("selected login-fails"), "{}", stdout(&second));
}

#[test]
fn match_without_scenario_files_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = format!("{}/*.yaml", dir.path().display());
    let output = run(&["match", "-s", &pattern, "-p", "/"]);
    assert_eq!(output.status.code(), Some(64));
}

// ============================================================================
// chaos
// ============================================================================

const CHAOS_CONFIG: &str = r#"
groups:
  users:
    chaos_enabled: true
    mean_time_between_failure: 4
    max_additional_latency: 300ms
    http_errors: [503]
  books: {}
"#;

#[test]
fn chaos_samples_enabled_group() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_file(dir.path(), "config.yaml", CHAOS_CONFIG);
    let output = run(&[
        "chaos",
        "-c",
        config.to_str().unwrap(),
        "-g",
        "users",
        "-n",
        "500",
        "--seed",
        "7",
        "-f",
        "json",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let summary: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(summary["samples"], 500);
    assert!(summary["failures"]["503"].as_u64().unwrap() > 0);
    assert!(summary["max_latency_ms"].as_u64().unwrap() <= 300);
}

#[test]
fn chaos_seed_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_file(dir.path(), "config.yaml", CHAOS_CONFIG);
    let args = [
        "chaos",
        "-c",
        config.to_str().unwrap(),
        "-g",
        "users",
        "--seed",
        "11",
        "-f",
        "json",
    ];
    assert_eq!(stdout(&run(&args)), stdout(&run(&args)));
}

#[test]
fn chaos_unknown_group_suggests() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_file(dir.path(), "config.yaml", CHAOS_CONFIG);
    let output = run(&["chaos", "-c", config.to_str().unwrap(), "-g", "usres"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(stderr(&output).contains("Did you mean 'users'?"));
}

#[test]
fn chaos_metrics_are_rendered() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_file(dir.path(), "config.yaml", CHAOS_CONFIG);
    let output = run(&[
        "chaos",
        "-c",
        config.to_str().unwrap(),
        "-g",
        "users",
        "-n",
        "200",
        "--seed",
        "3",
        "--metrics",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("apimock_chaos_faults_total"));
}
