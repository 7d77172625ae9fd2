// integration tests for the watch command

use crate::common::*;

/// parse every stdout line as a JSON-RPC notification
fn notifications(output: &std::process::Output) -> Vec<serde_json::Value> {
    stdout(output)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("notification is JSON"))
        .collect()
}

/// visibility states published for one field, in order
fn states_of(notes: &[serde_json::Value], field_id: &str) -> Vec<bool> {
    notes
        .iter()
        .filter(|n| n["method"] == "visibility" && n["params"]["field_id"] == field_id)
        .map(|n| n["params"]["is_visible"].as_bool().unwrap())
        .collect()
}

#[test]
fn test_watch_initial_states_without_input() {
    let env = TestEnv::new();
    let form = env.write_form("form.json5", CHECKOUT_FORM);

    let output = env.run_with_stdin(&["watch", form.to_str().unwrap()], "");
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let notes = notifications(&output);
    assert_eq!(notes.len(), 2);
    assert!(notes.iter().all(|n| n["jsonrpc"] == "2.0"));
    assert_eq!(states_of(&notes, "shipping.address"), vec![false]);
    assert_eq!(states_of(&notes, "billing.invoice"), vec![false]);
}

#[test]
fn test_watch_update_publishes_new_state() {
    let env = TestEnv::new();
    let form = env.write_form("form.json5", CHECKOUT_FORM);

    let input = concat!(
        r#"{"field": "shipping.method", "value": "delivery"}"#,
        "\n",
        r#"{"field": "billing.total", "value": 250}"#,
        "\n",
    );
    let output = env.run_with_stdin(&["watch", form.to_str().unwrap()], input);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let notes = notifications(&output);
    assert_eq!(states_of(&notes, "shipping.address"), vec![false, true]);
    assert_eq!(states_of(&notes, "billing.invoice"), vec![false, true]);
}

#[test]
fn test_watch_ignores_unset_values() {
    let env = TestEnv::new();
    let form = env.write_form("form.json5", CHECKOUT_FORM);

    let input = concat!(r#"{"field": "shipping.method"}"#, "\n");
    let output = env.run_with_stdin(&["watch", form.to_str().unwrap()], input);
    assert!(output.status.success());

    let notes = notifications(&output);
    assert_eq!(states_of(&notes, "shipping.address"), vec![false]);
}

#[test]
fn test_watch_teardown_stops_container() {
    let env = TestEnv::new();
    let form = env.write_form("form.json5", CHECKOUT_FORM);

    let input = concat!(
        r#"{"teardown": "shipping"}"#,
        "\n",
        r#"{"field": "shipping.method", "value": "delivery"}"#,
        "\n",
        r#"{"field": "billing.method", "value": "invoice"}"#,
        "\n",
    );
    let output = env.run_with_stdin(&["watch", form.to_str().unwrap()], input);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let notes = notifications(&output);
    assert_eq!(states_of(&notes, "shipping.address"), vec![false]);
    assert_eq!(states_of(&notes, "billing.invoice"), vec![false, true]);
}

#[test]
fn test_watch_reports_bad_lines_and_continues() {
    let env = TestEnv::new();
    let form = env.write_form("form.json5", CHECKOUT_FORM);

    let input = concat!(
        "not json\n",
        r#"{"field": "shiping.method", "value": "delivery"}"#,
        "\n",
        r#"{"teardown": "nowhere"}"#,
        "\n",
        r#"{"field": "shipping.method", "value": "delivery"}"#,
        "\n",
    );
    let output = env.run_with_stdin(&["watch", form.to_str().unwrap()], input);
    assert!(output.status.success());

    let err = stderr(&output);
    assert!(err.contains("line 1:"));
    assert!(err.contains("line 2: field 'shiping.method' not found"));
    assert!(err.contains("shipping.method"));
    assert!(err.contains("line 3: container 'nowhere' is not registered"));

    let notes = notifications(&output);
    assert_eq!(states_of(&notes, "shipping.address"), vec![false, true]);
}
