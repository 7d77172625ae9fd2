// integration tests for the eval command

use crate::common::*;

#[test]
fn test_eval_initial_visibility_json() {
    let env = TestEnv::new();
    let form = env.write_form("form.json5", CHECKOUT_FORM);

    let output = env.run(&["--json", "eval", form.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json = json_stdout(&output);
    assert_eq!(json["jsonrpc"], "2.0");
    let visibility = &json["result"]["visibility"];

    assert_eq!(visibility["shipping.address"], false);
    assert_eq!(visibility["billing.invoice"], false);
    // fields without conditional logic are always visible
    assert_eq!(visibility["shipping.method"], true);
    assert_eq!(visibility["shipping.notes"], true);
}

#[test]
fn test_eval_with_updates() {
    let env = TestEnv::new();
    let form = env.write_form("form.json5", CHECKOUT_FORM);

    let output = env.run(&[
        "--json",
        "eval",
        form.to_str().unwrap(),
        "--set",
        "shipping.method=delivery",
        "--set",
        "billing.total=150",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json = json_stdout(&output);
    assert_eq!(json["result"]["visibility"]["shipping.address"], true);
    assert_eq!(json["result"]["visibility"]["billing.invoice"], true);
}

#[test]
fn test_eval_list_value_update() {
    let env = TestEnv::new();
    let form = env.write_form("form.json5", CHECKOUT_FORM);

    let output = env.run(&[
        "--json",
        "eval",
        form.to_str().unwrap(),
        "--set",
        "billing.method=transfer",
    ]);
    assert!(output.status.success());
    assert_eq!(
        json_stdout(&output)["result"]["visibility"]["billing.invoice"],
        true
    );
}

#[test]
fn test_eval_text_output() {
    let env = TestEnv::new();
    let form = env.write_form("form.json5", CHECKOUT_FORM);

    let output = env.run(&["--no-json", "eval", form.to_str().unwrap()]);
    assert!(output.status.success());

    let text = stdout(&output);
    let address = text
        .lines()
        .find(|l| l.starts_with("shipping.address"))
        .expect("address line");
    assert!(address.ends_with("hidden"));
    assert!(text.lines().any(|l| l.starts_with("shipping.method") && l.ends_with("visible")));
}

#[test]
fn test_eval_unknown_field_suggests() {
    let env = TestEnv::new();
    let form = env.write_form("form.json5", CHECKOUT_FORM);

    let output = env.run(&[
        "--json",
        "eval",
        form.to_str().unwrap(),
        "--set",
        "shipping.metod=delivery",
    ]);
    assert_eq!(output.status.code(), Some(2));

    let json = json_stdout(&output);
    assert_eq!(json["error"]["code"], -32002);
    let suggestions = json["error"]["data"]["suggestions"].as_array().unwrap();
    assert!(suggestions.iter().any(|s| s == "shipping.method"));
}

#[test]
fn test_eval_invalid_assignment() {
    let env = TestEnv::new();
    let form = env.write_form("form.json5", CHECKOUT_FORM);

    let output = env.run(&["--no-json", "eval", form.to_str().unwrap(), "--set", "nothing"]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("expected FIELD=VALUE"));
}

#[test]
fn test_eval_reports_diagnostics() {
    let env = TestEnv::new();
    let form = env.write_form(
        "broken.json5",
        r#"{ containers: [{ id: "c", fields: [
            { name: "a", value: "x" },
            { name: "b", conditional_logic: { relation: "OR", rules: [
                { field: "missing", value: "x" },
                { field: "a", value: "x" },
            ] } },
        ] }] }"#,
    );

    let output = env.run(&["--json", "eval", form.to_str().unwrap()]);
    assert!(output.status.success());

    let json = json_stdout(&output);
    // rule_false: the unresolved rule counts as false, the other rule still holds
    assert_eq!(json["result"]["visibility"]["c.b"], true);
    let diagnostics = json["result"]["diagnostics"].as_array().unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["field_id"], "c.b");
}

#[test]
fn test_eval_fail_policy_uses_fallback() {
    let env = TestEnv::new();
    env.write_config(&serde_json::json!({
        "error_policy": "fail",
        "fallback_visibility": false,
    }));
    let form = env.write_form(
        "broken.json5",
        r#"{ containers: [{ id: "c", fields: [
            { name: "a", value: "x" },
            { name: "b", conditional_logic: [{ field: "a", compare: "LIKE", value: "x" }] },
        ] }] }"#,
    );

    let output = env.run(&["--json", "eval", form.to_str().unwrap()]);
    assert!(output.status.success());

    let json = json_stdout(&output);
    assert_eq!(json["result"]["visibility"]["c.b"], false);
    assert_eq!(json["result"]["diagnostics"][0]["fallback"]["is_visible"], false);
}

#[test]
fn test_eval_missing_form() {
    let env = TestEnv::new();
    let missing = env.path().join("missing.json5");

    let output = env.run(&["--json", "eval", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(json_stdout(&output)["error"]["code"], -32003);
}
