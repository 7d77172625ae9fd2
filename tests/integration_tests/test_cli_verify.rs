// integration tests for the verify command

use crate::common::*;

const BROKEN_FORM: &str = r#"{ containers: [{ id: "c", fields: [
    { name: "method" },
    { name: "b", conditional_logic: { rules: [
        { field: "metod", value: "x" },
        { field: "method", compare: "in", value: ["x"] },
    ] } },
] }] }"#;

#[test]
fn test_verify_clean_form_text() {
    let env = TestEnv::new();
    let form = env.write_form("form.json5", CHECKOUT_FORM);

    let output = env.run(&["--no-json", "verify", form.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("✓"));
    assert!(text.contains("6 field(s), 2 with conditional logic"));
}

#[test]
fn test_verify_clean_form_json() {
    let env = TestEnv::new();
    let form = env.write_form("form.json5", CHECKOUT_FORM);

    let output = env.run(&["--json", "verify", form.to_str().unwrap()]);
    assert!(output.status.success());

    let json = json_stdout(&output);
    assert_eq!(json["result"]["fields"], 6);
    assert_eq!(json["result"]["conditional"], 2);
    assert_eq!(json["result"]["errors"], 0);
}

#[test]
fn test_verify_reports_problems() {
    let env = TestEnv::new();
    let form = env.write_form("broken.json5", BROKEN_FORM);

    let output = env.run(&["--no-json", "verify", form.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(5));

    let err = stderr(&output);
    assert!(err.contains("2 error(s)"));
    assert!(err.contains("c.b: error: rules[0].field"));
    assert!(err.contains("did you mean 'method'"));
    assert!(err.contains("rules[1].compare"));
    assert!(err.contains("did you mean 'IN'"));
}

#[test]
fn test_verify_problems_as_jsonrpc_error() {
    let env = TestEnv::new();
    let form = env.write_form("broken.json5", BROKEN_FORM);

    let output = env.run(&["--json", "verify", form.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(5));

    let json = json_stdout(&output);
    assert_eq!(json["error"]["code"], -32005);
    let problems = json["error"]["data"]["problems"].as_array().unwrap();
    assert_eq!(problems.len(), 2);
    assert_eq!(problems[0]["field_id"], "c.b");
    assert_eq!(problems[0]["severity"], "error");
    assert_eq!(problems[0]["path"], "rules[0].field");
}

#[test]
fn test_verify_warnings_pass_unless_strict() {
    let env = TestEnv::new();
    let form = env.write_form(
        "warn.json5",
        r#"{ containers: [{ id: "c", fields: [
            { name: "a" },
            { name: "b", conditional_logic: { relation: "OR", rules: [] } },
        ] }] }"#,
    );

    let output = env.run(&["--no-json", "verify", form.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("always hidden"));

    let output = env.run(&["--no-json", "verify", "--strict", form.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_verify_form_parse_error() {
    let env = TestEnv::new();
    let form = env.write_form(
        "bad.json5",
        r#"{ containers: [{ id: "c", fields: [{ name: "b", conditional_logic: { relaton: "AND" } }] }] }"#,
    );

    let output = env.run(&["--no-json", "verify", form.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(3));

    let err = stderr(&output);
    assert!(err.contains("containers[0].fields[0].conditional_logic.relaton"));
    assert!(err.contains("relation"));
}

#[test]
fn test_verify_quiet() {
    let env = TestEnv::new();
    let form = env.write_form("form.json5", CHECKOUT_FORM);

    let output = env.run(&["--quiet", "verify", form.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_deps_lists_dependencies() {
    let env = TestEnv::new();
    let form = env.write_form("form.json5", CHECKOUT_FORM);

    let output = env.run(&["--json", "deps", form.to_str().unwrap()]);
    assert!(output.status.success());

    let json = json_stdout(&output);
    let deps = &json["result"]["dependencies"];
    assert_eq!(deps["shipping.address"], serde_json::json!(["method"]));
    assert_eq!(deps["billing.invoice"], serde_json::json!(["method", "total"]));
    assert!(deps.get("shipping.method").is_none());
}
