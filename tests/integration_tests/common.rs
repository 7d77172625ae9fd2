// shared utilities for integration tests

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// two containers; each has a plain "method" field and one conditional field
pub const CHECKOUT_FORM: &str = r#"{
    // checkout form used across the CLI tests
    title: "checkout",
    containers: [
        {
            id: "shipping",
            fields: [
                { name: "method", value: "pickup" },
                {
                    name: "address",
                    conditional_logic: {
                        relation: "AND",
                        rules: [{ field: "method", compare: "=", value: "delivery" }],
                    },
                },
                { name: "notes" },
            ],
        },
        {
            id: "billing",
            fields: [
                { name: "method", value: "card" },
                { name: "total", value: 40 },
                {
                    name: "invoice",
                    conditional_logic: {
                        relation: "OR",
                        rules: [
                            { field: "method", compare: "IN", value: ["invoice", "transfer"] },
                            { field: "total", compare: ">=", value: "100" },
                        ],
                    },
                },
            ],
        },
    ],
}"#;

/// a scratch directory holding a form and a config file
pub struct TestEnv {
    pub dir: tempfile::TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let env = Self {
            dir: tempfile::tempdir().expect("Failed to create test directory"),
        };
        // pin the error policy so results do not depend on the build profile
        env.write_config(&serde_json::json!({ "error_policy": "rule_false" }));
        env
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("config.json")
    }

    pub fn write_config(&self, config: &serde_json::Value) {
        fs::write(
            self.config_path(),
            serde_json::to_string_pretty(config).unwrap(),
        )
        .expect("Failed to write test config");
    }

    pub fn write_form(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, content).expect("Failed to write form");
        path
    }

    /// run fieldlogic with this environment's config
    pub fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("Failed to run fieldlogic")
    }

    /// run fieldlogic feeding `input` on stdin
    pub fn run_with_stdin(&self, args: &[&str], input: &str) -> Output {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn fieldlogic");

        child
            .stdin
            .take()
            .expect("stdin is piped")
            .write_all(input.as_bytes())
            .expect("Failed to write stdin");

        child.wait_with_output().expect("Failed to wait for fieldlogic")
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(binary_path());
        cmd.arg("--config").arg(self.config_path());
        cmd.args(args);
        cmd.env_remove("FIELDLOGIC_CONFIG");
        cmd.env_remove("FIELDLOGIC_LOG");
        cmd
    }
}

/// path to the fieldlogic binary built for this test run
pub fn binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fieldlogic"))
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// parse stdout as a single JSON document
pub fn json_stdout(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!("stdout is not JSON ({}): {}", e, stdout(output));
    })
}
