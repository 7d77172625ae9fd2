//! `watch`: run the async engine over stdin updates
//!
//! input is one JSON object per line, output one JSON-RPC notification per
//! publication. malformed input lines are reported on stderr and skipped.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::engine::{ChannelPublisher, Engine};
use crate::form::{FormDocument, MemoryHost};
use crate::logic::{parse_value, suggest, Value};

/// one stdin command
#[derive(Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WatchInput {
    Update {
        field: String,
        /// absent means the field was unset
        #[serde(default, deserialize_with = "present")]
        value: Option<JsonValue>,
    },
    Teardown {
        teardown: String,
    },
}

// distinguishes `"value": null` (present) from a missing key
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<JsonValue>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    JsonValue::deserialize(deserializer).map(Some)
}

pub fn parse_line(line: &str) -> Result<WatchInput> {
    serde_json::from_str(line).map_err(|_| {
        anyhow!(r#"expected {{"field": "<id>", "value": ...}} or {{"teardown": "<container>"}}"#)
    })
}

pub fn run(form: FormDocument, config: EngineConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(watch(form, config))
}

async fn watch(form: FormDocument, config: EngineConfig) -> Result<()> {
    let host = Arc::new(MemoryHost::from_document(&form));
    let (publisher, mut publications) = ChannelPublisher::new();
    let engine = Engine::new(host.clone(), Arc::new(publisher), config);

    let printer = tokio::spawn(async move {
        while let Some(publication) = publications.recv().await {
            println!("{}", publication.to_jsonrpc_notification());
        }
    });

    for container in &form.containers {
        for (field_id, outcome) in engine.register_container(&container.id, container.field_ids())? {
            outcome.with_context(|| format!("failed to set up field {}", field_id))?;
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let input = match parse_line(line) {
            Ok(input) => input,
            Err(e) => {
                eprintln!("line {}: {}", line_no, e);
                continue;
            }
        };

        match input {
            WatchInput::Update { field, value } => {
                let Some(field_id) = host.resolve(&field) else {
                    let suggestions = suggest(&field, &host.field_ids());
                    if suggestions.is_empty() {
                        eprintln!("line {}: field '{}' not found", line_no, field);
                    } else {
                        eprintln!(
                            "line {}: field '{}' not found (did you mean {}?)",
                            line_no,
                            field,
                            suggestions.join(", ")
                        );
                    }
                    continue;
                };

                let value: Option<Value> = match value {
                    Some(json) => match parse_value(&json, "value") {
                        Ok(v) => Some(v),
                        Err(e) => {
                            eprintln!("line {}: {}", line_no, e);
                            continue;
                        }
                    },
                    None => None,
                };

                if let Some(v) = &value {
                    host.set_value(&field_id, v.clone());
                }
                let delivered = engine.field_updated(&field_id, value)?;
                debug!(field = %field_id, delivered, "update applied");
            }
            WatchInput::Teardown { teardown } => {
                if !engine.is_registered(&teardown) {
                    warn!(container = %teardown, "teardown of unknown container");
                    eprintln!("line {}: container '{}' is not registered", line_no, teardown);
                    continue;
                }
                engine.teardown_container(&teardown);
            }
        }

        // let listeners drain before the next line
        tokio::task::yield_now().await;
    }

    // end of input: finish queued updates, then close the publication channel
    engine.drain().await;
    drop(engine);
    printer.await.context("publication printer failed")?;
    Ok(())
}
