use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{self, EngineConfig};
use crate::engine::{InlineScheduler, RecordingPublisher, VisibilityState};
use crate::form::{FormDocument, FormError, MemoryHost};
use crate::logic::{dependencies_of, suggest, Value};

use super::exit_codes;
use super::output::{self, EvalData, OutputMode, VerifyData};
use super::watch;

#[derive(Parser)]
#[command(name = "fieldlogic")]
#[command(about = "Evaluate conditional field visibility for form documents")]
#[command(version)]
pub struct Cli {
    /// Path to config file (overrides FIELDLOGIC_CONFIG env var and default location)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (auto-enabled when stdout is piped)
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Force text output even when stdout is piped
    #[arg(long, global = true, conflicts_with = "json")]
    pub no_json: bool,

    /// Suppress all output on success (errors still go to stderr)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check every field's conditional logic against its siblings
    Verify {
        /// Form document (JSON or JSON5)
        form: PathBuf,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// Evaluate the visibility of every field
    Eval {
        /// Form document (JSON or JSON5)
        form: PathBuf,

        /// Update a field before reporting: field id or container.name, value as JSON or plain text
        #[arg(short, long = "set", value_name = "FIELD=VALUE", action = clap::ArgAction::Append)]
        set: Vec<String>,
    },

    /// Run the engine, reading updates from stdin and streaming visibility changes
    ///
    /// each input line is a JSON object: {"field": "<id>", "value": ...} updates a
    /// field (omit "value" to send an unset update), {"teardown": "<container>"}
    /// removes a container
    Watch {
        /// Form document (JSON or JSON5)
        form: PathBuf,
    },

    /// List the sibling fields each field's visibility depends on
    Deps {
        /// Form document (JSON or JSON5)
        form: PathBuf,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "error_policy")
        key: String,
        /// Value to set
        value: String,
    },
    /// Reset configuration to defaults
    Reset,
}

/// print an error in the selected format and exit with `code`
pub(super) fn exit_with(mode: OutputMode, code: i32, message: &str, suggestions: Vec<String>) -> ! {
    if mode.is_json() {
        output::print_json_error_with_suggestions(code, message, suggestions);
    } else {
        eprintln!("Error: {}", message);
        if !suggestions.is_empty() {
            eprintln!("Did you mean: {}", suggestions.join(", "));
        }
    }
    std::process::exit(code);
}

pub(super) fn load_form(path: &Path, mode: OutputMode) -> FormDocument {
    match FormDocument::load(path) {
        Ok(form) => form,
        Err(FormError::Invalid(e)) => {
            exit_with(mode, exit_codes::FORM_ERROR, &e.to_string(), e.suggestions.clone())
        }
        Err(e) => exit_with(mode, exit_codes::FORM_ERROR, &e.to_string(), Vec::new()),
    }
}

pub(super) fn load_config(path: Option<&Path>, mode: OutputMode) -> EngineConfig {
    match config::load_with_override(path) {
        Ok(config) => config,
        Err(e) => exit_with(mode, exit_codes::CONFIG_ERROR, &format!("{:#}", e), Vec::new()),
    }
}

/// resolve a field reference or exit with FIELD_NOT_FOUND and suggestions
pub(super) fn resolve_field(host: &MemoryHost, reference: &str, mode: OutputMode) -> String {
    match host.resolve(reference) {
        Some(id) => id,
        None => {
            let suggestions = suggest(reference, &host.field_ids());
            exit_with(
                mode,
                exit_codes::FIELD_NOT_FOUND,
                &format!("field '{}' not found", reference),
                suggestions,
            )
        }
    }
}

/// parse a FIELD=VALUE assignment; the value is JSON when it parses as such
pub fn parse_assignment(assignment: &str) -> Option<(String, Value)> {
    let (field, raw) = assignment.split_once('=')?;
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    Some((field.to_string(), parse_cli_value(raw)))
}

pub fn parse_cli_value(raw: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|json| Value::from_json(&json))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

pub fn execute(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    let output_mode = OutputMode::from_flags(cli.json, cli.no_json, cli.quiet);

    match cli.command {
        Commands::Verify { form: form_path, strict } => {
            let form = load_form(&form_path, output_mode);
            let problems = form.verify();
            let errors = problems.iter().filter(|p| p.problem.is_error()).count();
            let warnings = problems.len() - errors;
            let failed = errors > 0 || (strict && warnings > 0);
            let display = form_path.display().to_string();

            if output_mode.is_json() {
                if failed {
                    output::print_json_error_with_problems(
                        exit_codes::CONFIG_ERROR,
                        &format!("{} has {} error(s), {} warning(s)", display, errors, warnings),
                        problems,
                    );
                    std::process::exit(exit_codes::CONFIG_ERROR);
                }
                let data = VerifyData {
                    form: display,
                    fields: form.field_count(),
                    conditional: form.fields().filter(|f| f.conditional_logic.is_some()).count(),
                    errors,
                    warnings,
                    problems,
                };
                output::print_json(&data);
                return Ok(());
            }

            if failed {
                eprintln!(
                    "✗ {} has {} error(s), {} warning(s)",
                    display, errors, warnings
                );
                for problem in &problems {
                    eprintln!("  - {}", problem);
                }
                std::process::exit(exit_codes::CONFIG_ERROR);
            }

            if !output_mode.is_quiet() {
                println!(
                    "✓ {}: {} field(s), {} with conditional logic",
                    display,
                    form.field_count(),
                    form.fields().filter(|f| f.conditional_logic.is_some()).count()
                );
                for problem in &problems {
                    println!("  - {}", problem);
                }
            }
            Ok(())
        }

        Commands::Eval { form: form_path, set } => {
            let config = load_config(config_path, output_mode);
            let form = load_form(&form_path, output_mode);

            let mut updates = Vec::with_capacity(set.len());
            for assignment in &set {
                match parse_assignment(assignment) {
                    Some(update) => updates.push(update),
                    None => exit_with(
                        output_mode,
                        exit_codes::INVALID_ARGS,
                        &format!("invalid assignment '{}': expected FIELD=VALUE", assignment),
                        Vec::new(),
                    ),
                }
            }

            let host = Arc::new(MemoryHost::from_document(&form));
            let publisher = Arc::new(RecordingPublisher::new());
            let mut scheduler = InlineScheduler::new(host.clone(), publisher.clone(), config);

            for container in &form.containers {
                for (field_id, outcome) in
                    scheduler.register_container(&container.id, container.field_ids())
                {
                    outcome.with_context(|| format!("failed to set up field {}", field_id))?;
                }
            }

            for (reference, value) in updates {
                let field_id = resolve_field(&host, &reference, output_mode);
                host.set_value(&field_id, value.clone());
                scheduler.field_updated(&field_id, Some(value))?;
            }

            // fields without conditional logic are always visible
            let recorded = publisher.states();
            let states: BTreeMap<String, VisibilityState> = host
                .field_ids()
                .into_iter()
                .map(|id| {
                    let state = recorded.get(&id).copied().unwrap_or(VisibilityState::visible());
                    (id, state)
                })
                .collect();
            let diagnostics = publisher.diagnostics();

            if output_mode.is_json() {
                let data = EvalData::new(form_path.display().to_string(), states, diagnostics);
                output::print_json(&data);
            } else if !output_mode.is_quiet() {
                for diagnostic in &diagnostics {
                    for error in &diagnostic.errors {
                        eprintln!("warning: {}: {}", diagnostic.field_id, error);
                    }
                }
                let width = states.keys().map(|id| id.len()).max().unwrap_or(0);
                for (id, state) in &states {
                    let label = if state.is_visible { "visible" } else { "hidden" };
                    println!("{:width$}  {}", id, label, width = width);
                }
            }
            Ok(())
        }

        Commands::Watch { form: form_path } => {
            let config = load_config(config_path, output_mode);
            let form = load_form(&form_path, output_mode);
            watch::run(form, config)
        }

        Commands::Deps { form: form_path } => {
            let form = load_form(&form_path, output_mode);

            let deps: BTreeMap<String, Vec<String>> = form
                .fields()
                .filter_map(|f| {
                    f.conditional_logic
                        .as_ref()
                        .map(|logic| (f.id.clone(), dependencies_of(logic).into_iter().collect()))
                })
                .collect();

            if output_mode.is_json() {
                #[derive(Serialize)]
                struct DepsData {
                    dependencies: BTreeMap<String, Vec<String>>,
                }
                output::print_json(&DepsData { dependencies: deps });
            } else if !output_mode.is_quiet() {
                for (id, names) in &deps {
                    println!("{}: {}", id, names.join(", "));
                }
            }
            Ok(())
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let config = config::load_with_override(config_path)?;
                let json =
                    serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
                println!("{}", json);
                Ok(())
            }
            ConfigCommands::Path => {
                let path = config::get_config_path_with_override(config_path)?;
                println!("{}", path.display());
                Ok(())
            }
            ConfigCommands::Set { key, value } => {
                let mut config = config::load_with_override(config_path)?;
                if let Err(e) = config::set_value(&mut config, &key, &value) {
                    exit_with(output_mode, exit_codes::INVALID_ARGS, &e.to_string(), Vec::new());
                }
                config::save_with_override(&config, config_path)?;
                if !output_mode.is_quiet() {
                    println!("Set {} = {}", key, value);
                }
                Ok(())
            }
            ConfigCommands::Reset => {
                let config = EngineConfig::default();
                config::save_with_override(&config, config_path)?;
                if !output_mode.is_quiet() {
                    println!("Configuration reset to defaults");
                }
                Ok(())
            }
        },

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "fieldlogic", &mut std::io::stdout());
            Ok(())
        }
    }
}
