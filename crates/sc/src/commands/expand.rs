//! `sc expand` command implementation.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args};
use sc_config::{CliSettings, Config};
use sc_engine::{Engine, EngineConfig, HandlerRegistry, Outcome};

use super::read_input;
use crate::error::CliError;
use crate::output::Output;
use crate::templates::TemplateRegistry;

/// Arguments for the expand command.
#[derive(Args)]
pub(crate) struct ExpandArgs {
    /// Input file (default: stdin).
    input: Option<PathBuf>,

    /// Write the result here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the engine state as JSON after the run.
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Handler name prefix (overrides config).
    #[arg(long)]
    prefix: Option<String>,

    /// Handler template directory (overrides config).
    #[arg(long, env = "SC_HANDLERS")]
    handlers: Option<PathBuf>,

    /// Maximum nesting level (overrides config).
    #[arg(long)]
    max_levels: Option<u32>,

    /// Do not wrap substituted output in level markers.
    #[arg(long)]
    no_wrap: bool,

    /// Path to configuration file (default: auto-discover sc.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub(crate) verbose: u8,
}

impl ExpandArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            prefix: self.prefix.clone(),
            handlers_dir: self.handlers.clone(),
            max_levels: self.max_levels,
            wrap_output: self.no_wrap.then_some(false),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let registry = TemplateRegistry::load(&config.handlers_resolved)?;
        if registry.is_empty() {
            output.warning(&format!(
                "No handler templates in {}",
                config.handlers_resolved.dir.display()
            ));
        }

        let input = read_input(self.input.as_deref())?;
        let mut engine = Engine::new(registry, engine_config(&config));
        let result = engine.run(input);

        // The state is dumped even when the run failed
        if let Some(path) = &self.dump {
            write_dump(&engine, path)?;
        }

        match result? {
            Outcome::Text(text) => self.write_result(&output, &text)?,
            Outcome::Halted(value) => {
                output.highlight("Expansion halted by handler");
                let json = serde_json::to_string_pretty(&value)?;
                self.write_result(&output, &format!("{json}\n"))?;
            }
        }

        report_diagnostics(&output, &engine);
        Ok(())
    }

    fn write_result(&self, output: &Output, text: &str) -> Result<(), CliError> {
        match &self.output {
            Some(path) => std::fs::write(path, text)?,
            None => output.data(text)?,
        }
        Ok(())
    }
}

fn engine_config(config: &Config) -> EngineConfig {
    EngineConfig::new()
        .with_prefix(config.engine.prefix.clone())
        .with_max_levels(Some(config.engine.max_levels))
        .with_value_preview_chars(config.engine.value_preview_chars)
        .with_wrap_output(config.engine.wrap_output)
}

fn write_dump<R: HandlerRegistry>(engine: &Engine<R>, path: &Path) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(&engine.snapshot())?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), "Wrote engine state");
    Ok(())
}

fn report_diagnostics<R: HandlerRegistry>(output: &Output, engine: &Engine<R>) {
    let undefined: BTreeSet<&str> = engine.undefined().iter().map(String::as_str).collect();
    for name in undefined {
        output.warning(&format!("No handler for directive {name}"));
    }
    for (name, warning) in engine.warnings() {
        output.warning(&format!(
            "Value of {name} contains {} '[' and {} ']'",
            warning.open, warning.close
        ));
    }
}
