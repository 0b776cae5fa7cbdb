//! `sc scan` command implementation.

use std::path::PathBuf;

use clap::{ArgAction, Args};
use sc_engine::{DirectiveMatch, matcher};

use super::read_input;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the scan command.
#[derive(Args)]
pub(crate) struct ScanArgs {
    /// Input file (default: stdin).
    input: Option<PathBuf>,

    /// Enable verbose output (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub(crate) verbose: u8,
}

impl ScanArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let input = read_input(self.input.as_deref())?;

        let matches = matcher::scan(&input);
        if matches.is_empty() {
            output.info("No directives found");
            return Ok(());
        }

        output.data(&render(&matches))?;
        for m in &matches {
            if let Some(warning) = m.bracket_warning() {
                output.warning(&format!(
                    "Value of {} contains {} '[' and {} ']'",
                    m.name, warning.open, warning.close
                ));
            }
        }
        output.info(&format!("{} directive(s)", matches.len()));
        Ok(())
    }
}

/// One `name<TAB>value` line per directive, newlines in values escaped.
fn render(matches: &[DirectiveMatch]) -> String {
    matches
        .iter()
        .map(|m| format!("{}\t{}\n", m.name, m.value.replace('\n', "\\n")))
        .collect()
}
