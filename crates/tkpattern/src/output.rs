use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use tkpattern_codec::PatternStep;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// A command result that can be shown in every output format.
pub trait Report: Serialize {
    /// Field/value pairs for table and pretty output.
    fn fields(&self) -> Vec<(&'static str, String)>;

    /// Steps to list under the fields, if the report carries a pattern.
    fn steps(&self) -> Option<(&str, &[PatternStep])> {
        None
    }
}

pub fn print_report<R: Report>(report: &R, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in report.fields() {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");

            if let Some((symbols, steps)) = report.steps() {
                println!("{}", steps_table(symbols, steps));
            }
        }
        OutputFormat::Pretty => {
            let line = report
                .fields()
                .into_iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{line}");
        }
    }
}

fn steps_table(symbols: &str, steps: &[PatternStep]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "SYMBOL", "LED", "DURATION"]);
    for (i, (symbol, step)) in symbols.chars().zip(steps).enumerate() {
        table.add_row(vec![
            i.to_string(),
            format!("{symbol:?}"),
            if step.is_on() { "on" } else { "off" }.to_string(),
            step.duration.to_string(),
        ]);
    }
    table
}
