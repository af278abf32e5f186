use serde::Serialize;
use tkpattern_codec::{encode, PatternStep, PatternSummary};

use crate::cmd::EncodeArgs;
use crate::exit::{encoding_error, CliResult, SUCCESS};
use crate::output::{print_report, OutputFormat, Report};

#[derive(Serialize)]
struct EncodeOutput {
    input: String,
    #[serde(flatten)]
    summary: PatternSummary,
    packed: String,
}

impl Report for EncodeOutput {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("input", format!("{:?}", self.input)),
            ("normalized", format!("{:?}", self.summary.normalized)),
            ("steps", self.summary.step_count.to_string()),
            ("packed", self.packed.clone()),
        ]
    }

    fn steps(&self) -> Option<(&str, &[PatternStep])> {
        Some((&self.summary.normalized, &self.summary.steps))
    }
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let pattern = encode(&args.pattern).map_err(encoding_error)?;
    let out = EncodeOutput {
        input: args.pattern,
        summary: PatternSummary::from(&pattern),
        packed: hex::encode(pattern.as_bytes()),
    };
    print_report(&out, format);
    Ok(SUCCESS)
}
