//! JSON rendering of command results to stdout.

use std::io::Write;

use serde::Serialize;
use serde_json::Value;

use crate::commands::CommandResult;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct Rendered<'a> {
    data: &'a Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: &'a Vec<String>,
}

pub fn render(result: &CommandResult, pretty: bool) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    write_json(&mut stdout, result, pretty)?;
    stdout.flush()?;
    Ok(())
}

fn write_json<W: Write>(writer: &mut W, result: &CommandResult, pretty: bool) -> Result<(), CliError> {
    let rendered = Rendered {
        data: &result.data,
        warnings: &result.warnings,
    };
    if pretty {
        serde_json::to_writer_pretty(&mut *writer, &rendered)?;
    } else {
        serde_json::to_writer(&mut *writer, &rendered)?;
    }
    writeln!(writer)?;
    Ok(())
}
