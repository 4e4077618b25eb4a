use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::ScrapeOutcome;
use crate::CoreError;

const HEADER: [&str; 4] = ["coin", "description", "category", "price"];

/// Write outcomes as CSV to `path`, replacing any existing file.
///
/// Returns the number of data rows written.
pub fn write_outcomes_csv(path: &Path, outcomes: &[ScrapeOutcome]) -> Result<usize, CoreError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    let rows = write_outcomes(&mut writer, outcomes)?;
    writer.flush()?;
    Ok(rows)
}

/// The price column carries the scraped text, not the normalized number.
pub fn write_outcomes<W: Write>(writer: &mut W, outcomes: &[ScrapeOutcome]) -> std::io::Result<usize> {
    write_row(writer, &HEADER)?;
    for outcome in outcomes {
        write_row(
            writer,
            &[
                outcome.coin.as_str(),
                outcome.description.as_str(),
                outcome.category.as_str(),
                outcome.price_text.as_str(),
            ],
        )?;
    }
    Ok(outcomes.len())
}

fn write_row<W: Write>(writer: &mut W, fields: &[&str]) -> std::io::Result<()> {
    let line = fields
        .iter()
        .map(|field| escape_field(field))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(writer, "{line}")
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_fields_with_delimiters() {
        let outcome = ScrapeOutcome {
            coin: String::from("bitcoin"),
            description: String::from("Bitcoin, the \"original\" coin"),
            category: String::from("Layer 1"),
            price_text: String::from("$64,321.10"),
        };
        let mut buffer = Vec::new();

        let rows = write_outcomes(&mut buffer, &[outcome]).expect("write");

        assert_eq!(rows, 1);
        assert_eq!(
            String::from_utf8(buffer).expect("utf-8"),
            "coin,description,category,price\n\
             bitcoin,\"Bitcoin, the \"\"original\"\" coin\",Layer 1,\"$64,321.10\"\n"
        );
    }

    #[test]
    fn sentinel_rows_are_written_verbatim() {
        let mut buffer = Vec::new();

        write_outcomes(&mut buffer, &[ScrapeOutcome::unavailable("tron")]).expect("write");

        let text = String::from_utf8(buffer).expect("utf-8");
        assert!(text.ends_with("tron,N/A,N/A,N/A\n"));
    }
}
