use std::io::Write;

use serde::Serialize;

use crate::error::CliError;

/// Writes `value` to stdout as one JSON document.
pub fn render<T: Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write_json(&mut handle, value, pretty)
}

pub fn write_json<W, T>(writer: &mut W, value: &T, pretty: bool) -> Result<(), CliError>
where
    W: Write,
    T: Serialize,
{
    if pretty {
        serde_json::to_writer_pretty(&mut *writer, value)?;
    } else {
        serde_json::to_writer(&mut *writer, value)?;
    }
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
