use serde::Serialize;

/// Print the structured form of a response.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render either the table or the structured document, per the `--json`
/// flag.
pub fn emit<T: Serialize>(json: bool, value: &T, table: prettytable::Table) -> anyhow::Result<()> {
    if json {
        print_json(value)
    } else {
        table.printstd();
        Ok(())
    }
}
