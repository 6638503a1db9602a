use chrono::{DateTime, Utc};
use clap::Args;
use modular_types::audit::AuditQuery;
use prettytable::{format, row, Table};

use crate::{admin::Admin, output};

#[derive(Args, Debug)]
pub struct Audit {
    #[arg(long, help = "RFC 3339 lower bound, e.g. 2026-08-01T00:00:00Z")]
    from_date: Option<DateTime<Utc>>,
    #[arg(long, help = "RFC 3339 upper bound")]
    to_date: Option<DateTime<Utc>>,
    #[arg(long, help = "filter by command group")]
    group: Option<String>,
    #[arg(long, help = "filter by command")]
    command: Option<String>,
    #[arg(long, help = "only records whose integrity check failed")]
    invalid_only: bool,
}

impl Audit {
    pub async fn handle(self, json: bool) -> anyhow::Result<()> {
        let admin = Admin::connect().await?;
        let records = admin
            .audit
            .query(&AuditQuery {
                from_date: self.from_date,
                to_date: self.to_date,
                group: self.group,
                command: self.command,
                invalid_only: self.invalid_only,
            })
            .await?;

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row!["Id", "Timestamp", "Group", "Command", "Result", "Consistency"]);
        for entry in &records {
            table.add_row(row![
                entry.id,
                entry.record.timestamp.to_rfc3339(),
                entry.record.group,
                entry.record.command,
                entry.record.result,
                entry.consistency
            ]);
        }
        output::emit(json, &records, table)
    }
}
