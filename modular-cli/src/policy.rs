use clap::{Args, Subcommand};
use modular_types::policy::Statement;
use prettytable::{format, row, Table};
use serde_json::json;

use crate::{admin::Admin, output};

#[derive(Args, Debug)]
pub struct Policy {
    #[clap(subcommand)]
    subcommand: PolicySubcommands,
}

#[derive(Subcommand, Debug)]
pub enum PolicySubcommands {
    #[command(about = "add a new policy")]
    Add {
        #[arg(long, help = "name of the policy to create")]
        policy_name: String,
        #[arg(
            long,
            help = "JSON list of statements, inline or @path to a file"
        )]
        statements: String,
    },
    #[command(about = "replace the statements of a policy")]
    Update {
        #[arg(long)]
        policy_name: String,
        #[arg(long, help = "JSON list of statements, inline or @path to a file")]
        statements: String,
    },
    #[command(about = "describe one policy or all of them")]
    Describe {
        #[arg(long)]
        policy_name: Option<String>,
    },
    #[command(about = "delete a policy that no group references")]
    Delete {
        #[arg(long)]
        policy_name: String,
    },
}

fn parse_statements(raw: &str) -> anyhow::Result<Vec<Statement>> {
    let raw = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => raw.to_string(),
    };
    Ok(serde_json::from_str(&raw)?)
}

impl Policy {
    pub async fn handle(self, json: bool) -> anyhow::Result<()> {
        let admin = Admin::connect().await?;
        match self.subcommand {
            PolicySubcommands::Add {
                policy_name,
                statements,
            } => {
                let statements = parse_statements(&statements)?;
                let policy = admin.policies.create(&policy_name, statements).await?;
                admin
                    .log("policy", "add", json!({ "policy_name": policy_name }))
                    .await;
                output::print_json(&policy)
            }
            PolicySubcommands::Update {
                policy_name,
                statements,
            } => {
                let statements = parse_statements(&statements)?;
                let policy = admin.policies.update(&policy_name, statements).await?;
                admin
                    .log("policy", "update", json!({ "policy_name": policy_name }))
                    .await;
                output::print_json(&policy)
            }
            PolicySubcommands::Describe { policy_name } => {
                let policies = match policy_name {
                    Some(name) => match admin.policies.lookup(&name).await? {
                        Some(policy) => vec![policy],
                        None => anyhow::bail!("Policy `{name}` not found"),
                    },
                    None => admin.policies.list().await?,
                };
                let views = policies
                    .into_iter()
                    .map(|(policy, consistency)| {
                        modular_types::methods::policy::PolicyView { policy, consistency }
                    })
                    .collect::<Vec<_>>();

                let mut table = Table::new();
                table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
                table.set_titles(row!["Policy", "State", "Statements", "Consistency"]);
                for view in &views {
                    table.add_row(row![
                        view.policy.policy_name,
                        view.policy.state,
                        view.policy.statements.len(),
                        view.consistency
                    ]);
                }
                output::emit(json, &views, table)
            }
            PolicySubcommands::Delete { policy_name } => {
                admin.policies.delete(&policy_name).await?;
                admin
                    .log("policy", "delete", json!({ "policy_name": policy_name }))
                    .await;
                println!("Policy `{policy_name}` deleted");
                Ok(())
            }
        }
    }
}
