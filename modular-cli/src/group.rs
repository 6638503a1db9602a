use clap::{Args, Subcommand};
use prettytable::{format, row, Table};
use serde_json::json;

use crate::{admin::Admin, output};

#[derive(Args, Debug)]
pub struct Group {
    #[clap(subcommand)]
    subcommand: GroupSubcommands,
}

#[derive(Subcommand, Debug)]
pub enum GroupSubcommands {
    #[command(about = "add a new group")]
    Add {
        #[arg(long)]
        group_name: String,
        #[arg(long = "policy", help = "policy to attach, repeatable")]
        policies: Vec<String>,
    },
    #[command(about = "attach policies to a group")]
    AddPolicy {
        #[arg(long)]
        group_name: String,
        #[arg(long = "policy", required = true)]
        policies: Vec<String>,
    },
    #[command(about = "detach policies from a group")]
    DeletePolicy {
        #[arg(long)]
        group_name: String,
        #[arg(long = "policy", required = true)]
        policies: Vec<String>,
    },
    #[command(about = "describe one group or all of them")]
    Describe {
        #[arg(long)]
        group_name: Option<String>,
    },
    #[command(about = "delete a group; members lose its permissions immediately")]
    Delete {
        #[arg(long)]
        group_name: String,
    },
}

impl Group {
    pub async fn handle(self, json: bool) -> anyhow::Result<()> {
        let admin = Admin::connect().await?;
        match self.subcommand {
            GroupSubcommands::Add {
                group_name,
                policies,
            } => {
                let group = admin.groups.create(&group_name, policies).await?;
                admin
                    .log("group", "add", json!({ "group_name": group_name }))
                    .await;
                output::print_json(&group)
            }
            GroupSubcommands::AddPolicy {
                group_name,
                policies,
            } => {
                let group = admin.groups.add_policies(&group_name, policies).await?;
                admin
                    .log("group", "add_policy", json!({ "group_name": group_name }))
                    .await;
                output::print_json(&group)
            }
            GroupSubcommands::DeletePolicy {
                group_name,
                policies,
            } => {
                let group = admin.groups.remove_policies(&group_name, &policies).await?;
                admin
                    .log("group", "delete_policy", json!({ "group_name": group_name }))
                    .await;
                output::print_json(&group)
            }
            GroupSubcommands::Describe { group_name } => {
                let groups = match group_name {
                    Some(name) => match admin.groups.lookup(&name).await? {
                        Some(group) => vec![group],
                        None => anyhow::bail!("Group `{name}` not found"),
                    },
                    None => admin.groups.list().await?,
                };
                let views = groups
                    .into_iter()
                    .map(|(group, consistency)| modular_types::methods::group::GroupView {
                        group,
                        consistency,
                    })
                    .collect::<Vec<_>>();

                let mut table = Table::new();
                table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
                table.set_titles(row!["Group", "State", "Policies", "Consistency"]);
                for view in &views {
                    table.add_row(row![
                        view.group.group_name,
                        view.group.state,
                        view.group.policies.join(", "),
                        view.consistency
                    ]);
                }
                output::emit(json, &views, table)
            }
            GroupSubcommands::Delete { group_name } => {
                admin.groups.delete(&group_name).await?;
                admin
                    .log("group", "delete", json!({ "group_name": group_name }))
                    .await;
                println!("Group `{group_name}` deleted");
                Ok(())
            }
        }
    }
}
