use clap::{Args, Subcommand};
use modular_types::methods::user::UserView;
use prettytable::{format, row, Table};
use serde_json::json;

use crate::{admin::Admin, output};

#[derive(Args, Debug)]
pub struct User {
    #[clap(subcommand)]
    subcommand: UserSubcommands,
}

#[derive(Subcommand, Debug)]
pub enum UserSubcommands {
    #[command(about = "add a new user; without --password one is generated and printed once")]
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: Option<String>,
        #[arg(long = "group", help = "group to join, repeatable")]
        groups: Vec<String>,
    },
    #[command(about = "delete a user permanently")]
    Delete {
        #[arg(long)]
        username: String,
    },
    #[command(about = "describe one user or all of them")]
    Describe {
        #[arg(long)]
        username: Option<String>,
    },
    #[command(about = "block a user and revoke every token")]
    Block {
        #[arg(long)]
        username: String,
        #[arg(long)]
        reason: Option<String>,
    },
    #[command(about = "unblock a user")]
    Unblock {
        #[arg(long)]
        username: String,
    },
    #[command(about = "change a user's password and revoke every token")]
    ChangePassword {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    #[command(about = "rename a user and revoke every token")]
    ChangeUsername {
        #[arg(long)]
        username: String,
        #[arg(long)]
        new_username: String,
    },
    #[command(about = "add a user to groups")]
    AddToGroup {
        #[arg(long)]
        username: String,
        #[arg(long = "group", required = true)]
        groups: Vec<String>,
    },
    #[command(about = "remove a user from groups")]
    RemoveFromGroup {
        #[arg(long)]
        username: String,
        #[arg(long = "group", required = true)]
        groups: Vec<String>,
    },
    #[command(about = "declare a meta attribute: allow-list and/or injected aux datum")]
    SetMetaAttribute {
        #[arg(long)]
        username: String,
        #[arg(long)]
        key: String,
        #[arg(long = "value", help = "allowed literal value, repeatable")]
        values: Vec<String>,
        #[arg(long, help = "JSON value injected into backend requests")]
        aux: Option<String>,
    },
    #[command(about = "replace an existing meta attribute")]
    UpdateMetaAttribute {
        #[arg(long)]
        username: String,
        #[arg(long)]
        key: String,
        #[arg(long = "value")]
        values: Vec<String>,
        #[arg(long)]
        aux: Option<String>,
    },
    #[command(about = "delete one meta attribute")]
    DeleteMetaAttribute {
        #[arg(long)]
        username: String,
        #[arg(long)]
        key: String,
    },
    #[command(about = "drop all meta attributes of a user")]
    ResetMeta {
        #[arg(long)]
        username: String,
    },
    #[command(about = "show the meta attributes of a user")]
    GetMeta {
        #[arg(long)]
        username: String,
    },
}

fn parse_aux(aux: Option<String>) -> anyhow::Result<Option<serde_json::Value>> {
    aux.map(|raw| serde_json::from_str(&raw).map_err(Into::into))
        .transpose()
}

impl User {
    #[allow(clippy::too_many_lines)]
    pub async fn handle(self, json: bool) -> anyhow::Result<()> {
        let admin = Admin::connect().await?;
        match self.subcommand {
            UserSubcommands::Add {
                username,
                password,
                groups,
            } => {
                let (user, generated) = admin.users.create(&username, password, groups).await?;
                admin.log("user", "add", json!({ "username": username })).await;
                if let Some(generated) = generated {
                    println!("Generated password: {generated}");
                }
                output::print_json(&UserView::new(
                    user,
                    modular_types::audit::ConsistencyStatus::Ok,
                ))
            }
            UserSubcommands::Delete { username } => {
                admin.users.delete(&username).await?;
                admin
                    .log("user", "delete", json!({ "username": username }))
                    .await;
                println!("User `{username}` deleted");
                Ok(())
            }
            UserSubcommands::Describe { username } => {
                let users = match username {
                    Some(name) => match admin.users.lookup(&name).await? {
                        Some(user) => vec![user],
                        None => anyhow::bail!("User `{name}` not found"),
                    },
                    None => admin.users.list().await?,
                };
                let views = users
                    .into_iter()
                    .map(|(user, consistency)| UserView::new(user, consistency))
                    .collect::<Vec<_>>();

                let mut table = Table::new();
                table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
                table.set_titles(row!["User", "State", "Groups", "Consistency"]);
                for view in &views {
                    table.add_row(row![
                        view.username,
                        view.state,
                        view.groups.join(", "),
                        view.consistency
                    ]);
                }
                output::emit(json, &views, table)
            }
            UserSubcommands::Block { username, reason } => {
                admin.users.block(&username, reason.clone()).await?;
                admin
                    .log(
                        "user",
                        "block",
                        json!({ "username": username, "reason": reason }),
                    )
                    .await;
                println!("User `{username}` blocked");
                Ok(())
            }
            UserSubcommands::Unblock { username } => {
                admin.users.unblock(&username).await?;
                admin
                    .log("user", "unblock", json!({ "username": username }))
                    .await;
                println!("User `{username}` unblocked");
                Ok(())
            }
            UserSubcommands::ChangePassword { username, password } => {
                admin.users.change_password(&username, &password).await?;
                admin
                    .log(
                        "user",
                        "change_password",
                        json!({ "username": username, "password": password }),
                    )
                    .await;
                println!("Password changed, all sessions revoked");
                Ok(())
            }
            UserSubcommands::ChangeUsername {
                username,
                new_username,
            } => {
                admin.users.change_username(&username, &new_username).await?;
                admin
                    .log(
                        "user",
                        "change_username",
                        json!({ "username": username, "new_username": new_username }),
                    )
                    .await;
                println!("User `{username}` renamed to `{new_username}`");
                Ok(())
            }
            UserSubcommands::AddToGroup { username, groups } => {
                let user = admin.users.add_to_groups(&username, groups.clone()).await?;
                admin
                    .log(
                        "user",
                        "add_to_group",
                        json!({ "username": username, "groups": groups }),
                    )
                    .await;
                output::print_json(&UserView::new(
                    user,
                    modular_types::audit::ConsistencyStatus::Ok,
                ))
            }
            UserSubcommands::RemoveFromGroup { username, groups } => {
                let user = admin
                    .users
                    .remove_from_groups(&username, &groups)
                    .await?;
                admin
                    .log(
                        "user",
                        "remove_from_group",
                        json!({ "username": username, "groups": groups }),
                    )
                    .await;
                output::print_json(&UserView::new(
                    user,
                    modular_types::audit::ConsistencyStatus::Ok,
                ))
            }
            UserSubcommands::SetMetaAttribute {
                username,
                key,
                values,
                aux,
            } => {
                let values = if values.is_empty() { None } else { Some(values) };
                let aux = parse_aux(aux)?;
                admin
                    .users
                    .set_meta_attribute(&username, &key, values, aux)
                    .await?;
                admin
                    .log(
                        "user",
                        "set_meta_attribute",
                        json!({ "username": username, "key": key }),
                    )
                    .await;
                println!("Meta attribute `{key}` set");
                Ok(())
            }
            UserSubcommands::UpdateMetaAttribute {
                username,
                key,
                values,
                aux,
            } => {
                let values = if values.is_empty() { None } else { Some(values) };
                let aux = parse_aux(aux)?;
                admin
                    .users
                    .update_meta_attribute(&username, &key, values, aux)
                    .await?;
                admin
                    .log(
                        "user",
                        "update_meta_attribute",
                        json!({ "username": username, "key": key }),
                    )
                    .await;
                println!("Meta attribute `{key}` updated");
                Ok(())
            }
            UserSubcommands::DeleteMetaAttribute { username, key } => {
                admin.users.delete_meta_attribute(&username, &key).await?;
                admin
                    .log(
                        "user",
                        "delete_meta_attribute",
                        json!({ "username": username, "key": key }),
                    )
                    .await;
                println!("Meta attribute `{key}` deleted");
                Ok(())
            }
            UserSubcommands::ResetMeta { username } => {
                admin.users.reset_meta(&username).await?;
                admin
                    .log("user", "reset_meta", json!({ "username": username }))
                    .await;
                println!("Meta attributes reset");
                Ok(())
            }
            UserSubcommands::GetMeta { username } => {
                let meta = admin.users.get_meta(&username).await?;
                output::print_json(&modular_types::methods::user::GetMetaResponse {
                    username,
                    meta,
                })
            }
        }
    }
}
