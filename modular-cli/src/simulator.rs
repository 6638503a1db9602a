use clap::Args;
use modular_types::methods::simulator::{SimulateParams, SimulationSubject};

use crate::{admin::Admin, output};

/// Evaluate the decision for an explicit subject and command without
/// dispatching anything, to verify a policy before rollout.
#[derive(Args, Debug)]
pub struct PolicySimulator {
    #[arg(long, conflicts_with_all = ["group_name", "policy_name"])]
    username: Option<String>,
    #[arg(long, conflicts_with = "policy_name")]
    group_name: Option<String>,
    #[arg(long)]
    policy_name: Option<String>,
    #[arg(long)]
    module: String,
    #[arg(long, help = "`/`-separated command path, e.g. tenant/describe")]
    command: String,
}

impl PolicySimulator {
    pub async fn handle(self) -> anyhow::Result<()> {
        let subject = match (self.username, self.group_name, self.policy_name) {
            (Some(username), None, None) => SimulationSubject::User { username },
            (None, Some(group_name), None) => SimulationSubject::Group { group_name },
            (None, None, Some(policy_name)) => SimulationSubject::Policy { policy_name },
            _ => anyhow::bail!(
                "exactly one of --username, --group-name or --policy-name must be given"
            ),
        };

        let admin = Admin::connect().await?;
        let decision = modular_system::simulate(
            &admin.users,
            &admin.groups,
            &admin.policies,
            &SimulateParams {
                subject,
                module: self.module,
                command: self.command,
            },
        )
        .await?;
        output::print_json(&decision)
    }
}
