use modular_types::{
    methods::simulator::{SimulateParams, SimulationSubject},
    policy::{evaluate, Decision, Statement},
};

use crate::{
    error::{Error, ErrorType},
    store::{GroupStore, PolicyStore, UserStore},
};

/// Offline entry point of the policy engine: evaluate a command for an
/// explicit user, group or policy, returning the decision with the matched
/// statement. Used by operators to verify a policy before rollout.
pub async fn simulate(
    users: &UserStore,
    groups: &GroupStore,
    policies: &PolicyStore,
    params: &SimulateParams,
) -> Result<Decision, Error> {
    let statements = subject_statements(users, groups, policies, &params.subject).await?;
    let command_path = params
        .command
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    if command_path.is_empty() {
        return Err(ErrorType::InvalidPayload("`command` must not be empty".into()).into());
    }
    Ok(evaluate(&statements, &params.module, &command_path))
}

async fn subject_statements(
    users: &UserStore,
    groups: &GroupStore,
    policies: &PolicyStore,
    subject: &SimulationSubject,
) -> Result<Vec<Statement>, Error> {
    match subject {
        SimulationSubject::User { username } => {
            let Some((user, _)) = users.lookup(username).await? else {
                return Err(ErrorType::NotFound(format!("User `{username}` not found")).into());
            };
            users.effective_statements(&user).await
        }
        SimulationSubject::Group { group_name } => {
            let Some((group, _)) = groups.lookup(group_name).await? else {
                return Err(
                    ErrorType::NotFound(format!("Group `{group_name}` not found")).into(),
                );
            };
            let mut statements = vec![];
            for policy_name in &group.policies {
                if let Some((policy, _)) = policies.lookup(policy_name).await? {
                    statements.extend(policy.statements);
                }
            }
            Ok(statements)
        }
        SimulationSubject::Policy { policy_name } => {
            let Some((policy, _)) = policies.lookup(policy_name).await? else {
                return Err(
                    ErrorType::NotFound(format!("Policy `{policy_name}` not found")).into(),
                );
            };
            Ok(policy.statements)
        }
    }
}
