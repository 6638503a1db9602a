use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::{entity::EntityState, error::ApiError};

/// Effect of a policy statement.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    serde_with::SerializeDisplay,
    serde_with::DeserializeFromStr,
)]
pub enum Effect {
    Allow,
    Deny,
}

/// A resource pattern, parsed once when a policy is loaded and never
/// re-parsed at request time.
///
/// The grammar is exactly:
/// - `*` matches every command in the module,
/// - `cmd` matches the terminal command `cmd` at the root,
/// - `group:*` matches every command under `group` (any depth),
/// - `group:cmd` matches `cmd` directly under `group`,
/// - `group/sub:*` and `group/sub:cmd` are the nested-group forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourcePattern {
    Any,
    Command(String),
    GroupAny(Vec<String>),
    GroupCommand(Vec<String>, String),
}

fn valid_segment(s: &str) -> bool {
    !s.is_empty()
        && !s
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == ':' || c == '/' || c == '*')
}

impl FromStr for ResourcePattern {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            return Ok(Self::Any);
        }
        match s.split_once(':') {
            Some((group, rest)) => {
                let segments = group.split('/').map(ToString::to_string).collect::<Vec<_>>();
                if segments.iter().any(|seg| !valid_segment(seg)) {
                    return Err(ApiError::bad_request());
                }
                if rest == "*" {
                    Ok(Self::GroupAny(segments))
                } else if valid_segment(rest) {
                    Ok(Self::GroupCommand(segments, rest.to_string()))
                } else {
                    Err(ApiError::bad_request())
                }
            }
            None => {
                if valid_segment(s) {
                    Ok(Self::Command(s.to_string()))
                } else {
                    Err(ApiError::bad_request())
                }
            }
        }
    }
}

impl Display for ResourcePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Command(cmd) => write!(f, "{cmd}"),
            Self::GroupAny(group) => write!(f, "{}:*", group.join("/")),
            Self::GroupCommand(group, cmd) => write!(f, "{}:{cmd}", group.join("/")),
        }
    }
}

impl ResourcePattern {
    /// Test the pattern against a full command path, the trailing segment
    /// being the command name.
    #[must_use]
    pub fn matches(&self, command_path: &[String]) -> bool {
        match self {
            Self::Any => true,
            Self::Command(cmd) => command_path.len() == 1 && command_path[0] == *cmd,
            Self::GroupAny(group) => {
                command_path.len() > group.len() && command_path[..group.len()] == group[..]
            }
            Self::GroupCommand(group, cmd) => {
                command_path.len() == group.len() + 1
                    && command_path[..group.len()] == group[..]
                    && command_path[group.len()] == *cmd
            }
        }
    }
}

/// One Allow/Deny statement over (module, resources).
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(rename = "Effect")]
    pub effect: Effect,
    #[serde(rename = "Module")]
    pub module: String,
    #[serde_as(as = "Vec<DisplayFromStr>")]
    #[serde(rename = "Resources")]
    pub resources: Vec<ResourcePattern>,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
}

impl Statement {
    fn matches(&self, module: &str, command_path: &[String]) -> bool {
        if self.module != "*" && self.module != module {
            return false;
        }
        self.resources.iter().any(|p| p.matches(command_path))
    }
}

/// A named, ordered list of statements. Order is preserved on persistence
/// and describe; evaluation semantics are set-like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub policy_name: String,
    pub statements: Vec<Statement>,
    pub state: EntityState,
    pub creation_date: DateTime<Utc>,
    pub last_modification_date: DateTime<Utc>,
}

impl Policy {
    #[must_use]
    pub fn new(policy_name: String, statements: Vec<Statement>, now: DateTime<Utc>) -> Self {
        Self {
            policy_name,
            statements,
            state: EntityState::Activated,
            creation_date: now,
            last_modification_date: now,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.policy_name
    }
}

/// Outcome of evaluating a set of statements for one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision")]
pub enum Decision {
    Allow { statement: Statement },
    Deny { statement: Option<Statement> },
}

impl Decision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }
}

/// Evaluate the effective statements for a requested (module, command path).
///
/// Deny-precedence: any matching Deny statement wins over any number of
/// matching Allow statements. No matching statement at all is a Deny.
#[must_use]
pub fn evaluate(statements: &[Statement], module: &str, command_path: &[String]) -> Decision {
    let mut allowed: Option<&Statement> = None;
    for statement in statements {
        if !statement.matches(module, command_path) {
            continue;
        }
        match statement.effect {
            Effect::Deny => {
                return Decision::Deny {
                    statement: Some(statement.clone()),
                }
            }
            Effect::Allow => allowed = allowed.or(Some(statement)),
        }
    }
    match allowed {
        Some(statement) => Decision::Allow {
            statement: statement.clone(),
        },
        None => Decision::Deny { statement: None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    fn allow(module: &str, resources: &[&str]) -> Statement {
        Statement {
            effect: Effect::Allow,
            module: module.to_string(),
            resources: resources
                .iter()
                .map(|r| r.parse().unwrap())
                .collect(),
            description: None,
        }
    }

    fn deny(module: &str, resources: &[&str]) -> Statement {
        Statement {
            effect: Effect::Deny,
            ..allow(module, resources)
        }
    }

    #[test]
    fn parses_patterns() {
        assert_eq!("*".parse::<ResourcePattern>().unwrap(), ResourcePattern::Any);
        assert_eq!(
            "aws".parse::<ResourcePattern>().unwrap(),
            ResourcePattern::Command("aws".into())
        );
        assert_eq!(
            "tenant:*".parse::<ResourcePattern>().unwrap(),
            ResourcePattern::GroupAny(vec!["tenant".into()])
        );
        assert_eq!(
            "tenant:describe".parse::<ResourcePattern>().unwrap(),
            ResourcePattern::GroupCommand(vec!["tenant".into()], "describe".into())
        );
        assert_eq!(
            "tenant/region:*".parse::<ResourcePattern>().unwrap(),
            ResourcePattern::GroupAny(vec!["tenant".into(), "region".into()])
        );
        assert_eq!(
            "tenant/region:add".parse::<ResourcePattern>().unwrap(),
            ResourcePattern::GroupCommand(vec!["tenant".into(), "region".into()], "add".into())
        );
    }

    #[test]
    fn rejects_malformed_patterns() {
        for bad in ["", " ", "a b", ":cmd", "grp:", "grp::cmd", "grp:a b", "a*", "*:cmd"] {
            assert!(bad.parse::<ResourcePattern>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn pattern_display_round_trip() {
        for s in ["*", "aws", "tenant:*", "tenant:describe", "tenant/region:add"] {
            let p: ResourcePattern = s.parse().unwrap();
            assert_eq!(p.to_string(), s);
        }
    }

    #[test]
    fn pattern_matching() {
        let any: ResourcePattern = "*".parse().unwrap();
        assert!(any.matches(&path(&["aws"])));
        assert!(any.matches(&path(&["tenant", "describe"])));

        let cmd: ResourcePattern = "aws".parse().unwrap();
        assert!(cmd.matches(&path(&["aws"])));
        assert!(!cmd.matches(&path(&["tenant", "aws"])));
        assert!(!cmd.matches(&path(&["azure"])));

        let group_any: ResourcePattern = "tenant:*".parse().unwrap();
        assert!(group_any.matches(&path(&["tenant", "describe"])));
        // Any depth below the group matches.
        assert!(group_any.matches(&path(&["tenant", "region", "add"])));
        assert!(!group_any.matches(&path(&["tenant"])));
        assert!(!group_any.matches(&path(&["other", "describe"])));

        let group_cmd: ResourcePattern = "tenant:describe".parse().unwrap();
        assert!(group_cmd.matches(&path(&["tenant", "describe"])));
        // Only directly under the group.
        assert!(!group_cmd.matches(&path(&["tenant", "region", "describe"])));
        assert!(!group_cmd.matches(&path(&["describe"])));
    }

    #[test]
    fn allow_then_default_deny() {
        let statements = vec![allow("m3admin", &["aws"])];
        assert!(evaluate(&statements, "m3admin", &path(&["aws"])).is_allowed());
        // No statement matches `azure`.
        assert_eq!(
            evaluate(&statements, "m3admin", &path(&["azure"])),
            Decision::Deny { statement: None }
        );
    }

    #[test]
    fn deny_precedence() {
        let statements = vec![allow("m3admin", &["aws"]), deny("m3admin", &["aws"])];
        let decision = evaluate(&statements, "m3admin", &path(&["aws"]));
        assert!(!decision.is_allowed());
        match decision {
            Decision::Deny { statement: Some(s) } => assert_eq!(s.effect, Effect::Deny),
            other => panic!("unexpected decision {other:?}"),
        }

        // Order of the statements does not change the outcome.
        let statements = vec![deny("m3admin", &["aws"]), allow("m3admin", &["aws"])];
        assert!(!evaluate(&statements, "m3admin", &path(&["aws"])).is_allowed());
    }

    #[test]
    fn module_filter() {
        let statements = vec![allow("m3admin", &["*"])];
        assert!(evaluate(&statements, "m3admin", &path(&["aws"])).is_allowed());
        assert!(!evaluate(&statements, "billing", &path(&["aws"])).is_allowed());

        let statements = vec![allow("*", &["aws"])];
        assert!(evaluate(&statements, "m3admin", &path(&["aws"])).is_allowed());
        assert!(evaluate(&statements, "billing", &path(&["aws"])).is_allowed());
    }

    #[test]
    fn statement_serde_preserves_shape() {
        let statement = allow("m3admin", &["aws", "tenant:*"]);
        let serialized = serde_json::to_string(&statement).unwrap();
        assert_eq!(
            serialized,
            r#"{"Effect":"Allow","Module":"m3admin","Resources":["aws","tenant:*"]}"#
        );
        let parsed: Statement = serde_json::from_str(&serialized).unwrap();
        assert_eq!(parsed, statement);
    }
}
