use http::Method;
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};

/// Dependency on another installed module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDependency {
    pub module_name: String,
    pub min_version: Version,
}

/// Descriptor shipped alongside each installable module. Only the fields
/// below are honored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub module_name: String,
    pub version: Version,
    /// Path of the command-tree schema file, relative to the module
    /// directory.
    pub cli_path: String,
    pub mount_point: String,
    #[serde(default)]
    pub dependencies: Vec<ModuleDependency>,
}

/// Parameter value types a command may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterKind {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "list-of-string")]
    StringList,
}

impl ParameterKind {
    /// Whether a JSON value already has the declared shape.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }

    /// Coerce the textual form query parameters arrive in. Returns `None`
    /// when the text does not parse into the declared type.
    #[must_use]
    pub fn coerce(&self, raw: &str) -> Option<Value> {
        match self {
            Self::String => Some(Value::String(raw.to_string())),
            Self::Integer => raw.parse::<i64>().ok().map(Value::from),
            Self::Boolean => raw.parse::<bool>().ok().map(Value::from),
            Self::StringList => Some(Value::from(
                raw.split(',')
                    .filter(|part| !part.is_empty())
                    .map(ToString::to_string)
                    .collect::<Vec<_>>(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

/// Whether a route demands an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Required,
    None,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRoute {
    #[serde_as(as = "DisplayFromStr")]
    pub method: Method,
    pub path: String,
    #[serde(default)]
    pub auth: AuthMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterMeta>,
    pub route: CommandRoute,
    /// Describe-class commands skip the audit step.
    #[serde(default)]
    pub describe: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub children: Vec<CommandNode>,
}

/// Sealed shape of the command tree a module author declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CommandNode {
    Group(CommandGroup),
    Command(CommandSpec),
}

impl CommandNode {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Group(group) => &group.name,
            Self::Command(command) => &command.name,
        }
    }
}

/// The schema file `cli_path` points at: the module's command tree plus the
/// base URL of the backend its routes forward to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleTree {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub service_url: String,
    #[serde(default)]
    pub commands: Vec<CommandNode>,
}

/// Client-visible catalog of one module, already filtered to the commands
/// the caller may invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMeta {
    pub module_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: Version,
    pub mount_point: String,
    pub commands: Vec<CommandNode>,
}

/// The API meta returned to clients: one entry per module, modules ordered
/// by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMeta {
    pub modules: Vec<ModuleMeta>,
}

/// Order the client-visible catalog: within each group, terminal commands
/// precede sub-groups, each category ordered lexicographically by name.
pub fn sort_nodes(nodes: &mut Vec<CommandNode>) {
    nodes.sort_by(|a, b| {
        let rank = |node: &CommandNode| u8::from(matches!(node, CommandNode::Group(_)));
        rank(a).cmp(&rank(b)).then_with(|| a.name().cmp(b.name()))
    });
    for node in nodes {
        if let CommandNode::Group(group) = node {
            sort_nodes(&mut group.children);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_kind_accepts() {
        use serde_json::json;
        assert!(ParameterKind::String.accepts(&json!("eu-central-1")));
        assert!(!ParameterKind::String.accepts(&json!(5)));
        assert!(ParameterKind::Integer.accepts(&json!(5)));
        assert!(!ParameterKind::Integer.accepts(&json!(5.5)));
        assert!(ParameterKind::Boolean.accepts(&json!(true)));
        assert!(ParameterKind::StringList.accepts(&json!(["a", "b"])));
        assert!(!ParameterKind::StringList.accepts(&json!(["a", 1])));
    }

    #[test]
    fn parameter_kind_coerce() {
        use serde_json::json;
        assert_eq!(ParameterKind::Integer.coerce("5"), Some(json!(5)));
        assert_eq!(ParameterKind::Integer.coerce("five"), None);
        assert_eq!(ParameterKind::Boolean.coerce("true"), Some(json!(true)));
        assert_eq!(
            ParameterKind::StringList.coerce("a,b"),
            Some(json!(["a", "b"]))
        );
        assert_eq!(
            ParameterKind::String.coerce("plain"),
            Some(json!("plain"))
        );
    }

    #[test]
    fn parses_command_tree() {
        let raw = r#"{
            "description": "tenant administration",
            "service_url": "http://m3admin:8000",
            "commands": [
                {
                    "kind": "command",
                    "name": "aws",
                    "parameters": [
                        {"name": "region", "type": "string", "required": true}
                    ],
                    "route": {"method": "POST", "path": "/aws"}
                },
                {
                    "kind": "group",
                    "name": "tenant",
                    "children": [
                        {
                            "kind": "command",
                            "name": "describe",
                            "describe": true,
                            "route": {"method": "GET", "path": "/tenant/describe"}
                        }
                    ]
                }
            ]
        }"#;
        let tree: ModuleTree = serde_json::from_str(raw).unwrap();
        assert_eq!(tree.service_url, "http://m3admin:8000");
        assert_eq!(tree.commands.len(), 2);
        match &tree.commands[1] {
            CommandNode::Group(group) => {
                assert_eq!(group.name, "tenant");
                match &group.children[0] {
                    CommandNode::Command(cmd) => {
                        assert!(cmd.describe);
                        assert_eq!(cmd.route.method, Method::GET);
                        assert_eq!(cmd.route.auth, AuthMode::Required);
                    }
                    CommandNode::Group(_) => panic!("expected a command"),
                }
            }
            CommandNode::Command(_) => panic!("expected a group"),
        }
    }

    #[test]
    fn sort_order_commands_before_groups() {
        let route = CommandRoute {
            method: Method::POST,
            path: "/x".into(),
            auth: AuthMode::default(),
        };
        let command = |name: &str| {
            CommandNode::Command(CommandSpec {
                name: name.into(),
                description: None,
                parameters: vec![],
                route: route.clone(),
                describe: false,
            })
        };
        let group = |name: &str, children: Vec<CommandNode>| {
            CommandNode::Group(CommandGroup {
                name: name.into(),
                description: None,
                children,
            })
        };

        let mut nodes = vec![
            group("alpha", vec![command("z"), command("a")]),
            command("zeta"),
            group("beta", vec![]),
            command("aws"),
        ];
        sort_nodes(&mut nodes);

        let names = nodes.iter().map(CommandNode::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["aws", "zeta", "alpha", "beta"]);
        match &nodes[2] {
            CommandNode::Group(g) => {
                let inner = g.children.iter().map(CommandNode::name).collect::<Vec<_>>();
                assert_eq!(inner, vec!["a", "z"]);
            }
            CommandNode::Command(_) => panic!("expected a group"),
        }
    }
}
