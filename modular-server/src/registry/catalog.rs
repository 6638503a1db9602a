use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use hyper::Method;
use modular_types::{
    module::{
        sort_nodes, ApiMeta, CommandNode, CommandSpec, ModuleDescriptor, ModuleMeta, ModuleTree,
    },
    policy::{evaluate, Statement},
};

use crate::error::{Error, ErrorType};

/// Facade paths no module may mount over.
pub const RESERVED_PATHS: [&str; 5] = ["/login", "/logout", "/health_check", "/swagger.json", "/meta"];

/// One loaded module: its descriptor plus the command tree the descriptor's
/// `cli_path` points at.
#[derive(Debug, Clone)]
pub struct InstalledModule {
    pub descriptor: ModuleDescriptor,
    pub tree: ModuleTree,
}

/// The resolved description of one invocable command.
#[derive(Debug, Clone)]
pub struct CommandMeta {
    pub module: String,
    /// Group path plus the trailing command name, as matched by resource
    /// patterns.
    pub command_path: Vec<String>,
    pub spec: CommandSpec,
    /// Base URL of the backend the command forwards to.
    pub service_url: String,
    /// Exact facade path the command is reachable under.
    pub route_path: String,
}

impl CommandMeta {
    #[must_use]
    pub fn command_name(&self) -> String {
        self.command_path.join("/")
    }
}

/// Immutable command catalog. Built as a whole, verified, then swapped in;
/// readers always observe one complete catalog.
#[derive(Default, Debug)]
pub struct Catalog {
    routes: HashMap<(Method, String), Arc<CommandMeta>>,
    modules: BTreeMap<String, InstalledModule>,
}

impl Catalog {
    /// Build and verify a candidate catalog.
    ///
    /// # Errors
    ///
    /// Fails when a descriptor is malformed, a dependency is not satisfied
    /// or a mount point / route collides.
    pub fn build(modules: Vec<InstalledModule>) -> Result<Self, Error> {
        let mut by_name: BTreeMap<String, InstalledModule> = BTreeMap::new();
        let mut mount_points: HashMap<String, String> = HashMap::new();
        for module in modules {
            validate_descriptor(&module.descriptor)?;
            let module_name = module.descriptor.module_name.clone();
            let mount_point = module.descriptor.mount_point.clone();
            if let Some(existing) = mount_points.insert(mount_point.clone(), module_name.clone()) {
                return Err(ErrorType::MountPointConflict {
                    mount_point,
                    existing,
                }
                .into());
            }
            if by_name.insert(module_name.clone(), module).is_some() {
                return Err(ErrorType::InvalidDescriptor(format!(
                    "module `{module_name}` is declared twice"
                ))
                .into());
            }
        }

        for module in by_name.values() {
            for dependency in &module.descriptor.dependencies {
                let satisfied = by_name
                    .get(&dependency.module_name)
                    .is_some_and(|dep| dep.descriptor.version >= dependency.min_version);
                if !satisfied {
                    return Err(ErrorType::DependencyMissing {
                        module: module.descriptor.module_name.clone(),
                        dependency: dependency.module_name.clone(),
                        required: dependency.min_version.to_string(),
                    }
                    .into());
                }
            }
        }

        let mut routes = HashMap::new();
        for module in by_name.values() {
            let mut commands = vec![];
            collect_commands(&module.tree.commands, &mut vec![], &mut commands)?;
            for (command_path, spec) in commands {
                let route_path =
                    format!("{}{}", module.descriptor.mount_point, spec.route.path);
                let meta = Arc::new(CommandMeta {
                    module: module.descriptor.module_name.clone(),
                    command_path,
                    service_url: module.tree.service_url.clone(),
                    route_path: route_path.clone(),
                    spec,
                });
                let key = (meta.spec.route.method.clone(), route_path.clone());
                if RESERVED_PATHS.contains(&route_path.as_str()) {
                    return Err(ErrorType::MountPointConflict {
                        mount_point: route_path,
                        existing: "system".to_string(),
                    }
                    .into());
                }
                if let Some(existing) = routes.insert(key, meta) {
                    return Err(ErrorType::MountPointConflict {
                        mount_point: route_path,
                        existing: existing.module.clone(),
                    }
                    .into());
                }
            }
        }

        Ok(Self {
            routes,
            modules: by_name,
        })
    }

    /// Exact route lookup; paths are not pattern-based.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Option<Arc<CommandMeta>> {
        self.routes
            .get(&(method.clone(), path.to_string()))
            .map(Arc::clone)
    }

    #[must_use]
    pub fn module(&self, module_name: &str) -> Option<&InstalledModule> {
        self.modules.get(module_name)
    }

    pub fn modules(&self) -> impl Iterator<Item = &InstalledModule> {
        self.modules.values()
    }

    pub fn commands(&self) -> impl Iterator<Item = &Arc<CommandMeta>> {
        self.routes.values()
    }

    /// The client-visible catalog. With statements given, commands the
    /// caller is denied are omitted; without, everything is included
    /// (operator surfaces). `detailed` keeps the parameter lists.
    #[must_use]
    pub fn meta(&self, statements: Option<&[Statement]>, detailed: bool) -> ApiMeta {
        let mut modules = vec![];
        for module in self.modules.values() {
            let mut commands = filter_nodes(
                &module.tree.commands,
                &module.descriptor.module_name,
                &mut vec![],
                statements,
                detailed,
            );
            if commands.is_empty() {
                continue;
            }
            sort_nodes(&mut commands);
            modules.push(ModuleMeta {
                module_name: module.descriptor.module_name.clone(),
                description: module.tree.description.clone(),
                version: module.descriptor.version.clone(),
                mount_point: module.descriptor.mount_point.clone(),
                commands,
            });
        }
        ApiMeta { modules }
    }
}

fn validate_descriptor(descriptor: &ModuleDescriptor) -> Result<(), Error> {
    let invalid = |message: String| Error::from(ErrorType::InvalidDescriptor(message));

    if descriptor.module_name.is_empty()
        || descriptor
            .module_name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '/' || c == ':' || c == '*')
    {
        return Err(invalid(format!(
            "`{}` is not a valid module name",
            descriptor.module_name
        )));
    }
    let mount_point = &descriptor.mount_point;
    if !mount_point.starts_with('/')
        || mount_point.len() < 2
        || mount_point.ends_with('/')
        || mount_point.chars().any(char::is_whitespace)
        || RESERVED_PATHS.contains(&mount_point.as_str())
    {
        return Err(invalid(format!("`{mount_point}` is not a valid mount point")));
    }
    if descriptor.cli_path.is_empty() {
        return Err(invalid("`cli_path` must not be empty".to_string()));
    }
    Ok(())
}

fn collect_commands(
    nodes: &[CommandNode],
    prefix: &mut Vec<String>,
    out: &mut Vec<(Vec<String>, CommandSpec)>,
) -> Result<(), Error> {
    let mut seen = std::collections::HashSet::new();
    for node in nodes {
        if !seen.insert(node.name().to_string()) {
            return Err(ErrorType::InvalidDescriptor(format!(
                "duplicate command tree entry `{}`",
                node.name()
            ))
            .into());
        }
        match node {
            CommandNode::Group(group) => {
                prefix.push(group.name.clone());
                collect_commands(&group.children, prefix, out)?;
                prefix.pop();
            }
            CommandNode::Command(spec) => {
                let mut params = std::collections::HashSet::new();
                for parameter in &spec.parameters {
                    if !params.insert(parameter.name.as_str()) {
                        return Err(ErrorType::InvalidDescriptor(format!(
                            "duplicate parameter `{}` in command `{}`",
                            parameter.name, spec.name
                        ))
                        .into());
                    }
                }
                if !spec.route.path.starts_with('/') {
                    return Err(ErrorType::InvalidDescriptor(format!(
                        "route path `{}` must start with `/`",
                        spec.route.path
                    ))
                    .into());
                }
                let mut command_path = prefix.clone();
                command_path.push(spec.name.clone());
                out.push((command_path, spec.clone()));
            }
        }
    }
    Ok(())
}

fn filter_nodes(
    nodes: &[CommandNode],
    module: &str,
    prefix: &mut Vec<String>,
    statements: Option<&[Statement]>,
    detailed: bool,
) -> Vec<CommandNode> {
    let mut kept = vec![];
    for node in nodes {
        match node {
            CommandNode::Group(group) => {
                prefix.push(group.name.clone());
                let children = filter_nodes(&group.children, module, prefix, statements, detailed);
                prefix.pop();
                if !children.is_empty() {
                    let mut group = group.clone();
                    group.children = children;
                    kept.push(CommandNode::Group(group));
                }
            }
            CommandNode::Command(spec) => {
                let mut command_path = prefix.clone();
                command_path.push(spec.name.clone());
                let allowed = match statements {
                    Some(statements) => {
                        evaluate(statements, module, &command_path).is_allowed()
                    }
                    None => true,
                };
                if allowed {
                    let mut spec = spec.clone();
                    if !detailed {
                        spec.parameters = vec![];
                    }
                    kept.push(CommandNode::Command(spec));
                }
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use modular_types::{
        module::{AuthMode, CommandGroup, CommandRoute, ParameterKind, ParameterMeta},
        policy::Effect,
    };
    use semver::Version;

    use super::*;

    pub(crate) fn command(name: &str, path: &str) -> CommandNode {
        CommandNode::Command(CommandSpec {
            name: name.into(),
            description: None,
            parameters: vec![ParameterMeta {
                name: "region".into(),
                kind: ParameterKind::String,
                required: false,
                default: None,
                help: None,
            }],
            route: CommandRoute {
                method: Method::POST,
                path: path.into(),
                auth: AuthMode::Required,
            },
            describe: false,
        })
    }

    pub(crate) fn module(
        name: &str,
        version: &str,
        mount_point: &str,
        commands: Vec<CommandNode>,
    ) -> InstalledModule {
        InstalledModule {
            descriptor: ModuleDescriptor {
                module_name: name.into(),
                version: Version::parse(version).expect("a valid version"),
                cli_path: "commands.json".into(),
                mount_point: mount_point.into(),
                dependencies: vec![],
            },
            tree: ModuleTree {
                description: None,
                service_url: format!("http://{name}:8000"),
                commands,
            },
        }
    }

    fn statement(effect: Effect, module: &str, resources: &[&str]) -> Statement {
        Statement {
            effect,
            module: module.into(),
            resources: resources.iter().map(|r| r.parse().unwrap()).collect(),
            description: None,
        }
    }

    #[test]
    fn builds_and_looks_up_routes() {
        let catalog = Catalog::build(vec![module(
            "m3admin",
            "3.0.0",
            "/m3admin",
            vec![command("aws", "/aws")],
        )])
        .unwrap();

        let meta = catalog.lookup(&Method::POST, "/m3admin/aws").unwrap();
        assert_eq!(meta.module, "m3admin");
        assert_eq!(meta.command_path, vec!["aws".to_string()]);
        assert_eq!(meta.service_url, "http://m3admin:8000");

        assert!(catalog.lookup(&Method::GET, "/m3admin/aws").is_none());
        assert!(catalog.lookup(&Method::POST, "/m3admin/azure").is_none());
    }

    #[test]
    fn rejects_mount_point_conflicts() {
        let err = Catalog::build(vec![
            module("m3admin", "3.0.0", "/m3admin", vec![command("aws", "/aws")]),
            module("billing", "1.0.0", "/m3admin", vec![]),
        ])
        .unwrap_err();
        assert!(matches!(err.variant, ErrorType::MountPointConflict { .. }));

        let err = Catalog::build(vec![module(
            "login-stealer",
            "1.0.0",
            "/login",
            vec![],
        )])
        .unwrap_err();
        assert!(matches!(err.variant, ErrorType::InvalidDescriptor(_)));
    }

    #[test]
    fn enforces_dependency_versions() {
        let mut billing = module("billing", "1.0.0", "/billing", vec![]);
        billing.descriptor.dependencies = vec![modular_types::module::ModuleDependency {
            module_name: "m3admin".into(),
            min_version: Version::parse("3.0.0").unwrap(),
        }];

        let err = Catalog::build(vec![
            billing.clone(),
            module("m3admin", "2.9.0", "/m3admin", vec![]),
        ])
        .unwrap_err();
        assert!(matches!(err.variant, ErrorType::DependencyMissing { .. }));

        assert!(Catalog::build(vec![
            billing,
            module("m3admin", "3.0.0", "/m3admin", vec![]),
        ])
        .is_ok());
    }

    #[test]
    fn rejects_duplicate_tree_entries() {
        let err = Catalog::build(vec![module(
            "m3admin",
            "3.0.0",
            "/m3admin",
            vec![command("aws", "/aws"), command("aws", "/aws2")],
        )])
        .unwrap_err();
        assert!(matches!(err.variant, ErrorType::InvalidDescriptor(_)));
    }

    #[test]
    fn meta_filters_denied_commands() {
        let catalog = Catalog::build(vec![module(
            "m3admin",
            "3.0.0",
            "/m3admin",
            vec![
                command("aws", "/aws"),
                command("azure", "/azure"),
                CommandNode::Group(CommandGroup {
                    name: "tenant".into(),
                    description: None,
                    children: vec![command("describe", "/tenant/describe")],
                }),
            ],
        )])
        .unwrap();

        let statements = [statement(Effect::Allow, "m3admin", &["aws", "tenant:*"])];
        let meta = catalog.meta(Some(&statements), true);
        assert_eq!(meta.modules.len(), 1);
        let names = meta.modules[0]
            .commands
            .iter()
            .map(CommandNode::name)
            .collect::<Vec<_>>();
        // `azure` is omitted; commands sort before groups.
        assert_eq!(names, vec!["aws", "tenant"]);

        // A denied caller sees nothing at all.
        let statements = [
            statement(Effect::Allow, "m3admin", &["*"]),
            statement(Effect::Deny, "m3admin", &["*"]),
        ];
        assert!(catalog.meta(Some(&statements), true).modules.is_empty());

        // Without statements everything is visible, and `detailed = false`
        // strips the parameter lists.
        let full = catalog.meta(None, false);
        let first = &full.modules[0].commands[0];
        match first {
            CommandNode::Command(spec) => assert!(spec.parameters.is_empty()),
            CommandNode::Group(_) => panic!("expected a command first"),
        }
    }
}
