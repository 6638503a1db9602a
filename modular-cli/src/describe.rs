use clap::Args;
use modular_sdk::Client;
use modular_types::module::CommandNode;
use prettytable::{format, row, Table};

use crate::output;

#[derive(Args, Debug)]
pub struct Describe {
    #[arg(long, help = "limit the output to one module")]
    module: Option<String>,
}

impl Describe {
    pub async fn handle(self, sdk: &Client, json: bool) -> anyhow::Result<()> {
        let mut resp = sdk.meta.describe().await.map_err(anyhow::Error::msg)?;
        if let Some(module) = self.module {
            resp.meta.modules.retain(|m| m.module_name == module);
        }

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row!["Module", "Command", "Method", "Route"]);
        for module in &resp.meta.modules {
            let mut rows = vec![];
            flatten(&module.commands, &mut vec![], &mut rows);
            for (path, spec) in rows {
                table.add_row(row![
                    module.module_name,
                    path,
                    spec.route.method,
                    format!("{}{}", module.mount_point, spec.route.path)
                ]);
            }
        }
        output::emit(json, &resp, table)
    }
}

fn flatten<'a>(
    nodes: &'a [CommandNode],
    prefix: &mut Vec<&'a str>,
    out: &mut Vec<(String, &'a modular_types::module::CommandSpec)>,
) {
    for node in nodes {
        match node {
            CommandNode::Group(group) => {
                prefix.push(&group.name);
                flatten(&group.children, prefix, out);
                prefix.pop();
            }
            CommandNode::Command(spec) => {
                let mut path = prefix.clone();
                path.push(&spec.name);
                out.push((path.join("/"), spec));
            }
        }
    }
}
