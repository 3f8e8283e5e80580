pub mod config;
pub mod names;
pub mod stack;

use std::path::Path;

use anyhow::Context;
use trantor_core::{Config, Overrides, Program, StackFile, StackGraph};
use trantor_workload::KubeconfigSource;

/// A stack file with its resolved configuration.
pub struct LoadedStack {
    pub file: StackFile,
    pub config: Config,
}

/// Read a stack file and layer `TRANTOR_CONFIG_*` variables and `--config`
/// assignments on top of it, in that order.
pub fn load(path: &Path, assignments: &[String]) -> anyhow::Result<LoadedStack> {
    let file = StackFile::from_file(path)?;
    let mut cli = Overrides::new();
    for assignment in assignments {
        cli.parse_assignment(assignment)?;
    }
    let overrides = Overrides::from_env(std::env::vars()).merge(cli);
    let config = file.resolver(overrides)?;
    Ok(LoadedStack { file, config })
}

impl LoadedStack {
    pub fn build_graph(&self) -> anyhow::Result<StackGraph> {
        let name = self.file.stack_name()?;
        let graph = match self.file.stack.program {
            Program::Cluster => trantor_cluster::build_cluster_stack(&self.config, &name)
                .with_context(|| format!("building cluster stack {name}"))?,
            Program::Workload => {
                let source = KubeconfigSource::from_config(&self.config)?;
                trantor_workload::build_workload_stack(&self.config, &name, &source)
                    .with_context(|| format!("building workload stack {name}"))?
            }
        };
        Ok(graph)
    }
}
