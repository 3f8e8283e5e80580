use std::path::Path;

use anyhow::{Context, bail};
use serde_json::Value;
use tracing::info;
use trantor_core::Program;
use trantor_engine::{Engine, LocalProvider};
use trantor_state::StateStore;
use trantor_workload::{WorkloadSpec, render_manifests};

use super::load;

fn open_store(path: &Path) -> anyhow::Result<StateStore> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating state directory {}", dir.display()))?;
    }
    Ok(StateStore::open(path)?)
}

fn engine(state: &Path) -> anyhow::Result<Engine<LocalProvider>> {
    Ok(Engine::new(open_store(state)?, LocalProvider::new()))
}

pub fn preview(state: &Path, file: &Path, assignments: &[String], format: &str) -> anyhow::Result<()> {
    let stack = load(file, assignments)?;
    let graph = stack.build_graph()?;
    let plan = engine(state)?.preview(&graph)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&plan)?),
        _ => println!("{plan}"),
    }
    Ok(())
}

pub fn up(state: &Path, file: &Path, assignments: &[String]) -> anyhow::Result<()> {
    let stack = load(file, assignments)?;
    let graph = stack.build_graph()?;
    let result = engine(state)?.up(&graph)?;

    println!("Stack {}", graph.stack());
    for (name, action) in &result.actions {
        println!("  {} {name} ({action})", action.symbol());
    }
    print_outputs(&result.outputs);
    println!("✓ {} resources", result.actions.len());
    Ok(())
}

pub fn destroy(state: &Path, file: &Path) -> anyhow::Result<()> {
    let stack = load(file, &[])?;
    let name = stack.file.stack_name()?;
    let result = engine(state)?.destroy(&name)?;
    for resource in &result.deleted {
        println!("  - {resource}");
    }
    println!("✓ Destroyed {name} ({} resources)", result.deleted.len());
    Ok(())
}

pub fn outputs(state: &Path, stack: &str, format: &str) -> anyhow::Result<()> {
    let store = open_store(state)?;
    let Some(recorded) = store.get_stack(stack)? else {
        bail!("stack '{stack}' has no recorded state");
    };
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&recorded.outputs)?),
        _ => print_outputs(&recorded.outputs),
    }
    Ok(())
}

pub fn render(file: &Path, assignments: &[String]) -> anyhow::Result<()> {
    let stack = load(file, assignments)?;
    if stack.file.stack.program != Program::Workload {
        bail!("{} is not a workload stack", file.display());
    }
    let spec = WorkloadSpec::from_config(&stack.config)?;
    info!(namespace = %spec.namespace, tier = %spec.tier(), "rendering manifests");
    println!("{}", serde_json::to_string_pretty(&render_manifests(&spec)?)?);
    Ok(())
}

fn print_outputs(outputs: &std::collections::BTreeMap<String, Value>) {
    if outputs.is_empty() {
        return;
    }
    println!("Outputs:");
    for (name, value) in outputs {
        match value {
            Value::String(s) if s.contains('\n') => {
                println!("  {name}:");
                for line in s.lines() {
                    println!("    {line}");
                }
            }
            Value::String(s) => println!("  {name}: {s}"),
            other => println!("  {name}: {other}"),
        }
    }
}
