use std::path::Path;

use anyhow::bail;
use trantor_core::{ConfigValue, Overrides, StackFile};

pub fn get(path: &Path, key: &str) -> anyhow::Result<()> {
    let file = StackFile::from_file(path)?;
    let config = file.resolver(Overrides::new())?;
    match config.get(key) {
        Some(value) => println!("{value}"),
        None => bail!("configuration key '{}' is not set", config.full_key(key)),
    }
    Ok(())
}

pub fn set(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let mut file = StackFile::from_file(path)?;
    file.set(key, ConfigValue::from(value))?;
    file.save(path)?;
    println!("✓ Set {key} in {}", path.display());
    Ok(())
}

pub fn rm(path: &Path, key: &str) -> anyhow::Result<()> {
    let mut file = StackFile::from_file(path)?;
    if file.remove(key)?.is_none() {
        bail!("configuration key '{key}' is not set in {}", path.display());
    }
    file.save(path)?;
    println!("✓ Removed {key} from {}", path.display());
    Ok(())
}
