use anyhow::Result;
use std::path::PathBuf;
use wikicorpus::config::{Config, DEFAULT_CONFIG_FILE};

pub async fn init_config(path: PathBuf) -> Result<()> {
    let config_path = path.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() {
        anyhow::bail!(
            "Configuration file already exists: {}",
            config_path.display()
        );
    }

    std::fs::create_dir_all(&path)?;
    let toml_content = format!(
        "# wikicorpus configuration\n\n{}",
        Config::default().to_toml()?
    );

    std::fs::write(&config_path, toml_content)?;
    println!("Created configuration file: {}", config_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path().to_path_buf()).await.unwrap();

        let config = Config::load(&dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert!(config.extract.skip_redirects);
    }

    #[tokio::test]
    async fn test_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path().to_path_buf()).await.unwrap();
        assert!(init_config(dir.path().to_path_buf()).await.is_err());
    }
}
