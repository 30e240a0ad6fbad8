pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{PollSettings, Settings, Timeouts};

use std::path::PathBuf;

const CONFIG_PATH_ENV: &str = "CONTAINERFLOW_CONFIG_PATH";
const PROJECT_DIR: &str = ".containerflow";

/// Return the ContainerFlow configuration directory, creating it if needed
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("containerflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the project's container file
///
/// Search order:
/// 1. `CONTAINERFLOW_CONFIG_PATH` (explicit path)
/// 2. current directory: container.local.kdl, .container.local.kdl, container.kdl, .container.kdl
/// 3. the same names inside `./.containerflow/`
/// 4. `~/.config/containerflow/container.kdl`
pub fn find_container_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "{} points at a missing file", CONFIG_PATH_ENV);
    }

    let current_dir = std::env::current_dir()?;
    let candidates = [
        "container.local.kdl",
        ".container.local.kdl",
        "container.kdl",
        ".container.kdl",
    ];

    for filename in &candidates {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(PROJECT_DIR);
    if project_dir.is_dir() {
        for filename in &candidates {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("containerflow").join("container.kdl");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::ContainerFileNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    #[serial]
    fn test_find_container_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("container.kdl"), "// test").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_container_file();

        std::env::set_current_dir(original_dir).unwrap();
        assert!(result.unwrap().ends_with("container.kdl"));
    }

    #[test]
    #[serial]
    fn test_local_file_has_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("container.kdl"), "// shared").unwrap();
        fs::write(temp_dir.path().join("container.local.kdl"), "// local").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_container_file();

        std::env::set_current_dir(original_dir).unwrap();
        assert!(result.unwrap().ends_with("container.local.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_container_file_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let project_dir = temp_dir.path().join(".containerflow");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("container.kdl"), "// nested").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_container_file();

        std::env::set_current_dir(original_dir).unwrap();
        assert!(result.unwrap().ends_with(".containerflow/container.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_container_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.kdl");
        fs::write(&config_path, "// custom").unwrap();

        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, config_path.to_str().unwrap());
        }

        let result = find_container_file();

        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }
        assert_eq!(result.unwrap(), config_path);
    }
}
