//! Materializes the on-disk runtime a project stack boots from.
//!
//! The runtime agent only consumes files: a `config.toml` describing the
//! stack and a `.env` carrying credentials. This module renders both under
//! `<project root>/stack`. Materialization must not run concurrently for the
//! same project root; distinct roots are independent.

use serde::{Deserialize, Serialize};
use stackd_core::config::PlatformConfig;
use stackd_core::ports::{PortAllocation, PortRangeError};
use stackd_utils::envfile;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const STACK_DIR_NAME: &str = "stack";
const CONFIG_FILE_NAME: &str = "config.toml";
const ENV_FILE_NAME: &str = ".env";
const DEFAULT_DB_MAJOR_VERSION: u8 = 15;

/// Errors raised while materializing a runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Ports(#[from] PortRangeError),
    #[error("failed to materialize {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render stack config: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("failed to merge stack env file: {0}")]
    EnvFile(anyhow::Error),
}

/// Inputs for one materialization.
#[derive(Debug, Clone)]
pub struct PrepareRuntimeOptions {
    pub project_id: u32,
    pub project_ref: String,
    pub project_name: String,
    pub project_root: PathBuf,
    pub database_password: String,
    pub db_version: String,
}

/// Result of a materialization, handed to dispatch and the health gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRuntime {
    pub stack_dir: PathBuf,
    pub config_path: PathBuf,
    pub ports: PortAllocation,
    pub site_url: String,
}

/// The stack description written to `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackConfig {
    pub project_id: String,
    pub project_name: String,
    pub site_url: String,
    pub api: ApiSection,
    pub db: DbSection,
    pub studio: StudioSection,
    pub mail: MailSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiSection {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DbSection {
    pub port: u16,
    pub major_version: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudioSection {
    pub port: u16,
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailSection {
    pub port: u16,
}

/// Writes the stack directory, config, and merged env file for a project.
///
/// # Errors
///
/// Returns [`RuntimeError`] when the project's port block is out of range or
/// any file under the project root cannot be written.
pub fn prepare_runtime(
    config: &PlatformConfig,
    options: &PrepareRuntimeOptions,
) -> Result<PreparedRuntime, RuntimeError> {
    let stack_dir = options.project_root.join(STACK_DIR_NAME);

    if let Some(template_dir) = &config.runtime.template_dir {
        copy_template(template_dir, &stack_dir)?;
    }
    fs::create_dir_all(&stack_dir).map_err(|source| RuntimeError::Io {
        path: stack_dir.clone(),
        source,
    })?;

    let ports = config.ports.allocate_for(options.project_id)?;
    let site_url = format!("http://127.0.0.1:{}", ports.api);

    let stack_config = StackConfig {
        project_id: options.project_ref.clone(),
        project_name: options.project_name.clone(),
        site_url: site_url.clone(),
        api: ApiSection { port: ports.api },
        db: DbSection {
            port: ports.db,
            major_version: parse_major_version(&options.db_version),
        },
        studio: StudioSection {
            port: ports.studio,
            api_url: site_url.clone(),
        },
        mail: MailSection { port: ports.mail },
    };

    let config_path = stack_dir.join(CONFIG_FILE_NAME);
    let rendered = toml::to_string_pretty(&stack_config)?;
    fs::write(&config_path, rendered).map_err(|source| RuntimeError::Io {
        path: config_path.clone(),
        source,
    })?;

    envfile::merge_env_file(
        &stack_dir.join(ENV_FILE_NAME),
        &[
            ("POSTGRES_PASSWORD", options.database_password.as_str()),
            ("STACK_DB_PASSWORD", options.database_password.as_str()),
        ],
    )
    .map_err(RuntimeError::EnvFile)?;

    debug!(
        project_ref = %options.project_ref,
        stack_dir = %stack_dir.display(),
        "materialized runtime"
    );

    Ok(PreparedRuntime {
        stack_dir,
        config_path,
        ports,
        site_url,
    })
}

/// Copies the stack template into place on first provision.
///
/// A destination that already exists is left untouched so re-provisioning
/// never clobbers a project's stack state.
fn copy_template(template_dir: &Path, destination: &Path) -> Result<(), RuntimeError> {
    if destination.exists() {
        return Ok(());
    }
    copy_dir_all(template_dir, destination).map_err(|source| RuntimeError::Io {
        path: destination.to_path_buf(),
        source,
    })
}

fn copy_dir_all(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Pulls the major version out of a database version string like `"15"` or
/// `"15.5.0"`. Unparseable input falls back to the current default.
fn parse_major_version(value: &str) -> u8 {
    let digits: String = value
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    match digits.parse::<u8>() {
        Ok(parsed) if parsed > 0 => parsed,
        _ => DEFAULT_DB_MAJOR_VERSION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackd_core::ports::PortPlan;
    use tempfile::tempdir;

    fn test_options(root: &Path) -> PrepareRuntimeOptions {
        PrepareRuntimeOptions {
            project_id: 1,
            project_ref: "proj-one".to_string(),
            project_name: "Project One".to_string(),
            project_root: root.to_path_buf(),
            database_password: "p@ss word!".to_string(),
            db_version: "15.5.0".to_string(),
        }
    }

    #[test]
    fn renders_config_that_parses_back_identically() {
        let dir = tempdir().unwrap();
        let config = PlatformConfig::default();

        let prepared = prepare_runtime(&config, &test_options(dir.path())).unwrap();
        assert_eq!(prepared.ports.api, 23020);
        assert_eq!(prepared.site_url, "http://127.0.0.1:23020");

        let raw = fs::read_to_string(&prepared.config_path).unwrap();
        let parsed: StackConfig = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.project_id, "proj-one");
        assert_eq!(parsed.api.port, 23020);
        assert_eq!(parsed.db.port, 23021);
        assert_eq!(parsed.db.major_version, 15);
        assert_eq!(parsed.studio.port, 23022);
        assert_eq!(parsed.mail.port, 23023);
        assert_eq!(parsed.studio.api_url, prepared.site_url);
    }

    #[test]
    fn env_file_round_trips_the_database_password() {
        let dir = tempdir().unwrap();
        let config = PlatformConfig::default();

        let prepared = prepare_runtime(&config, &test_options(dir.path())).unwrap();
        let env = envfile::read_env_file(&prepared.stack_dir.join(".env"));
        assert_eq!(
            env.get("POSTGRES_PASSWORD").map(String::as_str),
            Some("p@ss word!")
        );
        assert_eq!(
            env.get("STACK_DB_PASSWORD").map(String::as_str),
            Some("p@ss word!")
        );
    }

    #[test]
    fn reprovisioning_preserves_existing_env_entries() {
        let dir = tempdir().unwrap();
        let config = PlatformConfig::default();
        let options = test_options(dir.path());

        prepare_runtime(&config, &options).unwrap();
        let env_path = dir.path().join("stack").join(".env");
        let mut vars = envfile::read_env_file(&env_path);
        vars.insert("CUSTOM".to_string(), "kept".to_string());
        envfile::write_env_file(&env_path, &vars).unwrap();

        prepare_runtime(&config, &options).unwrap();
        let env = envfile::read_env_file(&env_path);
        assert_eq!(env.get("CUSTOM").map(String::as_str), Some("kept"));
    }

    #[test]
    fn template_is_copied_once_and_never_clobbered() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("template");
        fs::create_dir_all(template.join("functions")).unwrap();
        fs::write(template.join("functions/hello.ts"), "export {}").unwrap();

        let root = dir.path().join("project");
        fs::create_dir_all(&root).unwrap();

        let mut config = PlatformConfig::default();
        config.runtime.template_dir = Some(template.clone());

        let options = test_options(&root);
        prepare_runtime(&config, &options).unwrap();
        let copied = root.join("stack/functions/hello.ts");
        assert!(copied.exists());

        fs::write(&copied, "edited").unwrap();
        prepare_runtime(&config, &options).unwrap();
        assert_eq!(fs::read_to_string(&copied).unwrap(), "edited");
    }

    #[test]
    fn port_range_errors_surface() {
        let dir = tempdir().unwrap();
        let mut config = PlatformConfig::default();
        config.ports = PortPlan {
            base: 65530,
            step: 20,
        };

        let err = prepare_runtime(&config, &test_options(dir.path())).unwrap_err();
        assert!(matches!(err, RuntimeError::Ports(_)));
    }

    #[test]
    fn major_version_parsing_tolerates_noise() {
        assert_eq!(parse_major_version("15"), 15);
        assert_eq!(parse_major_version("17.0.0"), 17);
        assert_eq!(parse_major_version("pg16"), 16);
        assert_eq!(parse_major_version(""), 15);
        assert_eq!(parse_major_version("garbage"), 15);
        assert_eq!(parse_major_version("0"), 15);
    }
}
