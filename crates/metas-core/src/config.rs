use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;

use crate::amount::{Amount, parse_amount};
use crate::error::MetasError;

/// Project directory holding the database and config.
pub const PROJECT_DIR: &str = ".metas";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub sanitize: SanitizeConfig,
    #[serde(default)]
    pub attainment: AttainmentConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Delete targets past the horizon on `metas reconcile` even for
    /// indicators without an end month.
    #[serde(default)]
    pub hard_cap: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizeConfig {
    #[serde(default = "default_placeholder_origin")]
    pub placeholder_origin: String,
    #[serde(default = "default_true")]
    pub create_missing: bool,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            placeholder_origin: default_placeholder_origin(),
            create_missing: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttainmentConfig {
    /// Allowed distance from the target for monitoring indicators.
    #[serde(default = "default_monitoring_tolerance")]
    pub monitoring_tolerance: String,
}

impl Default for AttainmentConfig {
    fn default() -> Self {
        Self {
            monitoring_tolerance: default_monitoring_tolerance(),
        }
    }
}

impl AttainmentConfig {
    /// # Errors
    ///
    /// Returns an error if the configured tolerance is not a valid amount.
    pub fn tolerance(&self) -> Result<Amount> {
        parse_amount(&self.monitoring_tolerance)
            .with_context(|| format!("invalid attainment.monitoring_tolerance '{}'", self.monitoring_tolerance))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    /// Name recorded as the submitting actor and in the action log.
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// # Errors
///
/// Returns an error if the file exists but cannot be read, or
/// [`MetasError::ConfigParse`] if it cannot be parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<ProjectConfig>(&content).map_err(|err| MetasError::ConfigParse {
        path: path.clone(),
        reason: err.message().to_string(),
    })?;
    parse_amount(&config.attainment.monitoring_tolerance).map_err(|err| MetasError::ConfigParse {
        path,
        reason: format!("attainment.monitoring_tolerance: {err}"),
    })?;
    Ok(config)
}

/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("metas/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(toml::from_str::<UserConfig>(&content).map_err(|err| MetasError::ConfigParse {
        path,
        reason: err.message().to_string(),
    })?)
}

/// Merge project config, user config and the `FORMAT` environment variable.
///
/// # Errors
///
/// Returns an error if either config file is unreadable or invalid.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.as_deref(), env_format.as_deref());

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(cli_json: bool, user_output: Option<&str>, env_format: Option<&str>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    env_format
        .and_then(normalize_output_mode)
        .or_else(|| user_output.and_then(normalize_output_mode))
        .map_or_else(
            || {
                if std::io::stdout().is_terminal() {
                    "pretty".to_string()
                } else {
                    "text".to_string()
                }
            },
            ToString::to_string,
        )
}

const fn default_true() -> bool {
    true
}

fn default_placeholder_origin() -> String {
    "sanitizer-placeholder".to_string()
}

fn default_monitoring_tolerance() -> String {
    "5.00".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_project_config(root: &Path, content: &str) {
        let dir = root.join(PROJECT_DIR);
        std::fs::create_dir_all(&dir).expect("create project dir");
        std::fs::write(dir.join("config.toml"), content).expect("write config");
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("temp dir");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert!(!cfg.reconcile.hard_cap);
        assert_eq!(cfg.sanitize.placeholder_origin, "sanitizer-placeholder");
        assert!(cfg.sanitize.create_missing);
        assert_eq!(
            cfg.attainment.tolerance().expect("tolerance"),
            Amount::from_hundredths(500)
        );
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let root = tempfile::tempdir().expect("temp dir");
        write_project_config(
            root.path(),
            r#"
[sanitize]
placeholder_origin = "nightly-job"

[attainment]
monitoring_tolerance = "0,5"
"#,
        );
        let cfg = load_project_config(root.path()).expect("load");
        assert_eq!(cfg.sanitize.placeholder_origin, "nightly-job");
        assert!(cfg.sanitize.create_missing);
        assert_eq!(
            cfg.attainment.tolerance().expect("tolerance"),
            Amount::from_hundredths(50)
        );
    }

    #[test]
    fn invalid_tolerance_is_rejected_at_load() {
        let root = tempfile::tempdir().expect("temp dir");
        write_project_config(root.path(), "[attainment]\nmonitoring_tolerance = \"lots\"\n");
        let err = load_project_config(root.path()).expect_err("bad tolerance");
        assert!(format!("{err:#}").contains("monitoring_tolerance"));
    }

    #[test]
    fn malformed_toml_reports_the_path() {
        let root = tempfile::tempdir().expect("temp dir");
        write_project_config(root.path(), "[sanitize\n");
        let err = load_project_config(root.path()).expect_err("parse error");
        assert!(format!("{err:#}").contains("config.toml"));
        let code = err.downcast_ref::<MetasError>().map(MetasError::code);
        assert_eq!(code, Some(crate::error::ErrorCode::ConfigParseError));
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        assert_eq!(resolve_output(true, Some("pretty"), Some("text")), "json");
    }

    #[test]
    fn env_beats_user_config_and_aliases_normalize() {
        assert_eq!(resolve_output(false, Some("table"), Some("human")), "pretty");
        assert_eq!(resolve_output(false, Some("human"), Some("table")), "text");
        assert_eq!(resolve_output(false, Some("json"), Some("bogus")), "json");
    }

    #[test]
    fn user_config_parses_actor() {
        let cfg: UserConfig = toml::from_str("output = \"json\"\nactor = \"ana\"\n").expect("parse");
        assert_eq!(cfg.output.as_deref(), Some("json"));
        assert_eq!(cfg.actor.as_deref(), Some("ana"));
    }
}
