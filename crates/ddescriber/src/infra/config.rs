//! Configuration management utilities.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::app::finder::ScanPattern;
use crate::domain::model::SyntaxVariant;

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".ddescriber/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub scan: Scan,
    #[serde(default)]
    pub ignore: Ignore,
}

/// Fields left unset by a layer fall through to the layers below it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    syntax: Option<SyntaxVariant>,
}

impl Defaults {
    pub fn syntax(&self) -> SyntaxVariant {
        self.syntax.unwrap_or_default()
    }

    pub fn set_syntax(&mut self, syntax: SyntaxVariant) {
        self.syntax = Some(syntax);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scan {
    #[serde(default)]
    pattern: Option<ScanPattern>,
    #[serde(default)]
    include: Option<Vec<String>>,
    #[serde(default)]
    max_file_size: Option<u64>,
}

impl Scan {
    fn default_include() -> Vec<String> {
        vec!["*.js".into()]
    }

    fn default_max_file_size() -> u64 {
        1024 * 1024
    }

    pub fn pattern(&self) -> ScanPattern {
        self.pattern.unwrap_or_default()
    }

    pub fn set_pattern(&mut self, pattern: ScanPattern) {
        self.pattern = Some(pattern);
    }

    /// Globs selecting candidate files during project walks.
    pub fn include(&self) -> Vec<String> {
        self.include.clone().unwrap_or_else(Self::default_include)
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
            .unwrap_or_else(Self::default_max_file_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ignore {
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub globs: Vec<String>,
}

impl Default for Ignore {
    fn default() -> Self {
        Self {
            paths: vec![
                "node_modules/".into(),
                "bower_components/".into(),
                "dist/".into(),
                "target/".into(),
                ".git/".into(),
            ],
            globs: vec!["*.min.js".into()],
        }
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    syntax: Option<String>,
    pattern: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            syntax: env::var("DDESCRIBER_SYNTAX").ok(),
            pattern: env::var("DDESCRIBER_PATTERN").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(syntax: &str, pattern: &str) -> Self {
        Self {
            syntax: Some(syntax.to_owned()),
            pattern: Some(pattern.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            tracing::debug!(path = %global_path.display(), "loading global config");
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            tracing::debug!(path = %workspace_path.display(), "loading workspace config");
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        apply_env_overrides(merged, env_overrides)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            defaults: merge_defaults(self.defaults, other.defaults),
            scan: merge_scan(self.scan, other.scan),
            ignore: merge_ignore(self.ignore, other.ignore),
        }
    }
}

fn merge_defaults(mut base: Defaults, overlay: Defaults) -> Defaults {
    if let Some(value) = overlay.syntax {
        base.syntax = Some(value);
    }
    base
}

fn merge_scan(mut base: Scan, overlay: Scan) -> Scan {
    if let Some(value) = overlay.pattern {
        base.pattern = Some(value);
    }
    if let Some(value) = overlay.include {
        base.include = Some(value);
    }
    if let Some(value) = overlay.max_file_size {
        base.max_file_size = Some(value);
    }
    base
}

fn merge_ignore(base: Ignore, overlay: Ignore) -> Ignore {
    let mut paths: BTreeSet<String> = base.paths.into_iter().collect();
    paths.extend(overlay.paths);

    let mut globs: BTreeSet<String> = base.globs.into_iter().collect();
    globs.extend(overlay.globs);

    Ignore {
        paths: paths.into_iter().collect(),
        globs: globs.into_iter().collect(),
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("ddescriber/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() || current.join("package.json").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Result<Config> {
    if let Some(syntax) = env.syntax {
        config
            .defaults
            .set_syntax(syntax.parse().context("invalid DDESCRIBER_SYNTAX")?);
    }
    if let Some(pattern) = env.pattern {
        config
            .scan
            .set_pattern(pattern.parse().context("invalid DDESCRIBER_PATTERN")?);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert_eq!(config.defaults.syntax(), SyntaxVariant::Jasmine2);
        assert_eq!(config.scan.pattern(), ScanPattern::Focus);
        assert_eq!(config.scan.include(), vec!["*.js".to_string()]);
        assert!(config.ignore.paths.contains(&"node_modules/".into()));
    }

    #[test]
    fn merge_global_and_workspace() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[defaults]
syntax = "jasmine1"
[ignore]
paths = ["vendor/"]
"#,
        )?;

        let workspace_dir = temp.path().join("repo");
        fs::create_dir_all(workspace_dir.join(".ddescriber"))?;
        fs::write(
            workspace_dir.join(".ddescriber/config.toml"),
            r#"
[scan]
pattern = "extended"
include = ["*.spec.js", "*.spec.ts"]
[ignore]
globs = ["*.bundle.js"]
"#,
        )?;

        let global_path = Some(global);
        let workspace_path = Some(workspace_dir.join(".ddescriber/config.toml"));

        let config =
            Config::load_with_layers(global_path, workspace_path, EnvOverrides::default())?;

        assert_eq!(config.defaults.syntax(), SyntaxVariant::Jasmine1);
        assert_eq!(config.scan.pattern(), ScanPattern::Extended);
        assert_eq!(config.scan.include().len(), 2);
        assert_eq!(config.scan.max_file_size(), 1024 * 1024);
        assert!(config.ignore.paths.contains(&"vendor/".into()));
        assert!(config.ignore.paths.contains(&"node_modules/".into()));
        assert!(config.ignore.globs.contains(&"*.bundle.js".into()));

        Ok(())
    }

    #[test]
    fn workspace_can_restore_the_default_syntax() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("global.toml");
        fs::write(&global, "[defaults]\nsyntax = \"jasmine1\"\n")?;
        let workspace = temp.path().join("workspace.toml");
        fs::write(&workspace, "[defaults]\nsyntax = \"jasmine2\"\n")?;

        let config =
            Config::load_with_layers(Some(global.clone()), None, EnvOverrides::default())?;
        assert_eq!(config.defaults.syntax(), SyntaxVariant::Jasmine1);

        let config =
            Config::load_with_layers(Some(global), Some(workspace), EnvOverrides::default())?;
        assert_eq!(config.defaults.syntax(), SyntaxVariant::Jasmine2);
        Ok(())
    }

    #[test]
    fn layers_without_a_section_keep_lower_values() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("global.toml");
        fs::write(
            &global,
            "[defaults]\nsyntax = \"jasmine1\"\n[scan]\npattern = \"extended\"\n",
        )?;
        let workspace = temp.path().join("workspace.toml");
        fs::write(&workspace, "[ignore]\nglobs = [\"*.bundle.js\"]\n")?;

        let config =
            Config::load_with_layers(Some(global), Some(workspace), EnvOverrides::default())?;
        assert_eq!(config.defaults.syntax(), SyntaxVariant::Jasmine1);
        assert_eq!(config.scan.pattern(), ScanPattern::Extended);
        assert_eq!(config.scan.include(), vec!["*.js".to_string()]);
        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests("jasmine1", "extended");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(config.defaults.syntax(), SyntaxVariant::Jasmine1);
        assert_eq!(config.scan.pattern(), ScanPattern::Extended);
        Ok(())
    }

    #[test]
    fn invalid_env_override_is_an_error() {
        let overrides = EnvOverrides::for_tests("jasmine9", "classic");
        assert!(Config::load_with_layers(None, None, overrides).is_err());
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        let result = Config::from_file(&file);
        assert!(result.is_err());
        Ok(())
    }
}
