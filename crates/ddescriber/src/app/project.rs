//! Discovering test files across a project.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::{DirEntry, WalkBuilder, WalkState};

use crate::app::document::JasmineFile;
use crate::app::finder::JasmineFinder;
use crate::app::projection::{FileProjection, ProjectTree};
use crate::infra::config::Config;

const DDESCRIBER_IGNORE: &str = ".ddescriberignore";

/// Inputs for a project walk.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub max_file_size: u64,
    pub config: Config,
}

impl ProjectConfig {
    pub fn from_root(root: PathBuf, config: Config) -> Self {
        Self {
            root,
            max_file_size: config.scan.max_file_size(),
            config,
        }
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }
}

/// Decides which paths under a root are candidate test files.
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    ignore: GlobSet,
    include: GlobSet,
    gitignore: Gitignore,
    max_file_size: u64,
}

impl PathFilter {
    pub fn new(cfg: &ProjectConfig) -> Result<Self> {
        Ok(Self {
            root: cfg.root.clone(),
            ignore: build_ignore_matcher(&cfg.root, &cfg.config)?,
            include: build_include_matcher(&cfg.config)?,
            gitignore: build_gitignore(&cfg.root)?,
            max_file_size: cfg.max_file_size,
        })
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    /// Whether a path (absolute or relative to the root) falls under an ignore rule.
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignore.is_match(self.relative(path))
    }

    /// Whether a file path is a candidate: not ignored, and its name or relative path matches an
    /// include glob.
    pub fn is_candidate(&self, path: &Path) -> bool {
        if self.is_ignored(path) {
            return false;
        }
        let rel = self.relative(path);
        self.include.is_match(rel)
            || rel
                .file_name()
                .is_some_and(|name| self.include.is_match(Path::new(name)))
    }

    /// Whether an existing file is scanned: a candidate that is not hidden, not excluded by the
    /// root `.gitignore`, and within the size limit. Walks and watch events share this check.
    pub fn accepts_file(&self, path: &Path) -> bool {
        if !self.is_candidate(path) || self.is_hidden(path) || self.is_gitignored(path) {
            return false;
        }
        let Ok(metadata) = path.metadata() else {
            return false;
        };
        if !metadata.is_file() {
            return false;
        }
        if metadata.len() > self.max_file_size {
            tracing::debug!(path = %path.display(), size = metadata.len(), "skipping large file");
            return false;
        }
        true
    }

    fn is_hidden(&self, path: &Path) -> bool {
        self.relative(path)
            .components()
            .any(|part| part.as_os_str().to_string_lossy().starts_with('.'))
    }

    fn is_gitignored(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
            && self
                .gitignore
                .matched_path_or_any_parents(path, false)
                .is_ignore()
    }
}

/// Walks a project and scans every candidate file.
#[derive(Debug, Clone)]
pub struct ProjectScanner {
    finder: JasmineFinder,
}

impl ProjectScanner {
    pub fn new(finder: JasmineFinder) -> Self {
        Self { finder }
    }

    pub fn finder(&self) -> &JasmineFinder {
        &self.finder
    }

    /// Candidate file paths under the root, sorted.
    pub fn candidates(&self, cfg: &ProjectConfig) -> Result<Vec<PathBuf>> {
        let filter = Arc::new(PathFilter::new(cfg)?);
        let mut builder = WalkBuilder::new(&cfg.root);
        builder.git_ignore(true).hidden(true);

        builder.filter_entry({
            let filter = filter.clone();
            move |entry| entry.depth() == 0 || !filter.is_ignored(entry.path())
        });

        let paths = Mutex::new(Vec::new());

        builder.build_parallel().run(|| {
            let paths = &paths;
            let filter = filter.clone();
            Box::new(move |result| match result {
                Ok(entry) => {
                    if let Some(path) = accept_entry(&entry, &filter)
                        && let Ok(mut guard) = paths.lock()
                    {
                        guard.push(path);
                    }
                    WalkState::Continue
                }
                Err(err) => {
                    tracing::warn!(error = %err, "project walk error");
                    WalkState::Continue
                }
            })
        });

        let mut paths = paths.into_inner().unwrap_or_default();
        paths.sort();
        Ok(paths)
    }

    /// Scan a single candidate. Unreadable files and files without matches yield `None`.
    pub fn scan_path(&self, path: &Path) -> Option<JasmineFile> {
        match JasmineFile::load(path, &self.finder) {
            Ok(file) if !file.forest().is_empty() => Some(file),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable file");
                None
            }
        }
    }

    /// Every file under the root with at least one suite or spec.
    pub fn scan(&self, cfg: &ProjectConfig) -> Result<Vec<JasmineFile>> {
        let files: Vec<_> = self
            .candidates(cfg)?
            .iter()
            .filter_map(|path| self.scan_path(path))
            .collect();
        tracing::debug!(root = %cfg.root.display(), files = files.len(), "scanned project");
        Ok(files)
    }

    /// Rebuild `tree` from a fresh walk.
    pub fn refresh(&self, cfg: &ProjectConfig, tree: &mut ProjectTree) -> Result<()> {
        let projections: Vec<FileProjection> =
            self.scan(cfg)?.iter().map(JasmineFile::to_projection).collect();
        tree.refresh(projections);
        Ok(())
    }
}

fn accept_entry(entry: &DirEntry, filter: &PathFilter) -> Option<PathBuf> {
    if entry.depth() == 0 || !entry.file_type().is_some_and(|kind| kind.is_file()) {
        return None;
    }
    filter
        .accepts_file(entry.path())
        .then(|| entry.path().to_path_buf())
}

/// Root `.gitignore`, honoured only inside a git checkout like the walker does.
fn build_gitignore(root: &Path) -> Result<Gitignore> {
    let path = root.join(".gitignore");
    if !root.join(".git").exists() || !path.is_file() {
        return Ok(Gitignore::empty());
    }
    let mut builder = GitignoreBuilder::new(root);
    if let Some(err) = builder.add(&path) {
        tracing::warn!(path = %path.display(), error = %err, "partially invalid .gitignore");
    }
    builder
        .build()
        .with_context(|| format!("failed to load {}", path.display()))
}

fn build_include_matcher(config: &Config) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in config.scan.include() {
        let glob = Glob::new(&pattern)
            .with_context(|| format!("invalid include glob '{pattern}'"))?;
        builder.add(glob);
    }
    builder.build().context("failed to build include matcher")
}

fn build_ignore_matcher(root: &Path, config: &Config) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();

    for pattern in &config.ignore.paths {
        for expanded in expand_dir_pattern(pattern) {
            let glob = Glob::new(&expanded).context("invalid ignore path pattern")?;
            builder.add(glob);
        }
    }

    for glob in &config.ignore.globs {
        let glob = Glob::new(glob).context("invalid ignore glob")?;
        builder.add(glob);
    }

    for pattern in load_ddescriberignore(root)? {
        for expanded in expand_dir_pattern(&pattern) {
            let glob = Glob::new(&expanded).context("invalid .ddescriberignore pattern")?;
            builder.add(glob);
        }
    }

    builder.build().context("failed to build ignore matcher")
}

fn expand_dir_pattern(raw: &str) -> Vec<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    vec![
        trimmed.to_owned(),
        format!("{trimmed}/**"),
        format!("**/{trimmed}"),
        format!("**/{trimmed}/**"),
    ]
}

fn load_ddescriberignore(root: &Path) -> Result<Vec<String>> {
    let path = root.join(DDESCRIBER_IGNORE);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut patterns = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        patterns.push(trimmed.to_owned());
    }
    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::finder::ScanPattern;
    use std::fs;

    const FOCUSED: &str = "describe('a', function () {\n  iit('b');\n});\n";
    const PLAIN: &str = "describe('a', function () {\n  it('b');\n});\n";

    fn scanner() -> ProjectScanner {
        ProjectScanner::new(JasmineFinder::new(ScanPattern::Classic).expect("pattern compiles"))
    }

    fn names(files: &[JasmineFile]) -> Vec<String> {
        files.iter().map(|f| f.file_id().label()).collect()
    }

    #[test]
    fn finds_js_files_with_tests() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();

        fs::create_dir_all(root.join("spec"))?;
        fs::create_dir_all(root.join("node_modules/lib"))?;
        fs::write(root.join("spec/focused.js"), FOCUSED)?;
        fs::write(root.join("spec/plain.js"), PLAIN)?;
        fs::write(root.join("spec/util.js"), "module.exports = 1;\n")?;
        fs::write(root.join("spec/notes.txt"), FOCUSED)?;
        fs::write(root.join("node_modules/lib/vendor.js"), FOCUSED)?;
        fs::write(root.join("app.min.js"), FOCUSED)?;

        let cfg = ProjectConfig::from_root(root.to_path_buf(), Config::default());
        let files = scanner().scan(&cfg)?;

        assert_eq!(names(&files), vec!["focused.js", "plain.js"]);
        Ok(())
    }

    #[test]
    fn respects_ddescriberignore_and_size_limit() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();

        fs::create_dir_all(root.join("generated"))?;
        fs::write(root.join("generated/out.js"), FOCUSED)?;
        fs::write(root.join("big.js"), FOCUSED.repeat(50))?;
        fs::write(root.join("small.js"), FOCUSED)?;
        fs::write(root.join(DDESCRIBER_IGNORE), "# build output\ngenerated/\n")?;

        let cfg = ProjectConfig::from_root(root.to_path_buf(), Config::default())
            .with_max_file_size(256);
        let files = scanner().scan(&cfg)?;

        assert_eq!(names(&files), vec!["small.js"]);
        Ok(())
    }

    #[test]
    fn refresh_keeps_only_focused_files() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::write(root.join("a.js"), FOCUSED)?;
        fs::write(root.join("b.js"), PLAIN)?;

        let cfg = ProjectConfig::from_root(root.to_path_buf(), Config::default());
        let mut tree = ProjectTree::default();
        scanner().refresh(&cfg, &mut tree)?;

        let labels: Vec<_> = tree.files().iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["a.js"]);
        Ok(())
    }

    #[test]
    fn accepts_file_applies_walk_rules() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::create_dir_all(root.join(".git"))?;
        fs::create_dir_all(root.join(".cache"))?;
        fs::write(root.join(".gitignore"), "generated.js\n")?;
        fs::write(root.join("generated.js"), FOCUSED)?;
        fs::write(root.join(".cache/spec.js"), FOCUSED)?;
        fs::write(root.join("big.js"), FOCUSED.repeat(50))?;
        fs::write(root.join("small.js"), FOCUSED)?;

        let cfg = ProjectConfig::from_root(root.to_path_buf(), Config::default())
            .with_max_file_size(256);
        let filter = PathFilter::new(&cfg)?;

        assert!(filter.accepts_file(&root.join("small.js")));
        assert!(!filter.accepts_file(&root.join("generated.js")));
        assert!(!filter.accepts_file(&root.join(".cache/spec.js")));
        assert!(!filter.accepts_file(&root.join("big.js")));
        assert!(!filter.accepts_file(&root.join("missing.js")));

        assert_eq!(names(&scanner().scan(&cfg)?), vec!["small.js"]);
        Ok(())
    }

    #[test]
    fn filter_matches_relative_include_globs() -> Result<()> {
        let mut config = Config::default();
        config.ignore.paths.push("fixtures/".into());
        let cfg = ProjectConfig::from_root(PathBuf::from("/repo"), config);
        let filter = PathFilter::new(&cfg)?;

        assert!(filter.is_candidate(Path::new("/repo/test/a.js")));
        assert!(!filter.is_candidate(Path::new("/repo/test/a.ts")));
        assert!(!filter.is_candidate(Path::new("/repo/fixtures/a.js")));
        Ok(())
    }
}
