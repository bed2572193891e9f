//! Command line front end.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::thread;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;

use crate::app::document::JasmineFile;
use crate::app::finder::{JasmineFinder, ScanPattern};
use crate::app::project::{ProjectConfig, ProjectScanner};
use crate::app::projection::{FileProjection, ProjectTree, ProjectionEvent};
use crate::app::render;
use crate::app::watch::ProjectWatcher;
use crate::domain::errors::DomainError;
use crate::domain::model::{NodeId, PendingState, SyntaxVariant, TestCounts, TestNode};
use crate::infra::config::Config;

#[derive(Debug, Parser)]
#[command(name = "ddescriber", author, version, about = "Focus and exclude Jasmine suites and specs", long_about = None)]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Focus keyword spelling, overriding the configuration
    #[arg(long, global = true, value_enum)]
    pub syntax: Option<SyntaxVariant>,
    /// Keyword set to scan for, overriding the configuration
    #[arg(long, global = true, value_enum)]
    pub pattern: Option<ScanPattern>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show every suite and spec of a file
    Tree {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show the node closest to a line with its siblings and enclosing suites
    Closest {
        file: PathBuf,
        #[arg(short, long)]
        line: usize,
        #[arg(long)]
        json: bool,
    },
    /// Focus the node closest to a line
    Include(ChangeArgs),
    /// Exclude the node closest to a line
    Exclude(ChangeArgs),
    /// Restore the plain keyword of the node closest to a line
    Rollback(ChangeArgs),
    /// Restore every focused or excluded node of a file
    Clean {
        file: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// List files that contain focused suites or specs
    Focused {
        root: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// List focused files and keep the list current as files change
    Watch { root: Option<PathBuf> },
    /// Generate shell completions
    Completions { shell: Shell },
}

#[derive(Debug, Args)]
pub struct ChangeArgs {
    pub file: PathBuf,
    /// 1-based line of the cursor
    #[arg(short, long)]
    pub line: usize,
    /// Apply to the closest node's siblings and enclosing suites as well
    #[arg(long)]
    pub hierarchy: bool,
    /// Print the edited file instead of writing it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Serialize)]
struct TreeReport<'a> {
    file: String,
    counts: TestCounts,
    nodes: Vec<&'a TestNode>,
}

#[derive(Serialize)]
struct ClosestReport<'a> {
    closest: &'a TestNode,
    matches: Vec<&'a TestNode>,
}

/// Session state shared by every command.
struct Session {
    config: Config,
    finder: JasmineFinder,
}

impl Session {
    fn new(cli: &Cli) -> Result<Self> {
        let mut config = Config::load()?;
        if let Some(syntax) = cli.syntax {
            config.defaults.set_syntax(syntax);
        }
        if let Some(pattern) = cli.pattern {
            config.scan.set_pattern(pattern);
        }
        let finder = JasmineFinder::new(config.scan.pattern())?;
        Ok(Self { config, finder })
    }

    fn syntax(&self) -> SyntaxVariant {
        self.config.defaults.syntax()
    }

    fn project(&self, root: Option<PathBuf>) -> Result<ProjectConfig> {
        let root = match root {
            Some(root) => root,
            None => std::env::current_dir().context("unable to determine working directory")?,
        };
        let root = root
            .canonicalize()
            .with_context(|| format!("failed to resolve {}", root.display()))?;
        Ok(ProjectConfig::from_root(root, self.config.clone()))
    }
}

/// Run a parsed command line, writing results to stdout.
pub fn run(cli: Cli) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(cli, &mut out)
}

pub fn execute(cli: Cli, out: &mut dyn Write) -> Result<()> {
    if let Command::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "ddescriber", out);
        return Ok(());
    }

    let session = Session::new(&cli)?;
    match cli.command {
        Command::Tree { file, json } => tree(&session, &file, json, out),
        Command::Closest { file, line, json } => closest(&session, &file, line, json, out),
        Command::Include(args) => change(&session, &args, PendingState::Include, out),
        Command::Exclude(args) => change(&session, &args, PendingState::Exclude, out),
        Command::Rollback(args) => change(&session, &args, PendingState::Rollback, out),
        Command::Clean { file, dry_run } => clean(&session, &file, dry_run, out),
        Command::Focused { root, json } => focused(&session, root, json, out),
        Command::Watch { root } => watch(&session, root, out),
        Command::Completions { .. } => Ok(()),
    }
}

fn tree(session: &Session, path: &Path, json: bool, out: &mut dyn Write) -> Result<()> {
    let file = JasmineFile::load(path, &session.finder)?;
    let forest = file.forest();

    if json {
        let report = TreeReport {
            file: file.file_id().to_string(),
            counts: file.counts(),
            nodes: forest.preorder().into_iter().filter_map(|id| forest.node(id)).collect(),
        };
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
        return Ok(());
    }

    if forest.is_empty() {
        writeln!(out, "No suites or specs found in {}", file.file_id())?;
        return Ok(());
    }
    write!(out, "{}", render::render_forest(forest, None))?;
    writeln!(out, "{}", render::render_counts(&file.counts()))?;
    Ok(())
}

fn closest(session: &Session, path: &Path, line: usize, json: bool, out: &mut dyn Write) -> Result<()> {
    let file = JasmineFile::load(path, &session.finder)?;
    let hierarchy = file.hierarchy_at(line)?;

    if json {
        let report = ClosestReport {
            closest: file.node(hierarchy.closest)?,
            matches: hierarchy
                .matches
                .iter()
                .map(|id| file.node(*id))
                .collect::<Result<_, DomainError>>()?,
        };
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
        return Ok(());
    }

    write!(out, "{}", render::render_hierarchy(file.forest(), &hierarchy))?;
    Ok(())
}

fn change(session: &Session, args: &ChangeArgs, state: PendingState, out: &mut dyn Write) -> Result<()> {
    let mut file = JasmineFile::load(&args.file, &session.finder)?;
    let hierarchy = file.hierarchy_at(args.line)?;
    let targets: Vec<NodeId> = if args.hierarchy {
        hierarchy.matches
    } else {
        vec![hierarchy.closest]
    };

    for id in &targets {
        file.set_pending(*id, state)?;
    }
    commit(session, &mut file, args.dry_run, out)
}

fn clean(session: &Session, path: &Path, dry_run: bool, out: &mut dyn Write) -> Result<()> {
    let mut file = JasmineFile::load(path, &session.finder)?;
    file.mark_clean();
    commit(session, &mut file, dry_run, out)
}

fn commit(session: &Session, file: &mut JasmineFile, dry_run: bool, out: &mut dyn Write) -> Result<()> {
    let changes = file.commit(session.syntax(), &session.finder)?;
    if dry_run {
        write!(out, "{}", file.text())?;
        return Ok(());
    }
    if !changes.is_empty() {
        file.save()?;
    }
    writeln!(out, "Updated {} keyword(s) in {}", changes.len(), file.file_id())?;
    Ok(())
}

fn focused(session: &Session, root: Option<PathBuf>, json: bool, out: &mut dyn Write) -> Result<()> {
    let cfg = session.project(root)?;
    let scanner = ProjectScanner::new(session.finder.clone());
    let mut tree = ProjectTree::default();
    scanner.refresh(&cfg, &mut tree)?;

    if json {
        let files: &[FileProjection] = tree.files();
        serde_json::to_writer_pretty(&mut *out, files)?;
        writeln!(out)?;
        return Ok(());
    }
    write!(out, "{}", render::render_project(&tree))?;
    Ok(())
}

fn watch(session: &Session, root: Option<PathBuf>, out: &mut dyn Write) -> Result<()> {
    let cfg = session.project(root)?;
    let watcher = ProjectWatcher::new(ProjectScanner::new(session.finder.clone()), cfg)?;
    let mut tree = ProjectTree::default();
    let events = tree.subscribe();

    writeln!(out, "Watching for changes, press Ctrl-C to stop")?;
    out.flush()?;

    // The tree lives on the watcher thread; its senders close the channel when `run` returns.
    let handle = thread::spawn(move || watcher.run(&mut tree));
    write_events(events, out)?;
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("watcher thread panicked"))?
}

/// Print each projection event as a JSON line until every sender is gone.
fn write_events(events: Receiver<ProjectionEvent>, out: &mut dyn Write) -> Result<()> {
    for event in events {
        serde_json::to_writer(&mut *out, &event)
            .with_context(|| format!("failed to write event for {}", event.file_id))?;
        writeln!(out)?;
        out.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::projection::FileId;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn events_are_written_as_json_lines() -> Result<()> {
        let finder = JasmineFinder::new(ScanPattern::Classic)?;
        let focused = finder.scan("describe('a', function () {\n  iit('b');\n});\n");

        let mut tree = ProjectTree::default();
        let events = tree.subscribe();
        tree.update_file(FileProjection::new(FileId::new("a.js"), focused));
        tree.remove_file(&FileId::new("a.js"));
        drop(tree);

        let mut out = Vec::new();
        write_events(events, &mut out)?;

        let lines: Vec<serde_json::Value> = String::from_utf8(out)?
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["change"], "added");
        assert_eq!(lines[0]["file_id"], "a.js");
        assert_eq!(lines[1]["change"], "removed");
        Ok(())
    }

    #[test]
    fn parses_change_arguments() {
        let cli = Cli::parse_from([
            "ddescriber",
            "--syntax",
            "jasmine1",
            "include",
            "a.js",
            "-l",
            "4",
            "--hierarchy",
        ]);
        assert_eq!(cli.syntax, Some(SyntaxVariant::Jasmine1));
        match cli.command {
            Command::Include(args) => {
                assert_eq!(args.line, 4);
                assert!(args.hierarchy);
                assert!(!args.dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
