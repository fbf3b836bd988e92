//! Migration run
//!
//! Usage: wikicat run <ROWS> --pages <DIR> [--rules <FILE>] [--non-interactive]
//!
//! The migration runs on a worker thread; this thread answers its
//! confirmation requests on the terminal.

use super::{ProjectArgs, DEFAULT_RULES};
use crate::review::TerminalReviewSurface;
use anyhow::{bail, Context, Result};
use clap::Args;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use wikicat_core::namespace::NamespacePrefixResolver;
use wikicat_core::review::SkipAllReviewSurface;
use wikicat_engine::{
    confirmation_pair, parse_rows, spawn_migration, Collaborators, MigrationOptions,
    MigrationOrchestrator, NamespaceSelection,
};
use wikicat_store::{DirPageStore, RuleStore};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Tab-separated rows: old title, new title, comment
    pub rows: PathBuf,

    /// Directory with one `.wiki` file per page
    #[arg(long)]
    pub pages: PathBuf,

    /// Learned template rules
    #[arg(long, default_value = DEFAULT_RULES)]
    pub rules: PathBuf,

    #[command(flatten)]
    pub project: ProjectArgs,

    /// Namespace of the row titles: `auto` or a namespace id
    #[arg(long)]
    pub ns: Option<NamespaceSelection>,

    /// Summary comment replacing every row comment
    #[arg(long)]
    pub comment: Option<String>,

    /// Only process member pages whose title matches this regex
    #[arg(long)]
    pub filter: Option<String>,

    /// Skip direct category link rewriting
    #[arg(long)]
    pub no_phase1: bool,

    /// Skip template parameter rewriting
    #[arg(long)]
    pub no_phase2: bool,

    /// Leave category pages where they are (members are still migrated)
    #[arg(long)]
    pub no_move_category: bool,

    /// Move pages only, do not touch category members
    #[arg(long)]
    pub no_members: bool,

    /// Leave a redirect behind moved category pages
    #[arg(long)]
    pub category_redirect: bool,

    /// Skip every confirmation instead of asking
    #[arg(long)]
    pub non_interactive: bool,

    /// Write the run report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl RunArgs {
    fn apply_overrides(&self, options: &mut MigrationOptions) {
        if let Some(ns) = self.ns {
            options.namespace = ns;
        }
        if let Some(comment) = &self.comment {
            options.override_comment = Some(comment.clone());
        }
        if let Some(filter) = &self.filter {
            options.title_filter = Some(filter.clone());
        }
        options.phase1 &= !self.no_phase1;
        options.phase2 &= !self.no_phase2;
        options.move_category &= !self.no_move_category;
        options.move_members &= !self.no_members;
        options.leave_category_redirect |= self.category_redirect;
    }
}

/// Execute a migration run
pub fn execute(args: RunArgs) -> Result<()> {
    let mut config = args.project.load()?;
    args.apply_overrides(&mut config.migration);

    if !args.pages.is_dir() {
        bail!("page directory {} does not exist", args.pages.display());
    }
    let input = std::fs::read_to_string(&args.rows)
        .with_context(|| format!("reading rows from {}", args.rows.display()))?;
    let rows = parse_rows(&input);

    let resolver: Arc<dyn NamespacePrefixResolver> = Arc::new(config.resolver());
    let rules = Arc::new(
        RuleStore::open(&args.rules, resolver.clone())
            .with_context(|| format!("opening rules {}", args.rules.display()))?,
    );
    let pages = Arc::new(DirPageStore::new(&args.pages));

    let (channel, endpoint) = confirmation_pair(config.review.poll_interval());
    let orchestrator = MigrationOrchestrator::with_tracing(
        Collaborators {
            pages: pages.clone(),
            members: pages,
            resolver,
            rules,
            confirmations: channel,
        },
        config.migration.clone(),
        config.throttle.clone(),
    )?;
    let handle = spawn_migration(orchestrator, rows)?;

    if args.non_interactive {
        endpoint.serve(&mut SkipAllReviewSurface);
    } else {
        let mut surface = TerminalReviewSurface::new(io::BufReader::new(io::stdin()), io::stdout());
        endpoint.serve(&mut surface);
    }
    let report = handle.wait()?;

    println!("{}", report.summary_line());
    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
    }
    Ok(())
}
