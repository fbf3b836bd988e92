//! Rule store maintenance
//!
//! Usage: wikicat rules [--rules <FILE>] <show|clear|approve|skip>

use super::{ProjectArgs, DEFAULT_RULES};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use wikicat_core::rules::{Rule, RuleKind};
use wikicat_store::RuleStore;

#[derive(Debug, Args)]
pub struct RulesArgs {
    /// Learned template rules
    #[arg(long, default_value = DEFAULT_RULES, global = true)]
    pub rules: PathBuf,

    #[command(flatten)]
    pub project: ProjectArgs,

    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// List every bucket per project
    Show {
        /// Print the stored document as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget every learned rule
    Clear,
    /// Apply a template's rules without asking
    Approve(DispositionArgs),
    /// Never prompt for a template
    Skip(DispositionArgs),
}

#[derive(Debug, Args)]
pub struct DispositionArgs {
    /// Template name, with or without namespace prefix
    pub template: String,

    /// Switch the disposition off instead of on
    #[arg(long)]
    pub off: bool,
}

/// Execute rules command
pub fn execute(args: RulesArgs) -> Result<()> {
    let config = args.project.load()?;
    let project = config.migration.project();
    let store = RuleStore::open(&args.rules, Arc::new(config.resolver()))
        .with_context(|| format!("opening rules {}", args.rules.display()))?;

    match args.command {
        RulesCommand::Show { json } => show(&store, json),
        RulesCommand::Clear => {
            store.clear();
            println!("✓ Cleared {}", args.rules.display());
            Ok(())
        }
        RulesCommand::Approve(d) => {
            let changed = store.set_auto_approve(&project, &d.template, !d.off);
            report_disposition("approve", &d, changed);
            Ok(())
        }
        RulesCommand::Skip(d) => {
            let changed = store.set_auto_skip(&project, &d.template, !d.off);
            report_disposition("skip", &d, changed);
            Ok(())
        }
    }
}

fn report_disposition(name: &str, args: &DispositionArgs, changed: bool) {
    let state = if args.off { "off" } else { "on" };
    if changed {
        println!("✓ {} {} for {}", name, state, args.template);
    } else {
        println!("{} already {} for {}", name, state, args.template);
    }
}

fn show(store: &RuleStore, json: bool) -> Result<()> {
    let document = store.snapshot();
    if json {
        println!("{}", document.to_json_pretty()?);
        return Ok(());
    }
    if document.0.is_empty() {
        println!("No rules stored");
        return Ok(());
    }
    for (project, rules) in &document.0 {
        println!("{}", project);
        for (template, bucket) in &rules.templates {
            println!(
                "  {} [{}] {} rule(s)",
                template,
                bucket.auto.as_str(),
                bucket.rules.len()
            );
            for rule in &bucket.rules {
                println!("    {}", describe(rule));
            }
        }
    }
    Ok(())
}

fn describe(rule: &Rule) -> String {
    let body = match &rule.kind {
        RuleKind::Named { param, from, to } => format!("{}: {} → {}", param, from, to),
        RuleKind::PositionalSingle { from, to, dedupe } => match dedupe {
            Some(policy) => format!("{} → {} (dedupe {:?})", from, to, policy),
            None => format!("{} → {}", from, to),
        },
        RuleKind::PositionalSequence { sequence } => sequence
            .iter()
            .map(|s| format!("#{} {} → {}", s.index, s.from, s.to))
            .collect::<Vec<_>>()
            .join(", "),
    };
    if rule.auto == wikicat_core::AutoState::None {
        body
    } else {
        format!("{} [{}]", body, rule.auto.as_str())
    }
}
