use crate::analysis::AnalyzerKind;
use crate::error::Result;
use crate::logging::{self, LogFormat};
use crate::rules::{RuleSet, RuleStore};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "query-elevation")]
#[command(about = "Validate and inspect query elevation rules", long_about = None)]
pub struct Cli {
    /// Query analysis: keyword, lowercase, text or stemmed
    #[arg(short, long, global = true, default_value = "text")]
    pub analyzer: AnalyzerKind,
    /// Only match rules whose query is exactly the request query
    #[arg(long, global = true)]
    pub exact_only: bool,
    /// Emit log lines as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate a rule file and report how many rules it holds
    Check { rules: PathBuf },
    /// Show the rule a query resolves to
    Lookup {
        rules: PathBuf,
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
}

impl Cli {
    fn store(&self) -> RuleStore {
        RuleStore::new(self.analyzer.build()).with_subset_matching(!self.exact_only)
    }
}

/// Runs a parsed command line, printing results to stdout.
pub async fn run(cli: Cli) -> Result<()> {
    logging::init_with(if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    });

    let store = cli.store();
    match &cli.command {
        Commands::Check { rules } => {
            let rule_set = RuleSet::read(rules).await?;
            let provider = store.load(&rule_set.rules)?;
            println!(
                "{}: {} rules OK (analyzer: {}, fingerprint: {:016x})",
                rules.display(),
                provider.size(),
                cli.analyzer,
                provider.fingerprint()
            );
        }
        Commands::Lookup { rules, query } => {
            let rule_set = RuleSet::read(rules).await?;
            let provider = store.load(&rule_set.rules)?;
            let query = query.join(" ");
            let key = store.analyzer().key(&query);

            match provider.lookup(&key) {
                Some(rule) => {
                    let kind = if *rule.key() == key { "exact" } else { "subset" };
                    println!("Query {} matches rule '{}' ({})", key, rule.query(), kind);
                    let elevated: Vec<_> = rule.elevated_ids().iter().map(|id| id.as_str()).collect();
                    let mut excluded: Vec<_> = rule.excluded_ids().iter().map(|id| id.as_str()).collect();
                    excluded.sort_unstable();
                    println!("  elevate: {}", elevated.join(", "));
                    println!("  exclude: {}", excluded.join(", "));
                }
                None => println!("Query {} matches no rule", key),
            }
        }
    }

    Ok(())
}
