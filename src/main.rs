//! conceptq CLI: ask questions against an ontology and answer its dialogs.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use conceptq::config::EngineConfig;
use conceptq::dialog::learning::LearningStore;
use conceptq::model::Key;
use conceptq::ontology::{OntologyGraph, StaticSynonyms};
use conceptq::pipeline::{Outcome, Request, Resolver};
use conceptq::session::FileSessionStore;

#[derive(Parser)]
#[command(name = "conceptq", version, about = "Question resolution over knowledge graphs")]
struct Cli {
    /// Engine configuration (TOML). Defaults apply when the file is missing.
    #[arg(long, global = true, default_value = "conceptq.toml")]
    config: PathBuf,

    /// Session id; dialogs are answered within the same session.
    #[arg(long, global = true, default_value = "default")]
    session: String,

    /// Directory holding session state between invocations.
    #[arg(long, global = true, default_value = ".conceptq/sessions")]
    session_dir: PathBuf,

    /// Only log warnings and errors.
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question given as a bracketed parse tree.
    Ask {
        /// Ontology document (JSON).
        #[arg(long)]
        ontology: PathBuf,

        /// Penn Treebank parse of the question, e.g. "(ROOT (NP (NNS cities)))".
        #[arg(long)]
        tree: String,

        /// Personalization labels (comma-separated).
        #[arg(long, value_delimiter = ',')]
        labels: Vec<String>,
    },

    /// Answer the pending dialog of the session.
    Vote {
        /// Ontology document (JSON).
        #[arg(long)]
        ontology: PathBuf,

        /// Id of the chosen vote.
        id: String,
    },

    /// Inspect or reset the learning model.
    Learning {
        #[command(subcommand)]
        action: LearningAction,
    },
}

#[derive(Subcommand)]
enum LearningAction {
    /// List stored keys and their votes.
    Show,
    /// Delete the learning model.
    Clear,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = EngineConfig::load(&cli.config)?;
    let learning = LearningStore::new(&config.learning.store_path);

    match &cli.command {
        Commands::Ask {
            ontology,
            tree,
            labels,
        } => {
            let context = Context::new(&cli, &config, &learning);
            let outcome = context.resolve(ontology, labels.clone(), Request::Ask(tree.clone()))?;
            print!("{outcome}");
        }

        Commands::Vote { ontology, id } => {
            let context = Context::new(&cli, &config, &learning);
            let outcome = context.resolve(ontology, Vec::new(), Request::Vote(id.clone()))?;
            print!("{outcome}");
        }

        Commands::Learning { action } => match action {
            LearningAction::Show => {
                let entries = learning.entries()?;
                if entries.is_empty() {
                    println!("Learning model is empty ({}).", learning.path().display());
                } else {
                    println!("Learning model ({} keys):", entries.len());
                    for (key, votes) in &entries {
                        println!("  {}", describe_key(key));
                        for vote in votes {
                            println!(
                                "    {:+.3} {}{}",
                                vote.score,
                                vote.identifier.element.print_uri(),
                                vote.task
                                    .as_deref()
                                    .map(|t| format!(" ({t})"))
                                    .unwrap_or_default()
                            );
                        }
                    }
                }
            }
            LearningAction::Clear => {
                learning.clear()?;
                println!("Learning model cleared.");
            }
        },
    }

    Ok(())
}

/// Session and stores shared by `ask` and `vote`.
struct Context<'a> {
    session: &'a str,
    session_dir: &'a Path,
    config: &'a EngineConfig,
    learning: &'a LearningStore,
}

impl<'a> Context<'a> {
    fn new(cli: &'a Cli, config: &'a EngineConfig, learning: &'a LearningStore) -> Self {
        Self {
            session: &cli.session,
            session_dir: &cli.session_dir,
            config,
            learning,
        }
    }

    fn resolve(&self, ontology: &Path, labels: Vec<String>, request: Request) -> Result<Outcome> {
        let kb = OntologyGraph::load(ontology)?;
        let synonyms = StaticSynonyms::new();
        std::fs::create_dir_all(self.session_dir).into_diagnostic()?;
        let sessions = FileSessionStore::new(self.session_dir);
        let resolver = Resolver::new(&kb, &synonyms, self.config, &sessions)
            .with_learning(self.learning)
            .with_user_labels(labels);
        Ok(resolver.respond(self.session, request))
    }
}

fn describe_key(key: &Key) -> String {
    let mut out = format!("\"{}\" @ {}", key.text, key.oe_id);
    for triple in &key.triples {
        out.push_str(&format!(" [{} {} {}]", triple[0], triple[1], triple[2]));
    }
    out
}
