use std::cmp;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use atty::Stream;
use clap::{Parser, Subcommand};
use diksionariu::{
    DictionaryStore, Entry, Language, MarkupEngine, MatchPattern, MemoryStore, RankedCandidate,
    ResultFormatter, SearchConfig, SearchOrchestrator, SearchOutcome, SqliteStore,
    order_cross_references, order_definitions, order_exact, order_partial, redirect_target,
};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "diksionariu", about = "Search the Chamoru-English dictionary", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// SQLite dictionary file.
    #[arg(long, global = true, value_name = "PATH", conflicts_with = "entries")]
    db: Option<PathBuf>,

    /// JSON array of entries to search in memory instead of SQLite.
    #[arg(long, global = true, value_name = "PATH")]
    entries: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search headwords (Chamoru) or definitions (English).
    Search {
        /// Words to search for; `*` and `?` are wildcards, `~` asks for near matches.
        #[arg(required = true)]
        query: Vec<String>,
        /// Which side of the dictionary to search.
        #[arg(long, default_value_t = Language::Chamoru)]
        lang: Language,
        /// Maximum number of near-match suggestions.
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print the HTML result page instead of tables.
        #[arg(long)]
        html: bool,
    },
    /// Show every entry whose headword matches the word.
    Show {
        /// Headword to display.
        word: String,
        /// Print the HTML entry instead of text.
        #[arg(long)]
        html: bool,
    },
    /// Load a JSON array of entries into the SQLite file given by --db.
    Import {
        /// JSON file to read.
        source: PathBuf,
    },
    /// Serve the dictionary over HTTP.
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Default number of near-match suggestions per search.
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Search {
            query,
            lang,
            limit,
            html,
        } => {
            init_tracing("warn");
            let store = open_store(cli.db.as_deref(), cli.entries.as_deref())?;
            handle_search(store, &query.join(" "), lang, limit, html, cli.json)
        }
        Command::Show { word, html } => {
            init_tracing("warn");
            let store = open_store(cli.db.as_deref(), cli.entries.as_deref())?;
            handle_show(store, word, html, cli.json)
        }
        Command::Import { source } => {
            init_tracing("info");
            let target = cli
                .db
                .ok_or("`import` needs --db <PATH> for the SQLite file to write")?;
            handle_import(&source, &target, cli.json)
        }
        #[cfg(feature = "web")]
        Command::Serve { addr, limit } => {
            init_tracing("info");
            let store = open_store(cli.db.as_deref(), cli.entries.as_deref())?;
            let config = diksionariu::web::WebConfig {
                addr,
                search: search_config(limit),
            };
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(diksionariu::web::serve(config, store))?;
            Ok(())
        }
    }
}

fn init_tracing(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_store(
    db: Option<&Path>,
    entries: Option<&Path>,
) -> Result<Arc<dyn DictionaryStore>, Box<dyn Error>> {
    match (db, entries) {
        (Some(path), _) => Ok(Arc::new(SqliteStore::open_read_only(path)?)),
        (None, Some(path)) => {
            let file = File::open(path)
                .map_err(|err| format!("Failed to open {}: {err}", path.display()))?;
            let store = MemoryStore::from_json_reader(BufReader::new(file))?;
            if store.is_empty() {
                warn!(path = %path.display(), "entries file holds no entries");
            } else {
                info!(path = %path.display(), entries = store.len(), "Loaded dictionary entries");
            }
            Ok(Arc::new(store))
        }
        (None, None) => Err("Provide --db <sqlite file> or --entries <json file>".into()),
    }
}

fn search_config(limit: Option<usize>) -> SearchConfig {
    match limit {
        Some(limit) => SearchConfig::default().with_limit(cmp::max(1, limit)),
        None => SearchConfig::default(),
    }
}

fn handle_search(
    store: Arc<dyn DictionaryStore>,
    query: &str,
    lang: Language,
    limit: Option<usize>,
    as_html: bool,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let search = SearchOrchestrator::new(store, search_config(limit));
    let partial_limit = search.config().partial_display_limit;
    let formatter = ResultFormatter::new(partial_limit);

    let outcome = match search.search(query, lang) {
        Ok(outcome) => outcome,
        Err(err) if as_html => {
            println!("{}", formatter.render_error(&err));
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    if as_json {
        let payload = json!({
            "language": lang,
            "outcome": outcome,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if as_html {
        println!("{}", formatter.render(&outcome));
    } else {
        print_outcome(&outcome, partial_limit);
    }
    Ok(())
}

fn handle_show(
    store: Arc<dyn DictionaryStore>,
    word: String,
    as_html: bool,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let entries = store.find_exact(&MatchPattern::new(word.trim()))?;
    if entries.is_empty() {
        return Err(format!("No entry found for word {word:?}").into());
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if as_html {
        let formatter = ResultFormatter::default();
        for entry in &entries {
            println!("{}", formatter.format_entry(entry, true));
        }
    } else {
        for (i, entry) in entries.iter().enumerate() {
            if i > 0 {
                println!();
            }
            print_entry(entry);
        }
    }
    Ok(())
}

fn handle_import(source: &Path, target: &Path, as_json: bool) -> Result<(), Box<dyn Error>> {
    let file =
        File::open(source).map_err(|err| format!("Failed to open {}: {err}", source.display()))?;
    let entries: Vec<Entry> = serde_json::from_reader(BufReader::new(file))?;
    let store = SqliteStore::open(target)?;
    let inserted = store.insert_entries(&entries)?;

    if as_json {
        let payload = json!({
            "source": source.display().to_string(),
            "database": target.display().to_string(),
            "inserted": inserted,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!(
            "Imported {inserted} entries from {} into {}.",
            source.display(),
            target.display()
        );
    }
    Ok(())
}

fn print_outcome(outcome: &SearchOutcome, partial_limit: usize) {
    match outcome {
        SearchOutcome::Exact { query, entries } => {
            if query.contains(['*', '?']) {
                println!("{} results found for \"{query}\".\n", entries.len());
            }
            for (i, entry) in order_exact(query, entries).into_iter().enumerate() {
                if i > 0 {
                    println!();
                }
                print_entry(entry);
            }
        }
        SearchOutcome::CrossReference { query, entries } => {
            if let Some(entry) = redirect_target(query, entries) {
                println!("(Redirected from \"{query}\")\n");
                print_entry(entry);
                return;
            }
            println!("Entry not found: \"{query}\". Try a near-match search with \"{query}~\".");
            println!("{} results in other entries:", entries.len());
            print_reference_table(query, &order_cross_references(query, entries));
        }
        SearchOutcome::Partial {
            query,
            headwords,
            candidates,
        } => {
            println!("Entry not found: \"{query}\".");
            let ordered = order_partial(query, headwords);
            println!("Partial matches:");
            for word in ordered.iter().take(partial_limit) {
                println!("  • {word}");
            }
            if ordered.len() > partial_limit {
                println!("  … {} more (search \"*{query}*\")", ordered.len() - partial_limit);
            }
            println!("\nOr did you mean:");
            print_candidate_table(candidates);
        }
        SearchOutcome::Fuzzy {
            query,
            candidates,
            long_list,
        } => {
            if *long_list {
                println!("Near matches for \"{query}\":");
            } else {
                println!("Entry not found: \"{query}\".\n\nDid you mean:");
            }
            print_candidate_table(candidates);
        }
        SearchOutcome::Definition { query, entries } => {
            if entries.is_empty() {
                println!(
                    "No results found for \"{query}\". Repeat the search in Chamoru with `--lang ch`."
                );
                return;
            }
            println!("{} results found for \"{query}\":", entries.len());
            print_definition_table(&order_definitions(query, entries));
        }
    }
}

fn print_entry(entry: &Entry) {
    let markup = MarkupEngine::markdown();
    println!("Entry: {} (#{})", entry.entry, entry.index_num);
    if !entry.part_of_speech.is_empty() {
        println!("Part of Speech: {}", entry.part_of_speech);
    }
    render_markdown_block("Definition", &markup.render(&entry.definition));
    render_markdown_block("Examples", &markup.render(&entry.examples));
    for (title, field) in [
        ("Alternate Forms", &entry.alternate_forms),
        ("Origin", &entry.origin),
        ("Notes", &entry.notes),
        ("Related Forms", &entry.related_forms),
        ("See Also", &entry.see_also),
        ("Source", &entry.source),
    ] {
        render_markdown_block(title, &markup.render(field));
    }
}

fn print_reference_table(query: &str, rows: &[&Entry]) {
    let width = rows
        .iter()
        .map(|entry| entry.entry.chars().count())
        .max()
        .unwrap_or(4)
        .max("WORD".len());
    println!("{:<width$}  {}", "WORD", "FIELD", width = width);
    println!("{:-<width$}  {}", "", "---------------", width = width);
    for entry in rows {
        let field = if entry.alternate_forms.contains(query) {
            "alternate forms"
        } else if entry.related_forms.contains(query) {
            "related forms"
        } else {
            "see also"
        };
        println!("{:<width$}  {}", entry.entry, field, width = width);
    }
}

fn print_candidate_table(rows: &[RankedCandidate]) {
    if rows.is_empty() {
        println!("No near matches.");
        return;
    }
    let width = rows
        .iter()
        .map(|row| row.word.chars().count())
        .max()
        .unwrap_or(4)
        .max("WORD".len());
    println!("{:<width$}  {:<5}  {}", "WORD", "SCORE", "MATCH", width = width);
    println!("{:-<width$}  {}  {}", "", "-----", "----------", width = width);
    for row in rows {
        println!(
            "{:<width$}  {:<5.3}  {}",
            row.word,
            row.score,
            strength_bar(row.score),
            width = width
        );
    }
}

fn strength_bar(score: f64) -> String {
    let filled = (score.clamp(0.0, 1.0) * 10.0).round() as usize;
    "█".repeat(filled)
}

fn print_definition_table(rows: &[&Entry]) {
    let markup = MarkupEngine::markdown();
    let width = rows
        .iter()
        .map(|entry| entry.entry.chars().count())
        .max()
        .unwrap_or(4)
        .max("WORD".len());
    println!("{:<width$}  {}", "WORD", "DEFINITION", width = width);
    println!("{:-<width$}  {}", "", "----------", width = width);
    for entry in rows {
        let definition = markup.render(&entry.definition.replace("'''", "").replace("~~", ""));
        let pos = if entry.part_of_speech.is_empty() {
            String::new()
        } else {
            format!("({}) ", entry.part_of_speech)
        };
        println!("{:<width$}  {pos}{definition}", entry.entry, width = width);
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn markdown_skin() -> MadSkin {
    MadSkin::default()
}

fn render_markdown_block(title: &str, body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    println!("\n{title}:");
    if stdout_is_tty() {
        let skin = markdown_skin();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}
