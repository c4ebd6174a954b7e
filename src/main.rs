use clap::Parser;
use clauseseek::{
    ConfigDb,
    DataDir,
    Error,
    IndexDb,
    Result,
    annotator::HeuristicAnnotator,
    document::IndexOptions,
    ingestion::{self, IngestOptions},
    mcp,
    model_manager::{
        DIMENSION_SETTING,
        EMBEDDER_SETTING,
        EmbedderConfig,
        EmbedderOverrides,
        MODEL_SETTING,
        load_embedder,
    },
    search::{self, SearchParams},
    text_util::add_line_numbers,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, ContextArgs, IngestArgs, ModelAction, SearchArgs};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("CLAUSESEEK_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config_db = ConfigDb::open(&data_dir.config_db())?;
    let flags = cli.embedder_overrides();

    match &cli.command {
        Command::Ingest(args) => {
            let index_db = IndexDb::open(&data_dir.indices_db())?;
            cmd_ingest(&config_db, &index_db, flags, args, cli.quiet)?;
        }
        Command::Remove { name } => {
            let index_db = IndexDb::open(&data_dir.indices_db())?;
            if !ingestion::remove_document(name, &config_db, &index_db)? {
                return Err(Error::NotFound {
                    kind: "document",
                    name: name.clone(),
                });
            }
            println!("Removed document '{name}'");
        }
        Command::List { json } => {
            cmd_list(&config_db, *json)?;
        }
        Command::Search(args) => {
            let index_db = IndexDb::open(&data_dir.indices_db())?;
            cmd_search(&config_db, &index_db, flags, args)?;
        }
        Command::Context(args) => {
            cmd_context(&config_db, args)?;
        }
        Command::Status { json } => {
            let index_db = IndexDb::open(&data_dir.indices_db())?;
            cmd_status(&config_db, &index_db, &data_dir, flags, *json)?;
        }
        Command::Model { action } => {
            cmd_model(&config_db, flags, action)?;
        }
        Command::Mcp => {
            let index_db = IndexDb::open(&data_dir.indices_db())?;
            let config = EmbedderConfig::load(flags, &config_db)?;
            let embedder = load_embedder(&config)?;
            mcp::run_mcp(config_db, index_db, embedder)?;
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_ingest(
    config_db: &ConfigDb,
    index_db: &IndexDb,
    flags: EmbedderOverrides,
    args: &IngestArgs,
    quiet: bool,
) -> Result<()> {
    if args.batch_size == 0 {
        return Err(Error::Config("batch size must be positive".to_string()));
    }

    let inputs = ingestion::inputs_from_path(&args.path, args.name.as_deref())?;
    if inputs.is_empty() {
        eprintln!("No documents found at {}", args.path.display());
        return Ok(());
    }

    let options = IngestOptions {
        titles: match &args.titles {
            Some(path) => ingestion::read_list_file(path)?,
            None => Vec::new(),
        },
        definitions: match &args.definitions {
            Some(path) => ingestion::read_list_file(path)?,
            None => Vec::new(),
        },
        replace: args.replace,
        index: IndexOptions {
            batch_size: args.batch_size,
            show_progress: !quiet,
        },
    };

    let config = EmbedderConfig::load(flags, config_db)?;
    eprintln!("Embedder: {}", config.describe());
    let mut embedder = load_embedder(&config)?;
    let annotator = HeuristicAnnotator::new(args.keyphrases);

    eprintln!("Found {} document(s)", inputs.len());
    for input in &inputs {
        eprintln!("Indexing '{}'...", input.name);
        let document = ingestion::ingest_document(
            input,
            &options,
            config_db,
            index_db,
            embedder.as_mut(),
            &annotator,
        )?;
        println!(
            "Ingested '{}' ({} sentences, {} titles)",
            document.name,
            document.sentences.len(),
            document.titles.len()
        );
    }

    Ok(())
}

fn cmd_list(config_db: &ConfigDb, json: bool) -> Result<()> {
    let documents = config_db.list_documents()?;

    if json {
        let items: Vec<_> = documents
            .iter()
            .map(|d| {
                json!({
                    "name": d.name,
                    "source": d.source,
                    "sentences": d.sentences.len(),
                    "titles": d.titles,
                    "definitions": d.definitions,
                    "embedder": d.embedder,
                    "ingested_at": d.ingested_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string(&items)?);
    } else if documents.is_empty() {
        println!("No documents ingested.");
    } else {
        for d in &documents {
            println!("{}\t{} sentences\t{}", d.name, d.sentences.len(), d.embedder);
        }
    }
    Ok(())
}

fn cmd_search(
    config_db: &ConfigDb,
    index_db: &IndexDb,
    flags: EmbedderOverrides,
    args: &SearchArgs,
) -> Result<()> {
    let config = EmbedderConfig::load(flags, config_db)?;
    let mut embedder = load_embedder(&config)?;

    let mut params = SearchParams::new(args.query.clone());
    params.documents = args.documents.clone();
    params.count = args.count;
    params.explain = args.explain;
    if let Some(min_score) = args.min_score {
        params.min_score = min_score;
    }

    let results = search::execute_search(
        &params,
        config_db,
        index_db,
        embedder.as_mut(),
        &HeuristicAnnotator::default(),
    )?;

    if args.json {
        search::format_json(&results, &args.query)?;
    } else {
        search::format_human(&results);
    }
    Ok(())
}

fn cmd_context(config_db: &ConfigDb, args: &ContextArgs) -> Result<()> {
    let Some(line) = args.line.checked_sub(1) else {
        return Err(Error::Config("line numbers start at 1".to_string()));
    };
    let window =
        search::context_window(config_db, &args.document, line, args.radius)?;

    if args.json {
        println!("{}", serde_json::to_string(&window)?);
    } else {
        println!("--- {}:{} ---", window.document, window.line + 1);
        println!(
            "{}",
            add_line_numbers(&window.lines.join("\n"), window.start + 1)
        );
    }
    Ok(())
}

fn cmd_status(
    config_db: &ConfigDb,
    index_db: &IndexDb,
    data_dir: &DataDir,
    flags: EmbedderOverrides,
    json: bool,
) -> Result<()> {
    let config = EmbedderConfig::load(flags, config_db)?;
    let documents = config_db.list_documents()?;
    let sentence_count: usize =
        documents.iter().map(|d| d.sentences.len()).sum();
    let interrupted = index_db.builds_in_progress()?;

    if json {
        let out = json!({
            "data_dir": data_dir.root(),
            "embedder": config.kind.as_str(),
            "model": config.model,
            "dimension": config.dimension,
            "documents": documents.len(),
            "sentences": sentence_count,
            "interrupted_builds": interrupted
                .iter()
                .map(|(name, _)| name)
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Embedder: {}", config.describe());
        println!("Documents: {}", documents.len());
        println!("Sentences: {sentence_count}");
        if !interrupted.is_empty() {
            println!("Interrupted builds (clear with `clauseseek remove <name>`):");
            for (name, started) in &interrupted {
                println!("  {name} (started at {started})");
            }
        }
    }
    Ok(())
}

fn cmd_model(
    config_db: &ConfigDb,
    flags: EmbedderOverrides,
    action: &ModelAction,
) -> Result<()> {
    match action {
        ModelAction::Show { json } => {
            let config = EmbedderConfig::load(flags, config_db)?;
            if *json {
                let out = json!({
                    "embedder": config.kind.as_str(),
                    "model": config.model,
                    "dimension": config.dimension,
                });
                println!("{}", serde_json::to_string(&out)?);
            } else {
                println!("{}", config.describe());
            }
        }
        ModelAction::Set => {
            if flags == EmbedderOverrides::default() {
                return Err(Error::Config(
                    "nothing to set (pass --embedder, --model or --dimension)"
                        .to_string(),
                ));
            }
            // Validate before persisting.
            EmbedderConfig::resolve(
                flags.clone(),
                EmbedderOverrides::default(),
                EmbedderOverrides::from_settings(config_db)?,
            )?;
            flags.store(config_db)?;
            let config = EmbedderConfig::load(EmbedderOverrides::default(), config_db)?;
            println!("Embedder set to {}", config.describe());
        }
        ModelAction::Clear => {
            for key in [EMBEDDER_SETTING, MODEL_SETTING, DIMENSION_SETTING] {
                config_db.remove_setting(key)?;
            }
            println!("Cleared stored embedder settings");
        }
    }
    Ok(())
}
