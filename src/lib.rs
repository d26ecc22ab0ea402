pub mod cli;
pub mod export;
pub mod grid;
pub mod io_utils;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod table;
pub mod view;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands, FinalCommands, SourceArgs},
    session::{IngestOptions, LoadSession},
    store::{FinalStore, JsonFileStore, KeyValueStore},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("table_recon", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Reconcile(args) => handle_reconcile(&args),
        Commands::Stats(args) => handle_stats(&args),
        Commands::Export(args) => export::execute(&args),
        Commands::ExportAll(args) => export::execute_all(&args),
        Commands::Final(command) => handle_final(&command),
    }
}

/// Reads and ingests the command's source files into a fresh session.
pub(crate) fn load_session(args: &SourceArgs) -> Result<LoadSession> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let options = IngestOptions {
        case_sensitive: !args.ignore_case,
        trim_headers: !args.keep_header_whitespace,
    };
    LoadSession::load(&args.inputs, options, args.delimiter, encoding)
}

/// Opens the final-value store bound to this command's source files; values
/// stored against a different set of sources are cleared on open.
pub(crate) fn open_source_store(args: &SourceArgs) -> Result<FinalStore<JsonFileStore>> {
    let fingerprint = store::load_fingerprint(&args.inputs)?;
    store::open_store(&args.store, &fingerprint)
        .with_context(|| format!("Opening final-value store {:?}", args.store))
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let session = load_session(&args.sources)?;
    info!(
        "{} source(s), {} entities",
        session.column_count(),
        session.entities().len()
    );
    view::print_probe(&session);
    Ok(())
}

fn handle_reconcile(args: &cli::ReconcileArgs) -> Result<()> {
    let session = load_session(&args.sources)?;
    let store = open_source_store(&args.sources)?;
    let entity = match &args.entity {
        Some(name) => {
            if !session.entities().iter().any(|entity| entity == name) {
                return Err(anyhow!(
                    "Entity '{name}' does not appear in the reference source"
                ));
            }
            name.clone()
        }
        None => session
            .entities()
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("No entities were loaded from the reference source"))?,
    };

    let report = reconcile::reconcile_entity(&session, &entity);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        view::print_entity_report(
            &session,
            &report,
            &store,
            view::use_color(args.color),
            args.feature.as_deref(),
        );
    }
    Ok(())
}

fn handle_stats(args: &cli::StatsArgs) -> Result<()> {
    let session = load_session(&args.sources)?;
    view::print_stats(&session);
    Ok(())
}

fn handle_final(command: &FinalCommands) -> Result<()> {
    match command {
        FinalCommands::Set(args) => {
            let mut final_store = store::open_store_unchecked(&args.store)?;
            match args.source {
                Some(source) => {
                    final_store.set_column(&args.entity, &args.feature, source, &args.value)?;
                    info!(
                        "Stored column value for '{}' / '{}' (source {})",
                        args.entity, args.feature, source
                    );
                }
                None => {
                    final_store.set_final(&args.entity, &args.feature, &args.value)?;
                    info!("Stored final value for '{}' / '{}'", args.entity, args.feature);
                }
            }
            Ok(())
        }
        FinalCommands::Clear(args) => {
            let mut final_store = store::open_store_unchecked(&args.store)?;
            match args.source {
                Some(source) => {
                    final_store.clear_column(&args.entity, &args.feature, source)?;
                }
                None => {
                    final_store.clear_final(&args.entity, &args.feature)?;
                }
            }
            info!("Cleared '{}' / '{}'", args.entity, args.feature);
            Ok(())
        }
        FinalCommands::List(args) => {
            let final_store = store::open_store_unchecked(&args.store)?;
            let mut keys = final_store.keys();
            keys.sort();
            for key in keys {
                let value = final_store.inner().get(&key).unwrap_or_default();
                match final_store.inner().updated_at(&key) {
                    Some(updated_at) => {
                        println!("{key} = {value}  ({})", updated_at.format("%Y-%m-%d %H:%M:%S"))
                    }
                    None => println!("{key} = {value}"),
                }
            }
            Ok(())
        }
        FinalCommands::Reset(args) => {
            let mut final_store = store::open_store_unchecked(&args.store)?;
            final_store.reset()?;
            info!("Final-value store reset");
            Ok(())
        }
    }
}
