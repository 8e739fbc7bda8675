//! # CLI Layer
//!
//! The CLI layer is the **only** place in the codebase that:
//! - Knows about terminal I/O (stdout, stderr)
//! - Handles argument parsing
//! - Installs the log subscriber
//! - Formats output for human consumption
//!
//! ## Responsibilities
//!
//! 1. **Argument Parsing**: Convert shell arguments into typed commands via clap
//! 2. **Context Setup**: Load configuration and open the store
//! 3. **Dispatch**: Route commands to handlers
//! 4. **Output Formatting**: Hand results to `render`
//! 5. **Error Handling**: Attach context so `main` can print one clear message

use super::render;
use super::setup::{CardCommands, Cli, Commands, GeohashCommands, PlaceCommands, TripCommands};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};
use tokistore::bundle::archive::{import_archive, write_archive};
use tokistore::config::TokiConfig;
use tokistore::error::EntityKind;
use tokistore::geohash;
use tokistore::model::{Card, Coordinates, NewCard, Trip};
use tokistore::store::fs_backend::FsBackend;
use tokistore::store::StorageBackend;
use tokistore::{TokiError, TripStore};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

type Store = TripStore<FsBackend>;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Geohash math needs neither config nor store
    if let Commands::Geohash { action } = &cli.command {
        return handle_geohash(action);
    }

    let config = load_config(&cli)?;
    let mut store = config
        .open_store()
        .context("Could not open the data directory")?;
    debug!(data_dir = ?config.data_dir, "Store opened");

    match cli.command {
        Commands::Trip { action } => handle_trip(&mut store, action),
        Commands::Place { action } => handle_place(&mut store, action),
        Commands::Card { action } => handle_card(&mut store, action),
        Commands::Export { trip, output } => handle_export(&store, &config, &trip, output),
        Commands::Import { archive } => handle_import(&mut store, &archive),
        Commands::Doctor => handle_doctor(&mut store),
        Commands::Geohash { .. } => Ok(()),
    }
}

/// Logs go to stderr. `--verbose` wins over `RUST_LOG`; without either only
/// warnings are shown.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("tokistore=debug,toki=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tokistore=warn,toki=warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<TokiConfig> {
    let mut config =
        TokiConfig::load(cli.config.as_deref()).context("Could not load configuration")?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    Ok(config)
}

// --- Selectors ---

/// Look a trip up by id first, then by exact name.
fn resolve_trip(store: &Store, selector: &str) -> Result<Trip> {
    store
        .trip(selector)
        .or_else(|| store.trip_by_name(selector))
        .cloned()
        .ok_or_else(|| TokiError::not_found(EntityKind::Trip, selector).into())
}

fn trip_or_active(store: &Store, selector: Option<&str>) -> Result<Trip> {
    match selector {
        Some(selector) => resolve_trip(store, selector),
        None => store
            .active_trip()
            .cloned()
            .ok_or_else(|| anyhow!("No active trip; pass --trip or run `toki trip use <trip>`")),
    }
}

// --- Trips ---

fn handle_trip(store: &mut Store, action: TripCommands) -> Result<()> {
    match action {
        TripCommands::New { name, start, end } => {
            if let (Some(start), Some(end)) = (start, end) {
                if end < start {
                    bail!("Trip ends ({}) before it starts ({})", end, start);
                }
            }
            let trip = store.create_trip(&name, start, end)?;
            let active = store.active_trip_id() == Some(trip.id.as_str());
            println!("{}", render::created_trip(&trip, active));
        }
        TripCommands::List => {
            print!(
                "{}",
                render::trip_list(store.trips(), store.active_trip_id(), |id| {
                    store.cards_for_trip(id).len()
                })
            );
        }
        TripCommands::Show { trip } => {
            let trip = trip_or_active(store, trip.as_deref())?;
            let cards = store.cards_for_trip(&trip.id);
            print!("{}", render::trip_detail(&trip, &cards));
        }
        TripCommands::Rename { trip, name } => {
            let mut trip = resolve_trip(store, &trip)?;
            let old = std::mem::replace(&mut trip.name, name);
            let trip = store.update_trip(trip)?;
            println!("{}", render::success(&format!("Renamed {} to {}", old, trip.name)));
        }
        TripCommands::Delete { trip } => {
            let trip = resolve_trip(store, &trip)?;
            let cards = store.cards_for_trip(&trip.id).len();
            store.delete_trip(&trip.id)?;
            println!(
                "{}",
                render::success(&format!("Deleted trip {} ({} cards)", trip.name, cards))
            );
        }
        TripCommands::Use { trip } => {
            let trip = resolve_trip(store, &trip)?;
            store.set_active_trip(Some(&trip.id))?;
            println!("{}", render::success(&format!("Active trip: {}", trip.name)));
        }
    }
    Ok(())
}

// --- Places ---

fn handle_place(store: &mut Store, action: PlaceCommands) -> Result<()> {
    match action {
        PlaceCommands::Add {
            lat,
            lon,
            label,
            categories,
        } => {
            let existed = store
                .place_by_geohash(&geohash::encode(lat, lon, geohash::PLACE_PRECISION))
                .is_some();
            let place = store.find_or_create_place(lat, lon, label.as_deref(), categories)?;
            println!("{}", render::place_added(&place, existed));
        }
        PlaceCommands::List => print!("{}", render::place_list(store.places())),
    }
    Ok(())
}

// --- Cards ---

fn handle_card(store: &mut Store, action: CardCommands) -> Result<()> {
    match action {
        CardCommands::Add {
            kind,
            trip,
            place,
            text,
            media,
            mime,
            tags,
        } => {
            let trip = trip_or_active(store, trip.as_deref())?;
            if let Some(place_id) = place.as_deref() {
                if store.place(place_id).is_none() {
                    return Err(TokiError::not_found(EntityKind::Place, place_id).into());
                }
            }

            let mut new = NewCard::new(&trip.id, kind).with_tags(tags);
            if let Some(place_id) = place {
                new = new.at_place(place_id);
            }
            if let Some(text) = text {
                new = new.with_text(text);
            }
            let payload = match media {
                Some(path) => {
                    let data = std::fs::read(&path)
                        .with_context(|| format!("Could not read {}", path.display()))?;
                    let mime = mime.unwrap_or_else(|| mime_for_path(&path).to_string());
                    Some((data, mime))
                }
                None => None,
            };

            let card = create_card_with_payload(store, new, payload)?;
            println!("{}", render::card_added(&card, &trip));
        }
        CardCommands::List { trip } => {
            let trip = trip_or_active(store, trip.as_deref())?;
            print!("{}", render::card_list(&store.cards_for_trip(&trip.id)));
        }
        CardCommands::Delete { card } => {
            store.delete_card(&card)?;
            println!("{}", render::success(&format!("Deleted card {}", card)));
        }
    }
    Ok(())
}

/// MIME type from a file extension, for the formats the journal records.
fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" => "image/heic",
        "m4a" => "audio/m4a",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}

// --- Bundles ---

fn handle_export(
    store: &Store,
    config: &TokiConfig,
    selector: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let trip = resolve_trip(store, selector)?;
    let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.tar.gz", slug(&trip.name))));

    let file = File::create(&output)
        .with_context(|| format!("Could not create {}", output.display()))?;
    let bundle = write_archive(store, &trip.id, file, config.compression_level())?;
    println!("{}", render::exported(&bundle, &output));
    Ok(())
}

fn handle_import(store: &mut Store, archive: &Path) -> Result<()> {
    let file =
        File::open(archive).with_context(|| format!("Could not open {}", archive.display()))?;
    let trip = import_archive(store, file)
        .with_context(|| format!("Could not import {}", archive.display()))?;
    let cards = store.cards_for_trip(&trip.id).len();
    println!(
        "{}",
        render::success(&format!("Imported trip {} ({} cards)", trip.name, cards))
    );
    Ok(())
}

/// File-name friendly form of a trip name.
fn slug(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "trip".to_string()
    } else {
        trimmed.to_string()
    }
}

// --- Maintenance ---

fn handle_doctor(store: &mut Store) -> Result<()> {
    let report = store.doctor()?;
    print!("{}", render::doctor_report(&report));
    Ok(())
}

/// Save the payload (if any) and create the card pointing at it. A payload
/// saved for a card that could not be created is deleted again.
fn create_card_with_payload<B: StorageBackend>(
    store: &mut TripStore<B>,
    new: NewCard,
    payload: Option<(Vec<u8>, String)>,
) -> tokistore::Result<Card> {
    let Some((data, mime)) = payload else {
        return store.create_card(new);
    };

    let media_id = store.save_media(&data, &mime, None)?;
    match store.create_card(new.with_media(media_id.as_str())) {
        Ok(card) => Ok(card),
        Err(e) => {
            if let Err(cleanup) = store.delete_media(&media_id) {
                warn!("Could not remove payload {} of failed card: {}", media_id, cleanup);
            }
            Err(e)
        }
    }
}

fn handle_geohash(action: &GeohashCommands) -> Result<()> {
    match action {
        GeohashCommands::Encode {
            lat,
            lon,
            precision,
        } => {
            if !Coordinates::new(*lat, *lon).is_valid() {
                return Err(TokiError::InvalidCoordinates {
                    lat: *lat,
                    lon: *lon,
                }
                .into());
            }
            println!("{}", geohash::encode(*lat, *lon, usize::from(*precision)));
        }
        GeohashCommands::Decode { hash } => {
            let bounds = geohash::decode_bounds(hash)?;
            println!("{}", render::decoded(&bounds));
        }
    }
    Ok(())
}
