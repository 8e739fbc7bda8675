use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokistore::model::CardKind;

#[derive(Parser, Debug)]
#[command(
    name = "toki",
    bin_name = "toki",
    version,
    disable_help_subcommand = true
)]
#[command(about = "Trip journal: trips, places, cards and media", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (overrides TOKI_DATA_DIR and the config file)
    #[arg(long, global = true, value_name = "DIR", help_heading = "Options")]
    pub data_dir: Option<PathBuf>,

    /// Config file to read instead of the default location
    #[arg(long, global = true, value_name = "FILE", help_heading = "Options")]
    pub config: Option<PathBuf>,

    /// Verbose output (debug logs on stderr)
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, list and manage trips
    #[command(display_order = 1)]
    Trip {
        #[command(subcommand)]
        action: TripCommands,
    },

    /// Register and list places
    #[command(display_order = 2)]
    Place {
        #[command(subcommand)]
        action: PlaceCommands,
    },

    /// Add, list and delete cards
    #[command(display_order = 3)]
    Card {
        #[command(subcommand)]
        action: CardCommands,
    },

    /// Export a trip with its media to a .tar.gz archive
    #[command(display_order = 10)]
    Export {
        /// Trip id or name
        trip: String,

        /// Output file (defaults to <trip-name>.tar.gz)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a trip archive as a new trip
    #[command(display_order = 11)]
    Import {
        /// Archive produced by `toki export`
        archive: PathBuf,
    },

    /// Check and repair the data directory
    #[command(display_order = 20)]
    Doctor,

    /// Encode or decode geohashes
    #[command(display_order = 21)]
    Geohash {
        #[command(subcommand)]
        action: GeohashCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum TripCommands {
    /// Create a trip
    #[command(alias = "n")]
    New {
        name: String,

        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// List trips
    #[command(alias = "ls")]
    List,

    /// Show a trip and its cards
    Show {
        /// Trip id or name (defaults to the active trip)
        trip: Option<String>,
    },

    /// Rename a trip
    Rename { trip: String, name: String },

    /// Delete a trip, its cards and media only they used
    #[command(alias = "rm")]
    Delete { trip: String },

    /// Make a trip the active one
    Use { trip: String },
}

#[derive(Subcommand, Debug)]
pub enum PlaceCommands {
    /// Find or create the place at a coordinate
    #[command(allow_negative_numbers = true)]
    Add {
        lat: f64,
        lon: f64,

        /// Label used if the place is new
        #[arg(short, long)]
        label: Option<String>,

        /// Category, repeatable
        #[arg(short, long = "category")]
        categories: Vec<String>,
    },

    /// List places
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand, Debug)]
pub enum CardCommands {
    /// Add a card to a trip
    Add {
        /// photo, note or audio
        kind: CardKind,

        /// Trip id or name (defaults to the active trip)
        #[arg(short, long)]
        trip: Option<String>,

        /// Place id
        #[arg(short, long)]
        place: Option<String>,

        /// Card text
        #[arg(long)]
        text: Option<String>,

        /// File to attach as the card's media
        #[arg(short, long, value_name = "FILE")]
        media: Option<PathBuf>,

        /// MIME type of the media (guessed from the extension otherwise)
        #[arg(long, requires = "media")]
        mime: Option<String>,

        /// Tag, repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List the cards of a trip in time order
    #[command(alias = "ls")]
    List {
        /// Trip id or name (defaults to the active trip)
        #[arg(short, long)]
        trip: Option<String>,
    },

    /// Delete a card
    #[command(alias = "rm")]
    Delete { card: String },
}

#[derive(Subcommand, Debug)]
pub enum GeohashCommands {
    /// Encode a coordinate
    #[command(allow_negative_numbers = true)]
    Encode {
        lat: f64,
        lon: f64,

        /// Number of characters (0-12)
        #[arg(
            short,
            long,
            default_value_t = tokistore::geohash::PLACE_PRECISION as u8,
            value_parser = clap::value_parser!(u8).range(0..=12)
        )]
        precision: u8,
    },

    /// Decode a geohash to the center of its cell
    Decode { hash: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_geohash_precision_is_capped() {
        let cli = Cli::try_parse_from(["toki", "geohash", "encode", "1", "2"]).unwrap();
        match cli.command {
            Commands::Geohash {
                action: GeohashCommands::Encode { precision, .. },
            } => assert_eq!(precision, 5),
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["toki", "geohash", "encode", "1", "2", "-p", "12"]).is_ok());
        assert!(Cli::try_parse_from(["toki", "geohash", "encode", "1", "2", "-p", "13"]).is_err());
        assert!(Cli::try_parse_from(["toki", "geohash", "encode", "1", "2", "-p", "100000"]).is_err());
    }

    #[test]
    fn test_negative_coordinates_parse() {
        let cli = Cli::try_parse_from(["toki", "place", "add", "-33.8568", "-151.2153"]).unwrap();
        match cli.command {
            Commands::Place {
                action: PlaceCommands::Add { lat, lon, .. },
            } => {
                assert_eq!(lat, -33.8568);
                assert_eq!(lon, -151.2153);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_card_kind_and_repeated_tags() {
        let cli = Cli::try_parse_from([
            "toki", "card", "add", "note", "--text", "ramen", "--tag", "food", "--tag", "night",
        ])
        .unwrap();
        match cli.command {
            Commands::Card {
                action: CardCommands::Add { kind, tags, .. },
            } => {
                assert_eq!(kind, CardKind::Note);
                assert_eq!(tags, vec!["food", "night"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_card_kind_is_rejected() {
        assert!(Cli::try_parse_from(["toki", "card", "add", "video"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["toki", "trip", "list", "--data-dir", "/tmp/x", "-v"]).unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_trip_dates_parse() {
        let cli = Cli::try_parse_from([
            "toki", "trip", "new", "Japan 2025", "--start", "2025-04-01", "--end", "2025-04-14",
        ])
        .unwrap();
        match cli.command {
            Commands::Trip {
                action: TripCommands::New { name, start, end },
            } => {
                assert_eq!(name, "Japan 2025");
                assert_eq!(start, NaiveDate::from_ymd_opt(2025, 4, 1));
                assert_eq!(end, NaiveDate::from_ymd_opt(2025, 4, 14));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_mime_requires_media() {
        assert!(Cli::try_parse_from(["toki", "card", "add", "photo", "--mime", "image/png"]).is_err());
    }
}
