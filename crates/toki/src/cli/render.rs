//! Plain-text rendering of store records.
//!
//! Every function returns a `String` so output can be tested without a terminal.
//! Colors come from `console`, which drops them when stdout is not a TTY.

use chrono::{DateTime, NaiveDate, Utc};
use console::style;
use std::fmt::Write;
use std::path::Path;
use tokistore::bundle::Bundle;
use tokistore::geohash::Bounds;
use tokistore::model::{Card, CardKind, Place, Trip};
use tokistore::store::DoctorReport;

const TIME_WIDTH: usize = 14;
const ACTIVE_MARKER: &str = "*";

pub fn success(message: &str) -> String {
    style(message).green().to_string()
}

pub fn created_trip(trip: &Trip, active: bool) -> String {
    let mut out = format!("Created trip {} {}", style(&trip.name).bold(), style(&trip.id).dim());
    if active {
        out.push_str(" (active)");
    }
    out
}

/// One line per trip; the active trip is starred.
pub fn trip_list(
    trips: &[Trip],
    active: Option<&str>,
    card_count: impl Fn(&str) -> usize,
) -> String {
    if trips.is_empty() {
        return "No trips yet. Create one with `toki trip new <name>`.\n".to_string();
    }

    let mut out = String::new();
    for trip in trips {
        let marker = if active == Some(trip.id.as_str()) {
            ACTIVE_MARKER
        } else {
            " "
        };
        let _ = writeln!(
            out,
            "{} {}  {}  {} cards  {}  {}",
            style(marker).yellow().bold(),
            style(&trip.name).bold(),
            date_range(trip.start_date, trip.end_date),
            card_count(&trip.id),
            style(format_time_ago(trip.updated_at)).dim(),
            style(&trip.id).dim(),
        );
    }
    out
}

pub fn trip_detail(trip: &Trip, cards: &[&Card]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", style(&trip.name).bold().underlined());
    let dates = date_range(trip.start_date, trip.end_date);
    if !dates.is_empty() {
        let _ = writeln!(out, "{}", dates);
    }
    if !trip.companions.is_empty() {
        let names: Vec<&str> = trip.companions.iter().map(|c| c.name.as_str()).collect();
        let _ = writeln!(out, "With {}", names.join(", "));
    }
    let _ = writeln!(out, "{}", style(&trip.id).dim());
    out.push('\n');
    out.push_str(&card_list(cards));
    out
}

pub fn place_added(place: &Place, existed: bool) -> String {
    let verb = if existed { "Found place" } else { "Added place" };
    format!(
        "{} {} [{}] {}",
        verb,
        style(place_name(place)).bold(),
        style(&place.geohash).cyan(),
        style(&place.id).dim()
    )
}

pub fn place_list(places: &[Place]) -> String {
    if places.is_empty() {
        return "No places yet.\n".to_string();
    }
    let mut out = String::new();
    for place in places {
        let categories = if place.categories.is_empty() {
            String::new()
        } else {
            format!("  ({})", place.categories.join(", "))
        };
        let _ = writeln!(
            out,
            "{}  {:>10.5} {:>11.5}  {}{}  {}",
            style(&place.geohash).cyan(),
            place.lat,
            place.lon,
            place_name(place),
            categories,
            style(&place.id).dim()
        );
    }
    out
}

fn place_name(place: &Place) -> &str {
    place.label.as_deref().unwrap_or("(unnamed)")
}

pub fn card_added(card: &Card, trip: &Trip) -> String {
    format!(
        "Added {} card to {} {}",
        kind_name(card.kind),
        style(&trip.name).bold(),
        style(&card.id).dim()
    )
}

/// Cards in the order given, one per line.
pub fn card_list(cards: &[&Card]) -> String {
    if cards.is_empty() {
        return "No cards yet.\n".to_string();
    }
    let mut out = String::new();
    for card in cards {
        let mut line = format!(
            "{}  {:<5}",
            card.taken_at.format("%Y-%m-%d %H:%M"),
            kind_name(card.kind)
        );
        if let Some(label) = &card.place_label_at_save {
            let _ = write!(line, "  @ {}", label);
        }
        if let Some(text) = &card.text {
            let _ = write!(line, "  {}", text);
        }
        if let Some(media_id) = &card.media_id {
            let _ = write!(line, "  [media {}]", media_id);
        }
        if !card.tags.is_empty() {
            let tags: Vec<String> = card.tags.iter().map(|t| format!("#{}", t)).collect();
            let _ = write!(line, "  {}", style(tags.join(" ")).magenta());
        }
        let _ = writeln!(out, "{}  {}", line, style(&card.id).dim());
    }
    out
}

fn kind_name(kind: CardKind) -> &'static str {
    match kind {
        CardKind::Photo => "photo",
        CardKind::Note => "note",
        CardKind::Audio => "audio",
    }
}

pub fn exported(bundle: &Bundle, path: &Path) -> String {
    success(&format!(
        "Exported {} ({} cards, {} places, {} media) to {}",
        bundle.trip.name,
        bundle.cards.len(),
        bundle.places.len(),
        bundle.media.len(),
        path.display()
    ))
}

pub fn doctor_report(report: &DoctorReport) -> String {
    if *report == DoctorReport::default() {
        return success("No problems found.\n");
    }
    let mut out = String::new();
    if report.dangling_cards > 0 {
        let _ = writeln!(
            out,
            "Removed {} cards whose trip no longer exists",
            report.dangling_cards
        );
    }
    if report.missing_payloads > 0 {
        let _ = writeln!(
            out,
            "Removed {} media entries whose file is missing",
            report.missing_payloads
        );
    }
    if report.orphaned_media > 0 {
        let _ = writeln!(
            out,
            "{}",
            style(format!(
                "{} media files are not referenced by any card",
                report.orphaned_media
            ))
            .yellow()
        );
    }
    out
}

pub fn decoded(bounds: &Bounds) -> String {
    let (lat, lon) = bounds.center();
    let (dlat, dlon) = bounds.half_extent();
    format!("{:.6} {:.6} (±{:.6}, ±{:.6})", lat, lon, dlat, dlon)
}

fn date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
    match (start, end) {
        (Some(s), Some(e)) => format!("{} → {}", s, e),
        (Some(s), None) => format!("from {}", s),
        (None, Some(e)) => format!("until {}", e),
        (None, None) => String::new(),
    }
}

fn format_time_ago(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    let formatter = timeago::Formatter::new();
    let time_str = formatter.convert(duration.to_std().unwrap_or_default());
    format!("{:>width$}", time_str, width = TIME_WIDTH)
}
