//! tracklet-run
//!
//! Runs every sector of the tracklet pipeline over a hit file, one event per
//! cycle, and prints a summary per event. Sectors of one event run in
//! parallel on the rayon pool.
//!
//! Usage:
//!   tracklet-run <config_dir> <hits_file> [--settings <file>] [--json]
//!
//! The configuration directory holds `memorymodules.dat`,
//! `processingmodules.dat` and `wires.dat`. The hit file has one hit per line,
//! `phi r z layer source [truth]`, with a line reading `event` between events.

use std::fs;
use std::path::PathBuf;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracklet_pipeline::{Hit, PipelineConfig, Sector, SectorSettings, Track};

fn print_usage() {
    eprintln!("tracklet-run - Run the sector pipeline over a hit file");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  tracklet-run <config_dir> <hits_file> [--settings <file>] [--json]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --settings <file>  JSON sector settings (default: built-in)");
    eprintln!("  --json             Print one JSON object per event");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG  Log filter (default: tracklet=info)");
}

struct Args {
    config_dir: PathBuf,
    hits: PathBuf,
    settings: Option<PathBuf>,
    json: bool,
}

fn parse_args(args: &[String]) -> Option<Args> {
    let mut positional = Vec::new();
    let mut settings = None;
    let mut json = false;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--settings" => settings = Some(PathBuf::from(iter.next()?)),
            "--json" => json = true,
            "-h" | "--help" => return None,
            _ => positional.push(PathBuf::from(arg)),
        }
    }
    let [config_dir, hits]: [PathBuf; 2] = positional.try_into().ok()?;
    Some(Args {
        config_dir,
        hits,
        settings,
        json,
    })
}

/// A hit and the readout source it arrived on.
#[derive(Debug)]
struct SourcedHit {
    hit: Hit,
    source: String,
}

fn parse_hits(text: &str) -> Result<Vec<Vec<SourcedHit>>, String> {
    let mut events: Vec<Vec<SourcedHit>> = Vec::new();
    let mut current: Option<Vec<SourcedHit>> = None;
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == "event" {
            events.extend(current.take());
            current = Some(Vec::new());
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let bad = |what: &str| format!("line {}: {what} in `{line}`", i + 1);
        if !(5..=6).contains(&fields.len()) {
            return Err(bad("expected `phi r z layer source [truth]`"));
        }
        let number = |s: &str| s.parse::<f64>().map_err(|_| bad("bad number"));
        let mut hit = Hit::new(
            number(fields[0])?,
            number(fields[1])?,
            number(fields[2])?,
            fields[3].parse().map_err(|_| bad("bad layer"))?,
        );
        if let Some(truth) = fields.get(5) {
            hit = hit.with_truth(truth.parse().map_err(|_| bad("bad truth id"))?);
        }
        current.get_or_insert_with(Vec::new).push(SourcedHit {
            hit,
            source: fields[4].to_string(),
        });
    }
    events.extend(current);
    Ok(events)
}

#[derive(Debug, Serialize)]
struct SectorSummary {
    sector: u32,
    stubs: usize,
    tracklets: usize,
    tracks: usize,
}

#[derive(Debug, Serialize)]
struct EventSummary {
    event: usize,
    hits: usize,
    sectors: Vec<SectorSummary>,
}

impl EventSummary {
    fn total(&self, f: impl Fn(&SectorSummary) -> usize) -> usize {
        self.sectors.iter().map(f).sum()
    }
}

/// Admit one event's hits into a sector, run every stage and clean up.
fn run_sector(sector: &mut Sector, hits: &[SourcedHit]) -> tracklet_pipeline::Result<SectorSummary> {
    for h in hits {
        sector.admit_hit(&h.hit, &h.source)?;
    }
    let stubs = sector.stubs().len();
    let mut accepted: Vec<Track> = Vec::new();
    sector.run_pipeline(&mut accepted)?;
    let summary = SectorSummary {
        sector: sector.index(),
        stubs,
        tracklets: sector.all_tracklets().len(),
        tracks: accepted.len(),
    };
    sector.clean()?;
    Ok(summary)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tracklet=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(args) = parse_args(&args) else {
        print_usage();
        std::process::exit(1);
    };

    let settings = match &args.settings {
        Some(path) => SectorSettings::load(path)?,
        None => SectorSettings::default(),
    };
    let config = PipelineConfig::load(&args.config_dir)?;
    let events = parse_hits(&fs::read_to_string(&args.hits)?)?;
    info!(
        sectors = settings.sector_count,
        events = events.len(),
        "starting run"
    );

    let mut sectors = (0..settings.sector_count)
        .map(|i| {
            let mut sector = Sector::new(i, settings.clone())?;
            sector.configure(&config)?;
            Ok(sector)
        })
        .collect::<tracklet_pipeline::Result<Vec<_>>>()?;

    for (event, hits) in events.iter().enumerate() {
        let summary = EventSummary {
            event,
            hits: hits.len(),
            sectors: sectors
                .par_iter_mut()
                .map(|sector| run_sector(sector, hits))
                .collect::<tracklet_pipeline::Result<_>>()?,
        };
        debug!(event, "event processed");

        if args.json {
            println!("{}", serde_json::to_string(&summary)?);
        } else {
            println!(
                "event {:>4}: {:>5} hits  {:>5} stubs  {:>4} tracklets  {:>4} tracks",
                summary.event,
                summary.hits,
                summary.total(|s| s.stubs),
                summary.total(|s| s.tracklets),
                summary.total(|s| s.tracks),
            );
        }
    }

    info!(events = events.len(), "run complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_need_two_paths() {
        let args: Vec<String> = ["cfg", "hits.txt", "--json"].map(String::from).to_vec();
        let parsed = parse_args(&args).unwrap();
        assert_eq!(parsed.config_dir, PathBuf::from("cfg"));
        assert!(parsed.json);
        assert!(parsed.settings.is_none());

        assert!(parse_args(&["cfg".to_string()]).is_none());
        let dangling: Vec<String> = ["cfg", "h", "--settings"].map(String::from).to_vec();
        assert!(parse_args(&dangling).is_none());
    }

    #[test]
    fn hits_split_into_events() {
        let text = "# header\nevent\n0.1 25 0 1 PS10G_1_A 7\n\nevent\n0.2 35 1 2 PS10G_2_A\n";
        let events = parse_hits(text).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0][0].hit.truth, Some(7));
        assert_eq!(events[1][0].source, "PS10G_2_A");
        assert_eq!(events[1][0].hit.layer, 2);

        let implicit = parse_hits("0.1 25 0 1 SRC\n").unwrap();
        assert_eq!(implicit.len(), 1);
        assert!(parse_hits("event\nevent\n").unwrap().iter().all(Vec::is_empty));
    }

    #[test]
    fn bad_hit_lines_name_the_line() {
        let err = parse_hits("event\n0.1 x 0 1 SRC\n").unwrap_err();
        assert!(err.starts_with("line 2: bad number"));
        assert!(parse_hits("0.1 25 0\n").is_err());
    }
}
