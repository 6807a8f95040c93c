use crate::error::{Error, Result};
use crate::sample::{PositionSample, Route};
use crate::summary::ActivitySummary;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

pub fn read_route_csv<R: Read>(reader: R) -> Result<Route> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut route = Vec::new();
    for record in rdr.deserialize::<PositionSample>() {
        route.push(record?);
    }
    Ok(route)
}

pub fn write_route_csv<W: Write>(writer: W, route: &[PositionSample]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for sample in route {
        wtr.serialize(sample)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn summary_to_json(summary: &ActivitySummary) -> Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

pub fn summary_from_json(text: &str) -> Result<ActivitySummary> {
    Ok(serde_json::from_str(text)?)
}

/// JSON route files hold either a whole summary or a bare sample list
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonRoute {
    Summary(Box<ActivitySummary>),
    Samples(Route),
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Read a route from a `.csv` or `.json` file
pub fn read_route_file<P: AsRef<Path>>(path: P) -> Result<Route> {
    let path = path.as_ref();
    let route = match extension(path).as_str() {
        "csv" => read_route_csv(BufReader::new(File::open(path)?))?,
        "json" => {
            let reader = BufReader::new(File::open(path)?);
            match serde_json::from_reader::<_, JsonRoute>(reader)? {
                JsonRoute::Summary(summary) => summary.route_points,
                JsonRoute::Samples(route) => route,
            }
        }
        other => return Err(Error::UnsupportedFormat(other.to_string())),
    };
    debug!(path = %path.display(), samples = route.len(), "route loaded");
    Ok(route)
}

/// Write a summary as JSON, or just its route as CSV, chosen by extension
pub fn write_summary_file<P: AsRef<Path>>(path: P, summary: &ActivitySummary) -> Result<()> {
    let path = path.as_ref();
    match extension(path).as_str() {
        "csv" => write_route_csv(BufWriter::new(File::create(path)?), &summary.route_points),
        "json" => {
            let mut out = BufWriter::new(File::create(path)?);
            out.write_all(summary_to_json(summary)?.as_bytes())?;
            out.flush()?;
            Ok(())
        }
        other => Err(Error::UnsupportedFormat(other.to_string())),
    }
}
