use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifier, player and timestamp columns; no generalisable signal, never read.
pub const DROPPED_COLUMNS: [&str; 6] = ["date", "mid", "batsman", "bowler", "striker", "non-striker"];

pub const REQUIRED_COLUMNS: [&str; 9] = [
    "bat_team",
    "bowl_team",
    "venue",
    "runs",
    "wickets",
    "overs",
    "runs_last_5",
    "wickets_last_5",
    "total",
];

/// One ball-by-ball snapshot of an innings, labelled with the final total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub bat_team: String,
    pub bowl_team: String,
    pub venue: String,
    pub runs: u32,
    pub wickets: u32,
    pub overs: f64,
    pub runs_last_5: u32,
    pub wickets_last_5: u32,
    pub total: u32,
}

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub records: Vec<MatchRecord>,
    pub dropped_columns: Vec<String>,
    pub fingerprint: String,
}

pub fn load_dataset(path: &Path) -> Result<LoadedDataset> {
    let raw = fs::read(path).with_context(|| format!("read training data {}", path.display()))?;
    let fingerprint = fingerprint_bytes(&raw);
    let (records, dropped_columns) =
        parse_records(&raw).with_context(|| format!("parse training data {}", path.display()))?;
    Ok(LoadedDataset {
        records,
        dropped_columns,
        fingerprint,
    })
}

pub fn load_records(path: &Path) -> Result<Vec<MatchRecord>> {
    load_dataset(path).map(|ds| ds.records)
}

/// Parses a header-led comma-delimited table. Returns the records and the
/// dirty columns that were present and skipped.
pub fn parse_records(raw: &[u8]) -> Result<(Vec<MatchRecord>, Vec<String>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(raw);

    let headers = reader.headers().context("read header row")?.clone();
    let missing = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .copied()
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(anyhow!("missing required columns: {}", missing.join(", ")));
    }
    let dropped = headers
        .iter()
        .filter(|h| DROPPED_COLUMNS.contains(h))
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut records = Vec::new();
    for (idx, row) in reader.deserialize::<MatchRecord>().enumerate() {
        // Header is line 1, so data row `idx` sits on line idx + 2.
        let record = row.with_context(|| format!("malformed row at line {}", idx + 2))?;
        if !record.overs.is_finite() || record.overs < 0.0 {
            return Err(anyhow!(
                "malformed row at line {}: overs must be a non-negative number",
                idx + 2
            ));
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(anyhow!("training data has no rows"));
    }
    Ok((records, dropped))
}

/// SHA-256 of the file as stored, so a bundle can be traced back to its data.
pub fn source_fingerprint(path: &Path) -> Result<String> {
    let raw = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(fingerprint_bytes(&raw))
}

pub fn fingerprint_bytes(raw: &[u8]) -> String {
    format!("{:x}", Sha256::digest(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "mid,date,venue,bat_team,bowl_team,batsman,bowler,runs,wickets,overs,runs_last_5,wickets_last_5,striker,non-striker,total\n\
1,2008-04-18,M Chinnaswamy Stadium,Kolkata Knight Riders,Royal Challengers Bangalore,SC Ganguly,P Kumar,1,0,0.1,1,0,0,0,222\n\
1,2008-04-18,M Chinnaswamy Stadium,Kolkata Knight Riders,Royal Challengers Bangalore,BB McCullum,P Kumar,1,0,0.2,1,0,0,0,222\n";

    #[test]
    fn parses_rows_and_reports_dropped_columns() {
        let (records, dropped) = parse_records(SAMPLE.as_bytes()).expect("sample parses");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].bat_team, "Kolkata Knight Riders");
        assert_eq!(records[1].overs, 0.2);
        assert_eq!(records[1].total, 222);
        assert_eq!(dropped.len(), DROPPED_COLUMNS.len());
    }

    #[test]
    fn dirty_columns_are_optional() {
        let raw = "bat_team,bowl_team,venue,runs,wickets,overs,runs_last_5,wickets_last_5,total\n\
A,B,V,10,1,2.3,10,1,150\n";
        let (records, dropped) = parse_records(raw.as_bytes()).expect("parses");
        assert_eq!(records.len(), 1);
        assert!(dropped.is_empty());
    }

    #[test]
    fn missing_column_is_fatal() {
        let raw = "bat_team,bowl_team,runs,wickets,overs,runs_last_5,wickets_last_5,total\n\
A,B,10,1,2.3,10,1,150\n";
        let err = parse_records(raw.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("venue"));
    }

    #[test]
    fn unparseable_row_is_fatal() {
        let raw = "bat_team,bowl_team,venue,runs,wickets,overs,runs_last_5,wickets_last_5,total\n\
A,B,V,10,1,2.3,10,1,150\n\
A,B,V,ten,1,2.3,10,1,150\n";
        let err = parse_records(raw.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("line 3"));
    }

    #[test]
    fn header_only_is_fatal() {
        let raw = "bat_team,bowl_team,venue,runs,wickets,overs,runs_last_5,wickets_last_5,total\n";
        assert!(parse_records(raw.as_bytes()).is_err());
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let a = fingerprint_bytes(b"abc");
        assert_eq!(a.len(), 64);
        assert_eq!(a, fingerprint_bytes(b"abc"));
        assert_ne!(a, fingerprint_bytes(b"abd"));
    }
}
