use ipl_score::dataset;
use ipl_score::encoding::CategoryEncoder;
use ipl_score::features::{FEATURE_NAMES, FeatureRow, StandardScaler};
use ipl_score::train;

fn rows() -> Vec<FeatureRow> {
    vec![
        [0.0, 1.0, 0.0, 40.0, 1.0, 6.0, 30.0, 1.0],
        [1.0, 0.0, 0.0, 90.0, 3.0, 12.0, 40.0, 2.0],
        [2.0, 1.0, 1.0, 150.0, 5.0, 18.0, 50.0, 1.0],
    ]
}

#[test]
fn encoder_round_trips_every_class() {
    let enc = CategoryEncoder::fit("venue", ["Wankhede Stadium", "Eden Gardens", "Feroz Shah Kotla"]);
    for (code, label) in enc.classes().iter().enumerate() {
        assert_eq!(enc.encode(label), Ok(code));
        assert_eq!(enc.decode(code), Ok(label.as_str()));
    }
    assert!(enc.encode("Lord's").is_err());
    assert!(enc.decode(enc.len()).is_err());
}

#[test]
fn scaler_statistics_are_in_feature_order() {
    let scaler = StandardScaler::fit(&rows()).expect("fit");
    let names = scaler.features.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, FEATURE_NAMES);
    scaler.check_layout().expect("layout");
    assert!((scaler.features[3].mean - 280.0 / 3.0).abs() < 1e-9);
}

#[test]
fn scrambled_scaler_is_refused() {
    let mut scaler = StandardScaler::fit(&rows()).expect("fit");
    scaler.features.swap(3, 4);
    assert!(scaler.check_layout().is_err());

    let mut scaler = StandardScaler::fit(&rows()).expect("fit");
    scaler.features.pop();
    assert!(scaler.check_layout().is_err());
}

#[test]
fn constant_feature_passes_through_centred() {
    let scaler = StandardScaler::fit(&rows()).expect("fit");
    // One venue everywhere leaves that column with zero spread.
    let mut same_venue = rows();
    for row in &mut same_venue {
        row[2] = 4.0;
    }
    let flat = StandardScaler::fit(&same_venue).expect("fit");
    assert_eq!(flat.features[2].std, 0.0);
    assert_eq!(flat.transform(&same_venue[0])[2], 0.0);
    assert!(scaler.transform(&rows()[0]).iter().all(|v| v.is_finite()));
}

#[test]
fn dirty_columns_are_reported_and_ignored() {
    let raw = "mid,date,venue,bat_team,bowl_team,batsman,bowler,runs,wickets,overs,runs_last_5,wickets_last_5,striker,non-striker,total\n\
               1,2008-04-18,Eden Gardens,TeamA,TeamB,X,Y,40,1,6.0,30,1,10,5,160\n";
    let (records, dropped) = dataset::parse_records(raw.as_bytes()).expect("parse");
    assert_eq!(records.len(), 1);
    assert_eq!(
        dropped,
        ["mid", "date", "batsman", "bowler", "striker", "non-striker"]
    );

    let (teams, venues, rows, targets) = train::encode_records(&records).expect("encode");
    assert_eq!(teams.len(), 2);
    assert_eq!(venues.classes(), ["Eden Gardens"]);
    assert_eq!(rows[0], [0.0, 1.0, 0.0, 40.0, 1.0, 6.0, 30.0, 1.0]);
    assert_eq!(targets, vec![160.0]);
}

#[test]
fn missing_column_names_the_column() {
    let raw = "venue,bat_team,bowl_team,runs,wickets,overs,runs_last_5,total\n\
               Eden Gardens,TeamA,TeamB,40,1,6.0,30,160\n";
    let err = dataset::parse_records(raw.as_bytes()).expect_err("missing column");
    assert!(err.to_string().contains("wickets_last_5"));
}
