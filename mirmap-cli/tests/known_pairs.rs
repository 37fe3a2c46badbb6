mod common;

use std::fs;
use tempfile::tempdir;

use crate::common::*;

const RAW_TARGETSCAN: &str = r#"{"targetscan": {"with_correction": false}}"#;

// Reference values of the hsa-miR-16 / known_utr pair
#[test]
fn known_pair_raw_targetscan_values() {
    let (Some(mirnas), Some(transcripts)) =
        (fixture("known_mirna.fa"), fixture("known_transcript.fa"))
    else {
        return;
    };
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("raw.json");
    fs::write(&config_path, RAW_TARGETSCAN).unwrap();

    let output = run_mirmap(&[
        "-a",
        mirnas.to_str().unwrap(),
        "-f",
        transcripts.to_str().unwrap(),
        "-i",
        "known_utr",
        "--config",
        config_path.to_str().unwrap(),
    ])
    .unwrap();
    let rows = parse_rows(&output);
    assert_eq!(rows.len(), 1);

    let row = &rows[0];
    assert_eq!(&row[..FIRST_FEATURE], ["hsa-miR-16", "known_utr", "186", "7", "0", "0"]);
    assert_close(&row[FIRST_FEATURE], 0.6411404871525753);
    assert_close(&row[FIRST_FEATURE + 1], 166.0);
    assert_close(&row[FIRST_FEATURE + 2], 1.0);
}

#[test]
fn fasta_ids_select_records() {
    let (Some(mirnas), Some(transcripts)) =
        (fixture("known_mirna.fa"), fixture("known_transcript.fa"))
    else {
        return;
    };
    let output = run_mirmap(&[
        "-a",
        mirnas.to_str().unwrap(),
        "-f",
        transcripts.to_str().unwrap(),
        "-i",
        "short_utr",
        "-i",
        "no_site",
        "-c",
    ])
    .unwrap();
    let rows = parse_rows(&output);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][1], "short_utr");
    assert_eq!(rows[0][2], "27");
}

#[test]
fn missing_alignment_gives_neutral_conservation() {
    let (Some(mirnas), Some(transcripts)) =
        (fixture("known_mirna.fa"), fixture("known_transcript.fa"))
    else {
        return;
    };
    let aln_dir = tempdir().unwrap();
    let output = run_mirmap(&[
        "-a",
        mirnas.to_str().unwrap(),
        "-f",
        transcripts.to_str().unwrap(),
        "-s",
        aln_dir.path().to_str().unwrap(),
    ])
    .unwrap();
    for row in parse_rows(&output) {
        assert_eq!(row[FIRST_FEATURE + 12], "0");
        assert_eq!(row[FIRST_FEATURE + 13], "1");
    }
}
