//! Smoke tests for the demo binary.

extern crate assert_cmd;
extern crate predicates;
extern crate tempfile;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

#[test]
fn renders_a_small_image() {
    let dir = tempfile::tempdir().unwrap();
    let outfile = dir.path().join("mandel.pnm");
    Command::cargo_bin("mandel")
        .unwrap()
        .args(&[
            "--output",
            outfile.to_str().unwrap(),
            "--size",
            "64x48",
            "--threads",
            "1",
            "--frames",
            "2",
        ])
        .assert()
        .success();

    // Binary PPM: magic, "64 48", maxval, then 64*48 BGR triples.
    let written = fs::read(&outfile).unwrap();
    assert_eq!(&written[0..2], b"P6");
    assert!(written.len() > 64 * 48 * 3);
}

#[test]
fn rejects_an_unparseable_size() {
    Command::cargo_bin("mandel")
        .unwrap()
        .args(&["--output", "unused.pnm", "--size", "64by48"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not parse output image size"));
}

#[test]
fn rejects_an_iteration_count_out_of_range() {
    Command::cargo_bin("mandel")
        .unwrap()
        .args(&["--output", "unused.pnm", "--iterations", "40000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 2 and 1024"));
}
