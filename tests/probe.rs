mod common;

use assert_cmd::Command;
use predicates::str::contains;

use common::{TestWorkspace, input_args, write_standard_sources};

fn recon_command() -> Command {
    Command::cargo_bin("table-recon").expect("binary exists")
}

#[test]
fn probe_lists_entities_with_coverage() {
    let ws = TestWorkspace::new();
    let sources = write_standard_sources(&ws);

    recon_command()
        .current_dir(ws.path())
        .arg("probe")
        .args(input_args(&sources))
        .assert()
        .success()
        .stdout(contains("Entity"))
        .stdout(contains("CarA"))
        .stdout(contains("CarB"))
        // CarA: three features, source 3 leaves the color cell empty.
        .stdout(contains("2/3"))
        .stdout(contains("3/3"));
}

#[test]
fn probe_shows_source_file_names_as_columns() {
    let ws = TestWorkspace::new();
    let sources = write_standard_sources(&ws);

    recon_command()
        .current_dir(ws.path())
        .arg("probe")
        .args(input_args(&sources))
        .assert()
        .success()
        .stdout(contains("source1.csv"))
        .stdout(contains("source3.csv"));
}

#[test]
fn stats_reports_one_row_per_entity() {
    let ws = TestWorkspace::new();
    let sources = write_standard_sources(&ws);

    recon_command()
        .current_dir(ws.path())
        .arg("stats")
        .args(input_args(&sources))
        .assert()
        .success()
        .stdout(contains("Entity"))
        .stdout(contains("CarA"))
        .stdout(contains("CarB"))
        .stdout(contains("source2.csv Diff"))
        .stdout(contains("33.3%"))
        .stdout(contains("50.0%"));
}

#[test]
fn entities_only_in_companion_sources_stay_invisible() {
    let ws = TestWorkspace::new();
    let sources = vec![
        ws.write("s1.csv", "Feature,CarA\nengine,V6\n"),
        ws.write("s2.csv", "Feature,CarA,CarX\nengine,V6,W16\n"),
        ws.write("s3.csv", "Feature,CarA\nengine,V6\n"),
    ];

    let assert = recon_command()
        .current_dir(ws.path())
        .arg("probe")
        .args(input_args(&sources))
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("CarA"));
    assert!(!stdout.contains("CarX"), "companion-only entity surfaced");
}
