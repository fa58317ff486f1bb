use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn fieldprobe(args: &[&str], working_dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fieldprobe"))
        .args(args)
        .current_dir(working_dir)
        .output()
        .expect("fieldprobe should launch")
}

fn write_file(path: &Path, content: &str) {
    fs::write(path, content).expect("input file should be written");
}

#[test]
fn help_exits_zero_and_lists_commands() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output = fieldprobe(&["--help"], temp.path());
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["profile", "merge", "tracks", "clusters"] {
        assert!(stdout.contains(command), "help should list '{}'", command);
    }
}

#[test]
fn missing_required_argument_is_a_usage_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output = fieldprobe(&["merge", "--query", "a.txt"], temp.path());
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [INPUT.CLI_USAGE]"), "stderr: {stderr}");
    assert!(stderr.contains("FATAL EXIT CODE: 2"), "stderr: {stderr}");
}

#[test]
fn profile_command_writes_csv_with_configured_path() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_file(&temp.path().join("mesh.txt"), "0 5 5\n1 5 5\n2 5 5\n3 5 5\n");
    write_file(
        &temp.path().join("field.txt"),
        "3 4 0\n0 0 2\n1 0 0\n0 6 8\n",
    );
    write_file(
        &temp.path().join("probe.json"),
        r#"{ "profilePath": { "axis": "x", "anchor": [0.0, 5.0, 5.0],
             "segments": [{ "start": 0.0, "stop": 4.0, "step": 1.0 }] } }"#,
    );

    let output = fieldprobe(
        &[
            "profile",
            "--mesh",
            "mesh.txt",
            "--values",
            "field.txt",
            "--config",
            "probe.json",
        ],
        temp.path(),
    );
    assert!(
        output.status.success(),
        "profile should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let profile = fs::read_to_string(temp.path().join("parsed_profile_at_5_5.csv"))
        .expect("profile should be written");
    assert_eq!(profile, "0,5\n1,2\n2,1\n3,10\n");
}

#[test]
fn malformed_record_exits_with_code_four() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_file(&temp.path().join("a.txt"), "0 0 0 1 2 3\n");
    write_file(&temp.path().join("b.txt"), "0 0 0 1 2\n");

    let output = fieldprobe(
        &["merge", "--query", "a.txt", "--reference", "b.txt"],
        temp.path(),
    );
    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[PARSE.FIELD_TABLE_RECORD]"), "stderr: {stderr}");
    assert!(stderr.contains("line 1"), "stderr: {stderr}");
}

#[test]
fn missing_input_file_exits_with_code_three() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output = fieldprobe(
        &["merge", "--query", "absent.txt", "--reference", "absent.txt"],
        temp.path(),
    );
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[IO.READ]"));
}

#[test]
fn invalid_config_exits_with_input_validation_code() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_file(&temp.path().join("probe.json"), "{ \"tolerance\": 3 }");
    let output = fieldprobe(
        &["tracks", "generate", "--count", "1", "--config", "probe.json"],
        temp.path(),
    );
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[INPUT.CONFIG]"));
}

#[test]
fn tracks_generate_and_compare_round_through_files() {
    let temp = TempDir::new().expect("tempdir should be created");
    let generate = fieldprobe(
        &["tracks", "generate", "--count", "15", "--seed", "9"],
        temp.path(),
    );
    assert!(
        generate.status.success(),
        "generate should succeed, stderr: {}",
        String::from_utf8_lossy(&generate.stderr)
    );
    let listing = fs::read_to_string(temp.path().join("new_track_list.txt"))
        .expect("track list should be written");
    assert_eq!(listing.lines().count(), 16);

    write_file(
        &temp.path().join("track_list.txt"),
        "# cotb cota p flp localx localy pT\n0.1 0.2 1.5 0 -4.0 2.5 0.9\n",
    );
    let compare = fieldprobe(
        &[
            "tracks",
            "compare",
            "--generated",
            "new_track_list.txt",
            "--pixelav",
            "track_list.txt",
            "--output",
            "report/comparison.json",
        ],
        temp.path(),
    );
    assert!(
        compare.status.success(),
        "compare should succeed, stderr: {}",
        String::from_utf8_lossy(&compare.stderr)
    );

    let report: Value = serde_json::from_str(
        &fs::read_to_string(temp.path().join("report/comparison.json"))
            .expect("report should be written"),
    )
    .expect("report should be json");
    assert_eq!(report["generatedCount"], 15);
    assert_eq!(report["referenceCount"], 1);
    assert_eq!(report["quantities"][0]["reference"]["stats"]["max"], 2.5);
}

#[test]
fn clusters_compare_warns_on_event_count_mismatch() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_file(
        &temp.path().join("run_a.out"),
        "run A\nstats\n<time slice 4000 ps>\n0 40\n20 0\n<cluster>\ntruth\n\
         <time slice 4000 ps>\n90\n<cluster>\ntruth\n",
    );
    write_file(
        &temp.path().join("run_b.out"),
        "run B\nstats\n<time slice 4000 ps>\n0 40\n0 0\n<cluster>\ntruth\n",
    );
    write_file(&temp.path().join("probe.json"), r#"{ "clusters": { "threshold": 30.0 } }"#);

    let output = Command::new(env!("CARGO_BIN_EXE_fieldprobe"))
        .args([
            "clusters",
            "compare",
            "--first",
            "run_a.out",
            "--second",
            "run_b.out",
            "--config",
            "probe.json",
        ])
        .current_dir(temp.path())
        .env_remove("RUST_LOG")
        .output()
        .expect("fieldprobe should launch");
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("event counts differ"));
    assert!(String::from_utf8_lossy(&output.stdout).contains("counts differ"));

    let report: Value = serde_json::from_str(
        &fs::read_to_string(temp.path().join("cluster_comparison.json"))
            .expect("report should be written"),
    )
    .expect("report should be json");
    assert_eq!(report["threshold"], 30.0);
    assert_eq!(report["pairedEvents"], 1);
    assert_eq!(report["deltas"][0]["values"]["stats"]["mean"], 0.0);
}

#[test]
fn clusters_compare_rejects_ragged_charge_maps() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_file(
        &temp.path().join("run_a.out"),
        "run A\nstats\n<time slice 4000 ps>\n1 2\n3\n<cluster>\n",
    );
    write_file(&temp.path().join("run_b.out"), "run B\nstats\n");

    let output = fieldprobe(
        &["clusters", "compare", "--first", "run_a.out", "--second", "run_b.out"],
        temp.path(),
    );
    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[PARSE.PIXELAV_EVENT_RECORD]"), "stderr: {stderr}");
}
