use std::{
    env, fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

fn run_bin(args: &[&str]) -> Output {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_episim"));

    Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command")
}

fn assert_success(args: &[&str]) {
    let output = run_bin(args);

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

    assert!(
        output.status.success(),
        "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
    );
}

fn fresh_dir(name: &str) -> PathBuf {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);
    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");
    test_dir
}

fn count_run_dirs(test_dir: &Path) -> usize {
    fs::read_dir(test_dir)
        .expect("failed to read test directory")
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("run-"))
        .count()
}

#[test]
fn basic_workflow() {
    let test_dir = fresh_dir("basic_workflow");

    let config_contents = String::new()
        + "[grid]\n"
        + "size = 30\n"
        + "susceptible_share = 0.6\n"
        + "infected_share = 0.02\n"
        + "seed = 5\n"
        + "\n"
        + "[movement]\n"
        + "limited = true\n"
        + "long_moves_uncommon = true\n"
        + "\n"
        + "[incubation]\n"
        + "enabled = true\n"
        + "period = 3\n"
        + "\n"
        + "[quarantine]\n"
        + "enabled = true\n"
        + "\n"
        + "[output]\n"
        + "max_days = 20\n";

    fs::write(test_dir.join("config.toml"), config_contents)
        .expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert_success(&["--sim-dir", test_dir_str, "create"]);
    assert_success(&["--sim-dir", test_dir_str, "create", "--n-runs", "3"]);
    assert_eq!(count_run_dirs(&test_dir), 4);

    for run_idx in 0..4 {
        let run_dir = test_dir.join(format!("run-{run_idx:04}"));
        assert!(run_dir.join("record.msgpack").is_file());
        assert!(run_dir.join("checkpoint.msgpack").is_file());
    }

    assert_success(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]);
    assert_success(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]);
    assert_success(&["--sim-dir", test_dir_str, "resume", "--run-idx", "3"]);

    assert_success(&["--sim-dir", test_dir_str, "analyze"]);
    assert!(test_dir.join("results.msgpack").is_file());

    assert_success(&["--sim-dir", test_dir_str, "clean"]);
    assert_eq!(count_run_dirs(&test_dir), 0);
    assert!(!test_dir.join("results.msgpack").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_config_fails() {
    let test_dir = fresh_dir("invalid_config_fails");

    let config_contents = String::new() + "[infection]\n" + "remove_prob = 1.5\n";
    fs::write(test_dir.join("config.toml"), config_contents)
        .expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    let output = run_bin(&["--sim-dir", test_dir_str, "create"]);
    assert!(!output.status.success());
    let stderr_str = String::from_utf8_lossy(&output.stderr);
    assert!(stderr_str.contains("removal probability"), "{stderr_str}");
    assert_eq!(count_run_dirs(&test_dir), 0);

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn missing_checkpoint_fails() {
    let test_dir = fresh_dir("missing_checkpoint_fails");
    fs::write(test_dir.join("config.toml"), "").expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    let output = run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "7"]);
    assert!(!output.status.success());

    fs::remove_dir_all(&test_dir).ok();
}
