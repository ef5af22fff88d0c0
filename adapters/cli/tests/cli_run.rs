use std::process::Command;

fn run(args: &[&str]) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_snake-ensemble"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to launch snake-ensemble");
    assert!(output.status.success(), "snake-ensemble exited with {:?}", output.status);
    String::from_utf8(output.stdout).expect("stdout is utf8")
}

#[test]
fn prints_banner_bindings_and_every_tick() {
    let stdout = run(&["--ticks", "3", "--no-board"]);

    assert!(stdout.starts_with("Welcome to the Snake Ensemble."));
    assert!(stdout.contains("WASD: LEAD#2"));
    assert!(stdout.contains("arrows: PERC#3"));
    assert!(stdout.contains("tick 1\n"));
    assert!(stdout.contains("tick 3\n"));
    assert!(!stdout.contains("tick 4\n"));
}

#[test]
fn identical_seeds_print_identical_sessions() {
    let args = ["--ticks", "12", "--seed", "314", "--edge-policy", "wrap"];

    assert_eq!(run(&args), run(&args));
}

#[test]
fn all_autonomous_leaves_no_input_bindings() {
    let stdout = run(&["--ticks", "1", "--all-autonomous", "--no-cues"]);

    assert!(!stdout.contains("WASD:"));
    assert!(stdout.contains("LEAD#2 auto"));
}
