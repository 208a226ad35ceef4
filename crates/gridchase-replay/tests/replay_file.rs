use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use gridchase_core::{MoveAction, Tick, TickRecord, TickSink};
use gridchase_replay::{ReplayLog, ReplayRecorder};

fn temp_path(tag: &str) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_micros();
    std::env::temp_dir().join(format!(
        "gridchase_replay_{tag}_{}_{timestamp}.txt",
        std::process::id()
    ))
}

fn record(tick: u64, last: bool) -> TickRecord {
    TickRecord {
        tick: Tick(tick),
        avatar_action: MoveAction::Right,
        pursuer_actions: vec![MoveAction::Left, MoveAction::Up],
        last_tick_of_level: last,
    }
}

#[test]
fn two_level_five_tick_game_writes_two_lines() {
    let path = temp_path("two_levels");
    let mut recorder = ReplayRecorder::new(&path);

    // Levels end at ticks 3 and 5; the recorder flushes itself on each
    // level boundary and at run end, as the scheduler would drive it.
    for tick in 1..=5 {
        let last = tick == 3 || tick == 5;
        recorder
            .on_tick(&record(tick, last), &[])
            .expect("record tick");
    }
    recorder.on_run_end().expect("final flush");

    let contents = fs::read_to_string(&path).expect("replay file");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);

    let groups = |line: &str| line.split('\t').filter(|f| !f.is_empty()).count() / 4;
    assert_eq!(groups(lines[0]), 3);
    assert_eq!(groups(lines[1]), 2);

    let log = ReplayLog::load(&path, 2).expect("parse");
    assert_eq!(log.levels.len(), 2);
    assert_eq!(log.levels[0].len(), 3);
    assert_eq!(log.levels[1].len(), 2);
    assert_eq!(log.levels[1][1].tick, Tick(5));

    let _ = fs::remove_file(&path);
}

#[test]
fn first_flush_truncates_then_appends() {
    let path = temp_path("truncate");
    fs::write(&path, "stale replay from an earlier run\n").expect("seed file");

    let mut recorder = ReplayRecorder::new(&path);
    recorder.append(&record(1, true));
    recorder.flush().expect("first flush");

    let contents = fs::read_to_string(&path).expect("replay file");
    assert!(
        !contents.contains("stale"),
        "first flush must truncate the destination"
    );
    assert_eq!(contents.lines().count(), 1);

    recorder.append(&record(2, true));
    recorder.flush().expect("second flush");
    let contents = fs::read_to_string(&path).expect("replay file");
    assert_eq!(contents.lines().count(), 2, "later flushes must append");

    let _ = fs::remove_file(&path);
}

#[test]
fn flush_failure_surfaces_as_error() {
    let missing_dir = temp_path("no_such_dir").join("replay.txt");
    let mut recorder = ReplayRecorder::new(&missing_dir);
    recorder.append(&record(1, true));
    assert!(recorder.flush().is_err());
}
