//! Recording a game, exporting it and reading it back through both codecs.

use std::sync::Arc;

use blockstack::core::{GarbageEvent, Input, Key, Ruleset, SimOptions};
use blockstack::engine::{GameRecorder, PlaybackSession};
use blockstack::replay::replay2::{decode, seek, states};
use blockstack::replay::{FrameType, ReplayExport, ReplayInfo};
use blockstack::types::GameMode;

fn tap(rec: &mut GameRecorder, key: Key, t: u32) {
    rec.input(Input::Press(key), t).unwrap();
    rec.input(Input::Release(key), t + 30).unwrap();
}

/// A game with quiet stretches longer than one DIFF frame can span.
fn long_game() -> (GameRecorder, Vec<u32>) {
    let options = SimOptions::new("long-game").with_mode(GameMode::Practice);
    let mut rec = GameRecorder::new(Arc::new(Ruleset::default()), options).unwrap();
    let mut checkpoints = Vec::new();
    let mut t = 0;
    for burst in 0..3u32 {
        for key in [Key::Left, Key::RotateCw, Key::HardDrop, Key::Right, Key::HardDrop] {
            t += 120;
            tap(&mut rec, key, t);
        }
        if burst == 1 {
            rec.add_garbage(GarbageEvent::Incoming { lines: 2 }, t).unwrap();
        }
        checkpoints.push(t + 30);
        t += 40_000;
        rec.advance(t).unwrap();
    }
    (rec, checkpoints)
}

#[test]
fn frames_span_several_keyframes_and_match_the_game() {
    let (rec, checkpoints) = long_game();
    let board = *rec.sim().board().cells();
    let hold = rec.sim().hold_piece();
    let recording = rec.finish(0);

    let frames = decode(&recording.replay2).unwrap();
    let keyframes = frames.iter().filter(|f| f.kind == FrameType::Full).count();
    assert!(keyframes >= 3, "only {keyframes} FULL frames");
    assert!(frames.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let all = states(&frames).unwrap();
    let (_, last) = all.last().unwrap();
    assert_eq!(last.matrix, board);
    assert_eq!(last.hold, hold);

    for t in checkpoints {
        let sought = seek(&frames, t).unwrap();
        let (_, walked) = all.iter().rev().find(|(at, _)| *at <= t).unwrap();
        assert_eq!(sought.matrix, walked.matrix);
        assert_eq!(sought.current, walked.current);
        assert_eq!(sought.hold, walked.hold);
        assert_eq!(sought.queue, walked.queue);
    }
}

#[test]
fn exported_legacy_replay_plays_back_to_the_same_result() {
    let (rec, _) = long_game();
    let recording = rec.finish(1_700_000_000_000);
    assert!(recording.valid);

    let export = recording.export().unwrap();
    assert!(export.verify());
    let json = serde_json::to_string(&export).unwrap();
    let parsed: ReplayExport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, export);

    let info = ReplayInfo::from_legacy(&recording.legacy).unwrap();
    let replay = ReplayInfo::from_json(&info.to_json().unwrap())
        .unwrap()
        .decode()
        .unwrap();
    assert_eq!(replay.actions, recording.legacy.actions);
    assert_eq!(replay.meta.game_end, 1_700_000_000_000);

    let summary = PlaybackSession::new(Arc::new(Ruleset::default()), &replay).run();
    assert_eq!(summary.pieces, recording.stats.pieces);
    assert_eq!(summary.score, recording.stats.score);
    assert_eq!(summary.lines, recording.stats.lines);
    assert_eq!(summary.key_presses, recording.stats.key_presses);
    assert_eq!(summary.finesse, recording.stats.finesse);
}

#[test]
fn replay2_export_carries_its_config() {
    let (rec, _) = long_game();
    let recording = rec.finish(0);
    let export = recording.export_replay2().unwrap();
    assert!(export.verify());
    assert_eq!(export.bytes().unwrap(), recording.replay2);
    let config: serde_json::Value = serde_json::from_str(&export.config).unwrap();
    assert_eq!(config["v"], 4);
    assert_eq!(config["seed"], "long-game");
}
