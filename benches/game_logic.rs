use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use blockstack::core::{catalog, try_rotate, Board, Input, Key, Ruleset, SimOptions, Simulation};
use blockstack::engine::Reachable;
use blockstack::replay::replay2::{Replay2Config, Replay2Encoder, ReplayState};
use blockstack::replay::{decode_actions, encode_actions};
use blockstack::types::{PieceKind, PieceRef, RotationDelta, BOARD_HEIGHT, BOARD_WIDTH};

fn played_game() -> Simulation<blockstack::core::LiveDriver> {
    let mut sim = Simulation::live(Arc::new(Ruleset::default()), SimOptions::new("bench"));
    sim.advance(0);
    let keys = [Key::Left, Key::RotateCw, Key::HardDrop, Key::Right, Key::HardDrop];
    for (i, key) in keys.iter().cycle().take(200).enumerate() {
        let t = i as u32 * 50;
        sim.input(Input::Press(*key), t);
        sim.input(Input::Release(*key), t + 20);
    }
    sim
}

fn bench_advance(c: &mut Criterion) {
    let mut sim = Simulation::live(Arc::new(Ruleset::default()), SimOptions::new("bench"));
    let mut now = 0;

    c.bench_function("advance_16ms", |b| {
        b.iter(|| {
            now += 16;
            sim.advance(black_box(now));
        })
    });
}

fn bench_line_clear(c: &mut Criterion) {
    c.bench_function("clear_4_lines", |b| {
        b.iter(|| {
            let mut board = Board::new();
            for y in BOARD_HEIGHT as i8 - 4..BOARD_HEIGHT as i8 {
                for x in 0..BOARD_WIDTH as i8 {
                    board.set(x, y, PieceKind::I.color());
                }
            }
            board.clear_full_rows()
        })
    });
}

fn bench_try_rotate(c: &mut Criterion) {
    let board = Board::new();
    let piece = catalog().spawn(PieceRef::standard(PieceKind::T)).unwrap();

    c.bench_function("try_rotate", |b| {
        b.iter(|| try_rotate(black_box(&piece), RotationDelta::Cw, |p| !board.collides(p)))
    });
}

fn bench_reachability(c: &mut Criterion) {
    let sim = played_game();
    let board = sim.board().clone();
    let start = catalog().spawn(PieceRef::standard(PieceKind::T)).unwrap();

    c.bench_function("reachable_search", |b| {
        b.iter(|| Reachable::search(black_box(&board), start).len())
    });
}

fn bench_legacy_codec(c: &mut Criterion) {
    let sim = played_game();
    let actions = sim.actions().to_vec();

    c.bench_function("legacy_round_trip", |b| {
        b.iter(|| decode_actions(&encode_actions(black_box(&actions)).unwrap()).unwrap())
    });
}

fn bench_replay2_capture(c: &mut Criterion) {
    let sim = played_game();
    let state = ReplayState::capture(&sim);
    let mut encoder = Replay2Encoder::new(Replay2Config::default());
    let mut t = 0;

    c.bench_function("replay2_capture", |b| {
        b.iter(|| {
            t += 16;
            encoder.capture(t, black_box(&state)).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_advance,
    bench_line_clear,
    bench_try_rotate,
    bench_reachability,
    bench_legacy_codec,
    bench_replay2_capture
);
criterion_main!(benches);
