//! Benchmarks for move generation, evaluation and search.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use qapla::clock::ClockSetting;
use qapla::config::EngineConfig;
use qapla::engine::EngineContext;
use qapla::movegen::{generate_legal, perft::perft};
use qapla::position::fen::from_fen;
use qapla::search::NullSink;

const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const KIWIPETE_FEN: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

fn bench_perft(c: &mut Criterion) {
    let mut group = c.benchmark_group("perft");

    let mut startpos = from_fen(STARTPOS_FEN).unwrap();
    for depth in 1..=4 {
        group.bench_with_input(BenchmarkId::new("startpos", depth), &depth, |b, &depth| {
            b.iter(|| perft(&mut startpos, black_box(depth)))
        });
    }

    let mut kiwipete = from_fen(KIWIPETE_FEN).unwrap();
    for depth in 1..=3 {
        group.bench_with_input(BenchmarkId::new("kiwipete", depth), &depth, |b, &depth| {
            b.iter(|| perft(&mut kiwipete, black_box(depth)))
        });
    }

    group.finish();
}

fn bench_movegen(c: &mut Criterion) {
    let mut group = c.benchmark_group("movegen");

    let mut startpos = from_fen(STARTPOS_FEN).unwrap();
    group.bench_function("startpos", |b| b.iter(|| black_box(generate_legal(&mut startpos))));

    let mut middlegame =
        from_fen("r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4").unwrap();
    group.bench_function("middlegame", |b| b.iter(|| black_box(generate_legal(&mut middlegame))));

    let mut kiwipete = from_fen(KIWIPETE_FEN).unwrap();
    group.bench_function("kiwipete", |b| b.iter(|| black_box(generate_legal(&mut kiwipete))));

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);

    for depth in [3, 4, 5] {
        group.bench_with_input(BenchmarkId::new("startpos", depth), &depth, |b, &depth| {
            b.iter(|| {
                let mut ctx = EngineContext::new(EngineConfig::default());
                let mut pos = from_fen(STARTPOS_FEN).unwrap();
                let mut sink = NullSink;
                ctx.search(&mut pos, ClockSetting::DepthLimit(depth), &mut sink)
            })
        });
    }

    for depth in [3, 4] {
        group.bench_with_input(BenchmarkId::new("tactical", depth), &depth, |b, &depth| {
            b.iter(|| {
                let mut ctx = EngineContext::new(EngineConfig::default());
                let mut pos =
                    from_fen("r1bqkb1r/pppp1Qpp/2n2n2/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 4").unwrap();
                let mut sink = NullSink;
                ctx.search(&mut pos, ClockSetting::DepthLimit(depth), &mut sink)
            })
        });
    }

    group.finish();
}

fn bench_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("eval");
    let ctx = EngineContext::new(EngineConfig::default());

    let positions = [
        ("startpos", STARTPOS_FEN),
        ("middlegame", "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4"),
        ("endgame", "8/5k2/8/8/8/8/5K2/4R3 w - - 0 1"),
    ];

    for (name, fen) in positions {
        let pos = from_fen(fen).unwrap();
        group.bench_with_input(BenchmarkId::new("position", name), &pos, |b, pos| {
            b.iter(|| black_box(ctx.evaluate(pos)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_perft, bench_movegen, bench_search, bench_eval);
criterion_main!(benches);
