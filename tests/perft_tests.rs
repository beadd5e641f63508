//! The six mandatory perft positions, shallow depths always run; deeper
//! counts are `#[ignore]`-gated since depth 6/7 perft takes minutes.

use qapla::movegen::perft::perft;
use qapla::position::fen::from_fen;

struct Case {
    name: &'static str,
    fen: &'static str,
    counts: &'static [(u32, u64)],
}

const CASES: &[Case] = &[
    Case {
        name: "startpos",
        fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        counts: &[(1, 20), (2, 400), (3, 8_902), (4, 197_281), (5, 4_865_609), (6, 119_060_324)],
    },
    Case {
        name: "kiwipete",
        fen: "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        counts: &[(1, 48), (2, 2_039), (3, 97_862), (4, 4_085_603), (5, 193_690_690)],
    },
    Case {
        name: "position 3",
        fen: "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        counts: &[(1, 14), (2, 191), (3, 2_812), (4, 43_238), (5, 674_624), (6, 11_030_083), (7, 178_633_661)],
    },
    Case {
        name: "position 4",
        fen: "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        counts: &[(1, 6), (2, 264), (3, 9_467), (4, 422_333), (5, 15_833_292), (6, 706_045_033)],
    },
    Case {
        name: "position 5",
        fen: "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        counts: &[(1, 44), (2, 1_486), (3, 62_379), (4, 2_103_487), (5, 89_941_194)],
    },
    Case {
        name: "position 6",
        fen: "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
        counts: &[(1, 46), (2, 2_079), (3, 89_890), (4, 3_894_594), (5, 164_075_551)],
    },
];

#[test]
fn perft_shallow_depths() {
    for case in CASES {
        let mut pos = from_fen(case.fen).unwrap();
        for &(depth, expected) in case.counts.iter().take_while(|(d, _)| *d <= 3) {
            assert_eq!(perft(&mut pos, depth), expected, "{} perft({depth}) mismatch", case.name);
        }
    }
}

#[test]
#[ignore]
fn perft_deep() {
    for case in CASES {
        let mut pos = from_fen(case.fen).unwrap();
        for &(depth, expected) in case.counts {
            assert_eq!(perft(&mut pos, depth), expected, "{} perft({depth}) mismatch", case.name);
        }
    }
}
