//! `qapla-bitbase`: generates and probes endgame bitbases.
//!
//! `qapla-bitbase generate <SIG> <out-dir> [children-dir] [--cores N]
//! [--compression raw|deflate|huffman] [--trace]` builds `<SIG>.qbb` in
//! `out-dir`, preloading any already-built bitbases in `children-dir` (if
//! given) so captures/promotions inside the retrograde search can consult a
//! simpler signature's result instead of stopping at "unknown". `--cores`
//! bounds the worker-thread count the king-square-pair-sharded generator
//! uses (default: 1). `qapla-bitbase probe <SIG> <dir> <fen>` loads
//! `<SIG>.qbb` from `dir` and prints the WDL result for `fen`,
//! side-to-move relative. `qapla-bitbase verify <SIG> <dir> [children-dir]
//! [--cores N]` re-generates `<SIG>.qbb` from its children and reports
//! whether it still agrees with what's on disk.
//!
//! `<SIG>` is the canonical name `Signature::name` prints, e.g. `KQK`,
//! `KRKP`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use qapla::bitbase::generate::{generate as generate_bitbase, verify as verify_bitbase};
use qapla::bitbase::{Bitbase, CompressionFormat, Signature};
use qapla::position::fen;
use qapla::types::{Color, PieceType};

/// Pulls `--cores N`, `--compression FMT` and a bare `--trace` flag out of
/// an argument list, returning the remaining positional arguments alongside
/// them. Unrecognised `--`-prefixed flags are left in place so callers see a
/// normal "too many arguments" usage error instead of a silent no-op.
struct ParsedFlags {
    positional: Vec<String>,
    cores: usize,
    compression: CompressionFormat,
    trace: bool,
}

fn parse_flags(args: &[String]) -> ParsedFlags {
    let mut positional = Vec::new();
    let mut cores = 1usize;
    let mut compression = CompressionFormat::Deflate;
    let mut trace = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--cores" => {
                if let Some(value) = iter.next() {
                    cores = value.parse().unwrap_or(1);
                }
            }
            "--compression" => {
                if let Some(value) = iter.next() {
                    compression = match value.as_str() {
                        "raw" => CompressionFormat::Raw,
                        "huffman" => CompressionFormat::HuffmanDeflate,
                        _ => CompressionFormat::Deflate,
                    };
                }
            }
            "--trace" => trace = true,
            other => positional.push(other.to_string()),
        }
    }

    ParsedFlags { positional, cores, compression, trace }
}

fn parse_signature(name: &str) -> Option<Signature> {
    let chars: Vec<char> = name.chars().collect();
    if chars.first() != Some(&'K') {
        return None;
    }
    let second_king = chars[1..].iter().position(|&c| c == 'K')? + 1;
    let mut pieces = Vec::new();
    for &c in &chars[1..second_king] {
        pieces.push((Color::White, PieceType::from_char(c)?));
    }
    for &c in &chars[second_king + 1..] {
        pieces.push((Color::Black, PieceType::from_char(c)?));
    }
    Some(Signature::new(pieces))
}

/// Loads every `*.qbb` file in `dir` whose filename stem parses as a
/// signature name, keyed by that name, for `generate`'s `children` argument.
fn load_children(dir: &Path) -> HashMap<String, Bitbase> {
    let mut children = HashMap::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return children;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(signature) = parse_signature(stem) else {
            continue;
        };
        if let Ok(bb) = Bitbase::read_from(&path, signature) {
            children.insert(stem.to_string(), bb);
        }
    }
    children
}

fn run_generate(args: &[String]) {
    let flags = parse_flags(args);
    let [sig_name, out_dir, rest @ ..] = flags.positional.as_slice() else {
        eprintln!(
            "usage: qapla-bitbase generate <SIG> <out-dir> [children-dir] \
             [--cores N] [--compression raw|deflate|huffman] [--trace]"
        );
        std::process::exit(1);
    };
    let Some(signature) = parse_signature(sig_name) else {
        eprintln!("invalid signature: {sig_name}");
        std::process::exit(1);
    };
    let children = rest.first().map(|dir| load_children(Path::new(dir))).unwrap_or_default();

    let started = std::time::Instant::now();
    let bitbase = generate_bitbase(&signature, &children, flags.cores, flags.compression, flags.trace);
    let out_path = Path::new(out_dir).join(format!("{}.qbb", signature.name()));
    if let Err(e) = bitbase.write_to(&out_path) {
        eprintln!("failed to write {}: {e}", out_path.display());
        std::process::exit(1);
    }
    println!("wrote {} in {:?}", out_path.display(), started.elapsed());
}

fn run_verify(args: &[String]) {
    let flags = parse_flags(args);
    let [sig_name, dir, rest @ ..] = flags.positional.as_slice() else {
        eprintln!("usage: qapla-bitbase verify <SIG> <dir> [children-dir] [--cores N]");
        std::process::exit(1);
    };
    let Some(signature) = parse_signature(sig_name) else {
        eprintln!("invalid signature: {sig_name}");
        std::process::exit(1);
    };
    let path = PathBuf::from(dir).join(format!("{}.qbb", signature.name()));
    let stored = match Bitbase::read_from(&path, signature.clone()) {
        Ok(bb) => bb,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    let children = rest.first().map(|dir| load_children(Path::new(dir))).unwrap_or_default();

    match verify_bitbase(&signature, &stored, &children, flags.cores) {
        Ok(()) => println!("{} matches its re-generated table", signature.name()),
        Err(e) => {
            eprintln!("verify failed: {e}");
            std::process::exit(1);
        }
    }
}

fn run_probe(args: &[String]) {
    let [sig_name, dir, fen_parts @ ..] = args else {
        eprintln!("usage: qapla-bitbase probe <SIG> <dir> <fen>");
        std::process::exit(1);
    };
    let Some(signature) = parse_signature(sig_name) else {
        eprintln!("invalid signature: {sig_name}");
        std::process::exit(1);
    };
    let path = PathBuf::from(dir).join(format!("{}.qbb", signature.name()));
    let bitbase = match Bitbase::read_from(&path, signature) {
        Ok(bb) => bb,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let fen_str = fen_parts.join(" ");
    let pos = match fen::from_fen(&fen_str) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("invalid fen: {e}");
            std::process::exit(1);
        }
    };

    match bitbase.probe(&pos) {
        Some(wdl) => println!("{wdl:?}"),
        None => println!("position outside this bitbase's index space"),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.split_first() {
        Some((cmd, rest)) if cmd.as_str() == "generate" => run_generate(rest),
        Some((cmd, rest)) if cmd.as_str() == "probe" => run_probe(rest),
        Some((cmd, rest)) if cmd.as_str() == "verify" => run_verify(rest),
        _ => {
            eprintln!("usage: qapla-bitbase <generate|probe|verify> ...");
            std::process::exit(1);
        }
    }
}
