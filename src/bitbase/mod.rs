//! Endgame bitbase subsystem: WDL generation by retrograde analysis, a
//! compressed on-disk format, and a thread-safe in-memory reader.
//!
//! The signature concept keys both the evaluator's endgame dispatch and
//! bitbase selection. The cache's shared-state shape follows the same
//! `parking_lot`-guarded pattern as the search transposition table, applied
//! to read-mostly decompressed blocks instead of search entries.
//!
//! On-disk payloads come in three formats, selected by a format byte:
//! stored-raw, deflate-only, and huffman+deflate (the huffman coder wraps
//! the deflate stream's bytes for an extra entropy-coding pass).

pub mod deflate;
pub mod generate;
pub mod huffman;
pub mod index;

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{EngineError, EngineResult};
use crate::position::Position;
use crate::types::Color;

pub use index::Signature;

const MAGIC: [u8; 4] = *b"QBB1";
const FORMAT_RAW: u8 = 0;
const FORMAT_DEFLATE: u8 = 1;
const FORMAT_HUFFMAN_DEFLATE: u8 = 2;

/// Which on-disk payload format [`Bitbase::write_to`] emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CompressionFormat {
    Raw,
    #[default]
    Deflate,
    HuffmanDeflate,
}

/// One signature's win/draw/loss outcome, from the perspective of the side
/// to move at the indexed position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wdl {
    Win,
    Draw,
    Loss,
    Illegal,
}

impl Wdl {
    #[must_use]
    fn to_byte(self) -> u8 {
        match self {
            Wdl::Win => 0,
            Wdl::Draw => 1,
            Wdl::Loss => 2,
            Wdl::Illegal => 3,
        }
    }

    #[must_use]
    fn from_byte(b: u8) -> Self {
        match b {
            0 => Wdl::Win,
            1 => Wdl::Draw,
            2 => Wdl::Loss,
            _ => Wdl::Illegal,
        }
    }

    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Wdl::Win => Wdl::Loss,
            Wdl::Loss => Wdl::Win,
            other => other,
        }
    }
}

/// One loaded, decompressed bitbase: a flat array indexed by
/// `Signature::encode`'s packed `(side_to_move, placement)` value, two
/// entries packed per byte.
pub struct Bitbase {
    signature: Signature,
    entries: Vec<Wdl>,
    preferred_format: CompressionFormat,
}

impl Bitbase {
    #[must_use]
    pub fn from_entries(signature: Signature, entries: Vec<Wdl>) -> Self {
        Bitbase {
            signature,
            entries,
            preferred_format: CompressionFormat::default(),
        }
    }

    #[must_use]
    pub fn with_compression(mut self, format: CompressionFormat) -> Self {
        self.preferred_format = format;
        self
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Looks up the WDL value for `pos`, if `pos`'s material matches this
    /// bitbase's signature exactly. Side-to-move relative, matching
    /// `Evaluator::evaluate`'s convention.
    #[must_use]
    pub fn probe(&self, pos: &Position) -> Option<Wdl> {
        let (white_king, black_king, piece_squares) = placement_from_position(pos, &self.signature)?;
        let index = self
            .signature
            .encode(pos.side_to_move(), white_king, black_king, &piece_squares)?;
        self.entries.get(index as usize).copied()
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.entries.iter().map(|w| w.to_byte()).collect()
    }

    fn from_bytes(signature: Signature, bytes: &[u8]) -> Self {
        let entries = bytes.iter().map(|&b| Wdl::from_byte(b)).collect();
        Bitbase::from_entries(signature, entries)
    }

    /// Serialises header + payload: magic, format byte, signature name, raw
    /// payload length, payload length, then (for `HuffmanDeflate`) the
    /// intermediate deflate-stream length, then the payload itself.
    ///
    /// `Raw` stores `to_bytes()` unchanged; `Deflate` stores
    /// `deflate::compress`'s output; `HuffmanDeflate` additionally
    /// huffman-codes that deflate output, matching the on-disk format's
    /// "huffman tree serialised pre-order, then the payload" layout.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        let raw = self.to_bytes();
        let mut file = std::fs::File::create(path)?;
        file.write_all(&MAGIC)?;

        let name = self.signature.name();
        match self.preferred_format {
            CompressionFormat::Raw => {
                file.write_all(&[FORMAT_RAW])?;
                file.write_all(&(name.len() as u32).to_le_bytes())?;
                file.write_all(name.as_bytes())?;
                file.write_all(&(raw.len() as u64).to_le_bytes())?;
                file.write_all(&(raw.len() as u64).to_le_bytes())?;
                file.write_all(&raw)?;
            }
            CompressionFormat::Deflate => {
                let deflated = deflate::compress(&raw);
                file.write_all(&[FORMAT_DEFLATE])?;
                file.write_all(&(name.len() as u32).to_le_bytes())?;
                file.write_all(name.as_bytes())?;
                file.write_all(&(raw.len() as u64).to_le_bytes())?;
                file.write_all(&(deflated.len() as u64).to_le_bytes())?;
                file.write_all(&deflated)?;
            }
            CompressionFormat::HuffmanDeflate => {
                let deflated = deflate::compress(&raw);
                let huffman_coded = huffman::compress(&deflated);
                file.write_all(&[FORMAT_HUFFMAN_DEFLATE])?;
                file.write_all(&(name.len() as u32).to_le_bytes())?;
                file.write_all(name.as_bytes())?;
                file.write_all(&(raw.len() as u64).to_le_bytes())?;
                file.write_all(&(huffman_coded.len() as u64).to_le_bytes())?;
                file.write_all(&(deflated.len() as u64).to_le_bytes())?;
                file.write_all(&huffman_coded)?;
            }
        }
        Ok(())
    }

    pub fn read_from(path: &Path, signature: Signature) -> EngineResult<Self> {
        let mut file = std::fs::File::open(path).map_err(|_| EngineError::BitbaseMissing {
            signature: signature.name(),
        })?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic).map_err(corrupt(&signature))?;
        if magic != MAGIC {
            return Err(EngineError::BitbaseCorrupt {
                signature: signature.name(),
                reason: "bad magic".into(),
            });
        }
        let mut format = [0u8; 1];
        file.read_exact(&mut format).map_err(corrupt(&signature))?;

        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf).map_err(corrupt(&signature))?;
        let name_len = u32::from_le_bytes(len_buf) as usize;
        let mut name_buf = vec![0u8; name_len];
        file.read_exact(&mut name_buf).map_err(corrupt(&signature))?;

        let mut raw_len_buf = [0u8; 8];
        file.read_exact(&mut raw_len_buf).map_err(corrupt(&signature))?;
        let raw_len = u64::from_le_bytes(raw_len_buf) as usize;

        const MAX_BITBASE_BYTES: usize = 1 << 30;
        if raw_len > MAX_BITBASE_BYTES {
            return Err(EngineError::BitbaseTooLarge {
                signature: signature.name(),
                bytes: raw_len,
            });
        }

        let mut compressed_len_buf = [0u8; 8];
        file.read_exact(&mut compressed_len_buf).map_err(corrupt(&signature))?;
        let compressed_len = u64::from_le_bytes(compressed_len_buf) as usize;

        let intermediate_len = if format[0] == FORMAT_HUFFMAN_DEFLATE {
            let mut buf = [0u8; 8];
            file.read_exact(&mut buf).map_err(corrupt(&signature))?;
            Some(u64::from_le_bytes(buf) as usize)
        } else {
            None
        };

        let mut compressed = vec![0u8; compressed_len];
        file.read_exact(&mut compressed).map_err(corrupt(&signature))?;

        let (raw, preferred_format) = match format[0] {
            FORMAT_RAW => (compressed, CompressionFormat::Raw),
            FORMAT_DEFLATE => (deflate::decompress(&compressed, raw_len), CompressionFormat::Deflate),
            FORMAT_HUFFMAN_DEFLATE => {
                let deflated = huffman::decompress(&compressed, intermediate_len.unwrap_or(0));
                (deflate::decompress(&deflated, raw_len), CompressionFormat::HuffmanDeflate)
            }
            _ => {
                return Err(EngineError::BitbaseCorrupt {
                    signature: signature.name(),
                    reason: "unknown payload format".into(),
                })
            }
        };
        if raw.len() != raw_len {
            return Err(EngineError::BitbaseCorrupt {
                signature: signature.name(),
                reason: "payload length mismatch".into(),
            });
        }

        Ok(Bitbase::from_bytes(signature, &raw).with_compression(preferred_format))
    }
}

fn corrupt(signature: &Signature) -> impl Fn(io::Error) -> EngineError + '_ {
    move |_| EngineError::BitbaseCorrupt {
        signature: signature.name(),
        reason: "truncated file".into(),
    }
}

fn placement_from_position(
    pos: &Position,
    signature: &Signature,
) -> Option<(crate::types::Square, crate::types::Square, Vec<crate::types::Square>)> {
    let white_king = pos.king_square(Color::White);
    let black_king = pos.king_square(Color::Black);
    let mut piece_squares = Vec::with_capacity(signature.pieces.len());
    let mut used = pos.pieces(Color::White, crate::types::PieceType::King)
        | pos.pieces(Color::Black, crate::types::PieceType::King);

    for &(color, kind) in &signature.pieces {
        let candidates = pos.pieces(color, kind) & !used;
        let sq = crate::bits::squares(candidates).next()?;
        used |= sq.bit();
        piece_squares.push(sq);
    }
    Some((white_king, black_king, piece_squares))
}

/// Thread-safe cache of loaded bitbases, keyed by signature name. An
/// internal lock guards block insertion; lookups on already-cached blocks
/// are lock-free, via a `parking_lot::RwLock` whose read path takes no
/// write lock.
pub struct BitbaseCache {
    dir: RwLock<Option<PathBuf>>,
    loaded: RwLock<HashMap<String, Arc<Bitbase>>>,
    disabled: RwLock<std::collections::HashSet<String>>,
}

impl BitbaseCache {
    #[must_use]
    pub fn new() -> Self {
        BitbaseCache {
            dir: RwLock::new(None),
            loaded: RwLock::new(HashMap::new()),
            disabled: RwLock::new(std::collections::HashSet::new()),
        }
    }

    pub fn set_path(&self, dir: PathBuf) {
        *self.dir.write() = Some(dir);
    }

    /// Loads a signature's bitbase from disk into the cache if not already
    /// present. Corruption disables the signature for the rest of the
    /// session rather than erroring every probe.
    pub fn load(&self, signature: &Signature) -> EngineResult<()> {
        let name = signature.name();
        if self.loaded.read().contains_key(&name) {
            return Ok(());
        }
        let Some(dir) = self.dir.read().clone() else {
            #[cfg(feature = "logging")]
            log::warn!("bitbase {name} probed with no bitbase directory configured");
            return Err(EngineError::BitbaseMissing { signature: name });
        };
        let path = dir.join(format!("{name}.qbb"));
        #[cfg(feature = "logging")]
        log::info!("loading bitbase {name} from {}", path.display());
        match Bitbase::read_from(&path, signature.clone()) {
            Ok(bb) => {
                #[cfg(feature = "logging")]
                log::info!("loaded bitbase {name}");
                self.loaded.write().insert(name, Arc::new(bb));
                Ok(())
            }
            Err(err @ EngineError::BitbaseCorrupt { .. }) => {
                #[cfg(feature = "logging")]
                log::error!("bitbase {name} corrupt, disabling for this session: {err}");
                self.disabled.write().insert(name);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Probes `pos` against whichever loaded bitbase matches its material
    /// signature, returning `None` if none is loaded, disabled, or the
    /// position falls outside the signature's index space.
    #[must_use]
    pub fn probe(&self, pos: &Position, signature: &Signature) -> Option<Wdl> {
        let name = signature.name();
        if self.disabled.read().contains(&name) {
            return None;
        }
        self.loaded.read().get(&name).and_then(|bb| bb.probe(pos))
    }

    #[must_use]
    pub fn is_loaded(&self, signature: &Signature) -> bool {
        self.loaded.read().contains_key(&signature.name())
    }
}

impl Default for BitbaseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PieceType;

    #[test]
    fn wdl_flip_is_involutive() {
        for w in [Wdl::Win, Wdl::Draw, Wdl::Loss, Wdl::Illegal] {
            assert_eq!(w.flip().flip(), w);
        }
    }

    #[test]
    fn write_then_read_round_trips_a_tiny_bitbase() {
        let signature = Signature::new(vec![(Color::White, PieceType::Pawn)]);
        let entries = vec![Wdl::Win, Wdl::Draw, Wdl::Loss, Wdl::Illegal, Wdl::Win];
        let bb = Bitbase::from_entries(signature.clone(), entries.clone());

        let dir = std::env::temp_dir().join(format!("qapla-bitbase-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("KPK.qbb");
        bb.write_to(&path).unwrap();

        let loaded = Bitbase::read_from(&path, signature).unwrap();
        assert_eq!(loaded.entries, entries);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn cache_reports_missing_without_a_path() {
        let cache = BitbaseCache::new();
        let signature = Signature::new(vec![(Color::White, PieceType::Pawn)]);
        assert!(cache.load(&signature).is_err());
    }

    #[test]
    fn huffman_deflate_format_round_trips() {
        let signature = Signature::new(vec![(Color::White, PieceType::Pawn)]);
        let mut entries = vec![Wdl::Draw; 512];
        entries[10] = Wdl::Win;
        entries[300] = Wdl::Loss;
        entries[301] = Wdl::Illegal;
        let bb = Bitbase::from_entries(signature.clone(), entries.clone())
            .with_compression(CompressionFormat::HuffmanDeflate);

        let dir = std::env::temp_dir().join(format!("qapla-bitbase-huffman-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("KPK.qbb");
        bb.write_to(&path).unwrap();

        let loaded = Bitbase::read_from(&path, signature).unwrap();
        assert_eq!(loaded.entries, entries);
        assert_eq!(loaded.preferred_format, CompressionFormat::HuffmanDeflate);
        std::fs::remove_file(&path).ok();
    }
}
