//! Binary peak-file layout.
//!
//! All integers little-endian:
//!
//! ```text
//! magic        8 bytes  "CUEPEAKS"
//! version      u32
//! source len   u64      bytes of the source file
//! modified     i64      source mtime, ns since the Unix epoch
//! name len     u32
//! name         UTF-8
//! sample rate  u32
//! frames       u64
//! block len    u64
//! block        brotli {
//!                  level count  u32
//!                  per level:   reduction i32, count i64, count × u32 samples
//!              }
//! trailer      text, ignored when reading
//! ```

use std::io::{Read, Write};

use crate::error::PeakError;

use super::{PeakFile, PeakLevel, PeakSample, SourceInfo};

pub const MAGIC: [u8; 8] = *b"CUEPEAKS";
pub const FORMAT_VERSION: u32 = 1;

/// Extension of cache files, appended to the source file name.
pub const CACHE_EXTENSION: &str = "cuepk";

const BROTLI_BUFFER: usize = 4096;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_WINDOW: u32 = 22;

const TRAILER: &str = "\n# cuestream peak pyramid; levels are coarsest first, samples packed peak:16 rms:16\n";

pub(crate) fn encode(file: &PeakFile) -> Result<Vec<u8>, PeakError> {
    let mut block = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut block, BROTLI_BUFFER, BROTLI_QUALITY, BROTLI_WINDOW);
        writer.write_all(&(file.levels.len() as u32).to_le_bytes())?;
        for level in &file.levels {
            writer.write_all(&(level.reduction as i32).to_le_bytes())?;
            writer.write_all(&(level.samples.len() as i64).to_le_bytes())?;
            for sample in &level.samples {
                writer.write_all(&sample.0.to_le_bytes())?;
            }
        }
        writer.into_inner();
    }

    let name = file.source.name.as_bytes();
    let mut out = Vec::with_capacity(64 + name.len() + block.len() + TRAILER.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&file.source.length.to_le_bytes());
    out.extend_from_slice(&file.source.modified.to_le_bytes());
    out.extend_from_slice(&(name.len() as u32).to_le_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(&file.sample_rate.to_le_bytes());
    out.extend_from_slice(&file.total_frames.to_le_bytes());
    out.extend_from_slice(&(block.len() as u64).to_le_bytes());
    out.extend_from_slice(&block);
    out.extend_from_slice(TRAILER.as_bytes());
    Ok(out)
}

/// Read only the header, enough to decide whether a cache file is stale.
pub(crate) fn decode_header(bytes: &[u8]) -> Result<(SourceInfo, Reader<'_>), PeakError> {
    let mut r = Reader::new(bytes);
    if r.take(MAGIC.len())? != MAGIC {
        return Err(PeakError::BadMagic);
    }
    let version = r.u32()?;
    if version != FORMAT_VERSION {
        return Err(PeakError::UnsupportedVersion(version));
    }
    let length = r.u64()?;
    let modified = r.i64()?;
    let name_len = r.u32()? as usize;
    let name = core::str::from_utf8(r.take(name_len)?)
        .map_err(|_| PeakError::Corrupt("source name is not UTF-8"))?
        .to_owned();
    Ok((SourceInfo { name, length, modified }, r))
}

pub(crate) fn decode(bytes: &[u8]) -> Result<PeakFile, PeakError> {
    let (source, mut r) = decode_header(bytes)?;
    let sample_rate = r.u32()?;
    let total_frames = r.u64()?;
    let block_len = usize::try_from(r.u64()?).map_err(|_| PeakError::Corrupt("block length"))?;
    let compressed = r.take(block_len)?;

    let mut block = Vec::new();
    brotli::Decompressor::new(compressed, BROTLI_BUFFER)
        .read_to_end(&mut block)
        .map_err(|_| PeakError::Corrupt("compressed block"))?;

    let mut r = Reader::new(&block);
    let count = r.u32()? as usize;
    if count == 0 {
        return Err(PeakError::Corrupt("no levels"));
    }
    let mut levels = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let reduction = r.i32()?;
        let len = r.i64()?;
        if reduction <= 0 || len < 0 || len as u64 > (r.remaining() / 4) as u64 {
            return Err(PeakError::Corrupt("level header"));
        }
        let samples = r
            .take(len as usize * 4)?
            .chunks_exact(4)
            .map(|b| PeakSample(u32::from_le_bytes([b[0], b[1], b[2], b[3]])))
            .collect();
        levels.push(PeakLevel {
            reduction: reduction as u32,
            samples,
        });
    }

    Ok(PeakFile {
        source,
        sample_rate,
        total_frames,
        levels,
    })
}

/// Bounds-checked little-endian cursor.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn remaining(&self) -> usize {
        self.bytes.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], PeakError> {
        if n > self.bytes.len() {
            return Err(PeakError::Corrupt("truncated"));
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], PeakError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, PeakError> {
        self.array().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Result<i32, PeakError> {
        self.array().map(i32::from_le_bytes)
    }

    fn u64(&mut self) -> Result<u64, PeakError> {
        self.array().map(u64::from_le_bytes)
    }

    fn i64(&mut self) -> Result<i64, PeakError> {
        self.array().map(i64::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> PeakFile {
        PeakFile {
            source: SourceInfo {
                name: "kick.wav".into(),
                length: 1234,
                modified: 1_700_000_000_000_000_000,
            },
            sample_rate: 44_100,
            total_frames: 4096,
            levels: vec![
                PeakLevel { reduction: 64, samples: vec![PeakSample::new(1.0, 0.5); 64] },
                PeakLevel { reduction: 32, samples: (0..128).map(|i| PeakSample(i * 1000)).collect() },
            ],
        }
    }

    #[test]
    fn decodes_what_it_encodes() {
        let file = sample_file();
        let bytes = encode(&file).unwrap();
        assert!(bytes.ends_with(TRAILER.as_bytes()));
        assert_eq!(decode(&bytes).unwrap(), file);
    }

    #[test]
    fn rejects_foreign_and_future_files() {
        let mut bytes = encode(&sample_file()).unwrap();
        bytes[8] = 9;
        assert!(matches!(decode(&bytes), Err(PeakError::UnsupportedVersion(9))));
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(PeakError::BadMagic)));
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let bytes = encode(&sample_file()).unwrap();
        let cut = &bytes[..bytes.len() - TRAILER.len() - 10];
        assert!(matches!(decode(cut), Err(PeakError::Corrupt(_))));
    }
}
