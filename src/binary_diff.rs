use std::collections::HashMap;

use crate::patch_format::DiffChunk;
use crate::rolling_hash::RollingHash;

/// GRP lumps are often only a few KiB, so blocks stay small enough that
/// relocated lumps still contain whole blocks.
pub const BLOCK_SIZE: usize = 1024;

struct BlockSignature {
    rolling_hash: u32,
    strong_hash: blake3::Hash,
    offset: u64,
}

/// Compute a binary diff between `old` and `new` data.
///
/// Uses a block-matching algorithm (rsync-like):
/// 1. Split old data into fixed-size blocks
/// 2. Build a hash table from rolling hash -> block signatures
/// 3. Scan new data with a rolling hash, matching against old blocks and
///    extending each match byte-wise in both directions
/// 4. Emit Copy chunks for matches, Insert chunks for non-matching regions
/// 5. Rewrite Inserts that mostly repeat the source bytes they replace as Xor
pub fn compute_diff(old: &[u8], new: &[u8]) -> Vec<DiffChunk> {
    if new.is_empty() {
        return vec![];
    }
    if old.is_empty() {
        return vec![DiffChunk::Insert {
            data: new.to_vec(),
        }];
    }

    let signatures = build_signatures(old);
    let hash_table = build_hash_table(&signatures);

    let chunks = match_blocks(old, new, &hash_table, &signatures);
    merge_copies(xor_in_place_edits(old, chunks))
}

fn build_signatures(data: &[u8]) -> Vec<BlockSignature> {
    // Only full blocks: the scan window in `new` is always BLOCK_SIZE wide.
    data.chunks_exact(BLOCK_SIZE)
        .enumerate()
        .map(|(i, block)| BlockSignature {
            rolling_hash: RollingHash::over(block).digest(),
            strong_hash: blake3::hash(block),
            offset: (i * BLOCK_SIZE) as u64,
        })
        .collect()
}

fn build_hash_table(signatures: &[BlockSignature]) -> HashMap<u32, Vec<usize>> {
    let mut table: HashMap<u32, Vec<usize>> = HashMap::with_capacity(signatures.len());
    for (idx, sig) in signatures.iter().enumerate() {
        table.entry(sig.rolling_hash).or_default().push(idx);
    }
    table
}

fn match_blocks(
    old: &[u8],
    new: &[u8],
    hash_table: &HashMap<u32, Vec<usize>>,
    signatures: &[BlockSignature],
) -> Vec<DiffChunk> {
    let mut chunks: Vec<DiffChunk> = Vec::new();
    let mut insert_buf: Vec<u8> = Vec::new();

    if new.len() < BLOCK_SIZE || signatures.is_empty() {
        return vec![DiffChunk::Insert {
            data: new.to_vec(),
        }];
    }

    let mut rolling = RollingHash::over(&new[..BLOCK_SIZE]);
    let mut pos: usize = 0;

    while pos + BLOCK_SIZE <= new.len() {
        let window = &new[pos..pos + BLOCK_SIZE];

        if let Some(old_offset) = find_match(rolling.digest(), window, hash_table, signatures) {
            let mut start = old_offset as usize;
            let mut length = BLOCK_SIZE;

            // Pull back bytes that match just before the block.
            while start > 0 && insert_buf.last() == Some(&old[start - 1]) {
                insert_buf.pop();
                start -= 1;
                length += 1;
            }
            // And run forward past the block end.
            let mut new_end = pos + BLOCK_SIZE;
            while start + length < old.len()
                && new_end < new.len()
                && old[start + length] == new[new_end]
            {
                length += 1;
                new_end += 1;
            }

            if !insert_buf.is_empty() {
                chunks.push(DiffChunk::Insert {
                    data: std::mem::take(&mut insert_buf),
                });
            }
            chunks.push(DiffChunk::Copy {
                offset: start as u64,
                length: length as u64,
            });

            pos = new_end;
            if pos + BLOCK_SIZE <= new.len() {
                rolling = RollingHash::over(&new[pos..pos + BLOCK_SIZE]);
            }
        } else {
            insert_buf.push(new[pos]);
            pos += 1;

            if pos + BLOCK_SIZE <= new.len() {
                rolling.roll(new[pos - 1], new[pos + BLOCK_SIZE - 1]);
            }
        }
    }

    // Remaining bytes that don't fill a complete block window
    if pos < new.len() {
        insert_buf.extend_from_slice(&new[pos..]);
    }

    if !insert_buf.is_empty() {
        chunks.push(DiffChunk::Insert { data: insert_buf });
    }

    chunks
}

/// Try to find a matching old block for the current new window.
/// Returns the old block's offset on match.
fn find_match(
    rolling_digest: u32,
    new_block: &[u8],
    hash_table: &HashMap<u32, Vec<usize>>,
    signatures: &[BlockSignature],
) -> Option<u64> {
    let candidates = hash_table.get(&rolling_digest)?;

    let new_strong = blake3::hash(new_block);

    candidates
        .iter()
        .map(|&idx| &signatures[idx])
        .find(|sig| sig.strong_hash == new_strong)
        .map(|sig| sig.offset)
}

/// Fold runs of Copy chunks that read contiguous source ranges.
fn merge_copies(chunks: Vec<DiffChunk>) -> Vec<DiffChunk> {
    let mut merged: Vec<DiffChunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if let (
            Some(DiffChunk::Copy {
                offset: prev_offset,
                length: prev_length,
            }),
            DiffChunk::Copy { offset, length },
        ) = (merged.last_mut(), &chunk)
        {
            if *prev_offset + *prev_length == *offset {
                *prev_length += *length;
                continue;
            }
        }
        merged.push(chunk);
    }
    merged
}

/// An Insert that overwrites the source bytes right after the previous chunk,
/// leaving at least half of them unchanged, becomes an Xor against them
/// (or a plain Copy when nothing changed). The mask is mostly zeros and
/// compresses far better than the literal bytes.
fn xor_in_place_edits(old: &[u8], chunks: Vec<DiffChunk>) -> Vec<DiffChunk> {
    let mut cursor: usize = 0;
    chunks
        .into_iter()
        .map(|chunk| match chunk {
            DiffChunk::Copy { offset, length } => {
                cursor = (offset + length) as usize;
                DiffChunk::Copy { offset, length }
            }
            DiffChunk::Xor { offset, mask } => {
                cursor = offset as usize + mask.len();
                DiffChunk::Xor { offset, mask }
            }
            DiffChunk::Insert { data } => {
                let start = cursor;
                cursor += data.len();
                match old.get(start..start + data.len()) {
                    Some(src) if src == data.as_slice() => DiffChunk::Copy {
                        offset: start as u64,
                        length: data.len() as u64,
                    },
                    Some(src) if mostly_unchanged(src, &data) => DiffChunk::Xor {
                        offset: start as u64,
                        mask: src.iter().zip(&data).map(|(a, b)| a ^ b).collect(),
                    },
                    _ => DiffChunk::Insert { data },
                }
            }
        })
        .collect()
}

fn mostly_unchanged(src: &[u8], data: &[u8]) -> bool {
    let unchanged = src.iter().zip(data).filter(|(a, b)| a == b).count();
    unchanged * 2 >= data.len()
}
