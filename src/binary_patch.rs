use crate::error::PatchError;
use crate::patch_format::DiffChunk;

/// Reconstruct the new file from the old file data and a sequence of diff chunks.
///
/// Chunks are applied strictly in order. A chunk that reaches past the end of
/// `old`, or that would grow the output beyond `max_len` bytes, is rejected
/// before anything is returned.
pub fn apply_diff(
    old: &[u8],
    chunks: &[DiffChunk],
    max_len: u64,
) -> Result<Vec<u8>, PatchError> {
    let estimated_size: u64 = chunks
        .iter()
        .map(DiffChunk::output_len)
        .fold(0, u64::saturating_add);

    // Lengths come from the patch file; don't let a bogus one drive the allocation.
    let capacity = estimated_size.min(max_len);
    let mut result = Vec::with_capacity(capacity as usize);

    for (index, chunk) in chunks.iter().enumerate() {
        let end = (result.len() as u64).saturating_add(chunk.output_len());
        if end > max_len {
            return Err(PatchError::InvalidPatch(format!(
                "chunk {index} grows the output to {end} bytes, expected at most {max_len}"
            )));
        }
        match chunk {
            DiffChunk::Copy { offset, length } => {
                result.extend_from_slice(source_range(old, index, *offset, *length)?);
            }
            DiffChunk::Insert { data } => {
                result.extend_from_slice(data);
            }
            DiffChunk::Xor { offset, mask } => {
                let src = source_range(old, index, *offset, mask.len() as u64)?;
                result.extend(src.iter().zip(mask).map(|(b, m)| b ^ m));
            }
        }
    }

    Ok(result)
}

fn source_range(old: &[u8], index: usize, offset: u64, length: u64) -> Result<&[u8], PatchError> {
    let end = offset.checked_add(length).filter(|&end| end <= old.len() as u64);
    match end {
        Some(end) => Ok(&old[offset as usize..end as usize]),
        None => Err(PatchError::InvalidPatch(format!(
            "chunk {index} reads {length} bytes at offset {offset}, source is {} bytes",
            old.len()
        ))),
    }
}
