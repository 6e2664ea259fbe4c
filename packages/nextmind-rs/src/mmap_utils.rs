use crate::error::{NextMindError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Open a file and map it into memory (read-only)
pub fn mmap_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).map_err(|e| NextMindError::io(path, e))?;
    let mmap = unsafe { Mmap::map(&file).map_err(|e| NextMindError::io(path, e))? };
    Ok(mmap)
}

/// Size of a file in bytes, without opening it for reading
pub fn payload_len(path: &Path) -> Result<u64> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| NextMindError::io(path, e))
}
