//! `.npy` persistence for numeric arrays, guarded by advisory file locks.
//!
//! Writers hold an exclusive lock for the whole write; readers hold a shared
//! lock, so a reader never sees a half-written array from another process.

use crate::error::MarkifyError;
use ndarray::{Array, ArrayBase, Data, Dimension};
use ndarray_npy::{ReadNpyExt, ReadableElement, WritableElement, WriteNpyExt};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

fn npy_error(path: &Path, e: impl std::fmt::Display) -> MarkifyError {
    MarkifyError::ConversionFailed {
        format: "npy".to_string(),
        detail: format!("{}: {e}", path.display()),
    }
}

/// Write `array` to `path`, replacing any previous content.
pub fn save_array<A, S, D>(path: &Path, array: &ArrayBase<S, D>) -> Result<(), MarkifyError>
where
    A: WritableElement,
    S: Data<Elem = A>,
    D: Dimension,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| MarkifyError::io(parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| MarkifyError::io(path, e))?;
    file.lock().map_err(|e| MarkifyError::io(path, e))?;
    // Truncate only once the lock is held.
    file.set_len(0).map_err(|e| MarkifyError::io(path, e))?;

    let mut writer = BufWriter::new(&file);
    array.write_npy(&mut writer).map_err(|e| npy_error(path, e))?;
    writer.flush().map_err(|e| MarkifyError::io(path, e))?;
    drop(writer);

    file.unlock().map_err(|e| MarkifyError::io(path, e))
}

/// Read an array previously written by [`save_array`].
pub fn load_array<A, D>(path: &Path) -> Result<Array<A, D>, MarkifyError>
where
    A: ReadableElement,
    D: Dimension,
{
    let file = File::open(path).map_err(|e| MarkifyError::io(path, e))?;
    file.lock_shared().map_err(|e| MarkifyError::io(path, e))?;
    let array = Array::<A, D>::read_npy(BufReader::new(&file)).map_err(|e| npy_error(path, e));
    file.unlock().map_err(|e| MarkifyError::io(path, e))?;
    array
}
