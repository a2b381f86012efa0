//! Program images read from disk or any other reader

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::memory::PROGRAM_CAPACITY;

/// A CHIP-8 program: raw big-endian bytecode without header
///
/// `size` is the length the source declared (file size on disk); `data` holds
/// what was actually read, never more than fits into program memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rom {
    name: String,
    size: usize,
    data: Vec<u8>,
}

impl Rom {
    /// ROM whose declared size is the length of `data`
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len(),
            data,
        }
    }

    /// Read a ROM file, named after the file
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len() as usize;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_reader(name, size, File::open(path)?)
    }

    /// Read up to `size` bytes, capped at program capacity
    ///
    /// Running out of input early is not an error, the ROM just holds less
    /// data than declared.
    pub fn from_reader(name: impl Into<String>, size: usize, reader: impl Read) -> io::Result<Self> {
        let mut data = Vec::with_capacity(size.min(PROGRAM_CAPACITY));
        reader
            .take(size.min(PROGRAM_CAPACITY) as u64)
            .read_to_end(&mut data)?;
        Ok(Self {
            name: name.into(),
            size,
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
