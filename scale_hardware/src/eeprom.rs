//! Emulated EEPROM backends.
//!
//! Both backends model the ESP-style emulated EEPROM: writes land in a RAM
//! cache and only reach the medium on `commit()`. Erased bytes read as `0xFF`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use scale_traits::{BoxError, Storage};

use crate::error::{HwError, Result};
use crate::util::check_range;

/// Value of an erased cell.
pub const ERASED: u8 = 0xFF;

/// Volatile EEPROM for tests and demos.
///
/// Keeps the committed medium separate from the write cache so a test can
/// simulate power loss with [`MemEeprom::power_cycle`], and can tear the next
/// write to emulate a brown-out halfway through a slot.
#[derive(Debug, Clone)]
pub struct MemEeprom {
    cache: Vec<u8>,
    medium: Vec<u8>,
    tear_next: Option<usize>,
    write_log: Vec<usize>,
    commits: usize,
}

impl MemEeprom {
    /// A fully erased device of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self::from_image(vec![ERASED; capacity])
    }

    /// A device whose medium already holds `image`.
    pub fn from_image(image: Vec<u8>) -> Self {
        Self {
            cache: image.clone(),
            medium: image,
            tear_next: None,
            write_log: Vec::new(),
            commits: 0,
        }
    }

    /// Committed medium contents.
    pub fn image(&self) -> &[u8] {
        &self.medium
    }

    /// Drop uncommitted writes, as a reboot would.
    pub fn power_cycle(&mut self) {
        self.cache.clone_from(&self.medium);
        self.tear_next = None;
    }

    /// Only the first `keep` bytes of the next write reach the cache.
    pub fn tear_next_write(&mut self, keep: usize) {
        self.tear_next = Some(keep);
    }

    /// Start addresses of every write so far, oldest first.
    pub fn write_log(&self) -> &[usize] {
        &self.write_log
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Overwrite bytes directly on the medium (fixture setup, bit-rot tests).
    pub fn poke(&mut self, addr: usize, data: &[u8]) -> Result<()> {
        check_range(addr, data.len(), self.medium.len())?;
        self.medium[addr..addr + data.len()].copy_from_slice(data);
        self.cache[addr..addr + data.len()].copy_from_slice(data);
        Ok(())
    }
}

impl Storage for MemEeprom {
    fn capacity(&self) -> usize {
        self.cache.len()
    }

    fn read(&mut self, addr: usize, buf: &mut [u8]) -> std::result::Result<(), BoxError> {
        check_range(addr, buf.len(), self.cache.len())?;
        buf.copy_from_slice(&self.cache[addr..addr + buf.len()]);
        Ok(())
    }

    fn write(&mut self, addr: usize, data: &[u8]) -> std::result::Result<(), BoxError> {
        check_range(addr, data.len(), self.cache.len())?;
        let len = match self.tear_next.take() {
            Some(keep) => keep.min(data.len()),
            None => data.len(),
        };
        self.cache[addr..addr + len].copy_from_slice(&data[..len]);
        self.write_log.push(addr);
        Ok(())
    }

    fn commit(&mut self) -> std::result::Result<(), BoxError> {
        self.medium.clone_from(&self.cache);
        self.commits += 1;
        Ok(())
    }
}

/// EEPROM image persisted to a file on the host.
///
/// The whole image is rewritten on every commit through a temp file + rename,
/// so an interrupted commit leaves the previous image in place.
#[derive(Debug)]
pub struct FileEeprom {
    path: PathBuf,
    cache: Vec<u8>,
}

impl FileEeprom {
    /// Open `path`, or start from an erased image when it does not exist yet.
    /// Short files are padded with erased bytes; long files are truncated.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let path = path.into();
        let mut cache = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(HwError::Io(e)),
        };
        cache.resize(capacity, ERASED);
        tracing::debug!(path = %path.display(), capacity, "eeprom image opened");
        Ok(Self { path, cache })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileEeprom {
    fn capacity(&self) -> usize {
        self.cache.len()
    }

    fn read(&mut self, addr: usize, buf: &mut [u8]) -> std::result::Result<(), BoxError> {
        check_range(addr, buf.len(), self.cache.len())?;
        buf.copy_from_slice(&self.cache[addr..addr + buf.len()]);
        Ok(())
    }

    fn write(&mut self, addr: usize, data: &[u8]) -> std::result::Result<(), BoxError> {
        check_range(addr, data.len(), self.cache.len())?;
        self.cache[addr..addr + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> std::result::Result<(), BoxError> {
        write_image_atomic(&self.path, &self.cache).map_err(HwError::Io)?;
        tracing::trace!(path = %self.path.display(), "eeprom image committed");
        Ok(())
    }
}

fn write_image_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}
