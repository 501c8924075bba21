use std::fs::OpenOptions;
use std::io::prelude::*;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Instant;

use uuid::Uuid;

use crate::util::{self, unixtime};

pub const BLOCK_SIZE: usize = 1024;
pub const DISK_MAGIC: u32 = 0x44534B21; // "DSK!"
pub const DISK_VERSION: u32 = 1;
/// Serialized header length; the logical block space starts right after it.
pub const HEADER_SIZE: usize = 76;
// magic, version, block_size, total_blocks, disk_size - the fields the
// header checksum covers (timestamps and the checksum itself excluded)
const STABLE_PREFIX_LEN: usize = 24;

pub type Block = [u8; BLOCK_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskError {
  /// Invalid parameter
  InvalidParam(&'static str),
  /// Failed to open the backing file
  Open(&'static str),
  /// Failed to create the backing file
  Create(&'static str),
  /// Short or failed read at the OS boundary
  Read(&'static str),
  /// Short or failed write at the OS boundary
  Write(&'static str),
  /// Failed to position within the backing file
  Seek(&'static str),
  /// Block number outside [0, total_blocks)
  BlockRange(&'static str),
  /// General I/O error
  Io(&'static str),
  /// Header magic/version/block-size/checksum mismatch
  Corrupted(&'static str),
}

/// Rolling add-rotate checksum over the header's stable prefix.
fn header_checksum(bytes: &[u8]) -> u32 {
  let mut checksum: u32 = 0;
  for &byte in bytes {
    checksum = checksum.wrapping_add(byte as u32);
    checksum = checksum.rotate_left(1);
  }
  checksum
}

/// On-disk header, stored once at the start of the backing file,
/// outside the logical block space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskHeader {
  pub magic: u32,
  pub version: u32,
  pub block_size: u32,
  pub total_blocks: u32,
  pub disk_size: u64,
  pub created_time: i64,
  pub last_access_time: i64,
  pub checksum: u32,
  pub volume_id: [u8; 16],
  pub reserved: [u8; 16],
}

impl DiskHeader {
  pub fn new(total_blocks: u32) -> Self {
    let now = unixtime();
    let mut header = Self {
      magic: DISK_MAGIC,
      version: DISK_VERSION,
      block_size: BLOCK_SIZE as u32,
      total_blocks,
      disk_size: total_blocks as u64 * BLOCK_SIZE as u64,
      created_time: now,
      last_access_time: now,
      checksum: 0,
      volume_id: *Uuid::new_v4().as_bytes(),
      reserved: [0; 16],
    };

    let bytes = header.to_bytes();
    header.checksum = header_checksum(&bytes[..STABLE_PREFIX_LEN]);
    header
  }

  pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    let mut off = 0;
    util::put_u32(&mut buf, &mut off, self.magic);
    util::put_u32(&mut buf, &mut off, self.version);
    util::put_u32(&mut buf, &mut off, self.block_size);
    util::put_u32(&mut buf, &mut off, self.total_blocks);
    util::put_u64(&mut buf, &mut off, self.disk_size);
    util::put_i64(&mut buf, &mut off, self.created_time);
    util::put_i64(&mut buf, &mut off, self.last_access_time);
    util::put_u32(&mut buf, &mut off, self.checksum);
    util::put_bytes(&mut buf, &mut off, &self.volume_id);
    util::put_bytes(&mut buf, &mut off, &self.reserved);
    buf
  }

  pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
    let mut off = 0;
    Self {
      magic: util::get_u32(buf, &mut off),
      version: util::get_u32(buf, &mut off),
      block_size: util::get_u32(buf, &mut off),
      total_blocks: util::get_u32(buf, &mut off),
      disk_size: util::get_u64(buf, &mut off),
      created_time: util::get_i64(buf, &mut off),
      last_access_time: util::get_i64(buf, &mut off),
      checksum: util::get_u32(buf, &mut off),
      volume_id: util::get_bytes(buf, &mut off),
      reserved: util::get_bytes(buf, &mut off),
    }
  }

  pub fn validate(&self, raw: &[u8; HEADER_SIZE]) -> Result<(), DiskError> {
    if self.magic != DISK_MAGIC {
      return Err(DiskError::Corrupted("disk: bad header magic"));
    }
    if self.version != DISK_VERSION {
      return Err(DiskError::Corrupted("disk: unsupported header version"));
    }
    if self.block_size != BLOCK_SIZE as u32 {
      return Err(DiskError::Corrupted("disk: header block size mismatch"));
    }
    if header_checksum(&raw[..STABLE_PREFIX_LEN]) != self.checksum {
      return Err(DiskError::Corrupted("disk: header checksum mismatch"));
    }
    Ok(())
  }
}

/// Cumulative operation statistics, for observability only.
/// Latency averages are exponential moving averages (0.9/0.1),
/// not true means.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskStats {
  pub total_reads: u64,
  pub total_writes: u64,
  pub bytes_read: u64,
  pub bytes_written: u64,
  pub read_errors: u64,
  pub write_errors: u64,
  pub last_operation_time: i64,
  pub avg_read_time: f64,
  pub avg_write_time: f64,
}

/// Block device over a single backing file. Exclusively owns the
/// descriptor; everything above goes through read_block/write_block.
#[derive(Debug)]
pub struct Disk {
  file: std::fs::File,
  path: PathBuf,
  total_blocks: u32,
  disk_size: u64,
  read_only: bool,
  dirty: bool,
  auto_sync: bool,
  last_sync_time: i64,
  volume_id: [u8; 16],
  stats: DiskStats,
}

impl Disk {
  /// Open an existing backing file (validating its header) or create a
  /// fresh one of `size_bytes` with a new header.
  pub fn open_or_create(path: &Path, size_bytes: u64) -> Result<Self, DiskError> {
    if size_bytes == 0 || size_bytes % BLOCK_SIZE as u64 != 0 {
      return Err(DiskError::InvalidParam(
        "disk: size must be a positive multiple of the block size",
      ));
    }

    let total_blocks = (size_bytes / BLOCK_SIZE as u64) as u32;

    let (file, header) = if path.exists() {
      let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|_| DiskError::Open("disk: cannot open backing file"))?;

      let mut raw = [0u8; HEADER_SIZE];
      file
        .read_exact(&mut raw)
        .map_err(|_| DiskError::Read("disk: short header read"))?;

      let header = DiskHeader::from_bytes(&raw);
      header.validate(&raw)?;

      let expected = HEADER_SIZE as u64 + header.total_blocks as u64 * BLOCK_SIZE as u64;
      let actual = file
        .metadata()
        .map_err(|_| DiskError::Io("disk: cannot stat backing file"))?
        .len();
      if actual < expected {
        return Err(DiskError::Corrupted("disk: backing file truncated"));
      }

      (file, header)
    } else {
      let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|_| DiskError::Create("disk: cannot create backing file"))?;

      let header = DiskHeader::new(total_blocks);
      file
        .write_all(&header.to_bytes())
        .map_err(|_| DiskError::Write("disk: short header write"))?;

      // Extend to the full size so every block is addressable
      let file_size = HEADER_SIZE as u64 + total_blocks as u64 * BLOCK_SIZE as u64;
      file
        .set_len(file_size)
        .map_err(|_| DiskError::Write("disk: cannot extend backing file"))?;

      (file, header)
    };

    Ok(Self {
      file,
      path: path.to_owned(),
      total_blocks: header.total_blocks,
      disk_size: header.disk_size,
      read_only: false,
      dirty: false,
      auto_sync: false,
      last_sync_time: unixtime(),
      volume_id: header.volume_id,
      stats: DiskStats::default(),
    })
  }

  fn block_offset(block_num: u32) -> u64 {
    HEADER_SIZE as u64 + block_num as u64 * BLOCK_SIZE as u64
  }

  pub fn read_block(&mut self, block_num: u32) -> Result<Block, DiskError> {
    if block_num >= self.total_blocks {
      return Err(DiskError::BlockRange("disk: read past last block"));
    }

    let started = Instant::now();

    self
      .file
      .seek(SeekFrom::Start(Self::block_offset(block_num)))
      .map_err(|_| {
        self.stats.read_errors += 1;
        DiskError::Seek("disk: seek for block read failed")
      })?;

    let mut buf = [0u8; BLOCK_SIZE];
    self.file.read_exact(&mut buf).map_err(|_| {
      self.stats.read_errors += 1;
      DiskError::Read("disk: short block read")
    })?;

    self.note_read(BLOCK_SIZE as u64, started.elapsed().as_secs_f64());
    Ok(buf)
  }

  pub fn write_block(&mut self, block_num: u32, data: &Block) -> Result<(), DiskError> {
    if self.read_only {
      return Err(DiskError::Io("disk: device is read-only"));
    }
    if block_num >= self.total_blocks {
      return Err(DiskError::BlockRange("disk: write past last block"));
    }

    let started = Instant::now();

    self
      .file
      .seek(SeekFrom::Start(Self::block_offset(block_num)))
      .map_err(|_| {
        self.stats.write_errors += 1;
        DiskError::Seek("disk: seek for block write failed")
      })?;

    self.file.write_all(data).map_err(|_| {
      self.stats.write_errors += 1;
      DiskError::Write("disk: short block write")
    })?;

    self.note_write(BLOCK_SIZE as u64, started.elapsed().as_secs_f64());

    if self.auto_sync {
      self.sync()?;
    }

    Ok(())
  }

  pub fn zero_block(&mut self, block_num: u32) -> Result<(), DiskError> {
    self.write_block(block_num, &[0u8; BLOCK_SIZE])
  }

  /// Fill every block with `pattern`, then sync.
  pub fn fill(&mut self, pattern: u8) -> Result<(), DiskError> {
    let block = [pattern; BLOCK_SIZE];
    for block_num in 0..self.total_blocks {
      self.write_block(block_num, &block)?;
    }
    self.sync()
  }

  /// Flush pending writes to durable storage - the only durability
  /// boundary below the filesystem's own sync.
  pub fn sync(&mut self) -> Result<(), DiskError> {
    self
      .file
      .sync_all()
      .map_err(|_| DiskError::Io("disk: fsync failed"))?;
    self.dirty = false;
    self.last_sync_time = unixtime();
    Ok(())
  }

  /// Sync-if-dirty, then release the descriptor.
  pub fn close(mut self) -> Result<(), DiskError> {
    if self.dirty {
      self.sync()?;
    }
    Ok(())
  }

  fn note_read(&mut self, bytes: u64, elapsed: f64) {
    self.stats.total_reads += 1;
    self.stats.bytes_read += bytes;
    self.stats.last_operation_time = unixtime();

    if self.stats.total_reads == 1 {
      self.stats.avg_read_time = elapsed;
    } else {
      self.stats.avg_read_time = self.stats.avg_read_time * 0.9 + elapsed * 0.1;
    }
  }

  fn note_write(&mut self, bytes: u64, elapsed: f64) {
    self.stats.total_writes += 1;
    self.stats.bytes_written += bytes;
    self.stats.last_operation_time = unixtime();
    self.dirty = true;

    if self.stats.total_writes == 1 {
      self.stats.avg_write_time = elapsed;
    } else {
      self.stats.avg_write_time = self.stats.avg_write_time * 0.9 + elapsed * 0.1;
    }
  }

  pub fn stats(&self) -> DiskStats {
    self.stats
  }

  pub fn reset_stats(&mut self) {
    self.stats = DiskStats::default();
  }

  pub fn total_blocks(&self) -> u32 {
    self.total_blocks
  }

  pub fn block_size(&self) -> u32 {
    BLOCK_SIZE as u32
  }

  pub fn size_bytes(&self) -> u64 {
    self.disk_size
  }

  pub fn is_dirty(&self) -> bool {
    self.dirty
  }

  pub fn volume_id(&self) -> Uuid {
    Uuid::from_bytes(self.volume_id)
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn last_sync_time(&self) -> i64 {
    self.last_sync_time
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::mktemp;

  const DISK_SIZE: u64 = 64 * BLOCK_SIZE as u64;

  #[test]
  fn create_and_reopen_preserves_header() {
    let path = mktemp("disk-reopen");

    let disk = Disk::open_or_create(&path, DISK_SIZE).unwrap();
    let volume_id = disk.volume_id();
    assert_eq!(disk.total_blocks(), 64);
    disk.close().unwrap();

    let disk = Disk::open_or_create(&path, DISK_SIZE).unwrap();
    assert_eq!(disk.total_blocks(), 64);
    assert_eq!(disk.size_bytes(), DISK_SIZE);
    assert_eq!(disk.volume_id(), volume_id);
  }

  #[test]
  fn unaligned_size_is_rejected() {
    let path = mktemp("disk-unaligned");
    assert!(matches!(
      Disk::open_or_create(&path, DISK_SIZE + 1),
      Err(DiskError::InvalidParam(_))
    ));
    assert!(matches!(
      Disk::open_or_create(&path, 0),
      Err(DiskError::InvalidParam(_))
    ));
  }

  #[test]
  fn block_roundtrip() {
    let path = mktemp("disk-roundtrip");
    let mut disk = Disk::open_or_create(&path, DISK_SIZE).unwrap();

    let mut data = [0u8; BLOCK_SIZE];
    for (i, byte) in data.iter_mut().enumerate() {
      *byte = (i % 251) as u8;
    }

    disk.write_block(17, &data).unwrap();
    assert_eq!(disk.read_block(17).unwrap(), data);

    // untouched blocks of a fresh image read back zeroed
    assert_eq!(disk.read_block(16).unwrap(), [0u8; BLOCK_SIZE]);
  }

  #[test]
  fn out_of_range_blocks_are_rejected() {
    let path = mktemp("disk-range");
    let mut disk = Disk::open_or_create(&path, DISK_SIZE).unwrap();

    assert!(matches!(disk.read_block(64), Err(DiskError::BlockRange(_))));
    assert!(matches!(
      disk.write_block(64, &[0u8; BLOCK_SIZE]),
      Err(DiskError::BlockRange(_))
    ));
    assert!(matches!(
      disk.read_block(u32::MAX),
      Err(DiskError::BlockRange(_))
    ));

    // rejected operations leave no trace in the statistics
    let stats = disk.stats();
    assert_eq!(stats.total_reads, 0);
    assert_eq!(stats.total_writes, 0);
  }

  #[test]
  fn corrupted_magic_is_fatal_on_open() {
    let path = mktemp("disk-corrupt");
    Disk::open_or_create(&path, DISK_SIZE).unwrap().close().unwrap();

    // flip one byte of the magic
    let mut image = std::fs::read(&path).unwrap();
    image[0] ^= 0xFF;
    std::fs::write(&path, &image).unwrap();

    assert!(matches!(
      Disk::open_or_create(&path, DISK_SIZE),
      Err(DiskError::Corrupted(_))
    ));
  }

  #[test]
  fn corrupted_checksum_is_fatal_on_open() {
    let path = mktemp("disk-cksum");
    Disk::open_or_create(&path, DISK_SIZE).unwrap().close().unwrap();

    // corrupt total_blocks without refreshing the checksum
    let mut image = std::fs::read(&path).unwrap();
    image[12] ^= 0x01;
    std::fs::write(&path, &image).unwrap();

    assert!(matches!(
      Disk::open_or_create(&path, DISK_SIZE),
      Err(DiskError::Corrupted(_))
    ));
  }

  #[test]
  fn stats_track_operations() {
    let path = mktemp("disk-stats");
    let mut disk = Disk::open_or_create(&path, DISK_SIZE).unwrap();

    disk.write_block(0, &[0xAA; BLOCK_SIZE]).unwrap();
    disk.write_block(1, &[0xBB; BLOCK_SIZE]).unwrap();
    disk.read_block(0).unwrap();

    let stats = disk.stats();
    assert_eq!(stats.total_writes, 2);
    assert_eq!(stats.total_reads, 1);
    assert_eq!(stats.bytes_written, 2 * BLOCK_SIZE as u64);
    assert_eq!(stats.bytes_read, BLOCK_SIZE as u64);
    assert!(disk.is_dirty());

    disk.sync().unwrap();
    assert!(!disk.is_dirty());

    disk.reset_stats();
    assert_eq!(disk.stats().total_reads, 0);
  }

  #[test]
  fn fill_writes_pattern_everywhere() {
    let path = mktemp("disk-fill");
    let mut disk = Disk::open_or_create(&path, DISK_SIZE).unwrap();

    disk.fill(0x5A).unwrap();
    assert_eq!(disk.read_block(0).unwrap(), [0x5A; BLOCK_SIZE]);
    assert_eq!(disk.read_block(63).unwrap(), [0x5A; BLOCK_SIZE]);
  }

  #[test]
  fn header_serialization_roundtrip() {
    let header = DiskHeader::new(128);
    let bytes = header.to_bytes();
    let restored = DiskHeader::from_bytes(&bytes);
    assert_eq!(restored, header);
    restored.validate(&bytes).unwrap();
  }
}

// vim:ts=2 sw=2
