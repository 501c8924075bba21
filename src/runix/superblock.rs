use super::disk::{Block, Disk, BLOCK_SIZE};
use super::fs::FsError;
use super::layout;
use crate::util::{self, unixtime};

pub const FS_MAGIC: u32 = 0x53465321; // "SFS!"
pub const FS_VERSION: u32 = 1;
pub const ROOT_INODE: u32 = 1; // inode 0 is reserved
/// Serialized superblock length; the record occupies the head of
/// logical block 0.
pub const SUPERBLOCK_SIZE: usize = 152;

const DEFAULT_MAX_MOUNT_COUNT: u32 = 100;

/// Filesystem-wide metadata, logical block 0. Loaded once per session,
/// mutated on every allocation/free, persisted at sync boundaries.
/// The layout fields persisted here are authoritative after format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
  pub magic: u32,
  pub version: u32,
  pub block_size: u32,
  pub total_blocks: u32,
  pub total_inodes: u32,
  pub free_blocks: u32,
  pub free_inodes: u32,
  pub inode_table_start: u32,
  pub inode_table_blocks: u32,
  pub data_blocks_start: u32,
  pub root_inode: u32,
  pub mount_count: u32,
  pub max_mount_count: u32,
  pub created_time: i64,
  pub last_mount_time: i64,
  pub last_write_time: i64,
  pub last_check_time: i64,
  pub reserved: [u32; 16],
  pub checksum: u32,
}

impl Superblock {
  pub fn new(total_blocks: u32) -> Self {
    let total_inodes = layout::MAX_INODES;
    let inode_table_blocks = layout::inode_table_blocks(total_inodes);
    let data_blocks_start = layout::data_blocks_start(total_inodes);
    let now = unixtime();

    let mut superblock = Self {
      magic: FS_MAGIC,
      version: FS_VERSION,
      block_size: BLOCK_SIZE as u32,
      total_blocks,
      total_inodes,
      free_blocks: total_blocks - data_blocks_start,
      free_inodes: total_inodes - 1, // root inode accounted up front
      inode_table_start: layout::INODE_TABLE_START,
      inode_table_blocks,
      data_blocks_start,
      root_inode: ROOT_INODE,
      mount_count: 0,
      max_mount_count: DEFAULT_MAX_MOUNT_COUNT,
      created_time: now,
      last_mount_time: now,
      last_write_time: now,
      last_check_time: now,
      reserved: [0; 16],
      checksum: 0,
    };

    superblock.refresh_checksum();
    superblock
  }

  pub fn to_bytes(&self) -> [u8; SUPERBLOCK_SIZE] {
    let mut buf = [0u8; SUPERBLOCK_SIZE];
    let mut off = 0;
    util::put_u32(&mut buf, &mut off, self.magic);
    util::put_u32(&mut buf, &mut off, self.version);
    util::put_u32(&mut buf, &mut off, self.block_size);
    util::put_u32(&mut buf, &mut off, self.total_blocks);
    util::put_u32(&mut buf, &mut off, self.total_inodes);
    util::put_u32(&mut buf, &mut off, self.free_blocks);
    util::put_u32(&mut buf, &mut off, self.free_inodes);
    util::put_u32(&mut buf, &mut off, self.inode_table_start);
    util::put_u32(&mut buf, &mut off, self.inode_table_blocks);
    util::put_u32(&mut buf, &mut off, self.data_blocks_start);
    util::put_u32(&mut buf, &mut off, self.root_inode);
    util::put_u32(&mut buf, &mut off, self.mount_count);
    util::put_u32(&mut buf, &mut off, self.max_mount_count);
    util::put_i64(&mut buf, &mut off, self.created_time);
    util::put_i64(&mut buf, &mut off, self.last_mount_time);
    util::put_i64(&mut buf, &mut off, self.last_write_time);
    util::put_i64(&mut buf, &mut off, self.last_check_time);
    for word in self.reserved {
      util::put_u32(&mut buf, &mut off, word);
    }
    util::put_u32(&mut buf, &mut off, self.checksum);
    buf
  }

  pub fn from_bytes(buf: &[u8; SUPERBLOCK_SIZE]) -> Result<Self, FsError> {
    let mut off = 0;
    let mut superblock = Self {
      magic: util::get_u32(buf, &mut off),
      version: util::get_u32(buf, &mut off),
      block_size: util::get_u32(buf, &mut off),
      total_blocks: util::get_u32(buf, &mut off),
      total_inodes: util::get_u32(buf, &mut off),
      free_blocks: util::get_u32(buf, &mut off),
      free_inodes: util::get_u32(buf, &mut off),
      inode_table_start: util::get_u32(buf, &mut off),
      inode_table_blocks: util::get_u32(buf, &mut off),
      data_blocks_start: util::get_u32(buf, &mut off),
      root_inode: util::get_u32(buf, &mut off),
      mount_count: util::get_u32(buf, &mut off),
      max_mount_count: util::get_u32(buf, &mut off),
      created_time: util::get_i64(buf, &mut off),
      last_mount_time: util::get_i64(buf, &mut off),
      last_write_time: util::get_i64(buf, &mut off),
      last_check_time: util::get_i64(buf, &mut off),
      reserved: [0; 16],
      checksum: 0,
    };
    for word in superblock.reserved.iter_mut() {
      *word = util::get_u32(buf, &mut off);
    }
    superblock.checksum = util::get_u32(buf, &mut off);

    if superblock.magic != FS_MAGIC {
      return Err(FsError::Corrupted("superblock: bad magic"));
    }
    if superblock.version != FS_VERSION {
      return Err(FsError::Corrupted("superblock: unsupported version"));
    }
    if superblock.checksum != util::crc32(&buf[..SUPERBLOCK_SIZE - 4]) {
      return Err(FsError::Corrupted("superblock: checksum mismatch"));
    }
    if superblock.free_inodes > superblock.total_inodes {
      return Err(FsError::Corrupted("superblock: free inode count out of range"));
    }
    if superblock.data_blocks_start >= superblock.total_blocks
      || superblock.free_blocks > superblock.total_blocks - superblock.data_blocks_start
    {
      return Err(FsError::Corrupted("superblock: free block count out of range"));
    }

    Ok(superblock)
  }

  /// Checksum covers every serialized byte before the checksum field.
  pub fn refresh_checksum(&mut self) {
    self.checksum = 0;
    let bytes = self.to_bytes();
    self.checksum = util::crc32(&bytes[..SUPERBLOCK_SIZE - 4]);
  }

  pub fn write(&mut self, disk: &mut Disk) -> Result<(), FsError> {
    self.refresh_checksum();

    let mut block: Block = [0u8; BLOCK_SIZE];
    block[..SUPERBLOCK_SIZE].copy_from_slice(&self.to_bytes());
    disk.write_block(layout::SUPERBLOCK_BLOCK, &block)?;
    Ok(())
  }

  pub fn read(disk: &mut Disk) -> Result<Self, FsError> {
    let block = disk.read_block(layout::SUPERBLOCK_BLOCK)?;
    let mut buf = [0u8; SUPERBLOCK_SIZE];
    buf.copy_from_slice(&block[..SUPERBLOCK_SIZE]);
    Self::from_bytes(&buf)
  }
}


// vim:ts=2 sw=2
