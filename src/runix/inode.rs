use core::fmt;

use super::bitmap::Bitmap;
use super::disk::Disk;
use super::fs::FsError;
use super::layout;
use super::superblock::Superblock;
use crate::util::{self, unixtime};

/// Direct block pointers per inode; the only supported addressing level.
/// Indirect pointers are declared on disk but unresolved - any block
/// index past this range is an explicit addressing error.
pub const DIRECT_BLOCKS: usize = 12;
/// Serialized inode record length; 8 records per table block.
pub const INODE_SIZE: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
  Regular = 0x1,
  Directory = 0x2,
  Symlink = 0x3,
  Special = 0x4,
}

impl TryFrom<u16> for FileType {
  type Error = ();

  fn try_from(raw: u16) -> Result<Self, ()> {
    match raw {
      0x1 => Ok(FileType::Regular),
      0x2 => Ok(FileType::Directory),
      0x3 => Ok(FileType::Symlink),
      0x4 => Ok(FileType::Special),
      _ => Err(()),
    }
  }
}

/// Unix-style 9-bit rwxrwxrwx permission word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMode(pub u16);

impl FileMode {
  pub const OWNER_READ: u16 = 0o400;
  pub const OWNER_WRITE: u16 = 0o200;
  pub const OWNER_EXEC: u16 = 0o100;
  pub const GROUP_READ: u16 = 0o040;
  pub const GROUP_WRITE: u16 = 0o020;
  pub const GROUP_EXEC: u16 = 0o010;
  pub const OTHER_READ: u16 = 0o004;
  pub const OTHER_WRITE: u16 = 0o002;
  pub const OTHER_EXEC: u16 = 0o001;

  pub fn new(raw: u16) -> Self {
    Self(raw & 0o777)
  }

  pub fn raw(&self) -> u16 {
    self.0
  }

  /// rwx triple for the owner class (3 bits).
  pub fn owner(&self) -> u16 {
    (self.0 >> 6) & 0o7
  }

  pub fn group(&self) -> u16 {
    (self.0 >> 3) & 0o7
  }

  pub fn other(&self) -> u16 {
    self.0 & 0o7
  }
}

impl fmt::Display for FileMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for shift in [6u16, 3, 0] {
      let triple = (self.0 >> shift) & 0o7;
      write!(
        f,
        "{}{}{}",
        if triple & 0o4 != 0 { 'r' } else { '-' },
        if triple & 0o2 != 0 { 'w' } else { '-' },
        if triple & 0o1 != 0 { 'x' } else { '-' },
      )?;
    }
    Ok(())
  }
}

/// Fixed-size metadata record for one file or directory, addressed by a
/// 1-based number. Filenames live in directory entries, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
  pub inode_number: u32,
  pub file_type: u16,
  pub permissions: FileMode,
  pub owner_uid: u32,
  pub owner_gid: u32,
  pub link_count: u32,
  pub file_size: u64,
  pub block_count: u32,
  pub access_time: i64,
  pub modify_time: i64,
  pub change_time: i64,
  pub create_time: i64,
  pub direct_blocks: [u32; DIRECT_BLOCKS],
  pub indirect_block: u32,
  pub double_indirect_block: u32,
  pub flags: u32,
  pub generation: u32,
}

impl Default for Inode {
  fn default() -> Self {
    Self {
      inode_number: 0,
      file_type: 0,
      permissions: FileMode(0),
      owner_uid: 0,
      owner_gid: 0,
      link_count: 0,
      file_size: 0,
      block_count: 0,
      access_time: 0,
      modify_time: 0,
      change_time: 0,
      create_time: 0,
      direct_blocks: [0; DIRECT_BLOCKS],
      indirect_block: 0,
      double_indirect_block: 0,
      flags: 0,
      generation: 0,
    }
  }
}

impl Inode {
  pub fn new(inode_number: u32, file_type: FileType, permissions: FileMode, uid: u32, gid: u32) -> Self {
    let now = unixtime();
    Self {
      inode_number,
      file_type: file_type as u16,
      permissions,
      owner_uid: uid,
      owner_gid: gid,
      link_count: 1,
      access_time: now,
      modify_time: now,
      change_time: now,
      create_time: now,
      ..Self::default()
    }
  }

  pub fn is_regular(&self) -> bool {
    self.file_type == FileType::Regular as u16
  }

  pub fn is_directory(&self) -> bool {
    self.file_type == FileType::Directory as u16
  }

  /// Resolve a file block index through the direct pointers.
  /// Ok(None) means the slot is unallocated; indices past the direct
  /// range fail loudly instead of pretending to be sparse.
  pub fn data_block_at(&self, block_index: u32) -> Result<Option<u32>, FsError> {
    if block_index as usize >= DIRECT_BLOCKS {
      return Err(FsError::AddressingLimit(
        "inode: block index beyond direct range",
      ));
    }
    match self.direct_blocks[block_index as usize] {
      0 => Ok(None),
      block_num => Ok(Some(block_num)),
    }
  }

  /// Number of mapped direct blocks.
  pub fn mapped_blocks(&self) -> u32 {
    self.direct_blocks.iter().filter(|&&b| b != 0).count() as u32
  }

  pub fn to_bytes(&self) -> [u8; INODE_SIZE] {
    let mut buf = [0u8; INODE_SIZE];
    let mut off = 0;
    util::put_u32(&mut buf, &mut off, self.inode_number);
    util::put_u16(&mut buf, &mut off, self.file_type);
    util::put_u16(&mut buf, &mut off, self.permissions.0);
    util::put_u32(&mut buf, &mut off, self.owner_uid);
    util::put_u32(&mut buf, &mut off, self.owner_gid);
    util::put_u32(&mut buf, &mut off, self.link_count);
    util::put_u64(&mut buf, &mut off, self.file_size);
    util::put_u32(&mut buf, &mut off, self.block_count);
    util::put_i64(&mut buf, &mut off, self.access_time);
    util::put_i64(&mut buf, &mut off, self.modify_time);
    util::put_i64(&mut buf, &mut off, self.change_time);
    util::put_i64(&mut buf, &mut off, self.create_time);
    for block_num in self.direct_blocks {
      util::put_u32(&mut buf, &mut off, block_num);
    }
    util::put_u32(&mut buf, &mut off, self.indirect_block);
    util::put_u32(&mut buf, &mut off, self.double_indirect_block);
    util::put_u32(&mut buf, &mut off, self.flags);
    util::put_u32(&mut buf, &mut off, self.generation);
    buf
  }

  pub fn from_bytes(buf: &[u8; INODE_SIZE]) -> Self {
    let mut off = 0;
    let mut inode = Self {
      inode_number: util::get_u32(buf, &mut off),
      file_type: util::get_u16(buf, &mut off),
      permissions: FileMode(util::get_u16(buf, &mut off)),
      owner_uid: util::get_u32(buf, &mut off),
      owner_gid: util::get_u32(buf, &mut off),
      link_count: util::get_u32(buf, &mut off),
      file_size: util::get_u64(buf, &mut off),
      block_count: util::get_u32(buf, &mut off),
      access_time: util::get_i64(buf, &mut off),
      modify_time: util::get_i64(buf, &mut off),
      change_time: util::get_i64(buf, &mut off),
      create_time: util::get_i64(buf, &mut off),
      ..Self::default()
    };
    for slot in inode.direct_blocks.iter_mut() {
      *slot = util::get_u32(buf, &mut off);
    }
    inode.indirect_block = util::get_u32(buf, &mut off);
    inode.double_indirect_block = util::get_u32(buf, &mut off);
    inode.flags = util::get_u32(buf, &mut off);
    inode.generation = util::get_u32(buf, &mut off);
    inode
  }
}

fn check_inode_number(superblock: &Superblock, inode_number: u32) -> Result<(), FsError> {
  if inode_number == 0 || inode_number >= superblock.total_inodes {
    return Err(FsError::InvalidParam("inode: number out of range"));
  }
  Ok(())
}

/// Re-reads from the block store on every call - there is no cache, so
/// read-then-write callers get no atomicity across the gap.
pub fn read_inode(disk: &mut Disk, superblock: &Superblock, inode_number: u32) -> Result<Inode, FsError> {
  check_inode_number(superblock, inode_number)?;

  let (block_num, offset) = layout::inode_location(superblock.inode_table_start, inode_number);
  let block = disk.read_block(block_num)?;

  let mut record = [0u8; INODE_SIZE];
  record.copy_from_slice(&block[offset..offset + INODE_SIZE]);
  Ok(Inode::from_bytes(&record))
}

/// Read-modify-write of the containing table block.
pub fn write_inode(
  disk: &mut Disk,
  superblock: &Superblock,
  inode_number: u32,
  inode: &Inode,
) -> Result<(), FsError> {
  check_inode_number(superblock, inode_number)?;

  let (block_num, offset) = layout::inode_location(superblock.inode_table_start, inode_number);
  let mut block = disk.read_block(block_num)?;
  block[offset..offset + INODE_SIZE].copy_from_slice(&inode.to_bytes());
  disk.write_block(block_num, &block)?;
  Ok(())
}

/// Release an inode: give its data blocks back to the block bitmap,
/// zero the record, clear the bitmap bit, refresh superblock counts.
/// The root inode is never freeable.
pub fn free_inode(
  disk: &mut Disk,
  superblock: &mut Superblock,
  inode_bitmap: &mut Bitmap,
  block_bitmap: &mut Bitmap,
  inode_number: u32,
) -> Result<(), FsError> {
  check_inode_number(superblock, inode_number)?;

  if inode_number == superblock.root_inode {
    return Err(FsError::PermissionDenied("inode: cannot free the root inode"));
  }
  if !inode_bitmap.is_set(inode_number) {
    return Err(FsError::InvalidParam("inode: freeing an unallocated inode"));
  }

  let inode = read_inode(disk, superblock, inode_number)?;
  for block_num in inode.direct_blocks {
    if block_num != 0 {
      block_bitmap.free(block_num - superblock.data_blocks_start);
    }
  }

  write_inode(disk, superblock, inode_number, &Inode::default())?;
  inode_bitmap.free(inode_number);

  superblock.free_inodes = inode_bitmap.free_count();
  superblock.free_blocks = block_bitmap.free_count();
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::runix::disk::BLOCK_SIZE;
  use crate::util::mktemp;

  #[test]
  fn record_is_exactly_one_slot() {
    let inode = Inode::new(7, FileType::Regular, FileMode::new(0o644), 1000, 1000);
    assert_eq!(inode.to_bytes().len(), INODE_SIZE);
    assert_eq!(BLOCK_SIZE % INODE_SIZE, 0);
  }

  #[test]
  fn serialization_roundtrip() {
    let mut inode = Inode::new(42, FileType::Regular, FileMode::new(0o640), 1000, 100);
    inode.file_size = 5000;
    inode.direct_blocks[0] = 136;
    inode.direct_blocks[4] = 140;
    inode.block_count = 2;
    inode.link_count = 3;

    let restored = Inode::from_bytes(&inode.to_bytes());
    assert_eq!(restored, inode);
  }

  #[test]
  fn mode_rendering() {
    assert_eq!(FileMode::new(0o755).to_string(), "rwxr-xr-x");
    assert_eq!(FileMode::new(0o640).to_string(), "rw-r-----");
    assert_eq!(FileMode::new(0o000).to_string(), "---------");
  }

  #[test]
  fn mode_triples() {
    let mode = FileMode::new(0o641);
    assert_eq!(mode.owner(), 0o6);
    assert_eq!(mode.group(), 0o4);
    assert_eq!(mode.other(), 0o1);
  }

  #[test]
  fn direct_range_is_enforced() {
    let mut inode = Inode::new(2, FileType::Regular, FileMode::new(0o644), 0, 0);
    inode.direct_blocks[3] = 150;

    assert_eq!(inode.data_block_at(3), Ok(Some(150)));
    assert_eq!(inode.data_block_at(0), Ok(None));
    assert!(matches!(
      inode.data_block_at(DIRECT_BLOCKS as u32),
      Err(FsError::AddressingLimit(_))
    ));
  }

  #[test]
  fn store_roundtrip_and_bounds() {
    let path = mktemp("inode-store");
    let mut disk = Disk::open_or_create(&path, 200 * BLOCK_SIZE as u64).unwrap();
    let superblock = Superblock::new(200);

    let mut inode = Inode::new(9, FileType::Regular, FileMode::new(0o644), 1000, 1000);
    inode.file_size = 123;
    write_inode(&mut disk, &superblock, 9, &inode).unwrap();

    // a neighbor in the same table block survives the read-modify-write
    let neighbor = Inode::new(10, FileType::Regular, FileMode::new(0o600), 0, 0);
    write_inode(&mut disk, &superblock, 10, &neighbor).unwrap();

    assert_eq!(read_inode(&mut disk, &superblock, 9).unwrap(), inode);
    assert_eq!(read_inode(&mut disk, &superblock, 10).unwrap(), neighbor);

    assert!(matches!(
      read_inode(&mut disk, &superblock, 0),
      Err(FsError::InvalidParam(_))
    ));
    assert!(matches!(
      read_inode(&mut disk, &superblock, superblock.total_inodes),
      Err(FsError::InvalidParam(_))
    ));
  }

  #[test]
  fn free_inode_releases_blocks_and_record() {
    let path = mktemp("inode-free");
    let mut disk = Disk::open_or_create(&path, 200 * BLOCK_SIZE as u64).unwrap();
    let mut superblock = Superblock::new(200);
    let mut inode_bitmap = Bitmap::new(superblock.total_inodes);
    let mut block_bitmap = Bitmap::new(superblock.total_blocks - superblock.data_blocks_start);

    inode_bitmap.set(superblock.root_inode);
    let inode_number = inode_bitmap.allocate_from(1).unwrap();
    let bit = block_bitmap.allocate().unwrap();

    let mut inode = Inode::new(inode_number, FileType::Regular, FileMode::new(0o644), 0, 0);
    inode.direct_blocks[0] = superblock.data_blocks_start + bit;
    inode.block_count = 1;
    write_inode(&mut disk, &superblock, inode_number, &inode).unwrap();

    free_inode(
      &mut disk,
      &mut superblock,
      &mut inode_bitmap,
      &mut block_bitmap,
      inode_number,
    )
    .unwrap();

    assert!(!inode_bitmap.is_set(inode_number));
    assert!(!block_bitmap.is_set(bit));
    assert_eq!(
      read_inode(&mut disk, &superblock, inode_number).unwrap(),
      Inode::default()
    );

    // double free is an error, the root inode is untouchable
    let root = superblock.root_inode;
    assert!(matches!(
      free_inode(&mut disk, &mut superblock, &mut inode_bitmap, &mut block_bitmap, inode_number),
      Err(FsError::InvalidParam(_))
    ));
    assert!(matches!(
      free_inode(&mut disk, &mut superblock, &mut inode_bitmap, &mut block_bitmap, root),
      Err(FsError::PermissionDenied(_))
    ));
  }
}

// vim:ts=2 sw=2
