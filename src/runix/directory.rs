use super::bitmap::Bitmap;
use super::disk::{Block, Disk, BLOCK_SIZE};
use super::fs::FsError;
use super::inode::{self, FileMode, FileType, Inode, DIRECT_BLOCKS};
use super::superblock::Superblock;
use crate::util::{self, unixtime};

pub const MAX_FILENAME_LEN: usize = 64; // including the null terminator
/// Serialized directory entry length; 13 entries per block, the block
/// tail past the last slot is unused.
pub const DIR_ENTRY_SIZE: usize = 76;
pub const DIR_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;

pub const ROOT_PERMISSIONS: u16 = 0o755;

/// Fixed-size directory entry. Deleted entries are tombstoned in place
/// (is_valid = 0) and their slot reused by the next insertion scan;
/// entries are never compacted or reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
  pub inode_number: u32,
  pub entry_length: u16,
  pub name_length: u8,
  pub file_type: u8,
  pub name: [u8; MAX_FILENAME_LEN],
  pub is_valid: u8,
}

impl DirEntry {
  pub fn new(inode_number: u32, name: &str, file_type: FileType) -> Result<Self, FsError> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() >= MAX_FILENAME_LEN {
      return Err(FsError::InvalidParam("directory: bad entry name length"));
    }

    let mut name_buf = [0u8; MAX_FILENAME_LEN];
    name_buf[..bytes.len()].copy_from_slice(bytes);

    Ok(Self {
      inode_number,
      entry_length: DIR_ENTRY_SIZE as u16,
      name_length: bytes.len() as u8,
      file_type: file_type as u8,
      name: name_buf,
      is_valid: 1,
    })
  }

  pub fn name(&self) -> &str {
    let end = self
      .name
      .iter()
      .position(|&byte| byte == 0)
      .unwrap_or(MAX_FILENAME_LEN);
    core::str::from_utf8(&self.name[..end]).unwrap_or("<invalid>")
  }

  pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
    let mut buf = [0u8; DIR_ENTRY_SIZE];
    let mut off = 0;
    util::put_u32(&mut buf, &mut off, self.inode_number);
    util::put_u16(&mut buf, &mut off, self.entry_length);
    util::put_u8(&mut buf, &mut off, self.name_length);
    util::put_u8(&mut buf, &mut off, self.file_type);
    util::put_bytes(&mut buf, &mut off, &self.name);
    util::put_u8(&mut buf, &mut off, self.is_valid);
    buf
  }

  pub fn from_bytes(buf: &[u8; DIR_ENTRY_SIZE]) -> Self {
    let mut off = 0;
    Self {
      inode_number: util::get_u32(buf, &mut off),
      entry_length: util::get_u16(buf, &mut off),
      name_length: util::get_u8(buf, &mut off),
      file_type: util::get_u8(buf, &mut off),
      name: util::get_bytes(buf, &mut off),
      is_valid: util::get_u8(buf, &mut off),
    }
  }
}

fn entry_at(block: &Block, slot: usize) -> DirEntry {
  let offset = slot * DIR_ENTRY_SIZE;
  let mut record = [0u8; DIR_ENTRY_SIZE];
  record.copy_from_slice(&block[offset..offset + DIR_ENTRY_SIZE]);
  DirEntry::from_bytes(&record)
}

fn put_entry(block: &mut Block, slot: usize, entry: &DirEntry) {
  let offset = slot * DIR_ENTRY_SIZE;
  block[offset..offset + DIR_ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
}

/// Name -> inode number. Scans the directory's direct blocks in order,
/// short-circuiting on the first valid exact match (case-sensitive).
pub fn lookup(disk: &mut Disk, dir_inode: &Inode, name: &str) -> Result<Option<u32>, FsError> {
  if !dir_inode.is_directory() {
    return Err(FsError::NotDirectory("directory: lookup in a non-directory"));
  }

  for block_index in 0..DIRECT_BLOCKS {
    let block_num = dir_inode.direct_blocks[block_index];
    if block_num == 0 {
      break; // directory blocks are allocated densely
    }

    let block = disk.read_block(block_num)?;
    for slot in 0..DIR_ENTRIES_PER_BLOCK {
      let entry = entry_at(&block, slot);
      if entry.is_valid != 0 && entry.name() == name {
        return Ok(Some(entry.inode_number));
      }
    }
  }

  Ok(None)
}

/// Insert an entry into the first free or tombstoned slot, growing the
/// directory by one zeroed block when every existing slot is taken.
/// The directory size is deliberately coarse: blocks_used * BLOCK_SIZE.
pub fn insert(
  disk: &mut Disk,
  superblock: &mut Superblock,
  block_bitmap: &mut Bitmap,
  dir_inode: &mut Inode,
  name: &str,
  inode_number: u32,
  file_type: FileType,
) -> Result<(), FsError> {
  if !dir_inode.is_directory() {
    return Err(FsError::NotDirectory("directory: insert into a non-directory"));
  }
  if lookup(disk, dir_inode, name)?.is_some() {
    return Err(FsError::Exists("directory: name already present"));
  }

  let entry = DirEntry::new(inode_number, name, file_type)?;

  for block_index in 0..DIRECT_BLOCKS {
    let mut block: Block;
    let block_num = match dir_inode.direct_blocks[block_index] {
      0 => {
        // grow by one zero-initialized block
        let bit = block_bitmap
          .allocate()
          .ok_or(FsError::NoSpace("directory: no free data block"))?;
        let block_num = superblock.data_blocks_start + bit;

        dir_inode.direct_blocks[block_index] = block_num;
        dir_inode.block_count = dir_inode.mapped_blocks();
        superblock.free_blocks = block_bitmap.free_count();

        block = [0u8; BLOCK_SIZE];
        block_num
      }
      block_num => {
        block = disk.read_block(block_num)?;
        block_num
      }
    };

    for slot in 0..DIR_ENTRIES_PER_BLOCK {
      if entry_at(&block, slot).is_valid == 0 {
        put_entry(&mut block, slot, &entry);
        disk.write_block(block_num, &block)?;

        dir_inode.file_size = (block_index as u64 + 1) * BLOCK_SIZE as u64;
        let now = unixtime();
        dir_inode.modify_time = now;
        dir_inode.change_time = now;
        inode::write_inode(disk, superblock, dir_inode.inode_number, dir_inode)?;

        return Ok(());
      }
    }
  }

  Err(FsError::NoSpace("directory: every direct slot is full"))
}

/// Tombstone the matching valid entry in place.
pub fn remove(disk: &mut Disk, dir_inode: &Inode, name: &str) -> Result<(), FsError> {
  if !dir_inode.is_directory() {
    return Err(FsError::NotDirectory("directory: remove from a non-directory"));
  }

  for block_index in 0..DIRECT_BLOCKS {
    let block_num = dir_inode.direct_blocks[block_index];
    if block_num == 0 {
      break;
    }

    let mut block = disk.read_block(block_num)?;
    for slot in 0..DIR_ENTRIES_PER_BLOCK {
      let mut entry = entry_at(&block, slot);
      if entry.is_valid != 0 && entry.name() == name {
        entry.is_valid = 0;
        put_entry(&mut block, slot, &entry);
        disk.write_block(block_num, &block)?;
        return Ok(());
      }
    }
  }

  Err(FsError::NotFound("directory: no such entry"))
}

/// All valid entries, slot order preserved.
pub fn read_entries(disk: &mut Disk, dir_inode: &Inode) -> Result<Vec<DirEntry>, FsError> {
  if !dir_inode.is_directory() {
    return Err(FsError::NotDirectory("directory: listing a non-directory"));
  }

  let mut entries = Vec::new();
  for block_index in 0..DIRECT_BLOCKS {
    let block_num = dir_inode.direct_blocks[block_index];
    if block_num == 0 {
      break;
    }

    let block = disk.read_block(block_num)?;
    for slot in 0..DIR_ENTRIES_PER_BLOCK {
      let entry = entry_at(&block, slot);
      if entry.is_valid != 0 {
        entries.push(entry);
      }
    }
  }

  Ok(entries)
}

/// Bootstrap the root directory: inode 1, one data block holding the
/// two self-referential entries "." and ".." (the root is its own
/// parent). Marks the inode and data bits, refreshes superblock counts.
pub fn create_root(
  disk: &mut Disk,
  superblock: &mut Superblock,
  inode_bitmap: &mut Bitmap,
  block_bitmap: &mut Bitmap,
) -> Result<(), FsError> {
  let root_number = superblock.root_inode;
  let data_block = superblock.data_blocks_start; // first data block, bit 0

  let mut root = Inode::new(
    root_number,
    FileType::Directory,
    FileMode::new(ROOT_PERMISSIONS),
    0,
    0,
  );
  root.link_count = 2; // "." plus the parent link
  root.direct_blocks[0] = data_block;
  root.block_count = 1;
  root.file_size = 2 * DIR_ENTRY_SIZE as u64;

  let mut block: Block = [0u8; BLOCK_SIZE];
  put_entry(
    &mut block,
    0,
    &DirEntry::new(root_number, ".", FileType::Directory)?,
  );
  put_entry(
    &mut block,
    1,
    &DirEntry::new(root_number, "..", FileType::Directory)?,
  );
  disk.write_block(data_block, &block)?;

  inode::write_inode(disk, superblock, root_number, &root)?;

  inode_bitmap.set(root_number);
  block_bitmap.set(0);
  superblock.free_inodes = inode_bitmap.free_count();
  superblock.free_blocks = block_bitmap.free_count();

  Ok(())
}


// vim:ts=2 sw=2
