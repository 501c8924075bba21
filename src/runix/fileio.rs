//! Byte-range file I/O: offsets translated to (block index, intra-block
//! offset) pairs over the inode's direct pointers, actual bytes
//! delegated to the block store. Multi-block writes are a sequence of
//! independently durable steps - no atomicity across block boundaries.

use super::disk::{Block, BLOCK_SIZE};
use super::fs::{Filesystem, FsError, Whence};
use super::inode::{self, Inode};
use super::users::{self, Perm};
use crate::util::unixtime;

fn block_position(offset: u64) -> (u32, usize) {
  (
    (offset / BLOCK_SIZE as u64) as u32,
    (offset % BLOCK_SIZE as u64) as usize,
  )
}

impl Filesystem {
  /// Map a block index, allocating a fresh data block when the slot is
  /// empty. Returns (absolute block number, freshly-allocated flag).
  fn resolve_or_allocate(&mut self, inode: &mut Inode, block_index: u32) -> Result<Option<(u32, bool)>, FsError> {
    if let Some(block_num) = inode.data_block_at(block_index)? {
      return Ok(Some((block_num, false)));
    }

    let bit = match self.block_bitmap.allocate() {
      Some(bit) => bit,
      None => return Ok(None),
    };

    let block_num = self.superblock.data_blocks_start + bit;
    inode.direct_blocks[block_index as usize] = block_num;
    Ok(Some((block_num, true)))
  }

  fn fill_gap(&mut self, file_inode: &mut Inode, position: u64) -> Result<(), FsError> {
    let (first_gap, _) = block_position(file_inode.file_size);
    let (last_gap, _) = block_position(position - 1);
    for block_index in first_gap..=last_gap {
      match self.resolve_or_allocate(file_inode, block_index)? {
        Some((block_num, true)) => self.disk.zero_block(block_num)?,
        Some((_, false)) => {}
        None => return Err(FsError::NoSpace("write: no block for seek gap")),
      }
    }
    Ok(())
  }

  /// Write at the handle's cursor. Short writes are a normal outcome:
  /// when the allocator runs dry mid-range the byte count written so
  /// far is returned and the caller must check it. Only a write that
  /// cannot produce a single byte reports its cause as an error.
  pub fn write(&mut self, fd: u32, data: &[u8]) -> Result<usize, FsError> {
    if data.is_empty() {
      return Err(FsError::InvalidParam("write: empty buffer"));
    }

    let handle = *self.handles.get(fd)?;
    let mut file_inode =
      inode::read_inode(&mut self.disk, &self.superblock, handle.inode_number)?;

    if !file_inode.is_regular() {
      return Err(FsError::InvalidParam("write: not a regular file"));
    }

    let gid = self.current_gid();
    if !users::check_permission(self.current_uid, gid, &file_inode, Perm::Write) {
      return Err(FsError::PermissionDenied("write: write permission denied"));
    }

    // A cursor parked past end-of-file leaves a gap: allocate and zero
    // every unmapped block covering it so the gap reads back as zeroes.
    // This design never produces a sparse region below end-of-file.
    if handle.position > file_inode.file_size {
      let filled = self.fill_gap(&mut file_inode, handle.position);
      // persist whatever was placed before surfacing a failure, so no
      // allocated bit is left orphaned
      file_inode.block_count = file_inode.mapped_blocks();
      inode::write_inode(&mut self.disk, &self.superblock, handle.inode_number, &file_inode)?;
      self.superblock.free_blocks = self.block_bitmap.free_count();
      filled?;
    }

    let start = handle.position;
    let end = start + data.len() as u64;
    let mut offset = start;
    let mut written = 0usize;

    while offset < end {
      let (block_index, block_offset) = block_position(offset);

      let (block_num, fresh) = match self.resolve_or_allocate(&mut file_inode, block_index) {
        Ok(Some(mapping)) => mapping,
        // allocator dry: stop early, the partial count is the result
        Ok(None) => {
          if written == 0 {
            return Err(FsError::NoSpace("write: out of data blocks"));
          }
          break;
        }
        Err(err) => {
          if written == 0 {
            return Err(err);
          }
          break;
        }
      };

      // full block read before every partial write; a fresh block
      // starts from zeroes instead of stale device contents
      let mut block: Block = if fresh {
        [0u8; BLOCK_SIZE]
      } else {
        self.disk.read_block(block_num)?
      };

      let chunk = (BLOCK_SIZE - block_offset).min((end - offset) as usize);
      block[block_offset..block_offset + chunk].copy_from_slice(&data[written..written + chunk]);
      self.disk.write_block(block_num, &block)?;

      written += chunk;
      offset += chunk as u64;
    }

    if written > 0 {
      if offset > file_inode.file_size {
        file_inode.file_size = offset;
      }
      file_inode.block_count = file_inode.mapped_blocks();

      let now = unixtime();
      file_inode.modify_time = now;
      file_inode.change_time = now;
      inode::write_inode(&mut self.disk, &self.superblock, handle.inode_number, &file_inode)?;

      self.handles.get_mut(fd)?.position = offset;
      self.superblock.free_blocks = self.block_bitmap.free_count();
    }

    Ok(written)
  }

  /// Read up to max_len bytes at the cursor. The request is clamped to
  /// end-of-file; at or past it the result is simply empty. Reads never
  /// allocate - an unmapped block below end-of-file is corruption.
  pub fn read(&mut self, fd: u32, max_len: usize) -> Result<Vec<u8>, FsError> {
    if max_len == 0 {
      return Err(FsError::InvalidParam("read: zero-length request"));
    }

    let handle = *self.handles.get(fd)?;
    let mut file_inode =
      inode::read_inode(&mut self.disk, &self.superblock, handle.inode_number)?;

    if !file_inode.is_regular() {
      return Err(FsError::InvalidParam("read: not a regular file"));
    }

    let gid = self.current_gid();
    if !users::check_permission(self.current_uid, gid, &file_inode, Perm::Read) {
      return Err(FsError::PermissionDenied("read: read permission denied"));
    }

    if handle.position >= file_inode.file_size {
      return Ok(Vec::new());
    }

    let want = (file_inode.file_size - handle.position).min(max_len as u64) as usize;
    let end = handle.position + want as u64;
    let mut offset = handle.position;
    let mut out = Vec::with_capacity(want);

    while offset < end {
      let (block_index, block_offset) = block_position(offset);

      let block_num = file_inode.data_block_at(block_index)?.ok_or(FsError::Io(
        "read: unmapped block below end-of-file",
      ))?;

      let block = self.disk.read_block(block_num)?;
      let chunk = (BLOCK_SIZE - block_offset).min((end - offset) as usize);
      out.extend_from_slice(&block[block_offset..block_offset + chunk]);
      offset += chunk as u64;
    }

    file_inode.access_time = unixtime();
    inode::write_inode(&mut self.disk, &self.superblock, handle.inode_number, &file_inode)?;

    self.handles.get_mut(fd)?.position = end;
    Ok(out)
  }

  /// Reposition the cursor. Negative results are rejected; positions
  /// past end-of-file are allowed (the next write fills the gap).
  pub fn seek(&mut self, fd: u32, offset: i64, whence: Whence) -> Result<u64, FsError> {
    let handle = *self.handles.get(fd)?;
    let file_inode =
      inode::read_inode(&mut self.disk, &self.superblock, handle.inode_number)?;

    let base: i64 = match whence {
      Whence::Set => 0,
      Whence::Cur => handle.position as i64,
      Whence::End => file_inode.file_size as i64,
    };

    let target = base
      .checked_add(offset)
      .ok_or(FsError::InvalidParam("seek: position overflow"))?;
    if target < 0 {
      return Err(FsError::InvalidParam("seek: negative resulting position"));
    }

    self.handles.get_mut(fd)?.position = target as u64;
    Ok(target as u64)
  }

  pub fn tell(&self, fd: u32) -> Result<u64, FsError> {
    Ok(self.handles.get(fd)?.position)
  }

  pub fn size(&mut self, fd: u32) -> Result<u64, FsError> {
    let inode_number = self.handles.get(fd)?.inode_number;
    let file_inode = inode::read_inode(&mut self.disk, &self.superblock, inode_number)?;
    Ok(file_inode.file_size)
  }
}


// vim:ts=2 sw=2
