use sha2::{Digest, Sha256};

use super::inode::Inode;
use crate::util::unixtime;

pub const ROOT_UID: u32 = 0;
pub const ROOT_GID: u32 = 0;
pub const DEFAULT_UID: u32 = 1000;
pub const DEFAULT_GID: u32 = 1000;
pub const ANONYMOUS_UID: u32 = 65534;
pub const MAX_USERS: usize = 32;
const MAX_USERNAME_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserError {
  /// Invalid parameter
  InvalidParam(&'static str),
  /// User already exists
  Exists(&'static str),
  /// User not found
  NotFound(&'static str),
  /// Wrong password
  WrongPassword(&'static str),
  /// User table full
  TableFull(&'static str),
  /// Permission denied
  PermissionDenied(&'static str),
  /// Not logged in
  NotLoggedIn(&'static str),
}

/// One account. The table is session state only: rebuilt on every
/// mount, never persisted to the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
  pub uid: u32,
  pub gid: u32,
  pub username: String,
  pub password_hash: String,
  pub created_time: i64,
  pub is_active: bool,
}

/// Opaque password-verification material: sha256 of the secret,
/// hex-encoded. An empty secret hashes to the empty string so the
/// anonymous account stays passwordless.
pub fn hash_password(password: &str) -> String {
  if password.is_empty() {
    return String::new();
  }
  hex::encode(Sha256::digest(password.as_bytes()))
}

#[derive(Debug)]
pub struct UserTable {
  users: Vec<User>,
}

impl UserTable {
  /// Seed the default accounts: root (password "root123") and the
  /// passwordless anonymous user.
  pub fn new() -> Self {
    let mut table = Self { users: Vec::new() };

    table
      .create_user("root", "root123", ROOT_UID, ROOT_GID)
      .expect("user table: seeding root cannot fail on an empty table");
    table
      .create_user("anonymous", "", ANONYMOUS_UID, ANONYMOUS_UID)
      .expect("user table: seeding anonymous cannot fail");

    table
  }

  /// uid 0 requests auto-assignment starting at DEFAULT_UID.
  /// (Explicit uid 0 only exists for the seeded root account.)
  pub fn create_user(
    &mut self,
    username: &str,
    password: &str,
    uid: u32,
    gid: u32,
  ) -> Result<u32, UserError> {
    if username.is_empty() || username.len() >= MAX_USERNAME_LEN {
      return Err(UserError::InvalidParam("users: bad username length"));
    }
    if self.find_by_name(username).is_some() {
      return Err(UserError::Exists("users: username taken"));
    }

    let uid = if uid == 0 && !self.users.is_empty() {
      self.next_available_uid()?
    } else {
      if self.find_by_uid(uid).is_some() {
        return Err(UserError::Exists("users: uid taken"));
      }
      uid
    };

    let gid = if gid == 0 && uid != ROOT_UID { DEFAULT_GID } else { gid };

    if self.users.len() >= MAX_USERS {
      return Err(UserError::TableFull("users: table full"));
    }

    self.users.push(User {
      uid,
      gid,
      username: username.to_owned(),
      password_hash: hash_password(password),
      created_time: unixtime(),
      is_active: true,
    });

    Ok(uid)
  }

  fn next_available_uid(&self) -> Result<u32, UserError> {
    let mut uid = DEFAULT_UID;
    while uid < ANONYMOUS_UID {
      if self.find_by_uid(uid).is_none() {
        return Ok(uid);
      }
      uid += 1;
    }
    Err(UserError::TableFull("users: uid space exhausted"))
  }

  pub fn find_by_name(&self, username: &str) -> Option<&User> {
    self
      .users
      .iter()
      .find(|user| user.is_active && user.username == username)
  }

  pub fn find_by_uid(&self, uid: u32) -> Option<&User> {
    self.users.iter().find(|user| user.is_active && user.uid == uid)
  }

  /// Verify credentials; the caller installs the returned uid as the
  /// session's current user.
  pub fn login(&self, username: &str, password: &str) -> Result<u32, UserError> {
    let user = self
      .find_by_name(username)
      .ok_or(UserError::NotFound("users: no such user"))?;

    if user.password_hash != hash_password(password) {
      return Err(UserError::WrongPassword("users: wrong password"));
    }

    Ok(user.uid)
  }

  pub fn users(&self) -> impl Iterator<Item = &User> {
    self.users.iter().filter(|user| user.is_active)
  }

  pub fn len(&self) -> usize {
    self.users.iter().filter(|user| user.is_active).count()
  }
}

pub fn is_root(uid: u32) -> bool {
  uid == ROOT_UID
}

/// Ownership rule for chmod-style operations.
pub fn require_owner_or_root(uid: u32, owner_uid: u32) -> Result<(), UserError> {
  if is_root(uid) || uid == owner_uid {
    Ok(())
  } else {
    Err(UserError::PermissionDenied("users: owner or superuser only"))
  }
}

/// Ownership rule for chown-style operations.
pub fn require_root(uid: u32) -> Result<(), UserError> {
  if is_root(uid) {
    Ok(())
  } else {
    Err(UserError::PermissionDenied("users: superuser only"))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perm {
  Read,
  Write,
  Exec,
}

/// Owner/group/other evaluation against one inode. Pure: absence of
/// permission is `false`, never an error - callers turn it into
/// PermissionDenied at the filesystem layer. The superuser bypasses
/// every check.
pub fn check_permission(uid: u32, gid: u32, inode: &Inode, perm: Perm) -> bool {
  if is_root(uid) {
    return true;
  }

  let bit: u16 = match perm {
    Perm::Read => 0o4,
    Perm::Write => 0o2,
    Perm::Exec => 0o1,
  };

  let triple = if uid == inode.owner_uid {
    inode.permissions.owner()
  } else if gid == inode.owner_gid {
    inode.permissions.group()
  } else {
    inode.permissions.other()
  };

  triple & bit != 0
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::runix::inode::{FileMode, FileType};

  fn inode_with_mode(mode: u16, uid: u32, gid: u32) -> Inode {
    Inode::new(2, FileType::Regular, FileMode::new(mode), uid, gid)
  }

  #[test]
  fn default_accounts_exist() {
    let table = UserTable::new();
    assert_eq!(table.len(), 2);
    assert_eq!(table.find_by_name("root").unwrap().uid, ROOT_UID);
    assert_eq!(table.find_by_name("anonymous").unwrap().uid, ANONYMOUS_UID);
  }

  #[test]
  fn hashing_is_stable_and_empty_safe() {
    assert_eq!(hash_password("root123"), hash_password("root123"));
    assert_ne!(hash_password("root123"), hash_password("root124"));
    assert_eq!(hash_password(""), "");
    // sha256 hex digests are 64 chars
    assert_eq!(hash_password("x").len(), 64);
  }

  #[test]
  fn login_checks_credentials() {
    let table = UserTable::new();
    assert_eq!(table.login("root", "root123"), Ok(ROOT_UID));
    assert_eq!(
      table.login("root", "wrong"),
      Err(UserError::WrongPassword("users: wrong password"))
    );
    assert_eq!(
      table.login("ghost", "pw"),
      Err(UserError::NotFound("users: no such user"))
    );
    assert_eq!(table.login("anonymous", ""), Ok(ANONYMOUS_UID));
  }

  #[test]
  fn uid_auto_assignment() {
    let mut table = UserTable::new();
    assert_eq!(table.create_user("alice", "pw", 0, 0), Ok(DEFAULT_UID));
    assert_eq!(table.create_user("bob", "pw", 0, 0), Ok(DEFAULT_UID + 1));
    assert_eq!(table.find_by_name("alice").unwrap().gid, DEFAULT_GID);
  }

  #[test]
  fn duplicates_are_rejected() {
    let mut table = UserTable::new();
    table.create_user("alice", "pw", 2000, 2000).unwrap();

    assert!(matches!(
      table.create_user("alice", "pw", 2001, 2001),
      Err(UserError::Exists(_))
    ));
    assert!(matches!(
      table.create_user("alice2", "pw", 2000, 2000),
      Err(UserError::Exists(_))
    ));
  }

  #[test]
  fn table_capacity_is_bounded() {
    let mut table = UserTable::new();
    for i in 0..(MAX_USERS - 2) {
      table.create_user(&format!("user{i}"), "pw", 0, 0).unwrap();
    }
    assert!(matches!(
      table.create_user("overflow", "pw", 0, 0),
      Err(UserError::TableFull(_))
    ));
  }

  #[test]
  fn owner_triple_is_selected() {
    let inode = inode_with_mode(0o640, 1000, 100);

    // owner: rw-
    assert!(check_permission(1000, 100, &inode, Perm::Read));
    assert!(check_permission(1000, 100, &inode, Perm::Write));
    assert!(!check_permission(1000, 100, &inode, Perm::Exec));

    // group member: r--
    assert!(check_permission(1001, 100, &inode, Perm::Read));
    assert!(!check_permission(1001, 100, &inode, Perm::Write));

    // other: ---
    assert!(!check_permission(1001, 101, &inode, Perm::Read));
    assert!(!check_permission(1001, 101, &inode, Perm::Write));
  }

  #[test]
  fn owner_match_wins_over_group_bits() {
    // owner class denies read even though the group class allows it
    let inode = inode_with_mode(0o040, 1000, 100);
    assert!(!check_permission(1000, 100, &inode, Perm::Read));
  }

  #[test]
  fn ownership_guards() {
    assert!(require_owner_or_root(ROOT_UID, 1000).is_ok());
    assert!(require_owner_or_root(1000, 1000).is_ok());
    assert!(matches!(
      require_owner_or_root(1001, 1000),
      Err(UserError::PermissionDenied(_))
    ));

    assert!(require_root(ROOT_UID).is_ok());
    assert!(matches!(require_root(1000), Err(UserError::PermissionDenied(_))));
  }

  #[test]
  fn superuser_bypasses_everything() {
    let inode = inode_with_mode(0o000, 1000, 1000);
    assert!(check_permission(ROOT_UID, ROOT_GID, &inode, Perm::Read));
    assert!(check_permission(ROOT_UID, ROOT_GID, &inode, Perm::Write));
    assert!(check_permission(ROOT_UID, ROOT_GID, &inode, Perm::Exec));
  }
}

// vim:ts=2 sw=2
