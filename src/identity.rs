use alloc::string::{String, ToString as _};

use hashbrown::HashMap;
use log::trace;

/// Name-to-id lookups against a user and group database.
///
/// A miss is the normal signal for "fall back to the numeric id stored in the
/// header", not an error.
pub trait IdentityResolver {
  fn lookup_user_by_name(&self, name: &str) -> Option<u32>;
  fn lookup_group_by_name(&self, name: &str) -> Option<u32>;
}

impl<R: IdentityResolver + ?Sized> IdentityResolver for &R {
  fn lookup_user_by_name(&self, name: &str) -> Option<u32> {
    (**self).lookup_user_by_name(name)
  }

  fn lookup_group_by_name(&self, name: &str) -> Option<u32> {
    (**self).lookup_group_by_name(name)
  }
}

/// Resolves nothing, so the numeric header ids are always used.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumericIdentityResolver;

impl IdentityResolver for NumericIdentityResolver {
  fn lookup_user_by_name(&self, _name: &str) -> Option<u32> {
    None
  }

  fn lookup_group_by_name(&self, _name: &str) -> Option<u32> {
    None
  }
}

/// In-memory user and group tables.
///
/// Can be filled by hand or from the text of `passwd(5)` / `group(5)` databases.
#[derive(Debug, Default, Clone)]
pub struct TableIdentityResolver {
  users: HashMap<String, u32>,
  groups: HashMap<String, u32>,
}

impl TableIdentityResolver {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn with_user(mut self, name: &str, uid: u32) -> Self {
    self.insert_user(name, uid);
    self
  }

  #[must_use]
  pub fn with_group(mut self, name: &str, gid: u32) -> Self {
    self.insert_group(name, gid);
    self
  }

  /// Keeps the first id registered for a name, like `getpwnam` does for duplicate entries.
  pub fn insert_user(&mut self, name: &str, uid: u32) {
    self.users.entry(name.to_string()).or_insert(uid);
  }

  pub fn insert_group(&mut self, name: &str, gid: u32) {
    self.groups.entry(name.to_string()).or_insert(gid);
  }

  /// Builds the tables from `passwd` and `group` database text.
  #[must_use]
  pub fn from_databases(passwd: &str, group: &str) -> Self {
    let mut resolver = Self::new();
    resolver.load_passwd(passwd);
    resolver.load_group(group);
    resolver
  }

  /// Adds the entries of a `name:password:uid:...` formatted database.
  pub fn load_passwd(&mut self, passwd: &str) {
    for (name, uid) in database_entries(passwd) {
      self.insert_user(name, uid);
    }
  }

  /// Adds the entries of a `name:password:gid:members` formatted database.
  pub fn load_group(&mut self, group: &str) {
    for (name, gid) in database_entries(group) {
      self.insert_group(name, gid);
    }
  }

  #[must_use]
  pub fn user_count(&self) -> usize {
    self.users.len()
  }

  #[must_use]
  pub fn group_count(&self) -> usize {
    self.groups.len()
  }
}

impl IdentityResolver for TableIdentityResolver {
  fn lookup_user_by_name(&self, name: &str) -> Option<u32> {
    self.users.get(name).copied()
  }

  fn lookup_group_by_name(&self, name: &str) -> Option<u32> {
    self.groups.get(name).copied()
  }
}

/// Yields `(name, id)` for every well-formed line; the id is the third field.
fn database_entries(database: &str) -> impl Iterator<Item = (&str, u32)> {
  database.lines().filter_map(|line| {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
      return None;
    }
    let mut fields = line.split(':');
    let name = fields.next().filter(|name| !name.is_empty());
    let id = fields.nth(1).and_then(|id| id.parse::<u32>().ok());
    match (name, id) {
      (Some(name), Some(id)) => Some((name, id)),
      _ => {
        trace!("Skipping malformed identity database line: {line}");
        None
      },
    }
  })
}

#[cfg(feature = "std")]
pub use system::*;

#[cfg(feature = "std")]
mod system {
  use alloc::string::String;
  use std::{
    io,
    path::{Path, PathBuf},
  };

  use log::debug;
  use thiserror::Error;

  use super::TableIdentityResolver;

  pub const SYSTEM_PASSWD_PATH: &str = "/etc/passwd";
  pub const SYSTEM_GROUP_PATH: &str = "/etc/group";

  #[derive(Error, Debug)]
  pub enum IdentityDatabaseError {
    #[error("Failed to read identity database {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
  }

  fn read_database(path: &Path) -> Result<String, IdentityDatabaseError> {
    std::fs::read_to_string(path).map_err(|source| IdentityDatabaseError::Read {
      path: path.to_path_buf(),
      source,
    })
  }

  impl TableIdentityResolver {
    /// Snapshots the file-backed system databases.
    ///
    /// Entries served only by other name services (LDAP, NIS) are not seen.
    pub fn load_system() -> Result<Self, IdentityDatabaseError> {
      Self::load_from_paths(
        Path::new(SYSTEM_PASSWD_PATH),
        Path::new(SYSTEM_GROUP_PATH),
      )
    }

    pub fn load_from_paths(passwd: &Path, group: &Path) -> Result<Self, IdentityDatabaseError> {
      let resolver = Self::from_databases(&read_database(passwd)?, &read_database(group)?);
      debug!(
        "Loaded {} users from {} and {} groups from {}",
        resolver.user_count(),
        passwd.display(),
        resolver.group_count(),
        group.display()
      );
      Ok(resolver)
    }
  }

}
