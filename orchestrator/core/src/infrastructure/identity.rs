// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Target identity of the gateway process
//!
//! Resolved from the passwd/group databases. Permission checks evaluate the
//! POSIX mode bits the kernel would apply to this identity, so the validator
//! can judge access while the orchestrator still runs as root.

use nix::unistd::{self, Gid, Uid, User};
use std::ffi::CString;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;

use crate::domain::outcome::EnvironmentError;

const READ: u32 = 0o4;
const WRITE: u32 = 0o2;
const EXECUTE: u32 = 0o1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetIdentity {
    pub user: String,
    pub uid: u32,
    pub gid: u32,
    /// Supplementary groups, primary group included
    pub groups: Vec<u32>,
}

impl TargetIdentity {
    /// Look up an account by name
    pub fn lookup(user: &str) -> Result<Self, EnvironmentError> {
        let lookup_error = |reason: String| EnvironmentError::IdentityLookup {
            user: user.to_string(),
            reason,
        };

        let account = User::from_name(user)
            .map_err(|e| lookup_error(e.to_string()))?
            .ok_or_else(|| lookup_error("no such user".to_string()))?;
        let name = CString::new(user).map_err(|e| lookup_error(e.to_string()))?;
        let groups = unistd::getgrouplist(&name, account.gid).map_err(|e| lookup_error(e.to_string()))?;

        Ok(Self::from_parts(user.to_string(), account.uid, account.gid, groups))
    }

    /// The identity this process currently runs as.
    ///
    /// Falls back to the numeric uid as the name when the uid has no passwd
    /// entry, which is common for containers started with `--user <uid>`.
    pub fn current() -> Result<Self, EnvironmentError> {
        let uid = unistd::geteuid();
        let gid = unistd::getegid();
        let lookup_error = |reason: String| EnvironmentError::IdentityLookup {
            user: uid.to_string(),
            reason,
        };

        let name = User::from_uid(uid)
            .map_err(|e| lookup_error(e.to_string()))?
            .map(|account| account.name)
            .unwrap_or_else(|| uid.to_string());
        let groups = unistd::getgroups().map_err(|e| lookup_error(e.to_string()))?;

        Ok(Self::from_parts(name, uid, gid, groups))
    }

    fn from_parts(user: String, uid: Uid, gid: Gid, groups: Vec<Gid>) -> Self {
        let mut groups: Vec<u32> = groups.into_iter().map(Gid::as_raw).collect();
        groups.push(gid.as_raw());
        groups.sort_unstable();
        groups.dedup();
        Self {
            user,
            uid: uid.as_raw(),
            gid: gid.as_raw(),
            groups,
        }
    }

    pub fn is_root(&self) -> bool {
        self.uid == 0
    }

    pub fn owns(&self, metadata: &Metadata) -> bool {
        metadata.uid() == self.uid && metadata.gid() == self.gid
    }

    /// Whether this identity may create entries in a directory
    pub fn can_write_directory(&self, metadata: &Metadata) -> bool {
        self.permits(metadata, WRITE | EXECUTE)
    }

    pub fn can_read(&self, metadata: &Metadata) -> bool {
        self.permits(metadata, READ)
    }

    /// Only the first matching class (owner, group, other) is consulted,
    /// as the kernel does.
    fn permits(&self, metadata: &Metadata, wanted: u32) -> bool {
        if self.is_root() {
            return true;
        }
        let mode = metadata.mode();
        let granted = if metadata.uid() == self.uid {
            (mode >> 6) & 0o7
        } else if self.groups.contains(&metadata.gid()) {
            (mode >> 3) & 0o7
        } else {
            mode & 0o7
        };
        granted & wanted == wanted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, Permissions};
    use std::os::unix::fs::PermissionsExt;

    fn stranger() -> TargetIdentity {
        TargetIdentity {
            user: "nobody".to_string(),
            uid: 65534,
            gid: 65534,
            groups: vec![65534],
        }
    }

    #[test]
    fn test_current_identity_matches_process() {
        let identity = TargetIdentity::current().unwrap();
        assert_eq!(identity.uid, unistd::geteuid().as_raw());
        assert!(identity.groups.contains(&identity.gid));
        assert!(!identity.user.is_empty());
    }

    #[test]
    fn test_lookup_unknown_user_fails() {
        let result = TargetIdentity::lookup("openclaw-no-such-user-7f3a");
        assert!(matches!(result, Err(EnvironmentError::IdentityLookup { .. })));
    }

    #[test]
    fn test_owner_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let owner = TargetIdentity::current().unwrap();
        let metadata = fs::metadata(dir.path()).unwrap();
        assert!(owner.can_write_directory(&metadata));
        assert!(owner.can_read(&metadata));
    }

    #[test]
    fn test_other_class_decides_for_strangers() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("openclaw.json");
        fs::write(&file, "{}").unwrap();

        fs::set_permissions(&file, Permissions::from_mode(0o600)).unwrap();
        assert!(!stranger().can_read(&fs::metadata(&file).unwrap()));

        fs::set_permissions(&file, Permissions::from_mode(0o644)).unwrap();
        assert!(stranger().can_read(&fs::metadata(&file).unwrap()));

        fs::set_permissions(dir.path(), Permissions::from_mode(0o755)).unwrap();
        assert!(!stranger().can_write_directory(&fs::metadata(dir.path()).unwrap()));

        fs::set_permissions(dir.path(), Permissions::from_mode(0o777)).unwrap();
        assert!(stranger().can_write_directory(&fs::metadata(dir.path()).unwrap()));
    }

    #[test]
    fn test_root_passes_every_check() {
        let dir = tempfile::tempdir().unwrap();
        fs::set_permissions(dir.path(), Permissions::from_mode(0o000)).unwrap();
        let root = TargetIdentity {
            user: "root".to_string(),
            uid: 0,
            gid: 0,
            groups: vec![0],
        };
        let metadata = fs::metadata(dir.path()).unwrap();
        assert!(root.can_write_directory(&metadata));
        assert!(root.can_read(&metadata));
        fs::set_permissions(dir.path(), Permissions::from_mode(0o700)).unwrap();
    }
}
