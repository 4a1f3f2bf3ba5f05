// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Privilege drop and process handoff
//!
//! Three states, each consumed by the next:
//!
//! ```text
//! ElevatedSetup ──drop_privileges()──▶ DroppedPrivileges ──Handoff::new()──▶ Handoff ──exec()
//! ```
//!
//! `DroppedPrivileges` has no public constructor, so a `Handoff` cannot be
//! built without going through the drop and its write-access re-check.

use nix::unistd::{self, AccessFlags, Gid, Uid};
use std::collections::BTreeMap;
use std::ffi::CString;
use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::{lchown, PermissionsExt};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::domain::bootstrap_config::{DataLayout, TargetCommand};
use crate::domain::outcome::EnvironmentError;
use crate::infrastructure::identity::TargetIdentity;

const OWNER_RWX: u32 = 0o700;

/// Setup phase, still running with the caller's privileges
#[derive(Debug)]
pub struct ElevatedSetup {
    identity: TargetIdentity,
    elevated: bool,
}

impl ElevatedSetup {
    /// Root may switch to any identity; a process already running as the
    /// target uid proceeds without ownership changes.
    pub fn begin(identity: TargetIdentity) -> Result<Self, EnvironmentError> {
        let current = unistd::geteuid().as_raw();
        let elevated = if current == 0 {
            true
        } else if current == identity.uid {
            info!(user = %identity.user, uid = current, "Already running as target identity, skipping ownership changes");
            false
        } else {
            return Err(EnvironmentError::NotPrivileged {
                current_uid: current,
                user: identity.user.clone(),
                target_uid: identity.uid,
            });
        };

        Ok(Self { identity, elevated })
    }

    pub fn identity(&self) -> &TargetIdentity {
        &self.identity
    }

    pub fn is_elevated(&self) -> bool {
        self.elevated
    }

    /// Create the data directories and hand everything under them to the target identity
    pub fn normalize(&self, layout: &DataLayout) -> Result<(), EnvironmentError> {
        let directories = layout.required_directories();
        for dir in &directories {
            fs::create_dir_all(dir).map_err(|source| EnvironmentError::Filesystem {
                path: dir.clone(),
                source,
            })?;
        }

        let mut roots = vec![layout.data_root.clone()];
        for dir in directories {
            if !roots.iter().any(|root| dir.starts_with(root)) {
                roots.push(dir);
            }
        }

        let mut changed = 0usize;
        for root in &roots {
            changed += self.normalize_tree(root)?;
        }
        info!(user = %self.identity.user, changed, "Normalized data directory ownership");
        Ok(())
    }

    fn normalize_tree(&self, root: &Path) -> Result<usize, EnvironmentError> {
        let mut changed = 0;
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                EnvironmentError::Filesystem {
                    path,
                    source: e.into_io_error().unwrap_or_else(|| io::Error::other("filesystem loop")),
                }
            })?;
            let metadata = entry.metadata().map_err(|e| EnvironmentError::Filesystem {
                path: entry.path().to_path_buf(),
                source: e.into_io_error().unwrap_or_else(|| io::Error::other("metadata unavailable")),
            })?;

            if self.elevated && !self.identity.owns(&metadata) {
                lchown(entry.path(), Some(self.identity.uid), Some(self.identity.gid)).map_err(|source| {
                    EnvironmentError::Ownership {
                        path: entry.path().to_path_buf(),
                        source,
                    }
                })?;
                changed += 1;
            }

            if metadata.is_dir() && metadata.permissions().mode() & OWNER_RWX != OWNER_RWX {
                let mode = metadata.permissions().mode() | OWNER_RWX;
                fs::set_permissions(entry.path(), Permissions::from_mode(mode)).map_err(|source| {
                    EnvironmentError::Filesystem {
                        path: entry.path().to_path_buf(),
                        source,
                    }
                })?;
            }
        }
        Ok(changed)
    }

    /// Give a freshly written file to the target identity
    pub fn adopt(&self, path: &Path) -> Result<(), EnvironmentError> {
        if !self.elevated {
            return Ok(());
        }
        lchown(path, Some(self.identity.uid), Some(self.identity.gid)).map_err(|source| {
            EnvironmentError::Ownership {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Switch to the target identity and confirm it can write every directory in `writable`
    pub fn drop_privileges(self, writable: &[PathBuf]) -> Result<DroppedPrivileges, EnvironmentError> {
        let identity = self.identity;
        let drop_error = |reason: String| EnvironmentError::PrivilegeDrop {
            user: identity.user.clone(),
            reason,
        };

        if self.elevated {
            let name = CString::new(identity.user.as_str()).map_err(|e| drop_error(e.to_string()))?;
            let gid = Gid::from_raw(identity.gid);
            let uid = Uid::from_raw(identity.uid);

            unistd::initgroups(&name, gid).map_err(|e| drop_error(format!("initgroups: {}", e)))?;
            unistd::setgid(gid).map_err(|e| drop_error(format!("setgid: {}", e)))?;
            unistd::setuid(uid).map_err(|e| drop_error(format!("setuid: {}", e)))?;

            if identity.uid != 0 && unistd::setuid(Uid::from_raw(0)).is_ok() {
                return Err(drop_error("root privileges could be regained".to_string()));
            }
            info!(user = %identity.user, uid = identity.uid, gid = identity.gid, "Dropped privileges");
        }

        for dir in writable {
            unistd::access(dir.as_path(), AccessFlags::W_OK | AccessFlags::X_OK).map_err(|e| {
                EnvironmentError::WriteAccess {
                    path: dir.clone(),
                    user: identity.user.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        debug!(directories = writable.len(), "Write access confirmed");

        Ok(DroppedPrivileges { identity })
    }
}

/// Proof that privileges were dropped and write access re-verified
#[derive(Debug)]
pub struct DroppedPrivileges {
    identity: TargetIdentity,
}

impl DroppedPrivileges {
    pub fn identity(&self) -> &TargetIdentity {
        &self.identity
    }
}

/// Everything needed to replace this process with the target
#[derive(Debug)]
pub struct Handoff {
    identity: TargetIdentity,
    command: TargetCommand,
    environment: BTreeMap<String, String>,
    working_dir: PathBuf,
}

impl Handoff {
    pub fn new(token: DroppedPrivileges, command: TargetCommand) -> Self {
        Self {
            identity: token.identity,
            command,
            environment: BTreeMap::new(),
            working_dir: PathBuf::from("/"),
        }
    }

    /// The complete environment of the target; nothing is inherited
    pub fn environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn identity(&self) -> &TargetIdentity {
        &self.identity
    }

    pub fn command(&self) -> &TargetCommand {
        &self.command
    }

    pub fn env_vars(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn current_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Replace the process image. Returns only if exec failed.
    pub fn exec(self) -> EnvironmentError {
        if self.command.program.is_empty() {
            return EnvironmentError::EmptyCommand;
        }

        info!(
            program = %self.command.program,
            user = %self.identity.user,
            cwd = ?self.working_dir,
            "Handing off to target process"
        );

        let source = Command::new(&self.command.program)
            .args(&self.command.args)
            .env_clear()
            .envs(&self.environment)
            .current_dir(&self.working_dir)
            .exec();

        EnvironmentError::Exec {
            program: self.command.program,
            source,
        }
    }
}

/// Final step of the sequence
pub trait ProcessLauncher {
    /// `Ok` means the target has taken over
    fn launch(&self, handoff: Handoff) -> Result<(), EnvironmentError>;
}

/// Replaces the current process via `execvp`
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecLauncher;

impl ProcessLauncher for ExecLauncher {
    fn launch(&self, handoff: Handoff) -> Result<(), EnvironmentError> {
        Err(handoff.exec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;

    #[test]
    fn test_begin_as_current_user_is_allowed() {
        let identity = TargetIdentity::current().unwrap();
        let setup = ElevatedSetup::begin(identity.clone()).unwrap();
        assert_eq!(setup.identity(), &identity);
        assert_eq!(setup.is_elevated(), identity.is_root());
    }

    #[test]
    fn test_begin_as_other_user_without_root_fails() {
        if unistd::geteuid().is_root() {
            return;
        }
        let other = TargetIdentity {
            user: "openclaw".to_string(),
            uid: unistd::geteuid().as_raw() + 1,
            gid: 1,
            groups: vec![1],
        };
        assert!(matches!(
            ElevatedSetup::begin(other),
            Err(EnvironmentError::NotPrivileged { .. })
        ));
    }

    #[test]
    fn test_normalize_creates_layout_with_owner_rwx() {
        let root = tempfile::tempdir().unwrap();
        let layout = DataLayout::under(root.path().join("data"));
        let identity = TargetIdentity::current().unwrap();
        let setup = ElevatedSetup::begin(identity.clone()).unwrap();

        fs::create_dir_all(&layout.logs).unwrap();
        fs::set_permissions(&layout.logs, Permissions::from_mode(0o500)).unwrap();

        setup.normalize(&layout).unwrap();

        for dir in layout.required_directories() {
            let metadata = fs::metadata(&dir).unwrap();
            assert!(metadata.is_dir(), "{:?}", dir);
            assert_eq!(metadata.mode() & OWNER_RWX, OWNER_RWX, "{:?}", dir);
            assert_eq!(metadata.uid(), identity.uid);
        }
    }

    #[test]
    fn test_normalize_does_not_follow_symlinks() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::set_permissions(outside.path(), Permissions::from_mode(0o500)).unwrap();

        let layout = DataLayout::under(root.path());
        fs::create_dir_all(&layout.workspace).unwrap();
        std::os::unix::fs::symlink(outside.path(), layout.workspace.join("link")).unwrap();

        let setup = ElevatedSetup::begin(TargetIdentity::current().unwrap()).unwrap();
        setup.normalize(&layout).unwrap();

        let mode = fs::metadata(outside.path()).unwrap().mode();
        assert_eq!(mode & OWNER_RWX, 0o500);
        fs::set_permissions(outside.path(), Permissions::from_mode(0o700)).unwrap();
    }

    #[test]
    fn test_drop_as_current_user_verifies_write_access() {
        let root = tempfile::tempdir().unwrap();
        let identity = TargetIdentity::current().unwrap();
        let setup = ElevatedSetup::begin(identity.clone()).unwrap();

        let token = setup.drop_privileges(&[root.path().to_path_buf()]).unwrap();
        assert_eq!(token.identity(), &identity);

        let handoff = Handoff::new(token, TargetCommand::gateway())
            .environment(BTreeMap::from([("HOME".to_string(), "/data/home".to_string())]))
            .working_dir(root.path());
        assert_eq!(handoff.command().program, "openclaw");
        assert_eq!(handoff.current_dir(), root.path());
        assert_eq!(handoff.env_vars().len(), 1);
    }

    #[test]
    fn test_drop_fails_when_directory_is_missing() {
        let root = tempfile::tempdir().unwrap();
        let setup = ElevatedSetup::begin(TargetIdentity::current().unwrap()).unwrap();
        let result = setup.drop_privileges(&[root.path().join("missing")]);
        assert!(matches!(result, Err(EnvironmentError::WriteAccess { .. })));
    }

    #[test]
    fn test_exec_of_unknown_program_returns_error() {
        let setup = ElevatedSetup::begin(TargetIdentity::current().unwrap()).unwrap();
        let token = setup.drop_privileges(&[]).unwrap();
        let command = TargetCommand {
            program: "/nonexistent/openclaw-gateway".to_string(),
            args: vec![],
        };
        // a failed exec still applies the working directory to this process
        let cwd = std::env::current_dir().unwrap();
        let error = Handoff::new(token, command).working_dir(cwd).exec();
        assert!(matches!(error, EnvironmentError::Exec { .. }));
    }
}
