//! Source opening, include path expansion, and directory security checks
//!
//! Opening is behind a trait so tests can drive the include machinery
//! without touching the real filesystem. The directory checks mirror what a
//! privilege-granting policy file demands: expected ownership and no group
//! or world write bits.

use crate::config::compile_time::inclusion::{MAX_DIR_ENTRIES, MAX_PATH_LENGTH};
use crate::config::InclusionPreferences;
use crate::tokens::FatalError;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Why a directory failed its security check
#[derive(Debug, thiserror::Error)]
pub enum DirCheckError {
    #[error("unable to stat {path}: {message}")]
    Stat { path: String, message: String },

    #[error("{path} is not a directory")]
    NotADirectory { path: String },

    #[error("{path} is not owned by uid {expected}")]
    BadOwner { path: String, expected: u32 },

    #[error("{path} is not owned by gid {expected}")]
    BadGroup { path: String, expected: u32 },

    #[error("{path} is group or world writable")]
    Writable { path: String },
}

/// Directory listing failures
#[derive(Debug, thiserror::Error)]
pub enum ListDirError {
    #[error("unable to read directory {path}: {message}")]
    Io { path: String, message: String },

    #[error("too many files in {path}")]
    TooManyEntries { path: String },
}

/// Opens sources and inspects include directories
pub trait SourceOpener {
    fn open(&self, path: &Path) -> io::Result<Box<dyn BufRead>>;

    /// Validate an include directory's ownership and mode
    fn check_dir(
        &self,
        path: &Path,
        prefs: &InclusionPreferences,
    ) -> Result<(), DirCheckError>;

    /// List includable files in a directory. Entries whose name contains a
    /// dot or ends in `~` are editor artifacts and are never returned.
    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, ListDirError>;
}

/// Real filesystem opener
#[derive(Debug, Default)]
pub struct FsSourceOpener;

impl SourceOpener for FsSourceOpener {
    fn open(&self, path: &Path) -> io::Result<Box<dyn BufRead>> {
        let file = File::open(path)?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn check_dir(
        &self,
        path: &Path,
        prefs: &InclusionPreferences,
    ) -> Result<(), DirCheckError> {
        let meta = std::fs::metadata(path).map_err(|e| DirCheckError::Stat {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        if !meta.is_dir() {
            return Err(DirCheckError::NotADirectory {
                path: path.display().to_string(),
            });
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;

            if let Some(uid) = prefs.owner_uid {
                if meta.uid() != uid {
                    return Err(DirCheckError::BadOwner {
                        path: path.display().to_string(),
                        expected: uid,
                    });
                }
            }
            if let Some(gid) = prefs.owner_gid {
                if meta.gid() != gid {
                    return Err(DirCheckError::BadGroup {
                        path: path.display().to_string(),
                        expected: gid,
                    });
                }
            }
            if meta.mode() & 0o022 != 0 {
                return Err(DirCheckError::Writable {
                    path: path.display().to_string(),
                });
            }
        }

        #[cfg(not(unix))]
        let _ = prefs;

        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, ListDirError> {
        let entries = std::fs::read_dir(path).map_err(|e| ListDirError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ListDirError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.contains('.') || name.ends_with('~') {
                continue;
            }

            // Only regular files; subdirectories and special files are not
            // policy sources
            match entry.file_type() {
                Ok(t) if t.is_file() => {}
                _ => continue,
            }

            if files.len() >= MAX_DIR_ENTRIES {
                return Err(ListDirError::TooManyEntries {
                    path: path.display().to_string(),
                });
            }
            files.push(entry.path());
        }

        Ok(files)
    }
}

/// Expand an include path: substitute `%h` with the short hostname and
/// resolve relative paths against the including file's directory.
pub fn expand_include_path(
    raw: &str,
    including_file: &Path,
    prefs: &InclusionPreferences,
) -> Result<PathBuf, FatalError> {
    let mut expanded = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' && chars.peek() == Some(&'h') {
            if let Some(host) = prefs.short_hostname() {
                chars.next();
                expanded.push_str(host);
                continue;
            }
        }
        expanded.push(c);
    }

    let path = PathBuf::from(&expanded);
    let resolved = if path.is_absolute() {
        path
    } else {
        match including_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(path),
            _ => path,
        }
    };

    if resolved.as_os_str().len() > MAX_PATH_LENGTH {
        return Err(FatalError::PathTooLong {
            path: expanded,
        });
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_prefs() -> InclusionPreferences {
        InclusionPreferences {
            owner_uid: None,
            owner_gid: None,
            verbose_warnings: false,
            hostname: Some("web01.example.com".to_string()),
            keep_open: false,
        }
    }

    #[test]
    fn test_expand_hostname_escape() {
        let prefs = test_prefs();
        let path = expand_include_path(
            "/etc/sudoers.%h",
            Path::new("/etc/sudoers"),
            &prefs,
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/etc/sudoers.web01"));
    }

    #[test]
    fn test_hostname_escape_without_hostname() {
        let mut prefs = test_prefs();
        prefs.hostname = None;
        let path = expand_include_path(
            "/etc/sudoers.%h",
            Path::new("/etc/sudoers"),
            &prefs,
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/etc/sudoers.%h"));
    }

    #[test]
    fn test_relative_path_resolves_against_parent() {
        let prefs = test_prefs();
        let path =
            expand_include_path("extra", Path::new("/etc/sudoers"), &prefs).unwrap();
        assert_eq!(path, PathBuf::from("/etc/extra"));
    }

    #[test]
    fn test_path_length_limit() {
        let prefs = test_prefs();
        let long = format!("/{}", "a".repeat(MAX_PATH_LENGTH));
        let err = expand_include_path(&long, Path::new("/etc/sudoers"), &prefs);
        assert!(matches!(err, Err(FatalError::PathTooLong { .. })));
    }

    #[test]
    fn test_list_dir_filters_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["aliases", "web", "broken.bak", "editor~"] {
            let mut f = File::create(dir.path().join(name)).unwrap();
            writeln!(f, "# test").unwrap();
        }

        let opener = FsSourceOpener;
        let mut names: Vec<String> = opener
            .list_dir(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();

        assert_eq!(names, vec!["aliases", "web"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_check_dir_rejects_group_writable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let mut perms = std::fs::metadata(dir.path()).unwrap().permissions();
        perms.set_mode(0o770);
        std::fs::set_permissions(dir.path(), perms).unwrap();

        let opener = FsSourceOpener;
        let err = opener.check_dir(dir.path(), &test_prefs());
        assert!(matches!(err, Err(DirCheckError::Writable { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_check_dir_accepts_safe_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let mut perms = std::fs::metadata(dir.path()).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(dir.path(), perms).unwrap();

        let opener = FsSourceOpener;
        assert!(opener.check_dir(dir.path(), &test_prefs()).is_ok());
    }
}
