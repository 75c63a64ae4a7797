//! Path guard: validate user-supplied paths before any filesystem access.
//!
//! Every path the compositor touches (input PDF, output image, batch
//! directories and the files found in them) goes through [`validate`] first.
//! Validation is pure: it reads filesystem metadata to resolve symlinks but
//! never creates, opens, or modifies anything. Existence checks and directory
//! creation are the caller's job once a [`ValidatedPath`] is in hand.
//!
//! Two independent checks are applied:
//!
//! 1. The *original* path must not contain a `..` component. This is checked
//!    before resolution, so `root/sub/../file.pdf` is rejected even though it
//!    would land inside `root`.
//! 2. When a confinement root is given, the *resolved* path must lie under the
//!    resolved root. Resolution follows symlinks, so a link inside the root
//!    that points elsewhere is caught here.
//!
//! Paths that do not exist yet (typically output files) are resolved through
//! their longest existing ancestor; the missing tail is appended verbatim.

use crate::error::QuizError;
use std::ffi::OsString;
use std::fmt;
use std::ops::Deref;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// An absolute, canonical path that passed [`validate`].
///
/// The guarantee holds at validation time only; the filesystem can change
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedPath(PathBuf);

impl ValidatedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl Deref for ValidatedPath {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for ValidatedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ValidatedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Validate `path`, optionally confining it to `root`.
///
/// # Errors
/// [`QuizError::PathSafety`] when the path is empty, contains a NUL byte,
/// contains a `..` component, or resolves outside `root`.
pub fn validate(path: impl AsRef<Path>, root: Option<&Path>) -> Result<ValidatedPath, QuizError> {
    let original = path.as_ref();
    check_well_formed(original)?;

    let resolved = resolve(original)?;

    if let Some(root) = root {
        check_well_formed(root)?;
        let resolved_root = resolve(root)?;
        if !resolved.starts_with(&resolved_root) {
            return Err(QuizError::path_safety(
                original,
                format!("resolves outside of '{}'", resolved_root.display()),
            ));
        }
    }

    debug!("Validated path {} → {}", original.display(), resolved.display());
    Ok(ValidatedPath(resolved))
}

/// Validate `path` and require it to be an existing directory.
pub fn validate_existing_dir(
    path: impl AsRef<Path>,
    root: Option<&Path>,
) -> Result<ValidatedPath, QuizError> {
    let validated = validate(path, root)?;
    if !validated.is_dir() {
        return Err(QuizError::invalid_input(
            validated.as_path(),
            "not an existing directory",
        ));
    }
    Ok(validated)
}

fn check_well_formed(path: &Path) -> Result<(), QuizError> {
    if path.as_os_str().is_empty() {
        return Err(QuizError::path_safety(path, "path is empty"));
    }
    if path.to_string_lossy().contains('\0') {
        return Err(QuizError::path_safety(path, "path contains a NUL byte"));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(QuizError::path_safety(
            path,
            "parent-directory ('..') components are not allowed",
        ));
    }
    Ok(())
}

/// Make `path` absolute and canonical, tolerating a missing tail.
fn resolve(path: &Path) -> Result<PathBuf, QuizError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| QuizError::Internal(format!("cannot read current directory: {e}")))?
            .join(path)
    };
    let absolute: PathBuf = absolute
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let mut existing = absolute.as_path();
    let mut missing: Vec<OsString> = Vec::new();
    loop {
        match std::fs::canonicalize(existing) {
            Ok(mut canonical) => {
                for part in missing.iter().rev() {
                    canonical.push(part);
                }
                return Ok(canonical);
            }
            Err(_) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                _ => {
                    return Err(QuizError::path_safety(
                        path,
                        "no ancestor of the path could be resolved",
                    ))
                }
            },
        }
    }
}
