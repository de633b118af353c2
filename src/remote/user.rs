//! Local account lookup for the default SSH user.

use std::ffi::CStr;
use std::path::{Path, PathBuf};

use crate::remote::types::DescriptorError;

/// Name of the local account used when the URI carries no user.
///
/// A rootless uid override wins over the current user.
pub(crate) fn local_username(rootless_uid: Option<&str>) -> Result<String, DescriptorError> {
    match rootless_uid {
        Some(uid) => {
            let parsed: libc::uid_t = uid
                .parse()
                .map_err(|_| DescriptorError::UnknownUid(uid.to_string()))?;
            username_for_uid(parsed).ok_or_else(|| DescriptorError::UnknownUid(uid.to_string()))
        }
        None => Ok(whoami::username()),
    }
}

/// Initial `getpwuid_r` buffer; grown on `ERANGE`.
const PASSWD_BUF_LEN: usize = 4096;
/// Larger passwd entries are treated as unknown.
const PASSWD_BUF_MAX: usize = 1 << 20;

fn username_for_uid(uid: libc::uid_t) -> Option<String> {
    username_for_uid_with(uid, PASSWD_BUF_LEN)
}

fn username_for_uid_with(uid: libc::uid_t, initial_len: usize) -> Option<String> {
    let mut buf = vec![0 as libc::c_char; initial_len.max(1)];
    loop {
        // SAFETY: passwd is a plain C struct; all-zero is a valid value that
        // getpwuid_r overwrites.
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();

        // SAFETY: every pointer refers to a live local, and `buf.len()` is the
        // exact capacity handed to getpwuid_r.
        let rc = unsafe {
            libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result)
        };
        if rc == libc::ERANGE && buf.len() < PASSWD_BUF_MAX {
            let grown = buf.len() * 2;
            buf.resize(grown, 0);
            continue;
        }
        if rc != 0 || result.is_null() || pwd.pw_name.is_null() {
            return None;
        }

        // SAFETY: getpwuid_r succeeded, so pw_name points to a NUL terminated
        // string inside `buf`, which is still alive.
        let name = unsafe { CStr::from_ptr(pwd.pw_name) };
        break Some(name.to_string_lossy().into_owned());
    }
}

/// Expand a leading `~` to the home directory.
///
/// Only `~` alone and `~/...` are expanded; `something/~/x` and `~user` are
/// returned unchanged.
pub(crate) fn expand_home(path: &str) -> Result<PathBuf, DescriptorError> {
    if !(path == "~" || path.starts_with("~/")) {
        return Ok(PathBuf::from(path));
    }

    let home = dirs::home_dir().ok_or(DescriptorError::NoHomeDir)?;
    Ok(join_home(&home, path))
}

fn join_home(home: &Path, path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => home.to_path_buf(),
    }
}
