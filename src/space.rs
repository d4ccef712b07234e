//! Free-space probe for the pre-run disk report.

use std::io;
use std::path::Path;

/// Bytes available to unprivileged callers on the filesystem holding
/// `path`.
#[cfg(target_family = "unix")]
pub fn get_free_space(path: &Path) -> io::Result<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let bytes = path.as_os_str().as_bytes();
    let lookup = if bytes.is_empty() { Path::new(".") } else { path };
    let c_path = CString::new(lookup.as_os_str().as_bytes()).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Invalid path for CString: {}", e),
        )
    })?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    if unsafe { libc::statvfs(c_path.as_ptr(), &mut stat as *mut _) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(stat.f_bavail as u64 * stat.f_frsize as u64)
}

#[cfg(not(target_family = "unix"))]
pub fn get_free_space(_path: &Path) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "free-space probe not implemented on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_family = "unix")]
    #[test]
    fn reports_nonzero_for_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let free = get_free_space(dir.path()).unwrap();
        assert!(free > 0);
    }
}
