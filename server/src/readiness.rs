use std::fs;
use std::io;
use std::path::Path;

/// Proves that `root` is a directory we can create files in. The probe file
/// is removed again before returning.
pub fn probe_writable(root: &Path) -> io::Result<()> {
    let meta = fs::metadata(root)?;
    if !meta.is_dir() {
        return Err(io::Error::other("not a directory"));
    }
    let probe = tempfile::Builder::new()
        .prefix(".drywall-probe-")
        .tempfile_in(root)?;
    probe.close()
}
