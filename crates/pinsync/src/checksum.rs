use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Hex SHA-256 digest over the concatenated raw contents of `paths`, in the
/// order given, with no separators. Neither path names nor file lengths are
/// folded into the digest, so the result depends only on the byte stream the
/// files produce. Each file is streamed exactly once; an unreadable file
/// fails the whole call with the offending path.
pub fn fingerprint<P: AsRef<Path>>(paths: &[P]) -> Result<String> {
    let mut hasher = Sha256::new();
    for p in paths {
        let path = p.as_ref();
        let mut file = File::open(path).map_err(|e| Error::file_access(path, e))?;
        io::copy(&mut file, &mut hasher).map_err(|e| Error::file_access(path, e))?;
    }
    Ok(hex::encode(hasher.finalize()))
}
