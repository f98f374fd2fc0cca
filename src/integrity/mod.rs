use std::fs;
use std::io::{ErrorKind, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

const CHUNK_SIZE: usize = 8192;

/// SHA-256 of a file as lowercase hex, streamed in fixed-size chunks.
///
/// A missing file yields `default` unchanged so callers can pass the last
/// known digest and compare against it. Other I/O failures are reported.
pub fn digest(path: &Path, default: &str) -> Result<String, String> {
    let mut file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(default.to_owned()),
        Err(err) => return Err(format!("checksum open error: {err}")),
    };
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let read = file
            .read(&mut buf)
            .map_err(|e| format!("checksum read error: {e}"))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
