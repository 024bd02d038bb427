use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// blake3 digest of a file's bytes, as lowercase hex.
///
/// Byte-identical screenshots share a digest; the report carries it so
/// exact copies can be told apart from near-duplicates.
pub fn content_hash(file_path: &Path) -> std::io::Result<String> {
    let file = File::open(file_path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}
