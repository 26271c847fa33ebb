//! Output of mapped fragments.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::{ConvertError, Result};

/// Join fragments in order.
pub fn concat<S: AsRef<str>>(fragments: &[S]) -> String {
    let len = fragments.iter().map(|f| f.as_ref().len()).sum();
    let mut out = String::with_capacity(len);
    for fragment in fragments {
        out.push_str(fragment.as_ref());
    }
    out
}

/// Write fragments to `writer`, returning the number of bytes written.
pub fn write_to<W: Write, S: AsRef<str>>(writer: &mut W, fragments: &[S]) -> io::Result<usize> {
    let mut written = 0;
    for fragment in fragments {
        let bytes = fragment.as_ref().as_bytes();
        writer.write_all(bytes)?;
        written += bytes.len();
    }
    writer.flush()?;
    Ok(written)
}

/// Create (or truncate) `path` and write the fragments to it.
pub fn write_org<S: AsRef<str>>(path: &Path, fragments: &[S]) -> Result<usize> {
    let file = File::create(path).map_err(|source| ConvertError::io(path, source))?;
    let mut writer = BufWriter::new(file);
    let written =
        write_to(&mut writer, fragments).map_err(|source| ConvertError::io(path, source))?;
    tracing::debug!("Wrote {} bytes to {}", written, path.display());
    Ok(written)
}
