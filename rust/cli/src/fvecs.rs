//! File formats.
//!
//! `.fvecs`: per vector a little-endian `i32` dimension followed by that many
//! little-endian `f32` components. Code files: encoded descriptors back to back.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::CliError;

fn open(path: &str) -> Result<File, CliError> {
    if !Path::new(path).exists() {
        return Err(CliError::FileNotFound(path.to_string()));
    }
    Ok(File::open(path)?)
}

/// Reads every vector of an `.fvecs` file. Returns the shared dimension and
/// the components of all vectors, contiguous.
pub fn read_fvecs(path: &str) -> Result<(usize, Vec<f32>), CliError> {
    let mut reader = BufReader::new(open(path)?);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    let mut dim = None;
    let mut data = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let header = bytes
            .get(offset..offset + 4)
            .ok_or_else(|| CliError::malformed(path, "truncated dimension"))?;
        let d = i32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let d = usize::try_from(d)
            .ok()
            .filter(|&d| d > 0)
            .ok_or_else(|| CliError::malformed(path, format!("invalid dimension {d}")))?;
        match dim {
            None => dim = Some(d),
            Some(expected) if expected != d => {
                return Err(CliError::DimensionMismatch { expected, found: d });
            }
            Some(_) => {}
        }
        offset += 4;
        let body = bytes
            .get(offset..offset + d * 4)
            .ok_or_else(|| CliError::malformed(path, "truncated vector"))?;
        data.extend(
            body.chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
        );
        offset += d * 4;
    }
    let dim = dim.ok_or_else(|| CliError::malformed(path, "no vectors"))?;
    Ok((dim, data))
}

pub fn write_fvecs(path: &str, dim: usize, data: &[f32]) -> Result<(), CliError> {
    let mut writer = BufWriter::new(File::create(path)?);
    let header = (dim as i32).to_le_bytes();
    for vector in data.chunks_exact(dim) {
        writer.write_all(&header)?;
        for x in vector {
            writer.write_all(&x.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Reads a code file holding whole descriptors of `encoded_size` bytes.
pub fn read_codes(path: &str, encoded_size: usize) -> Result<Vec<u8>, CliError> {
    let mut bytes = Vec::new();
    BufReader::new(open(path)?).read_to_end(&mut bytes)?;
    if bytes.len() % encoded_size != 0 {
        return Err(CliError::malformed(
            path,
            format!(
                "{} bytes is not a whole number of {encoded_size}-byte descriptors",
                bytes.len()
            ),
        ));
    }
    Ok(bytes)
}

pub fn write_bytes(path: &str, bytes: &[u8]) -> Result<(), CliError> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}
