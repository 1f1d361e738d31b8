//! Plain raster and text dumps of a frame.
//!
//! The PGM header layout is fixed and has to be available without the
//! `imaging` feature, so it is written directly instead of through `image`.

use crate::error::ArchiveError;
use crate::frame::Frame;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Binary greyscale PGM: `P5\n{width} {height} 255\n` then row-major bytes
pub fn encode_pgm(frame: &Frame) -> Vec<u8> {
    let header = format!("P5\n{} {} 255\n", frame.width(), frame.height());
    let mut bytes = Vec::with_capacity(header.len() + frame.pixels().len());
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(frame.pixels());
    bytes
}

/// One line per pixel row, every value followed by a comma
pub fn encode_csv(frame: &Frame) -> String {
    let mut text = String::with_capacity(frame.pixels().len() * 4);
    for row in frame.rows() {
        for value in row {
            text.push_str(&value.to_string());
            text.push(',');
        }
        text.push('\n');
    }
    text
}

pub fn write_pgm(path: &Path, frame: &Frame) -> Result<(), ArchiveError> {
    write_file(path, &encode_pgm(frame))
}

pub fn write_csv(path: &Path, frame: &Frame) -> Result<(), ArchiveError> {
    write_file(path, encode_csv(frame).as_bytes())
}

pub(crate) fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ArchiveError> {
    let write = || -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(bytes)?;
        out.flush()
    };
    write().map_err(|source| ArchiveError::Write {
        path: path.to_path_buf(),
        source,
    })
}
