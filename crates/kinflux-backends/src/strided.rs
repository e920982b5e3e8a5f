//! Rectangular strided-copy primitive.
//!
//! A multi-field batch array is stored host-side as `[field][condition]` or
//! `[condition][field]`, but a chunk transfer moves a sub-range of conditions
//! across every field. A linear copy cannot express that in one pass, so
//! transfers are described as a rectangle: a region of `bytes_per_row` x
//! `rows` x `slices`, with independent row/slice pitches on each side.
//!
//! Source and destination must be distinct buffers; behavior is undefined for
//! overlapping regions (the slice-based API makes an overlap unrepresentable
//! in safe code, which is the accepted way of honoring that limitation).

use crate::error::{BackendError, Result};

/// Shape of a rectangular copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyRegion {
    /// Contiguous bytes copied per row.
    pub bytes_per_row: usize,
    /// Rows per slice.
    pub rows: usize,
    /// Number of slices.
    pub slices: usize,
}

impl CopyRegion {
    /// A fully contiguous region: one row, one slice.
    pub const fn contiguous(bytes: usize) -> Self {
        Self {
            bytes_per_row: bytes,
            rows: 1,
            slices: 1,
        }
    }

    /// Total bytes moved by the region.
    pub const fn total_bytes(&self) -> usize {
        self.bytes_per_row * self.rows * self.slices
    }
}

/// Starting corner of a rectangle, in (bytes, rows, slices).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RectOrigin {
    pub byte: usize,
    pub row: usize,
    pub slice: usize,
}

impl RectOrigin {
    pub const fn at_byte(byte: usize) -> Self {
        Self {
            byte,
            row: 0,
            slice: 0,
        }
    }
}

/// Row and slice pitches of a flat buffer interpreted as a 3D array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RectPitch {
    /// Bytes between the starts of consecutive rows.
    pub row: usize,
    /// Bytes between the starts of consecutive slices.
    pub slice: usize,
}

impl RectPitch {
    /// Pitches for a buffer that is exactly as tight as the region itself.
    pub const fn packed(region: &CopyRegion) -> Self {
        Self {
            row: region.bytes_per_row,
            slice: region.bytes_per_row * region.rows,
        }
    }
}

/// Byte offset of row 0 of a rectangle: `byte + row_pitch*row + slice_pitch*slice`.
pub const fn rect_offset(origin: RectOrigin, pitch: RectPitch) -> usize {
    origin.byte + pitch.row * origin.row + pitch.slice * origin.slice
}

/// Copy a rectangular region between two differently-strided flat buffers.
///
/// Iterates `rows x slices`, each row moved as one contiguous copy of
/// `bytes_per_row` bytes. Both ends are bounds-checked before any byte moves
/// so a failed call leaves `dst` untouched.
pub fn copy_rect(
    src: &[u8],
    src_origin: RectOrigin,
    src_pitch: RectPitch,
    dst: &mut [u8],
    dst_origin: RectOrigin,
    dst_pitch: RectPitch,
    region: CopyRegion,
) -> Result<()> {
    if region.total_bytes() == 0 {
        return Ok(());
    }

    let src_base = rect_offset(src_origin, src_pitch);
    let dst_base = rect_offset(dst_origin, dst_pitch);

    // last byte touched on either side
    let src_end = src_base
        + src_pitch.slice * (region.slices - 1)
        + src_pitch.row * (region.rows - 1)
        + region.bytes_per_row;
    let dst_end = dst_base
        + dst_pitch.slice * (region.slices - 1)
        + dst_pitch.row * (region.rows - 1)
        + region.bytes_per_row;

    if src_end > src.len() {
        return Err(BackendError::TransferFailure(format!(
            "source region ends at byte {} but buffer holds {}",
            src_end,
            src.len()
        )));
    }
    if dst_end > dst.len() {
        return Err(BackendError::TransferFailure(format!(
            "destination region ends at byte {} but buffer holds {}",
            dst_end,
            dst.len()
        )));
    }

    let n = region.bytes_per_row;
    for slice in 0..region.slices {
        for row in 0..region.rows {
            let s = src_base + src_pitch.slice * slice + src_pitch.row * row;
            let d = dst_base + dst_pitch.slice * slice + dst_pitch.row * row;
            dst[d..d + n].copy_from_slice(&src[s..s + n]);
        }
    }

    Ok(())
}
