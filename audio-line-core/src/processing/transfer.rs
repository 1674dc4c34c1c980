use std::ops::Range;

use crate::models::error::LineError;

/// Validate a caller-supplied transfer window against a buffer.
///
/// Checks, in order: non-negative length, whole frames, then bounds
/// (including a negative offset).
pub fn checked_range(
    buffer_len: usize,
    offset: i64,
    length: i64,
    frame_size: usize,
) -> Result<Range<usize>, LineError> {
    if length < 0 {
        return Err(LineError::InvalidArgument(format!(
            "transfer length {} is negative",
            length
        )));
    }
    let frame_size = frame_size.max(1) as i64;
    if length % frame_size != 0 {
        return Err(LineError::InvalidArgument(format!(
            "transfer length {} is not a multiple of the {}-byte frame size",
            length, frame_size
        )));
    }
    let out_of_bounds = || LineError::IndexOutOfBounds {
        offset,
        length,
        buffer_len,
    };
    if offset < 0 {
        return Err(out_of_bounds());
    }
    let end = offset.checked_add(length).ok_or_else(out_of_bounds)?;
    if end as u64 > buffer_len as u64 {
        return Err(out_of_bounds());
    }
    Ok(offset as usize..end as usize)
}

/// Round `bytes` down to a whole number of frames.
pub fn align_to_frames(bytes: usize, frame_size: usize) -> usize {
    let frame_size = frame_size.max(1);
    bytes - bytes % frame_size
}

pub fn bytes_to_frames(bytes: u64, frame_size: usize) -> u64 {
    bytes / frame_size.max(1) as u64
}

/// Microseconds represented by `frames` at `frame_rate`. Zero for an
/// unspecified or zero rate.
pub fn frames_to_micros(frames: u64, frame_rate: Option<u32>) -> u64 {
    match frame_rate {
        Some(rate) if rate > 0 => (frames as u128 * 1_000_000 / rate as u128) as u64,
        _ => 0,
    }
}
