// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Envelope frame codec for server streams.
//!
//! Wire format, repeated per message:
//!
//! ```text
//! byte  0       : flags  (0x00 data, 0x80 trailer)
//! bytes 1..4    : big-endian uint32 payload length
//! bytes 5..5+L-1: JSON payload
//! ```
//!
//! A trailer frame carries the JSON error envelope and terminates the
//! stream.

use serde::Serialize;
use thiserror::Error;
use vapp_rpc::RpcError;

/// Flags byte of a data frame.
pub const FLAG_DATA: u8 = 0x00;

/// Flags byte of a trailer frame.
pub const FLAG_TRAILER: u8 = 0x80;

/// Maximum payload size (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Header length: flags byte + 4-byte length prefix.
const HEADER_LEN: usize = 5;

/// Frame codec errors.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("truncated frame: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub flags: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn is_trailer(&self) -> bool {
        self.flags & FLAG_TRAILER != 0
    }

    /// Parse the payload as JSON.
    pub fn json(&self) -> Result<serde_json::Value, FrameError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Encode a message as a data frame.
pub fn encode_data_frame<T: Serialize>(msg: &T) -> Result<Vec<u8>, FrameError> {
    encode_frame(FLAG_DATA, serde_json::to_vec(msg)?)
}

/// Encode an error envelope as a trailer frame.
pub fn encode_trailer_frame(err: &RpcError) -> Result<Vec<u8>, FrameError> {
    encode_frame(FLAG_TRAILER, serde_json::to_vec(&err.envelope())?)
}

fn encode_frame(flags: u8, payload: Vec<u8>) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.push(flags);
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode one frame from the front of `bytes`; returns the frame and
/// the number of bytes consumed.
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, usize), FrameError> {
    if bytes.len() < HEADER_LEN {
        return Err(FrameError::Truncated {
            need: HEADER_LEN,
            have: bytes.len(),
        });
    }
    let flags = bytes[0];
    let len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    let total = HEADER_LEN + len;
    if bytes.len() < total {
        return Err(FrameError::Truncated {
            need: total,
            have: bytes.len(),
        });
    }
    Ok((
        Frame {
            flags,
            payload: bytes[HEADER_LEN..total].to_vec(),
        },
        total,
    ))
}

/// Decode a whole buffer of concatenated frames.
pub fn decode_frames(mut bytes: &[u8]) -> Result<Vec<Frame>, FrameError> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        let (frame, consumed) = decode_frame(bytes)?;
        frames.push(frame);
        bytes = &bytes[consumed..];
    }
    Ok(frames)
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
