// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Error types for decoding items returned by the kernel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{what} truncated: need {need} bytes, have {have}")]
    Truncated {
        what: &'static str,
        need: usize,
        have: usize,
    },

    #[error("search buffer holds {found} items, kernel reported {expected}")]
    ItemCount { expected: u32, found: u32 },
}

/// Result type alias for item decoding
pub type Result<T> = std::result::Result<T, DecodeError>;

pub(crate) fn ensure_len(what: &'static str, buf: &[u8], need: usize) -> Result<()> {
    if buf.len() < need {
        return Err(DecodeError::Truncated {
            what,
            need,
            have: buf.len(),
        });
    }
    Ok(())
}
