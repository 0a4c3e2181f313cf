//! Value types held by [`Parameters`](super::Parameters)

use crate::error::{Result, RocError};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Set of enabled link indices
pub type LinkMask = BTreeSet<u32>;

/// Highest link index a parsed mask may name (one bit per link in a 32-bit
/// enable register)
pub const MAX_LINK: u32 = u32::BITS - 1;

/// Parse a link mask: comma separated link numbers and inclusive ranges
///
/// * `"0,1,2,8-10"` for links 0, 1, 2, 8, 9 and 10
/// * `"0-19,21-23"` for links 0 to 23 except 20
///
/// # Errors
///
/// Returns `RocError::Parse` on malformed tokens, descending ranges and
/// links above [`MAX_LINK`].
pub fn parse_link_mask(string: &str) -> Result<LinkMask> {
    let number = |text: &str| -> Result<u32> {
        let link = text
            .trim()
            .parse::<u32>()
            .map_err(|e| RocError::parse(string, format!("invalid link number {text:?}: {e}")))?;
        if link > MAX_LINK {
            return Err(RocError::parse(
                string,
                format!("link {link} out of range (max {MAX_LINK})"),
            ));
        }
        Ok(link)
    };

    let mut links = LinkMask::new();

    for token in string.split(',') {
        match token.split_once('-') {
            Some((first, last)) => {
                let (first, last) = (number(first)?, number(last)?);
                if first > last {
                    return Err(RocError::parse(
                        string,
                        format!("link range {first}-{last} is not ascending"),
                    ));
                }
                links.extend(first..=last);
            }
            None => {
                links.insert(number(token)?);
            }
        }
    }

    Ok(links)
}

/// Content of internally generated data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorPattern {
    /// Every word the same
    Constant,
    /// Alternating `0xa` / `0x5` words
    Alternating,
    /// Walking zero
    Flying0,
    /// Walking one
    Flying1,
    /// Incrementing counter
    Incremental,
    /// Decrementing counter
    Decremental,
    /// Pseudo-random words
    Random,
}

impl GeneratorPattern {
    const NAMES: [(Self, &'static str); 7] = [
        (Self::Constant, "Constant"),
        (Self::Alternating, "Alternating"),
        (Self::Flying0, "Flying0"),
        (Self::Flying1, "Flying1"),
        (Self::Incremental, "Incremental"),
        (Self::Decremental, "Decremental"),
        (Self::Random, "Random"),
    ];
}

/// Routing of generated data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopbackMode {
    /// No loopback; data comes from the links
    None,
    /// Loopback inside the card
    Internal,
    /// Loopback through the DIU
    Diu,
    /// Loopback through the SIU
    Siu,
    /// Data generated by the front-end data generator
    Ddg,
}

impl LoopbackMode {
    const NAMES: [(Self, &'static str); 5] = [
        (Self::None, "None"),
        (Self::Internal, "Internal"),
        (Self::Diu, "Diu"),
        (Self::Siu, "Siu"),
        (Self::Ddg, "Ddg"),
    ];
}

/// Readout mode of a DMA channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadoutMode {
    /// Continuous readout
    Continuous,
}

impl ReadoutMode {
    const NAMES: [(Self, &'static str); 1] = [(Self::Continuous, "Continuous")];
}

macro_rules! named_enum {
    ($ty:ident, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = Self::NAMES
                    .iter()
                    .find(|(value, _)| value == self)
                    .map_or("?", |(_, name)| *name);
                f.write_str(name)
            }
        }

        impl FromStr for $ty {
            type Err = RocError;

            fn from_str(s: &str) -> Result<Self> {
                Self::NAMES
                    .iter()
                    .find(|(_, name)| name.eq_ignore_ascii_case(s.trim()))
                    .map(|(value, _)| *value)
                    .ok_or_else(|| {
                        let known: Vec<_> = Self::NAMES.iter().map(|(_, name)| *name).collect();
                        RocError::parse(
                            s,
                            format!(concat!("unknown ", $what, " (expected one of {})"), known.join(", ")),
                        )
                    })
            }
        }
    };
}

named_enum!(GeneratorPattern, "generator pattern");
named_enum!(LoopbackMode, "loopback mode");
named_enum!(ReadoutMode, "readout mode");

/// DMA buffer registered with a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferParameters {
    /// Buffer already mapped in this process
    Memory {
        /// Userspace virtual address of the buffer
        address: usize,
        /// Size in bytes
        size: usize,
    },
    /// Buffer backed by a file, typically in a hugetlbfs mount
    File {
        /// Path of the file
        path: PathBuf,
        /// Size in bytes
        size: usize,
    },
    /// No buffer; the channel is opened without transferring data
    Null,
}
