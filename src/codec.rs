//! Byte-level codec for the DHCP options area.
//!
//! The options area starts with the 4-byte magic cookie and is followed by
//! a TLV sequence:
//!
//! ```text
//! +------+-----+----------------+
//! | code | len | data (len)     |   any code except PAD and END
//! +------+-----+----------------+
//! | 0    |                          PAD, single byte
//! +------+
//! | 255  |                          END, single byte
//! +------+
//! ```
//!
//! Replies are written into a fixed 312-byte buffer; every write is
//! bounds-checked and fails with [`Error::OptionOverflow`] instead of
//! running past the end. Inbound areas are walked with [`OptionIter`],
//! which never trusts a length byte without checking it against the
//! remaining input.

use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::options::OptionCode;

/// Capacity of the options area in a reply (RFC 2131 §2).
pub const OPTIONS_BUFFER_SIZE: usize = 312;

/// Marker identifying a DHCP (vs plain BOOTP) options area.
pub const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];

const PAD: u8 = OptionCode::Pad as u8;
const END: u8 = OptionCode::End as u8;

/// Writes the magic cookie at the start of `buffer` and returns the offset
/// of the first option.
pub fn write_magic_cookie(buffer: &mut [u8; OPTIONS_BUFFER_SIZE]) -> usize {
    buffer[..MAGIC_COOKIE.len()].copy_from_slice(&MAGIC_COOKIE);
    MAGIC_COOKIE.len()
}

/// Writes one option at `offset` and returns the offset after it.
///
/// PAD and END occupy a single byte and ignore `data`. Every other code is
/// written as `[code][len][data..]`.
///
/// # Errors
///
/// Returns [`Error::OptionOverflow`] if the option would not fit in the
/// buffer or `data` is longer than a length byte can express. The buffer
/// is left untouched in that case.
pub fn encode_option(
    buffer: &mut [u8; OPTIONS_BUFFER_SIZE],
    offset: usize,
    code: u8,
    data: &[u8],
) -> Result<usize> {
    if code == PAD || code == END {
        if offset >= OPTIONS_BUFFER_SIZE {
            return Err(Error::OptionOverflow { code });
        }
        buffer[offset] = code;
        return Ok(offset + 1);
    }

    let length = u8::try_from(data.len()).map_err(|_| Error::OptionOverflow { code })?;
    let end = offset
        .checked_add(2 + data.len())
        .filter(|end| *end <= OPTIONS_BUFFER_SIZE)
        .ok_or(Error::OptionOverflow { code })?;

    buffer[offset] = code;
    buffer[offset + 1] = length;
    buffer[offset + 2..end].copy_from_slice(data);
    Ok(end)
}

/// Iterator over the `(code, data)` pairs of an options area.
///
/// PAD bytes are skipped, END terminates the walk, and running off the end
/// of the input without END also terminates it. A malformed TLV yields one
/// `Err` and then the iterator is exhausted.
#[derive(Debug, Clone)]
pub struct OptionIter<'a> {
    data: &'a [u8],
    index: usize,
    finished: bool,
}

/// Validates the magic cookie and returns an iterator over the options.
///
/// # Errors
///
/// Returns [`Error::MalformedPacket`] if the area is shorter than the
/// cookie or the cookie does not match.
pub fn iter_options(area: &[u8]) -> Result<OptionIter<'_>> {
    match area.get(..MAGIC_COOKIE.len()) {
        Some(cookie) if cookie == MAGIC_COOKIE => Ok(OptionIter {
            data: area,
            index: MAGIC_COOKIE.len(),
            finished: false,
        }),
        Some(_) => Err(Error::MalformedPacket("Invalid magic cookie".to_string())),
        None => Err(Error::MalformedPacket("Magic cookie missing".to_string())),
    }
}

impl<'a> Iterator for OptionIter<'a> {
    type Item = Result<(u8, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let Some(&code) = self.data.get(self.index) else {
                self.finished = true;
                return None;
            };

            if code == PAD {
                self.index += 1;
                continue;
            }

            if code == END {
                self.finished = true;
                return None;
            }

            let Some(&length) = self.data.get(self.index + 1) else {
                self.finished = true;
                return Some(Err(Error::MalformedPacket(format!(
                    "Option {} length missing",
                    code
                ))));
            };

            let start = self.index + 2;
            let end = start + length as usize;
            let Some(value) = self.data.get(start..end) else {
                self.finished = true;
                return Some(Err(Error::MalformedPacket(format!(
                    "Option {} declares {} bytes but only {} remain",
                    code,
                    length,
                    self.data.len().saturating_sub(start)
                ))));
            };

            self.index = end;
            return Some(Ok((code, value)));
        }
        None
    }
}

/// Finds the first occurrence of `code` in an options area.
///
/// Returns `Ok(None)` when END (or the end of input) is reached first.
///
/// # Errors
///
/// Returns [`Error::MalformedPacket`] if the cookie is absent or a TLV
/// before the wanted option is truncated. Callers should then treat the
/// whole area as carrying no options.
pub fn decode_option(area: &[u8], code: u8) -> Result<Option<&[u8]>> {
    for option in iter_options(area)? {
        let (found, data) = option?;
        if found == code {
            return Ok(Some(data));
        }
    }
    Ok(None)
}

/// Like [`decode_option`], but returns at most `max_len` bytes of data.
pub fn decode_option_truncated(area: &[u8], code: u8, max_len: usize) -> Result<Option<&[u8]>> {
    Ok(decode_option(area, code)?.map(|data| &data[..data.len().min(max_len)]))
}

/// A reply options area under construction.
///
/// Starts with the magic cookie already written. Each `put_*` call appends
/// one TLV or fails with [`Error::OptionOverflow`] leaving earlier options
/// intact.
#[derive(Debug, Clone)]
pub struct OptionsBuffer {
    bytes: [u8; OPTIONS_BUFFER_SIZE],
    len: usize,
}

impl OptionsBuffer {
    pub fn new() -> Self {
        let mut bytes = [0u8; OPTIONS_BUFFER_SIZE];
        let len = write_magic_cookie(&mut bytes);
        Self { bytes, len }
    }

    pub fn put(&mut self, code: u8, data: &[u8]) -> Result<()> {
        self.len = encode_option(&mut self.bytes, self.len, code, data)?;
        Ok(())
    }

    pub fn put_u8(&mut self, code: u8, value: u8) -> Result<()> {
        self.put(code, &[value])
    }

    pub fn put_u32(&mut self, code: u8, value: u32) -> Result<()> {
        self.put(code, &value.to_be_bytes())
    }

    pub fn put_addr(&mut self, code: u8, addr: Ipv4Addr) -> Result<()> {
        self.put(code, &addr.octets())
    }

    /// Appends the END marker.
    pub fn finish(&mut self) -> Result<()> {
        self.put(END, &[])
    }

    /// The bytes written so far, cookie included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == MAGIC_COOKIE.len()
    }

    pub fn remaining(&self) -> usize {
        OPTIONS_BUFFER_SIZE - self.len
    }
}

impl Default for OptionsBuffer {
    fn default() -> Self {
        Self::new()
    }
}
