//! Wire codec for the SynScan motor protocol.
//!
//! Payloads are ASCII hex with the two-digit groups in reverse order: the
//! 24-bit value `0x123456` travels as `"563412"`, the 16-bit value `0x1234`
//! as `"3412"`, a single byte `0x12` as `"12"`. No I/O, no state.

use crate::command::{AxisId, PayloadWidth};
use crate::error::{Error, MountError, Result};

/// Decoded payload of a successful reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyData {
    /// Reply carried no data (`=\r`), typical for set commands.
    Empty,
    /// Integer payload (1, 2, 4 or 6 hex digits).
    Value(u32),
    /// The 12-bit status word, three raw hex digits. Three digits cannot be
    /// split into two-digit groups, so the protocol ships them verbatim.
    Status(String),
}

impl ReplyData {
    /// Integer payload, or a decode error for replies of another shape.
    pub fn value(self) -> Result<u32> {
        match self {
            ReplyData::Value(v) => Ok(v),
            other => Err(Error::decode(format!("expected integer reply, got {other:?}"))),
        }
    }

    /// Status triplet, or a decode error for replies of another shape.
    pub fn status(self) -> Result<String> {
        match self {
            ReplyData::Status(s) => Ok(s),
            other => Err(Error::decode(format!("expected status reply, got {other:?}"))),
        }
    }
}

/// Format `value` as zero-padded uppercase hex and emit the two-digit groups
/// last group first. A one-digit payload has no group to reverse.
pub fn encode(value: u32, width: PayloadWidth) -> String {
    let digits = width.digits();
    if digits == 0 {
        return String::new();
    }

    // Values that overflow the field would otherwise grow the frame and
    // desynchronize the link.
    let mask = if digits >= 8 { u32::MAX } else { (1 << (digits * 4)) - 1 };
    let hex = format!("{:0width$X}", value & mask, width = digits);

    let mut swapped = String::with_capacity(digits);
    let bytes = hex.as_bytes();
    let mut i = bytes.len();
    while i > 0 {
        let start = i.saturating_sub(2);
        swapped.push_str(&hex[start..i]);
        i = start;
    }
    swapped
}

/// Inverse of [`encode`]: reassemble the two-digit groups from the end and
/// parse as hex. Three digits are the status special case and pass through
/// untouched.
pub fn decode(data: &str) -> Result<ReplyData> {
    let len = data.len();
    if len > 6 {
        return Err(Error::decode(format!(
            "reply payload too long ({len} digits, max 6): {data:?}"
        )));
    }
    match len {
        0 => Ok(ReplyData::Empty),
        3 => Ok(ReplyData::Status(data.to_string())),
        1 | 2 | 4 | 6 => {
            let mut hex = String::with_capacity(len);
            let mut i = len;
            while i > 0 {
                let start = i.saturating_sub(2);
                hex.push_str(&data[start..i]);
                i = start;
            }
            let value = u32::from_str_radix(&hex, 16)
                .map_err(|_| Error::decode(format!("not hex: {data:?}")))?;
            Ok(ReplyData::Value(value))
        }
        _ => Err(Error::decode(format!("odd reply payload length: {data:?}"))),
    }
}

/// `":" cmd axis payload "\r"`.
pub fn build_frame(cmd: char, axis: AxisId, payload: &str) -> Vec<u8> {
    format!(":{}{}{}\r", cmd, axis.digit(), payload).into_bytes()
}

/// Classify a raw reply. `=` leads success, `!` leads a two-digit mount
/// error code; anything else is a transport-level fault.
pub fn parse_reply(raw: &[u8]) -> Result<ReplyData> {
    let body = std::str::from_utf8(raw)
        .map_err(|_| Error::decode("reply is not ASCII"))?
        .trim_end_matches('\r');

    match body.as_bytes().first() {
        Some(b'=') => decode(&body[1..]),
        Some(b'!') => {
            let code = decode(&body[1..])?.value()?;
            Err(Error::Mount(MountError::from_code(code as u8)))
        }
        _ => Err(Error::decode(format!("unrecognized reply {raw:?}"))),
    }
}
