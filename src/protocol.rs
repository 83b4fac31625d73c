//! Wire contract for the fileferry request/response protocol.
//!
//! One request type: a fixed-width, NUL-padded file name. The reply is a
//! 4-byte status, then (only when the status is [`STATUS_AVAILABLE`]) an
//! 8-byte payload length followed by the raw bytes in chunks of at most
//! [`CHUNK_SIZE`]. All integers are big-endian.

use crate::error::Error;

/// Default TCP port the daemon listens on.
pub const DEFAULT_PORT: u16 = 27015;

/// Fixed width of the request frame on the wire. The file name occupies at
/// most `REQUEST_LEN - 1` bytes; the remainder is NUL padding.
pub const REQUEST_LEN: usize = 260;

/// Maximum payload bytes per streamed chunk.
pub const CHUNK_SIZE: usize = 1024;

/// Status code: file exists and the payload follows.
pub const STATUS_AVAILABLE: i32 = 200;

/// Status code: file missing or request rejected. No length field, no
/// payload. Path-validation rejections use this same code so the wire leaks
/// nothing about why.
pub const STATUS_NOT_FOUND: i32 = 404;

/// Encode a file name into the fixed-width request frame.
///
/// Rejects empty names, embedded NULs, and names longer than the frame can
/// hold: truncating would silently request a different file.
pub fn encode_request(name: &str) -> Result<[u8; REQUEST_LEN], Error> {
    if name.is_empty() {
        return Err(Error::Protocol("empty file name".into()));
    }
    if name.as_bytes().contains(&0) {
        return Err(Error::Protocol("file name contains NUL".into()));
    }
    if name.len() > REQUEST_LEN - 1 {
        return Err(Error::Protocol(format!(
            "file name too long: {} bytes (max {})",
            name.len(),
            REQUEST_LEN - 1
        )));
    }
    let mut frame = [0u8; REQUEST_LEN];
    frame[..name.len()].copy_from_slice(name.as_bytes());
    Ok(frame)
}

/// Decode a request frame: the name is everything up to the first NUL.
pub fn decode_request(frame: &[u8; REQUEST_LEN]) -> Result<&str, Error> {
    let end = frame.iter().position(|&b| b == 0).unwrap_or(REQUEST_LEN);
    if end == 0 {
        return Err(Error::Protocol("empty file name".into()));
    }
    std::str::from_utf8(&frame[..end])
        .map_err(|_| Error::Protocol("file name is not valid UTF-8".into()))
}

pub fn encode_status(status: i32) -> [u8; 4] {
    status.to_be_bytes()
}

pub fn decode_status(buf: [u8; 4]) -> Result<i32, Error> {
    match i32::from_be_bytes(buf) {
        s @ (STATUS_AVAILABLE | STATUS_NOT_FOUND) => Ok(s),
        other => Err(Error::Protocol(format!("unknown status code {other}"))),
    }
}

pub fn encode_size(size: i64) -> [u8; 8] {
    size.to_be_bytes()
}

pub fn decode_size(buf: [u8; 8]) -> Result<u64, Error> {
    let size = i64::from_be_bytes(buf);
    u64::try_from(size).map_err(|_| Error::Protocol(format!("negative payload size {size}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trip() {
        let frame = encode_request("dir/notes.txt").unwrap();
        assert_eq!(frame.len(), REQUEST_LEN);
        assert_eq!(decode_request(&frame).unwrap(), "dir/notes.txt");
        assert!(frame["dir/notes.txt".len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn request_max_width_name() {
        let name = "a".repeat(REQUEST_LEN - 1);
        let frame = encode_request(&name).unwrap();
        assert_eq!(decode_request(&frame).unwrap(), name);
    }

    #[test]
    fn request_rejects_bad_names() {
        assert!(encode_request("").is_err());
        assert!(encode_request("has\0nul").is_err());
        assert!(encode_request(&"a".repeat(REQUEST_LEN)).is_err());
    }

    #[test]
    fn decode_rejects_empty_and_invalid() {
        let empty = [0u8; REQUEST_LEN];
        assert!(decode_request(&empty).is_err());

        let mut bad = [0u8; REQUEST_LEN];
        bad[0] = 0xFF;
        bad[1] = 0xFE;
        assert!(decode_request(&bad).is_err());
    }

    #[test]
    fn status_round_trip() {
        assert_eq!(decode_status(encode_status(STATUS_AVAILABLE)).unwrap(), 200);
        assert_eq!(decode_status(encode_status(STATUS_NOT_FOUND)).unwrap(), 404);
        assert!(decode_status(encode_status(500)).is_err());
    }

    #[test]
    fn status_is_big_endian() {
        assert_eq!(encode_status(200), [0, 0, 0, 200]);
    }

    #[test]
    fn size_round_trip() {
        assert_eq!(decode_size(encode_size(0)).unwrap(), 0);
        assert_eq!(decode_size(encode_size(10_000_000)).unwrap(), 10_000_000);
        assert!(decode_size(encode_size(-1)).is_err());
    }
}
