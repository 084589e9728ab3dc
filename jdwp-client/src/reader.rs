// Helper functions for reading JDWP data types from buffers

use bytes::Buf;
use crate::protocol::{JdwpError, JdwpResult};

/// Read a JDWP string (4-byte length prefix + modified UTF-8 bytes)
pub fn read_string(buf: &mut &[u8]) -> JdwpResult<String> {
    if buf.remaining() < 4 {
        return Err(JdwpError::Protocol("Not enough data for string length".to_string()));
    }

    let len = buf.get_u32() as usize;

    if buf.remaining() < len {
        return Err(JdwpError::Protocol(format!(
            "Not enough data for string: expected {}, got {}",
            len,
            buf.remaining()
        )));
    }

    let bytes = &buf[..len];
    buf.advance(len);

    cesu8::from_java_cesu8(bytes)
        .map(|s| s.into_owned())
        .map_err(|e| JdwpError::Protocol(format!("Invalid modified UTF-8 in string: {}", e)))
}

/// Read a i32
pub fn read_i32(buf: &mut &[u8]) -> JdwpResult<i32> {
    if buf.remaining() < 4 {
        return Err(JdwpError::Protocol("Not enough data for i32".to_string()));
    }
    Ok(buf.get_i32())
}

/// Read a u8
pub fn read_u8(buf: &mut &[u8]) -> JdwpResult<u8> {
    if buf.remaining() < 1 {
        return Err(JdwpError::Protocol("Not enough data for u8".to_string()));
    }
    Ok(buf.get_u8())
}

/// Read a boolean (one byte, non-zero is true)
pub fn read_bool(buf: &mut &[u8]) -> JdwpResult<bool> {
    Ok(read_u8(buf)? != 0)
}

/// Read an ID whose width was declared by the target in IDSizes
pub fn read_id(buf: &mut &[u8], size: usize) -> JdwpResult<u64> {
    if size == 0 || size > 8 {
        return Err(JdwpError::Protocol(format!("Unsupported ID size: {}", size)));
    }
    if buf.remaining() < size {
        return Err(JdwpError::Protocol(format!(
            "Not enough data for {}-byte ID",
            size
        )));
    }
    Ok(buf.get_uint(size))
}

/// Read a count prefix, rejecting negative values
pub fn read_count(buf: &mut &[u8]) -> JdwpResult<usize> {
    let count = read_i32(buf)?;
    usize::try_from(count)
        .map_err(|_| JdwpError::Protocol(format!("Negative count: {}", count)))
}
