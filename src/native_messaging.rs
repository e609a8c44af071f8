use std::io::{ErrorKind, Read, Write};

use anyhow::{bail, Context};
use serde::Serialize;

use crate::{config, protocol::Request};

/// Read one framed request. Clean EOF before a frame starts yields `None`.
pub fn read_message(stdin: &mut dyn Read) -> anyhow::Result<Option<Request>> {
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        match stdin.read(&mut len_buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("failed reading native message length"),
        }
    }
    if filled == 0 {
        return Ok(None);
    }
    if filled < 4 {
        bail!("incomplete length prefix (expected 4 bytes, got {filled})");
    }

    // Native messaging uses 32-bit little-endian length.
    let msg_len = u32::from_le_bytes(len_buf);
    if msg_len > config::native_messaging::MAX_MESSAGE_SIZE_BYTES {
        bail!("message too large: {msg_len} bytes");
    }

    let mut payload = vec![0u8; msg_len as usize];
    stdin
        .read_exact(&mut payload)
        .with_context(|| format!("failed reading native message payload ({msg_len} bytes)"))?;

    let req: Request = serde_json::from_slice(&payload).context("invalid JSON request")?;
    Ok(Some(req))
}

pub fn write_json<T: Serialize + ?Sized>(stdout: &mut dyn Write, v: &T) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec(v).context("failed serializing JSON response")?;
    let len: u32 = bytes
        .len()
        .try_into()
        .context("response too large for u32 length")?;
    stdout.write_all(&len.to_le_bytes())?;
    stdout.write_all(&bytes)?;
    stdout.flush().context("failed flushing stdout")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;

    fn frame(body: &[u8]) -> Vec<u8> {
        let mut out = (body.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn reads_consecutive_frames_then_eof() {
        let mut input = frame(br#"{"id":"1","method":"hello"}"#);
        input.extend(frame(br#"{"id":"2","method":"stats","params":{}}"#));
        let mut cur = Cursor::new(input);

        assert_eq!(read_message(&mut cur).unwrap().unwrap().id, "1");
        assert_eq!(read_message(&mut cur).unwrap().unwrap().method, "stats");
        assert!(read_message(&mut cur).unwrap().is_none());
    }

    #[test]
    fn truncated_frames_are_errors() {
        assert!(read_message(&mut Cursor::new(vec![1u8, 0])).is_err());
        let mut short = frame(br#"{"id":"1","method":"hello"}"#);
        short.truncate(10);
        assert!(read_message(&mut Cursor::new(short)).is_err());
    }

    #[test]
    fn oversized_length_is_rejected() {
        let len = config::native_messaging::MAX_MESSAGE_SIZE_BYTES + 1;
        let err = read_message(&mut Cursor::new(len.to_le_bytes().to_vec())).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn write_prefixes_length() {
        let mut out = Vec::new();
        write_json(&mut out, &json!({"id": "1", "result": true})).unwrap();
        let len = u32::from_le_bytes([out[0], out[1], out[2], out[3]]) as usize;
        assert_eq!(len, out.len() - 4);
        let v: serde_json::Value = serde_json::from_slice(&out[4..]).unwrap();
        assert_eq!(v["result"], true);
    }
}
