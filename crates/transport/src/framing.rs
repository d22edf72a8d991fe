//! Low-level frame codec: `[tag: u8][len: u32 big-endian][payload]`. Two tags
//! carry the protocol spec.md §4.C calls for (`Cmd`, `Data`); a third
//! (`Abort`) carries the coordinator's protocol-violation teardown signal,
//! which has no equivalent tag in the original MPI design because MPI's
//! `MPI_Abort` tears down the whole process group directly rather than
//! sending a message.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frames larger than this are treated as a protocol violation rather than
/// an allocation request — generously above any single batch line
/// (`worker_core::batch::DEFAULT_MAX_LINE_LEN`) times a realistic item's
/// line count.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Cmd = 0,
    Data = 1,
    Abort = 2,
}

impl Tag {
    fn from_byte(b: u8) -> std::io::Result<Self> {
        match b {
            0 => Ok(Tag::Cmd),
            1 => Ok(Tag::Data),
            2 => Ok(Tag::Abort),
            other => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown frame tag {other}"),
            )),
        }
    }
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    w: &mut W,
    tag: Tag,
    payload: &[u8],
) -> std::io::Result<()> {
    w.write_u8(tag as u8).await?;
    w.write_u32(payload.len() as u32).await?;
    w.write_all(payload).await?;
    w.flush().await
}

pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> std::io::Result<(Tag, Vec<u8>)> {
    let tag = Tag::from_byte(r.read_u8().await?)?;
    let len = r.read_u32().await?;
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame length {len} exceeds {MAX_FRAME_LEN}"),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload).await?;
    Ok((tag, payload))
}

pub async fn write_cmd<W: AsyncWrite + Unpin, T: serde::Serialize>(
    w: &mut W,
    msg: &T,
) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(msg)?;
    write_frame(w, Tag::Cmd, &payload).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_a_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, Tag::Data, b"hello").await.unwrap();

        let mut cursor = Cursor::new(buf);
        let (tag, payload) = read_frame(&mut cursor).await.unwrap();
        assert_eq!(tag, Tag::Data);
        assert_eq!(payload, b"hello");
    }

    #[tokio::test]
    async fn rejects_oversized_frame() {
        let mut buf = Vec::new();
        buf.push(Tag::Data as u8);
        buf.extend_from_slice(&(MAX_FRAME_LEN + 1).to_be_bytes());
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn rejects_unknown_tag() {
        let mut buf = Vec::new();
        buf.push(9u8);
        buf.extend_from_slice(&0u32.to_be_bytes());
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
