//! Worker side of the fabric: dials the coordinator, reads its handshake,
//! and exchanges `Assignment`/`Data`/`Completion` frames over the resulting
//! connection.

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use worker_core::error::DispatcherError;
use worker_core::protocol::{Assignment, Completion, Handshake};

use crate::framing::{read_frame, write_cmd, Tag};

/// An assignment read off the wire, paired with its script payload (already
/// drained from the following `Data` frame) or `None` for a `TERMINATE`.
pub struct Delivery {
    pub assignment: Assignment,
    pub payload: Option<Vec<u8>>,
}

pub struct WorkerTransport {
    read_half: OwnedReadHalf,
    write_half: OwnedWriteHalf,
    rank: u32,
    size: u32,
}

impl WorkerTransport {
    pub async fn connect(addr: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true).ok();
        let (mut read_half, write_half) = stream.into_split();

        let (tag, payload) = read_frame(&mut read_half).await?;
        if tag != Tag::Cmd {
            return Err(DispatcherError::Protocol(
                "expected handshake as first frame from coordinator".into(),
            )
            .into());
        }
        let handshake: Handshake = serde_json::from_slice(&payload)?;

        Ok(Self {
            read_half,
            write_half,
            rank: handshake.rank,
            size: handshake.size,
        })
    }

    pub fn rank(&self) -> u32 {
        self.rank
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub async fn send_ready(&mut self) -> anyhow::Result<()> {
        write_cmd(&mut self.write_half, &Completion::ready()).await
    }

    pub async fn send_completion(&mut self, job_id: u32, exit_status: i32) -> anyhow::Result<()> {
        write_cmd(
            &mut self.write_half,
            &Completion {
                job_id,
                exit_status,
            },
        )
        .await
    }

    /// Reads the next frame from the coordinator. A `TERMINATE` assignment
    /// carries no payload. An `Abort` frame (a protocol-violation teardown,
    /// not part of the original MPI design — see `framing`) surfaces as a
    /// `DispatcherError::Protocol`, since on a strictly-ordered TCP stream
    /// it can only ever arrive in place of the next expected frame.
    pub async fn recv_delivery(&mut self) -> anyhow::Result<Delivery> {
        let (tag, payload) = read_frame(&mut self.read_half).await?;
        match tag {
            Tag::Abort => {
                let reason = String::from_utf8_lossy(&payload).into_owned();
                Err(DispatcherError::Protocol(format!("coordinator aborted: {reason}")).into())
            }
            Tag::Data => Err(DispatcherError::Protocol(
                "expected an assignment, got an unsolicited data frame".into(),
            )
            .into()),
            Tag::Cmd => {
                let assignment: Assignment = serde_json::from_slice(&payload)?;
                if assignment.is_terminate() {
                    return Ok(Delivery {
                        assignment,
                        payload: None,
                    });
                }

                let (data_tag, data) = read_frame(&mut self.read_half).await?;
                if data_tag != Tag::Data {
                    return Err(DispatcherError::Protocol(format!(
                        "expected a data frame after assignment {}, got {data_tag:?}",
                        assignment.job_id
                    ))
                    .into());
                }
                if data.len() as u32 != assignment.payload_size {
                    return Err(DispatcherError::Protocol(format!(
                        "assignment {} declared {} bytes, data frame carried {}",
                        assignment.job_id,
                        assignment.payload_size,
                        data.len()
                    ))
                    .into());
                }

                Ok(Delivery {
                    assignment,
                    payload: Some(data),
                })
            }
        }
    }

    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.write_half.shutdown().await?;
        Ok(())
    }
}
