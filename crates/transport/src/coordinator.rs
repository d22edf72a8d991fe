//! Coordinator side of the fabric: accepts exactly `expected_workers`
//! connections, hands each its `(rank, size)` handshake, and fans all of
//! their `Cmd` frames into one channel tagged with the sending rank — the
//! concrete form of spec.md §4.C's "source-tagged wildcard receive".

use std::collections::HashMap;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use worker_core::error::DispatcherError;
use worker_core::protocol::{Assignment, Completion, Handshake};

use crate::framing::{read_frame, write_cmd, write_frame, Tag};

enum Inbound {
    Completion(u32, Completion),
    Violation(u32, String),
}

pub struct CoordinatorTransport {
    writers: HashMap<u32, OwnedWriteHalf>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    worker_count: u32,
}

impl CoordinatorTransport {
    /// Binds `addr` and blocks until `expected_workers` have connected,
    /// handshaking each with its rank (1-based, connection order) and the
    /// process-group size (`expected_workers + 1`, counting the
    /// coordinator as rank 0).
    pub async fn bind(addr: &str, expected_workers: u32, verbose: bool) -> anyhow::Result<Self> {
        if expected_workers == 0 {
            return Err(DispatcherError::NoWorkers.into());
        }

        let listener = TcpListener::bind(addr).await?;
        let size = expected_workers + 1;
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let mut writers = HashMap::with_capacity(expected_workers as usize);

        for rank in 1..=expected_workers {
            let (stream, peer) = listener.accept().await?;
            if verbose {
                eprintln!("### msg: worker rank {rank} connected from {peer}");
            }
            stream.set_nodelay(true).ok();
            let (read_half, mut write_half) = stream.into_split();
            write_cmd(&mut write_half, &Handshake { rank, size }).await?;
            writers.insert(rank, write_half);

            let tx = inbound_tx.clone();
            tokio::spawn(async move {
                read_completions(rank, read_half, tx).await;
            });
        }

        Ok(Self {
            writers,
            inbound_rx,
            worker_count: expected_workers,
        })
    }

    pub fn worker_count(&self) -> u32 {
        self.worker_count
    }

    /// Non-blocking poll: the coordinator's main-loop receive (spec.md
    /// §4.D step 2). Callers loop on `Ok(None)` with a configurable sleep.
    pub fn try_recv_completion(&mut self) -> anyhow::Result<Option<(u32, Completion)>> {
        match self.inbound_rx.try_recv() {
            Ok(Inbound::Completion(rank, c)) => Ok(Some((rank, c))),
            Ok(Inbound::Violation(rank, msg)) => {
                Err(DispatcherError::Protocol(format!("rank {rank}: {msg}")).into())
            }
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(DispatcherError::Protocol("all worker connections closed".into()).into())
            }
        }
    }

    /// Blocking receive used during drain (spec.md §4.D's drain phase).
    pub async fn recv_completion(&mut self) -> anyhow::Result<(u32, Completion)> {
        match self.inbound_rx.recv().await {
            Some(Inbound::Completion(rank, c)) => Ok((rank, c)),
            Some(Inbound::Violation(rank, msg)) => {
                Err(DispatcherError::Protocol(format!("rank {rank}: {msg}")).into())
            }
            None => Err(DispatcherError::Protocol("all worker connections closed".into()).into()),
        }
    }

    pub async fn send_assignment(
        &mut self,
        rank: u32,
        assignment: Assignment,
        payload: &[u8],
    ) -> anyhow::Result<()> {
        let writer = self
            .writers
            .get_mut(&rank)
            .ok_or_else(|| anyhow::anyhow!("no connection for rank {rank}"))?;
        write_cmd(writer, &assignment).await?;
        if assignment.payload_size > 0 {
            write_frame(writer, Tag::Data, payload).await?;
        }
        Ok(())
    }

    /// Broadcasts an `Abort` frame to every connected worker. Best-effort:
    /// a write failure on one connection doesn't stop the others from being
    /// notified.
    pub async fn abort(&mut self, reason: &str) {
        for writer in self.writers.values_mut() {
            let _ = write_frame(writer, Tag::Abort, reason.as_bytes()).await;
            let _ = writer.shutdown().await;
        }
    }
}

async fn read_completions(rank: u32, mut read_half: OwnedReadHalf, tx: mpsc::UnboundedSender<Inbound>) {
    loop {
        let (tag, payload) = match read_frame(&mut read_half).await {
            Ok(v) => v,
            // A worker that disconnects without a final message is the
            // undetected-crash case spec.md §9 calls out as an open
            // question: we simply stop contributing to the channel and let
            // the coordinator's drain block, rather than escalating.
            Err(_) => return,
        };

        match tag {
            Tag::Cmd => match serde_json::from_slice::<Completion>(&payload) {
                Ok(c) => {
                    if tx.send(Inbound::Completion(rank, c)).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    let _ = tx.send(Inbound::Violation(rank, format!("malformed completion: {err}")));
                    return;
                }
            },
            other => {
                let _ = tx.send(Inbound::Violation(
                    rank,
                    format!("unexpected {other:?} frame from worker"),
                ));
                return;
            }
        }
    }
}

