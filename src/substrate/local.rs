//! In-process substrate: one OS thread per rank.
//!
//! Every ordered pair of ranks owns a dedicated unbounded channel, so messages
//! between two ranks are delivered in send order and never interleave with
//! another sender's traffic. Tag matching and probing are implemented with a
//! per-source pending queue: messages pulled off a channel that do not match
//! the requested tag (or that were only probed) wait there until consumed.
//!
//! Collectives use a second, independent channel matrix so a rank that races
//! ahead into the next gather can never be confused with a late contribution
//! to the current one.

use super::{Substrate, SubstrateError};
use crate::utils::{get_cpu_cores, pin_current_thread};
use anyhow::{anyhow, Context, Result};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::collections::VecDeque;
use std::sync::{Arc, Barrier};
use std::thread;
use tracing::{debug, error};

/// A point-to-point message in flight
#[derive(Debug)]
struct Packet {
    tag: i32,
    data: Vec<i32>,
}

/// One rank's contribution to a collective
#[derive(Debug)]
enum Contribution {
    F64(Vec<f64>),
    Bytes(Vec<u8>),
}

impl Contribution {
    fn len(&self) -> usize {
        match self {
            Contribution::F64(values) => values.len(),
            Contribution::Bytes(bytes) => bytes.len(),
        }
    }
}

/// Communicator handed to the thread running one rank
pub struct LocalComm {
    rank: usize,
    size: usize,
    /// Indexed by destination rank
    outboxes: Vec<Sender<Packet>>,
    /// Indexed by source rank
    inboxes: Vec<Receiver<Packet>>,
    /// Indexed by source rank
    pending: Vec<VecDeque<Packet>>,
    collective_out: Vec<Sender<Contribution>>,
    collective_in: Vec<Receiver<Contribution>>,
    barrier: Arc<Barrier>,
    host: String,
}

impl LocalComm {
    fn check_rank(&self, rank: usize) -> Result<(), SubstrateError> {
        if rank >= self.size {
            return Err(SubstrateError::InvalidRank {
                rank,
                size: self.size,
            });
        }
        Ok(())
    }

    /// Index in the pending queue of the first message from `source` with
    /// `tag`, pulling from the channel until one arrives.
    fn wait_for(&mut self, source: usize, tag: i32) -> Result<usize, SubstrateError> {
        self.check_rank(source)?;
        if let Some(pos) = self.pending[source].iter().position(|p| p.tag == tag) {
            return Ok(pos);
        }

        loop {
            let packet = self.inboxes[source]
                .recv()
                .map_err(|_| SubstrateError::Disconnected { peer: source })?;
            let matched = packet.tag == tag;
            self.pending[source].push_back(packet);
            if matched {
                return Ok(self.pending[source].len() - 1);
            }
        }
    }

    fn gather(
        &mut self,
        contribution: Contribution,
        root: usize,
    ) -> Result<Option<Vec<Contribution>>, SubstrateError> {
        self.check_rank(root)?;
        if self.rank != root {
            self.collective_out[root]
                .send(contribution)
                .map_err(|_| SubstrateError::Disconnected { peer: root })?;
            return Ok(None);
        }

        let expected = contribution.len();
        let mut own = Some(contribution);
        let mut parts = Vec::with_capacity(self.size);
        for source in 0..self.size {
            let part = match own.take() {
                Some(part) if source == root => part,
                other => {
                    own = other;
                    self.collective_in[source]
                        .recv()
                        .map_err(|_| SubstrateError::Disconnected { peer: source })?
                }
            };
            if part.len() != expected {
                return Err(SubstrateError::GatherLength {
                    rank: source,
                    expected,
                    actual: part.len(),
                });
            }
            parts.push(part);
        }
        Ok(Some(parts))
    }
}

impl Substrate for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn processor_name(&self) -> String {
        self.host.clone()
    }

    fn library_version(&self) -> String {
        format!("{} {} local thread ring", env!("CARGO_PKG_NAME"), crate::VERSION)
    }

    fn send(&mut self, dest: usize, tag: i32, buf: &[i32]) -> Result<(), SubstrateError> {
        self.check_rank(dest)?;
        self.outboxes[dest]
            .send(Packet {
                tag,
                data: buf.to_vec(),
            })
            .map_err(|_| SubstrateError::Disconnected { peer: dest })
    }

    fn recv(&mut self, source: usize, tag: i32, buf: &mut [i32]) -> Result<(), SubstrateError> {
        let pos = self.wait_for(source, tag)?;
        let received = self.pending[source][pos].data.len();
        if received > buf.len() {
            return Err(SubstrateError::Truncated {
                source_rank: source,
                received,
                capacity: buf.len(),
            });
        }

        if let Some(packet) = self.pending[source].remove(pos) {
            buf[..received].copy_from_slice(&packet.data);
        }
        Ok(())
    }

    fn probe(&mut self, source: usize, tag: i32) -> Result<usize, SubstrateError> {
        let pos = self.wait_for(source, tag)?;
        Ok(self.pending[source][pos].data.len())
    }

    fn barrier(&mut self) -> Result<(), SubstrateError> {
        self.barrier.wait();
        Ok(())
    }

    fn gather_f64(
        &mut self,
        send: &[f64],
        root: usize,
    ) -> Result<Option<Vec<f64>>, SubstrateError> {
        let parts = self.gather(Contribution::F64(send.to_vec()), root)?;
        Ok(parts.map(|parts| {
            parts
                .into_iter()
                .flat_map(|part| match part {
                    Contribution::F64(values) => values,
                    Contribution::Bytes(_) => Vec::new(),
                })
                .collect()
        }))
    }

    fn gather_bytes(
        &mut self,
        send: &[u8],
        root: usize,
    ) -> Result<Option<Vec<u8>>, SubstrateError> {
        let parts = self.gather(Contribution::Bytes(send.to_vec()), root)?;
        Ok(parts.map(|parts| {
            parts
                .into_iter()
                .flat_map(|part| match part {
                    Contribution::Bytes(bytes) => bytes,
                    Contribution::F64(_) => Vec::new(),
                })
                .collect()
        }))
    }

    fn abort(&self, code: i32) -> ! {
        // All ranks live in this process, so exiting it ends the whole job.
        error!("Rank {} aborting local job with status {}", self.rank, code);
        std::process::exit(code)
    }
}

/// Factory for a fully wired set of local communicators
pub struct LocalUniverse {
    comms: Vec<LocalComm>,
}

impl LocalUniverse {
    /// Wire up `size` ranks
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(anyhow!("a local job needs at least one rank"));
        }

        let host = nix::unistd::gethostname()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());

        // senders[src][dst] / receivers[dst][src]
        let mut senders: Vec<Vec<Sender<Packet>>> = (0..size).map(|_| Vec::new()).collect();
        let mut receivers: Vec<Vec<Receiver<Packet>>> = (0..size).map(|_| Vec::new()).collect();
        let mut coll_senders: Vec<Vec<Sender<Contribution>>> =
            (0..size).map(|_| Vec::new()).collect();
        let mut coll_receivers: Vec<Vec<Receiver<Contribution>>> =
            (0..size).map(|_| Vec::new()).collect();

        for dst in 0..size {
            for src in 0..size {
                let (tx, rx) = unbounded();
                senders[src].push(tx);
                receivers[dst].push(rx);
                let (tx, rx) = unbounded();
                coll_senders[src].push(tx);
                coll_receivers[dst].push(rx);
            }
        }

        let barrier = Arc::new(Barrier::new(size));
        let comms = senders
            .into_iter()
            .zip(receivers)
            .zip(coll_senders.into_iter().zip(coll_receivers))
            .enumerate()
            .map(
                |(rank, ((outboxes, inboxes), (collective_out, collective_in)))| LocalComm {
                    rank,
                    size,
                    outboxes,
                    inboxes,
                    pending: (0..size).map(|_| VecDeque::new()).collect(),
                    collective_out,
                    collective_in,
                    barrier: Arc::clone(&barrier),
                    host: host.clone(),
                },
            )
            .collect();

        debug!("Wired local universe of {} ranks", size);
        Ok(Self { comms })
    }

    pub fn size(&self) -> usize {
        self.comms.len()
    }

    /// Run `body` once per rank, each on its own thread, and collect the
    /// per-rank results ordered by rank.
    ///
    /// With `pin` set, rank `r` is pinned to core `r % cores`.
    pub fn launch<T, F>(self, pin: bool, body: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(LocalComm) -> Result<T> + Sync,
    {
        let cores = get_cpu_cores();
        let body = &body;

        thread::scope(|scope| {
            let handles = self
                .comms
                .into_iter()
                .map(|comm| {
                    let rank = comm.rank;
                    thread::Builder::new()
                        .name(format!("rank-{}", rank))
                        .spawn_scoped(scope, move || {
                            if pin {
                                pin_current_thread(rank % cores);
                            }
                            body(comm)
                        })
                        .with_context(|| format!("Failed to spawn thread for rank {}", rank))
                })
                .collect::<Result<Vec<_>>>()?;

            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| {
                    handle
                        .join()
                        .map_err(|_| anyhow!("Rank {} panicked", rank))?
                        .with_context(|| format!("Rank {} failed", rank))
                })
                .collect()
        })
    }
}
