//! MPI adapter.
//!
//! MPI's default error handler aborts the job on any communication failure,
//! so the calls below never report errors of their own; only rank arguments
//! are checked before reaching the library.

use super::{Substrate, SubstrateError};
use mpi::datatype::Equivalence;
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use mpi::Rank;
use tracing::error;

/// One process of an MPI job
pub struct MpiComm {
    world: SimpleCommunicator,
    // Finalizes MPI when dropped, so it must outlive `world`
    _universe: Universe,
}

impl MpiComm {
    /// Initialize MPI; fails if it was already initialized in this process
    pub fn initialize() -> Result<Self, SubstrateError> {
        let universe = mpi::initialize()
            .ok_or_else(|| SubstrateError::Init("MPI was already initialized".to_string()))?;
        Ok(Self {
            world: universe.world(),
            _universe: universe,
        })
    }

    /// Finalize MPI
    pub fn finalize(self) {
        drop(self);
    }

    fn peer(&self, rank: usize) -> Result<Rank, SubstrateError> {
        let size = self.size();
        if rank >= size {
            return Err(SubstrateError::InvalidRank { rank, size });
        }
        Ok(rank as Rank)
    }

    fn gather<T: Equivalence + Default + Clone>(
        &mut self,
        send: &[T],
        root: usize,
    ) -> Result<Option<Vec<T>>, SubstrateError> {
        let root_process = self.world.process_at_rank(self.peer(root)?);
        if self.rank() == root {
            let mut recv = vec![T::default(); send.len() * self.size()];
            root_process.gather_into_root(send, &mut recv[..]);
            Ok(Some(recv))
        } else {
            root_process.gather_into(send);
            Ok(None)
        }
    }
}

impl Substrate for MpiComm {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn processor_name(&self) -> String {
        mpi::environment::processor_name().unwrap_or_else(|_| "unknown".to_string())
    }

    fn library_version(&self) -> String {
        mpi::environment::library_version()
            .map(|v| v.trim_end().to_string())
            .unwrap_or_else(|_| "unknown MPI".to_string())
    }

    fn send(&mut self, dest: usize, tag: i32, buf: &[i32]) -> Result<(), SubstrateError> {
        let dest = self.peer(dest)?;
        self.world.process_at_rank(dest).send_with_tag(buf, tag);
        Ok(())
    }

    fn recv(&mut self, source: usize, tag: i32, buf: &mut [i32]) -> Result<(), SubstrateError> {
        let source = self.peer(source)?;
        self.world
            .process_at_rank(source)
            .receive_into_with_tag(buf, tag);
        Ok(())
    }

    fn probe(&mut self, source: usize, tag: i32) -> Result<usize, SubstrateError> {
        let source = self.peer(source)?;
        let status = self.world.process_at_rank(source).probe_with_tag(tag);
        Ok(status.count(i32::equivalent_datatype()).max(0) as usize)
    }

    fn barrier(&mut self) -> Result<(), SubstrateError> {
        self.world.barrier();
        Ok(())
    }

    fn gather_f64(&mut self, send: &[f64], root: usize) -> Result<Option<Vec<f64>>, SubstrateError> {
        self.gather(send, root)
    }

    fn gather_bytes(&mut self, send: &[u8], root: usize) -> Result<Option<Vec<u8>>, SubstrateError> {
        self.gather(send, root)
    }

    fn abort(&self, code: i32) -> ! {
        error!("Rank {} aborting the MPI job with code {}", self.rank(), code);
        self.world.abort(code)
    }
}
