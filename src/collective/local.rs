use std::{io, num::NonZeroUsize, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::Barrier;

use super::{Collective, collective::invalid_src};

struct Shared {
    barrier: Barrier,
    slot: Mutex<bool>,
    any: Mutex<bool>,
}

/// A group of ranks living in the same process, e.g. one tokio task per rank.
///
/// Collectives rendezvous on a shared barrier, so every member must take part in
/// every call.
#[derive(Clone)]
pub struct LocalGroup {
    rank: usize,
    world_size: usize,
    shared: Arc<Shared>,
}

impl LocalGroup {
    /// Creates the members of a new group.
    ///
    /// # Arguments
    /// * `world_size` - The amount of ranks in the group.
    ///
    /// # Returns
    /// One handle per rank, ordered by rank.
    pub fn new(world_size: NonZeroUsize) -> Vec<Self> {
        let world_size = world_size.get();
        let shared = Arc::new(Shared {
            barrier: Barrier::new(world_size),
            slot: Mutex::new(false),
            any: Mutex::new(false),
        });

        (0..world_size)
            .map(|rank| Self {
                rank,
                world_size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Collective for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    async fn broadcast(&mut self, value: bool, src: usize) -> io::Result<bool> {
        if src >= self.world_size {
            return invalid_src(src, self.world_size);
        }

        if self.rank == src {
            *self.shared.slot.lock() = value;
        }

        self.shared.barrier.wait().await;
        let value = *self.shared.slot.lock();

        // `src` may not overwrite the slot until everyone has read it.
        self.shared.barrier.wait().await;
        Ok(value)
    }

    async fn reduce_any(&mut self, value: bool) -> io::Result<bool> {
        if value {
            *self.shared.any.lock() = true;
        }

        self.shared.barrier.wait().await;
        let any = *self.shared.any.lock();

        if self.shared.barrier.wait().await.is_leader() {
            *self.shared.any.lock() = false;
        }

        self.shared.barrier.wait().await;
        Ok(any)
    }
}
