use std::io;

/// Blocking collective operations across all cooperating processes.
///
/// Every process must call the same operations in the same order on every step, or
/// the job deadlocks.
#[allow(unused)]
#[trait_variant::make(Collective: Send)]
pub trait CollectiveTemplate {
    /// This process' rank within the group.
    fn rank(&self) -> usize;

    /// The amount of processes in the group.
    fn world_size(&self) -> usize;

    /// Distributes `src`'s `value` to every process.
    ///
    /// # Arguments
    /// * `value` - This process' value, only meaningful on `src`.
    /// * `src` - The rank whose value is distributed.
    ///
    /// # Returns
    /// The value held by `src`, identical on every process.
    async fn broadcast(&mut self, value: bool, src: usize) -> io::Result<bool>;

    /// Logical OR of `value` over every process.
    ///
    /// # Returns
    /// `true` on every process if any process passed `true`.
    async fn reduce_any(&mut self, value: bool) -> io::Result<bool>;
}

pub(super) fn invalid_src<T>(src: usize, world_size: usize) -> io::Result<T> {
    Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("broadcast source rank {src} is out of range for a group of {world_size}"),
    ))
}
