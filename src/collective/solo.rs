use std::io;

use super::{Collective, collective::invalid_src};

/// The trivial group of a single, non-distributed process.
#[derive(Debug, Clone, Copy, Default)]
pub struct Solo;

impl Collective for Solo {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    async fn broadcast(&mut self, value: bool, src: usize) -> io::Result<bool> {
        if src != 0 {
            return invalid_src(src, 1);
        }
        Ok(value)
    }

    async fn reduce_any(&mut self, value: bool) -> io::Result<bool> {
        Ok(value)
    }
}
