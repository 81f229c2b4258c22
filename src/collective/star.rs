use std::{io, time::Duration};

use futures::future;
use log::{debug, info, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{
        TcpListener, TcpStream, ToSocketAddrs,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    time,
};

use super::{Collective, collective::invalid_src};

const OP_BROADCAST: u8 = 0xB0;
const OP_REDUCE_ANY: u8 = 0xA0;

const CONNECT_RETRIES: usize = 20;
const CONNECT_BACKOFF: Duration = Duration::from_millis(500);

/// One end of a coordinator <-> rank connection.
struct Link<R, W> {
    rx: R,
    tx: W,
}

impl<R, W> Link<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, op: u8, value: bool) -> io::Result<()> {
        self.tx.write_all(&[op, value as u8]).await?;
        self.tx.flush().await
    }

    async fn recv(&mut self, op: u8) -> io::Result<bool> {
        let mut frame = [0; 2];
        self.rx.read_exact(&mut frame).await?;

        match frame {
            [got, 0] if got == op => Ok(false),
            [got, 1] if got == op => Ok(true),
            [got, value] => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected op {op:#x}, got frame ({got:#x}, {value})"),
            )),
        }
    }
}

/// A group connected in a star: the coordinator (rank 0) holds one link per other
/// rank and relays every collective, the other ranks only talk to the coordinator.
pub struct StarCollective<R, W> {
    rank: usize,
    world_size: usize,
    /// On the coordinator, the link to rank `i` is at `i - 1`. Elsewhere, the single
    /// link to the coordinator.
    links: Vec<Link<R, W>>,
}

impl<R, W> StarCollective<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates the coordinator's end of the group.
    ///
    /// # Arguments
    /// * `links` - The `(rx, tx)` streams to ranks `1..=links.len()`, ordered by rank.
    pub fn coordinator(links: Vec<(R, W)>) -> Self {
        Self {
            rank: 0,
            world_size: links.len() + 1,
            links: links.into_iter().map(|(rx, tx)| Link { rx, tx }).collect(),
        }
    }

    /// Creates a non-coordinating rank's end of the group.
    ///
    /// # Arguments
    /// * `rank` - This process' rank, must be in `1..world_size`.
    /// * `world_size` - The amount of processes in the group.
    /// * `rx` - Receiving end of the link to the coordinator.
    /// * `tx` - Sending end of the link to the coordinator.
    pub fn replica(rank: usize, world_size: usize, rx: R, tx: W) -> io::Result<Self> {
        if rank == 0 || rank >= world_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("replica rank must be in 1..{world_size}, got {rank}"),
            ));
        }

        Ok(Self {
            rank,
            world_size,
            links: vec![Link { rx, tx }],
        })
    }

    fn is_coordinator(&self) -> bool {
        self.rank == 0
    }
}

impl StarCollective<OwnedReadHalf, OwnedWriteHalf> {
    /// Accepts `world_size - 1` ranks on `addr` and builds the coordinator's end.
    ///
    /// Each connecting rank announces itself with its rank as a big-endian `u64`.
    pub async fn listen<A: ToSocketAddrs>(addr: A, world_size: usize) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("coordinator listening at {}", listener.local_addr()?);

        let mut slots: Vec<Option<(OwnedReadHalf, OwnedWriteHalf)>> =
            (1..world_size).map(|_| None).collect();

        while slots.iter().any(Option::is_none) {
            let (stream, peer) = listener.accept().await?;
            let (mut rx, tx) = stream.into_split();
            let rank = rx.read_u64().await? as usize;

            match slots.get_mut(rank.wrapping_sub(1)) {
                Some(slot) if slot.is_none() => {
                    *slot = Some((rx, tx));
                    info!(rank = rank; "rank connected from {peer}");
                }
                Some(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("rank {rank} connected twice"),
                    ));
                }
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("rank {rank} is out of range for a group of {world_size}"),
                    ));
                }
            }
        }

        Ok(Self::coordinator(slots.into_iter().flatten().collect()))
    }

    /// Connects to the coordinator at `addr`, retrying while it is not up yet.
    pub async fn connect<A>(addr: A, rank: usize, world_size: usize) -> io::Result<Self>
    where
        A: ToSocketAddrs + Clone,
    {
        let mut attempt = 0;
        let stream = loop {
            match TcpStream::connect(addr.clone()).await {
                Ok(stream) => break stream,
                Err(e) if attempt < CONNECT_RETRIES => {
                    attempt += 1;
                    warn!(rank = rank; "failed to connect to coordinator: {e}, retrying...");
                    time::sleep(CONNECT_BACKOFF).await;
                }
                Err(e) => return Err(e),
            }
        };

        let (rx, mut tx) = stream.into_split();
        tx.write_u64(rank as u64).await?;
        tx.flush().await?;
        Self::replica(rank, world_size, rx, tx)
    }
}

impl<R, W> Collective for StarCollective<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
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

        if !self.is_coordinator() {
            let link = &mut self.links[0];
            if src == self.rank {
                link.send(OP_BROADCAST, value).await?;
                return Ok(value);
            }
            return link.recv(OP_BROADCAST).await;
        }

        let value = match src {
            0 => value,
            src => self.links[src - 1].recv(OP_BROADCAST).await?,
        };

        debug!(src = src; "relaying broadcast value {value}");
        let futs = self
            .links
            .iter_mut()
            .enumerate()
            .filter(|(i, _)| i + 1 != src)
            .map(|(_, link)| link.send(OP_BROADCAST, value));

        future::try_join_all(futs).await?;
        Ok(value)
    }

    async fn reduce_any(&mut self, value: bool) -> io::Result<bool> {
        if !self.is_coordinator() {
            let link = &mut self.links[0];
            link.send(OP_REDUCE_ANY, value).await?;
            return link.recv(OP_REDUCE_ANY).await;
        }

        let futs = self.links.iter_mut().map(|link| link.recv(OP_REDUCE_ANY));
        let any = future::try_join_all(futs).await?.into_iter().any(|v| v) || value;

        let futs = self.links.iter_mut().map(|link| link.send(OP_REDUCE_ANY, any));
        future::try_join_all(futs).await?;
        Ok(any)
    }
}
