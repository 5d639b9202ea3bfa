//! Collective communication between the machines of a training cluster.
//!
//! The distributed tree learners only need three collectives: an
//! element-wise sum, an all-gather of opaque byte messages and a
//! broadcast from one rank. [`LocalNetwork`] is the single-machine
//! identity; [`ThreadNetwork`] runs a cluster of peers inside one process
//! over a shared exchange, which is how the distributed strategies are
//! exercised without a transport.

use crate::config::Config;
use crate::core::error::{LightGBMError, Result};
use parking_lot::{Condvar, Mutex};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Collectives every machine calls in the same order.
pub trait Network: Send + Sync + fmt::Debug {
    fn rank(&self) -> usize;

    fn num_machines(&self) -> usize;

    /// Element-wise sum over all machines, summed in rank order so every
    /// machine ends with identical values.
    fn allreduce_sum(&self, values: &mut [f64]) -> Result<()>;

    /// Every machine's message, indexed by rank.
    fn allgather(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>>;

    /// The message of `root`; other ranks' inputs are ignored.
    fn broadcast(&self, root: usize, bytes: &[u8]) -> Result<Vec<u8>>;
}

/// Gather one serializable value from every machine.
pub fn allgather_value<T: Serialize + DeserializeOwned>(network: &dyn Network, value: &T) -> Result<Vec<T>> {
    let bytes = bincode::serialize(value)?;
    network
        .allgather(&bytes)?
        .iter()
        .map(|b| bincode::deserialize(b).map_err(LightGBMError::from))
        .collect()
}

/// Broadcast one serializable value from `root`.
pub fn broadcast_value<T: Serialize + DeserializeOwned>(network: &dyn Network, root: usize, value: Option<&T>) -> Result<T> {
    let bytes = match value {
        Some(v) if network.rank() == root => bincode::serialize(v)?,
        _ => Vec::new(),
    };
    let received = network.broadcast(root, &bytes)?;
    Ok(bincode::deserialize(&received)?)
}

/// Single-machine network: every collective is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalNetwork;

impl Network for LocalNetwork {
    fn rank(&self) -> usize {
        0
    }

    fn num_machines(&self) -> usize {
        1
    }

    fn allreduce_sum(&self, _values: &mut [f64]) -> Result<()> {
        Ok(())
    }

    fn allgather(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(vec![bytes.to_vec()])
    }

    fn broadcast(&self, _root: usize, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

#[derive(Debug)]
struct ExchangeState {
    generation: u64,
    arrived: usize,
    slots: Vec<Vec<u8>>,
    /// Messages of the last completed exchange
    published: Arc<Vec<Vec<u8>>>,
    /// Set once any peer timed out; every later collective fails
    failure: Option<String>,
}

#[derive(Debug)]
struct Exchange {
    num_machines: usize,
    timeout: Duration,
    state: Mutex<ExchangeState>,
    ready: Condvar,
}

impl Exchange {
    /// Deposit `bytes` for `rank` and wait until every peer has deposited.
    fn exchange(&self, rank: usize, bytes: &[u8]) -> Result<Arc<Vec<Vec<u8>>>> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.failure {
            return Err(LightGBMError::network(rank, reason.clone()));
        }
        let generation = state.generation;
        state.slots[rank] = bytes.to_vec();
        state.arrived += 1;

        if state.arrived == self.num_machines {
            let messages = std::mem::replace(&mut state.slots, vec![Vec::new(); self.num_machines]);
            state.published = Arc::new(messages);
            state.arrived = 0;
            state.generation += 1;
            self.ready.notify_all();
            return Ok(Arc::clone(&state.published));
        }

        let deadline = Instant::now() + self.timeout;
        while state.generation == generation {
            if let Some(reason) = &state.failure {
                return Err(LightGBMError::network(rank, reason.clone()));
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() && state.generation == generation {
                let reason = format!(
                    "timed out after {:?} waiting for {} of {} peers",
                    self.timeout,
                    self.num_machines - state.arrived,
                    self.num_machines
                );
                log::error!("Rank {}: {}", rank, reason);
                state.failure = Some(reason.clone());
                self.ready.notify_all();
                return Err(LightGBMError::network(rank, reason));
            }
        }
        Ok(Arc::clone(&state.published))
    }
}

/// One peer of an in-process cluster.
#[derive(Debug, Clone)]
pub struct ThreadNetwork {
    rank: usize,
    exchange: Arc<Exchange>,
}

impl ThreadNetwork {
    /// Create `num_machines` connected peers; a collective that waits longer
    /// than `timeout` for its peers fails the whole cluster.
    pub fn cluster(num_machines: usize, timeout: Duration) -> Vec<ThreadNetwork> {
        let exchange = Arc::new(Exchange {
            num_machines,
            timeout,
            state: Mutex::new(ExchangeState {
                generation: 0,
                arrived: 0,
                slots: vec![Vec::new(); num_machines],
                published: Arc::new(Vec::new()),
                failure: None,
            }),
            ready: Condvar::new(),
        });
        (0..num_machines)
            .map(|rank| ThreadNetwork {
                rank,
                exchange: Arc::clone(&exchange),
            })
            .collect()
    }

    /// Peers for `config.num_machines` machines waiting at most
    /// `network_timeout_secs` on each collective.
    pub fn cluster_from_config(config: &Config) -> Vec<ThreadNetwork> {
        Self::cluster(config.num_machines, Duration::from_secs(config.network_timeout_secs))
    }
}

impl Network for ThreadNetwork {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_machines(&self) -> usize {
        self.exchange.num_machines
    }

    fn allreduce_sum(&self, values: &mut [f64]) -> Result<()> {
        let encoded = bincode::serialize(&*values)?;
        let messages = self.exchange.exchange(self.rank, &encoded)?;
        values.iter_mut().for_each(|v| *v = 0.0);
        for (peer, message) in messages.iter().enumerate() {
            let peer_values: Vec<f64> = bincode::deserialize(message)?;
            if peer_values.len() != values.len() {
                return Err(LightGBMError::network(
                    self.rank,
                    format!("rank {} reduced {} values, expected {}", peer, peer_values.len(), values.len()),
                ));
            }
            for (v, p) in values.iter_mut().zip(&peer_values) {
                *v += p;
            }
        }
        Ok(())
    }

    fn allgather(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(self.exchange.exchange(self.rank, bytes)?.as_ref().clone())
    }

    fn broadcast(&self, root: usize, bytes: &[u8]) -> Result<Vec<u8>> {
        if root >= self.num_machines() {
            return Err(LightGBMError::network(self.rank, format!("broadcast root {} out of range", root)));
        }
        let messages = self.exchange.exchange(self.rank, bytes)?;
        Ok(messages[root].clone())
    }
}
