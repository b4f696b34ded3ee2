//! A bounded pool of connections, keyed by endpoint configuration.
//!
//! Idle connections sit in per-endpoint LIFO stacks behind one
//! short-critical-section mutex; a per-endpoint semaphore bounds how many
//! connections exist at once. Leasing hands out a [`PooledConnection`]
//! guard that returns the connection on drop — but only a clean one:
//! anything closed, subscribed, mid-pipeline, mid-transaction or still
//! watching keys is silently dropped instead, which closes its socket.
//! That drop-guard discipline is what makes a connection single-user: no
//! two tasks ever hold the same one.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::config::ConnectionInfo;
use crate::connection::Connection;
use crate::error::Error;

/// Pool tuning knobs.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Most connections alive per endpoint configuration, leased and idle
    /// together.
    pub max_per_endpoint: usize,
    /// How long a lease may wait for capacity before failing with
    /// [`Error::PoolExhausted`]; `None` waits forever.
    pub lease_timeout: Option<Duration>,
    /// PING every pooled connection on lease and discard the ones that
    /// fail to answer `PONG`.
    pub check_on_lease: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_per_endpoint: 8,
            lease_timeout: Some(Duration::from_secs(5)),
            check_on_lease: false,
        }
    }
}

struct IdleEntry {
    conn: Connection,
    since: Instant,
}

struct EndpointSlot {
    idle: Vec<IdleEntry>,
    permits: Arc<Semaphore>,
}

struct PoolState {
    endpoints: HashMap<ConnectionInfo, EndpointSlot>,
    draining: bool,
}

struct PoolShared {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

/// The pool handle. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Pool {
    shared: Arc<PoolShared>,
}

impl Pool {
    /// A pool with the given configuration.
    pub fn new(config: PoolConfig) -> Self {
        Pool {
            shared: Arc::new(PoolShared {
                config,
                state: Mutex::new(PoolState {
                    endpoints: HashMap::new(),
                    draining: false,
                }),
            }),
        }
    }

    /// Lease a connection for `info`, reusing an idle one when possible.
    ///
    /// Waits up to the configured lease timeout for capacity when the
    /// endpoint is at its bound, then fails with
    /// [`Error::PoolExhausted`].
    pub async fn lease(&self, info: &ConnectionInfo) -> Result<PooledConnection, Error> {
        let permits = {
            let mut state = self.shared.state.lock().unwrap();
            if state.draining {
                return Err(Error::PoolExhausted);
            }
            let max = self.shared.config.max_per_endpoint;
            let slot = state
                .endpoints
                .entry(info.clone())
                .or_insert_with(|| EndpointSlot {
                    idle: Vec::new(),
                    permits: Arc::new(Semaphore::new(max)),
                });
            Arc::clone(&slot.permits)
        };
        let permit = match self.shared.config.lease_timeout {
            Some(limit) => tokio::time::timeout(limit, permits.acquire_owned())
                .await
                .map_err(|_| Error::PoolExhausted)?,
            None => permits.acquire_owned().await,
        }
        .map_err(|_| Error::PoolExhausted)?;

        let mut ready = None;
        while ready.is_none() {
            let popped = {
                let mut state = self.shared.state.lock().unwrap();
                if state.draining {
                    return Err(Error::PoolExhausted);
                }
                state.endpoints.get_mut(info).and_then(|slot| slot.idle.pop())
            };
            let Some(entry) = popped else { break };
            let mut conn = entry.conn;
            if !self.shared.config.check_on_lease {
                ready = Some(conn);
                break;
            }
            match conn.ping().await {
                Ok(ref answer) if answer == "PONG" => ready = Some(conn),
                Ok(answer) => {
                    warn!(%answer, "pooled connection failed its health check, discarding");
                    conn.close().await;
                }
                Err(err) => {
                    warn!(%err, "pooled connection failed its health check, discarding");
                    conn.close().await;
                }
            }
        }
        let conn = match ready {
            Some(conn) => conn,
            None => {
                debug!(endpoint = %info.endpoint, "growing pool");
                Connection::connect(info.clone()).await?
            }
        };
        Ok(PooledConnection {
            conn: Some(conn),
            shared: Arc::clone(&self.shared),
            info: info.clone(),
            _permit: permit,
        })
    }

    /// Close and drop idle connections unused for longer than
    /// `older_than`.
    pub async fn evict_idle(&self, older_than: Duration) {
        let victims: Vec<Connection> = {
            let mut state = self.shared.state.lock().unwrap();
            let mut victims = Vec::new();
            for slot in state.endpoints.values_mut() {
                let mut kept = Vec::with_capacity(slot.idle.len());
                for entry in slot.idle.drain(..) {
                    if entry.since.elapsed() > older_than {
                        victims.push(entry.conn);
                    } else {
                        kept.push(entry);
                    }
                }
                slot.idle = kept;
            }
            victims
        };
        for mut conn in victims {
            debug!("evicting idle connection");
            conn.close().await;
        }
    }

    /// Close everything and refuse all further leases.
    pub async fn drain(&self) {
        let victims: Vec<Connection> = {
            let mut state = self.shared.state.lock().unwrap();
            state.draining = true;
            state
                .endpoints
                .values_mut()
                .flat_map(|slot| slot.idle.drain(..))
                .map(|entry| entry.conn)
                .collect()
        };
        for mut conn in victims {
            conn.close().await;
        }
    }

    /// Idle connections currently stacked for `info`.
    pub fn idle_count(&self, info: &ConnectionInfo) -> usize {
        let state = self.shared.state.lock().unwrap();
        state.endpoints.get(info).map_or(0, |slot| slot.idle.len())
    }
}

/// A leased connection. Dereferences to [`Connection`]; dropping it
/// returns a clean connection to the pool and discards anything else.
pub struct PooledConnection {
    conn: Option<Connection>,
    shared: Arc<PoolShared>,
    info: ConnectionInfo,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Take the connection out of pool management entirely. The freed
    /// capacity goes back to the endpoint immediately.
    pub fn detach(mut self) -> Connection {
        self.conn.take().expect("connection already detached")
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection already detached")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection already detached")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else { return };
        if conn.is_poolable() {
            let mut state = self.shared.state.lock().unwrap();
            if !state.draining {
                if let Some(slot) = state.endpoints.get_mut(&self.info) {
                    slot.idle.push(IdleEntry {
                        conn,
                        since: Instant::now(),
                    });
                    return;
                }
            }
        }
        // Closed, subscribed, mid-pipeline, watching, or the pool is
        // draining: dropping the halves closes the socket.
    }
}
