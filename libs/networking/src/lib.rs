//! Networking utilities for sealink.
//!
//! This library provides helpers for:
//! - Probing whether a local TCP address is free
//! - Allocating ephemeral local addresses for node inlets and listeners
//!
//! Nothing here reserves an address. A probe binds and immediately releases,
//! so another process can take the address before the node binds it. Callers
//! treat a node's own bind failure as a retryable allocation error.

use std::collections::VecDeque;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

/// Networking errors.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The address does not resolve to a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Binding the probe socket failed for a reason other than the address
    /// being in use.
    #[error("failed to probe {address}: {source}")]
    Probe {
        address: String,
        #[source]
        source: io::Error,
    },

    /// No distinct free address could be found.
    #[error("no free address available on {0}")]
    Exhausted(String),
}

// ============================================================================
// Probing
// ============================================================================

/// Result of probing an address. Holds nothing open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortLease {
    /// The probed address.
    pub address: SocketAddr,

    /// Whether the address could be bound at probe time.
    pub was_free: bool,
}

/// Probe `address` (`host:port`) by binding it and releasing it immediately.
///
/// An address already in use, or one this process lacks permission to bind,
/// is reported as not free. Addresses that do not resolve are an error.
pub fn probe(address: &str) -> Result<PortLease, NetworkError> {
    let resolved = address
        .to_socket_addrs()
        .map_err(|_| NetworkError::InvalidAddress(address.to_string()))?
        .next()
        .ok_or_else(|| NetworkError::InvalidAddress(address.to_string()))?;

    let was_free = match TcpListener::bind(resolved) {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::AddrInUse | io::ErrorKind::PermissionDenied
            ) =>
        {
            false
        }
        Err(e) if e.kind() == io::ErrorKind::AddrNotAvailable => {
            return Err(NetworkError::InvalidAddress(address.to_string()));
        }
        Err(source) => {
            return Err(NetworkError::Probe {
                address: address.to_string(),
                source,
            });
        }
    };

    debug!(address = %resolved, was_free, "Probed local address");
    Ok(PortLease {
        address: resolved,
        was_free,
    })
}

/// Returns true if `address` cannot be bound right now.
///
/// Any probe failure counts as taken.
pub fn is_taken(address: &str) -> bool {
    !probe(address).map(|lease| lease.was_free).unwrap_or(false)
}

// ============================================================================
// Allocation
// ============================================================================

/// Number of recent allocations remembered to avoid handing out a port twice.
pub const RECENT_WINDOW: usize = 64;

/// Attempts per allocation before giving up.
pub const MAX_ATTEMPTS: usize = 16;

/// Ephemeral local address allocator.
///
/// Asks the OS for a free port by binding port 0, then releases it. Ports
/// handed out recently are skipped so sequential allocations stay distinct
/// even if the OS recycles an ephemeral port before the node binds it.
#[derive(Debug)]
pub struct AddressAllocator {
    /// Host to allocate on.
    host: IpAddr,

    /// Recently allocated ports, oldest first.
    recent: Mutex<VecDeque<u16>>,
}

impl AddressAllocator {
    /// Create an allocator for the given host.
    pub fn new(host: IpAddr) -> Self {
        Self {
            host,
            recent: Mutex::new(VecDeque::with_capacity(RECENT_WINDOW)),
        }
    }

    /// Create an allocator for `127.0.0.1`.
    pub fn localhost() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    /// Get the host being allocated on.
    pub fn host(&self) -> IpAddr {
        self.host
    }

    /// Find an address that is free at the instant of the call.
    pub fn find_free(&self) -> Result<SocketAddr, NetworkError> {
        for _ in 0..MAX_ATTEMPTS {
            let listener = TcpListener::bind(SocketAddr::new(self.host, 0)).map_err(|source| {
                NetworkError::Probe {
                    address: format!("{}:0", self.host),
                    source,
                }
            })?;
            let address = listener.local_addr().map_err(|source| NetworkError::Probe {
                address: format!("{}:0", self.host),
                source,
            })?;
            drop(listener);

            if self.remember(address.port()) {
                debug!(address = %address, "Allocated free local address");
                return Ok(address);
            }

            debug!(port = address.port(), "OS returned a recently allocated port, retrying");
        }

        Err(NetworkError::Exhausted(self.host.to_string()))
    }

    /// Probe an explicit address.
    pub fn probe(&self, address: &str) -> Result<PortLease, NetworkError> {
        probe(address)
    }

    /// Returns true if `address` cannot be bound right now.
    pub fn is_taken(&self, address: &str) -> bool {
        is_taken(address)
    }

    /// Record a port; returns false if it was handed out recently.
    fn remember(&self, port: u16) -> bool {
        let mut recent = self
            .recent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if recent.contains(&port) {
            return false;
        }

        if recent.len() == RECENT_WINDOW {
            recent.pop_front();
        }
        recent.push_back(port);
        true
    }
}

impl Default for AddressAllocator {
    fn default() -> Self {
        Self::localhost()
    }
}
