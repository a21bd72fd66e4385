use std::net::IpAddr;

use ipnet::IpNet;

use crate::{CyclicPrng, OptionValue};

/// Permuted enumeration is backed by a prime-field walk whose setup
/// factorizes `p - 1` by trial division; keep that tractable.
const MAX_PERMUTED: u128 = 1 << 32;

/// The outcome of interpreting a raw option value.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// A single concrete value.
    Value(OptionValue),
    /// A lazy sequence of values (prefix scans).
    Sequence(PrefixCursor),
}

/// Lazy enumeration of the usable addresses of a CIDR prefix.
///
/// IPv4 prefixes exclude the network and broadcast addresses; IPv6 prefixes
/// exclude only the network address. Enumeration is either ascending or a
/// cyclic permutation drawn from [`CyclicPrng`].
#[derive(Debug, Clone)]
pub struct PrefixCursor {
    net: IpNet,
    count: u128,
    mode: Mode,
}

#[derive(Debug, Clone)]
enum Mode {
    Ordered { next: u128 },
    Permuted(CyclicPrng),
}

fn usable_count(net: &IpNet) -> u128 {
    match net {
        IpNet::V4(n) => {
            let size = 1u128 << (32 - n.prefix_len());
            size.saturating_sub(2)
        }
        IpNet::V6(n) => {
            if n.prefix_len() == 0 {
                u128::MAX
            } else {
                (1u128 << (128 - n.prefix_len())) - 1
            }
        }
    }
}

impl PrefixCursor {
    /// Builds a cursor over `net`, ascending when `ordered`, permuted
    /// otherwise. Prefixes too large to permute fall back to ascending.
    pub fn new(net: IpNet, ordered: bool) -> Self {
        let count = usable_count(&net);
        let mode = if ordered || count >= MAX_PERMUTED {
            Mode::Ordered { next: 1 }
        } else {
            Mode::Permuted(CyclicPrng::new(count as u64))
        };
        Self { net, count, mode }
    }

    /// Number of addresses the full enumeration visits.
    pub fn len(&self) -> u128 {
        self.count
    }

    /// True when the enumeration is empty from the start.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn nth_address(&self, n: u128) -> IpAddr {
        match self.net {
            IpNet::V4(net) => {
                let base = u32::from(net.network());
                IpAddr::V4((base + n as u32).into())
            }
            IpNet::V6(net) => {
                let base = u128::from(net.network());
                IpAddr::V6((base + n).into())
            }
        }
    }
}

impl Iterator for PrefixCursor {
    type Item = IpAddr;

    fn next(&mut self) -> Option<IpAddr> {
        let idx = match &mut self.mode {
            Mode::Ordered { next } => {
                if *next > self.count {
                    return None;
                }
                let idx = *next;
                *next += 1;
                idx
            }
            Mode::Permuted(prng) => prng.next()? as u128,
        };
        Some(self.nth_address(idx))
    }
}
