//! Linux bridge and netfilter plumbing used by the interception abilities.

pub mod bridge;
pub mod netfilter;
