//! The `base` ability package: frame capture, raw injection, prefix
//! demultiplexing, netfilter drop rules and the MITM pipeline orchestrator,
//! plus the bridge/firewall system helpers they build on.

pub mod netcfg;

mod capture;
pub use capture::Capture;

mod demux;
pub use demux::Demux;

mod mitm;
pub use mitm::Mitm;

mod netfilter;
pub use netfilter::NetfilterConfig;

mod sendraw;
pub use sendraw::SendRaw;

use weaver_ability::AbilityType;
use weaver_registry::{AbilityDecl, Package};

/// The exported-ability registry of the `base` package.
pub fn package() -> Package {
    Package::new("base", || {
        vec![
            AbilityDecl {
                name: "Sniff Frames",
                kind: AbilityType::Component,
                build: || Box::new(Capture),
            },
            AbilityDecl {
                name: "Send Raw Frames",
                kind: AbilityType::Component,
                build: || Box::new(SendRaw),
            },
            AbilityDecl {
                name: "Demux",
                kind: AbilityType::Component,
                build: || Box::new(Demux),
            },
            AbilityDecl {
                name: "Netfilter Config",
                kind: AbilityType::Component,
                build: || Box::new(NetfilterConfig),
            },
            AbilityDecl {
                name: "Message Interceptor",
                kind: AbilityType::Component,
                build: || Box::new(Mitm),
            },
        ]
    })
}
