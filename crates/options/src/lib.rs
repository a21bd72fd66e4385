//! Typed option descriptors for weaver abilities.
//!
//! An ability declares its parameters as a list of [`OptionSpec`]s. Each spec
//! knows how to validate a raw [`OptionValue`], how to materialize it into a
//! concrete value (resolving symbolic generators such as `RandIP4` or
//! `RandMac` through a random draw), and which completion candidates it can
//! offer to an interactive front-end.

mod cyclic;
pub use cyclic::CyclicPrng;

pub mod draw;

mod error;
pub use error::OptionError;

mod kinds;
pub use kinds::{OptionSpec, PathConstraints};

mod sequence;
pub use sequence::{PrefixCursor, Resolved};

mod value;
pub use value::{Callback, OptionValue};
