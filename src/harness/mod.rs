//! The harness rule itself: lifecycle manager, builder, shutdown-time leak
//! verification and the implicit execution target test code runs against.

mod builder;
mod context;
mod fixture;
mod leak;

pub use builder::*;
pub use context::*;
pub use fixture::*;
pub use leak::LeakReport;

pub(crate) use leak::collect_shutdown_accounting;
