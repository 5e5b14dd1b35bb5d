//! jog-core: shared scrub types and math
//!
//! Frame-domain <-> sample-domain conversions used by the scrub controller,
//! plus the small value types shared across the workspace.

mod time;

pub use time::*;
