//! Actions that mutate the filesystem based on the index.
//!
//! Resolution is the only action family: given a duplicate group, keep
//! a canonical copy and quarantine or delete the rest, removing the
//! affected records from the store in the same logical step.

mod resolve;

pub use resolve::{
    CanonicalPolicy, ResolutionEngine, ResolveError, ResolveOutcome, ResolvedFile, ShortestPath,
};
