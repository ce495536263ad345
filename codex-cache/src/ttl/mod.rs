//! TTL selection: duration strings and the artifact-type registry

mod duration;
mod registry;

pub use duration::{format_ttl, parse_ttl, DAY, HOUR, MINUTE, WEEK};
pub use registry::{builtin_types, ArtifactType, TypeRegistry};
