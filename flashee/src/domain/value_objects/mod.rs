//! Value objects for the domain layer.
//!
//! Value objects are immutable, validated data types describing the on-flash
//! encodings and the configuration of the adapters.

mod exclude_region;
mod mapper_config;
mod page_header;
pub mod slot;

pub use exclude_region::ExcludeRegion;
pub use mapper_config::{DEFAULT_SEED, MapperConfig};
pub use page_header::{HEADER_SIZE, HeaderState, MAX_LOGICAL_PAGES, PageHeader};
