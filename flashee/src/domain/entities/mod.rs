//! Domain entities.
//!
//! Entities have identity and a lifecycle. Here that is the physical page
//! tracked by the logical page mapper.

mod page_state;

pub use page_state::PhysicalPageState;
