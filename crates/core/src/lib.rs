//! `sitestock-core`: domain foundation building blocks.
//!
//! Pure types only: identifiers, the domain error taxonomy, aggregate traits
//! and paging. No IO.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod page;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AuditId, CategoryId, EntryId, ItemId, LocationId, ProjectId, UserId};
pub use page::{Page, PageWindow};
