pub mod catalog;
pub mod collaborative;
pub mod content_filter;
pub mod providers;
pub mod recommendations;
pub mod sessions;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{Catalog, CatalogInfo};
pub use collaborative::{CollaborativeSession, Participant, UserStrategy};
pub use content_filter::ContentFilter;
pub use recommendations::{InitializationReport, RecommendationEngine};
pub use sessions::SessionService;
