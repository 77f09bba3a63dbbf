pub mod community_service;
pub mod profile_service;

// Re-export services for convenience
pub use community_service::{hydrate_authors, CommunityService};
pub use profile_service::ProfileService;
