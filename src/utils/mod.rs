pub mod fallback;

pub use fallback::{first_success_or, resolve_with_fallback, with_deadline, FallbackConfig, Resolved, Strategy};
