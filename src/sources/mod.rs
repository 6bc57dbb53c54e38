// Content sources — the platforms competitor content is fetched from.
//
// Each client implements the `SourceClient` capability. The rate-limit
// guard wraps whichever client a run uses, so pacing and retries are the
// same no matter which platform is behind it.

pub mod fixture;
pub mod http;
pub mod instagram;
pub mod rate_limit;
pub mod traits;
pub mod youtube;
