//! Response caching for provider completions.

pub mod response_cache;
