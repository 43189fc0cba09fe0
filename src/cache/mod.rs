//! Content-addressed response cache
//!
//! Responses are stored in generations named after the manifest they were
//! verified against. Nothing enters a generation without passing its
//! digest check, and a generation is only activated once every manifest
//! entry is present.
//!
//! # Storage Backends
//!
//! | Backend | Persistence | Use |
//! |---------|-------------|-----|
//! | `MemoryCacheStorage` | process lifetime | tests, embedding |
//! | `DiskCacheStorage` | state directory | CLI |

pub mod disk;
pub mod fetcher;
pub mod generation;
pub mod memory;
pub mod storage;

pub use disk::DiskCacheStorage;
pub use fetcher::{fallback_url, VerifiedFetcher};
pub use generation::{GenerationManager, PrecacheReport, DEFAULT_PREFIX};
pub use memory::MemoryCacheStorage;
pub use storage::CacheStorage;
