// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "sync/mod.rs"]
pub mod sync;
