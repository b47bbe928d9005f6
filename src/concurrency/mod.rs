//! Synchronization primitives shared by the repositories and the index cache

mod rwlock;

pub use rwlock::{LockState, ReadGuard, RwLock, WriteGuard};
