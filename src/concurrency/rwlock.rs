//! Writer-priority reader/writer lock
//!
//! Any number of readers may hold the lock at once, writers are exclusive.
//! As soon as a writer starts waiting, new readers queue behind it, so a
//! steady stream of readers cannot starve writers. The flip side is that
//! sustained writer traffic can starve readers.
//!
//! The lock is not re-entrant: a thread that already holds it (in either
//! mode) and tries to acquire it again will deadlock.

use parking_lot::{Condvar, Mutex, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LockState {
    /// Readers currently holding the lock
    pub readers: usize,
    /// Whether a writer currently holds the lock
    pub writer_active: bool,
    /// Writers blocked in `write()`
    pub writers_waiting: usize,
    /// Readers blocked in `read()`
    pub readers_waiting: usize,
}

/// Admission control: decides who may touch the data and in what order
struct Gate {
    state: Mutex<LockState>,
    readers_ok: Condvar,
    writers_ok: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            readers_ok: Condvar::new(),
            writers_ok: Condvar::new(),
        }
    }

    fn acquire_read(&self) {
        let mut state = self.state.lock();
        state.readers_waiting += 1;
        while state.writer_active || state.writers_waiting > 0 {
            self.readers_ok.wait(&mut state);
        }
        state.readers_waiting -= 1;
        state.readers += 1;
    }

    fn release_read(&self) {
        let mut state = self.state.lock();
        state.readers -= 1;
        if state.readers == 0 {
            self.writers_ok.notify_one();
        }
    }

    fn acquire_write(&self) {
        let mut state = self.state.lock();
        // Registered before blocking so that later readers queue behind us.
        state.writers_waiting += 1;
        while state.readers > 0 || state.writer_active {
            self.writers_ok.wait(&mut state);
        }
        state.writers_waiting -= 1;
        state.writer_active = true;
    }

    fn release_write(&self) {
        let mut state = self.state.lock();
        state.writer_active = false;
        if state.writers_waiting > 0 {
            self.writers_ok.notify_one();
        } else {
            self.readers_ok.notify_all();
        }
    }
}

/// Writer-priority lock around `T`.
///
/// The gate orders callers; the inner `parking_lot::RwLock` is only taken
/// after the gate admits a caller, so it is never contended.
pub struct RwLock<T: ?Sized> {
    gate: Gate,
    data: parking_lot::RwLock<T>,
}

impl<T> RwLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            gate: Gate::new(),
            data: parking_lot::RwLock::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> RwLock<T> {
    /// Acquire shared access, blocking while a writer holds or awaits the lock.
    pub fn read(&self) -> ReadGuard<'_, T> {
        self.gate.acquire_read();
        let permit = ReadPermit { gate: &self.gate };
        ReadGuard {
            data: self.data.read(),
            _permit: permit,
        }
    }

    /// Acquire exclusive access, blocking while any reader or writer is active.
    pub fn write(&self) -> WriteGuard<'_, T> {
        self.gate.acquire_write();
        let permit = WritePermit { gate: &self.gate };
        WriteGuard {
            data: self.data.write(),
            _permit: permit,
        }
    }

    /// Mutable access without locking, statically exclusive.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Snapshot of the lock bookkeeping, for diagnostics and tests.
    pub fn state(&self) -> LockState {
        *self.gate.state.lock()
    }
}

impl<T: Default> Default for RwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for RwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RwLock")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

struct ReadPermit<'a> {
    gate: &'a Gate,
}

impl Drop for ReadPermit<'_> {
    fn drop(&mut self) {
        self.gate.release_read();
    }
}

struct WritePermit<'a> {
    gate: &'a Gate,
}

impl Drop for WritePermit<'_> {
    fn drop(&mut self) {
        self.gate.release_write();
    }
}

/// Shared access; releases the read lock on drop, including during unwinding.
///
/// Fields drop in order: the data guard goes before the gate is released.
pub struct ReadGuard<'a, T: ?Sized> {
    data: RwLockReadGuard<'a, T>,
    _permit: ReadPermit<'a>,
}

impl<T: ?Sized> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

/// Exclusive access; releases the write lock on drop, including during unwinding.
pub struct WriteGuard<'a, T: ?Sized> {
    data: RwLockWriteGuard<'a, T>,
    _permit: WritePermit<'a>,
}

impl<T: ?Sized> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T: ?Sized> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}
