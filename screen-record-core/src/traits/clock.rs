/// Time sources used by the recording loop.
///
/// Encoder timestamps are on the monotonic clock; the frame-time metadata is
/// rebased onto elapsed realtime (which keeps counting during suspend) so it
/// lines up with system traces.
pub trait Clock: Send + Sync {
    fn monotonic_nanos(&self) -> i64;

    /// Time since boot including suspend.
    fn elapsed_realtime_nanos(&self) -> i64;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn monotonic_nanos(&self) -> i64 {
        platform::monotonic_nanos()
    }

    fn elapsed_realtime_nanos(&self) -> i64 {
        platform::boottime_nanos()
    }
}

#[cfg(unix)]
mod platform {
    fn clock_nanos(clock: libc::clockid_t) -> i64 {
        // SAFETY: timespec is plain data; clock_gettime only writes through the pointer.
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        if unsafe { libc::clock_gettime(clock, &mut ts) } != 0 {
            log::warn!("clock_gettime({}) failed", clock);
            return 0;
        }
        ts.tv_sec as i64 * 1_000_000_000 + ts.tv_nsec as i64
    }

    pub fn monotonic_nanos() -> i64 {
        clock_nanos(libc::CLOCK_MONOTONIC)
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn boottime_nanos() -> i64 {
        clock_nanos(libc::CLOCK_BOOTTIME)
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    pub fn boottime_nanos() -> i64 {
        monotonic_nanos()
    }
}

#[cfg(not(unix))]
mod platform {
    use std::sync::OnceLock;
    use std::time::Instant;

    fn epoch() -> Instant {
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        *EPOCH.get_or_init(Instant::now)
    }

    pub fn monotonic_nanos() -> i64 {
        epoch().elapsed().as_nanos() as i64
    }

    pub fn boottime_nanos() -> i64 {
        monotonic_nanos()
    }
}
