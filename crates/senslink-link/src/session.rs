//! State shared between the foreground link handle and the reader thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use senslink_frame::ReassemblerStats;
use serde::Serialize;

/// Session flags read by the reader thread on every frame.
///
/// `debug` is written by the foreground. `recording` is written only by the
/// reader thread when it attaches or detaches a sink, so it always reflects
/// whether samples are actually being appended.
#[derive(Debug, Default)]
pub struct SessionFlags {
    recording: AtomicBool,
    debug: AtomicBool,
}

impl SessionFlags {
    pub fn new(debug: bool) -> Self {
        Self {
            recording: AtomicBool::new(false),
            debug: AtomicBool::new(debug),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    pub(crate) fn set_recording(&self, on: bool) {
        self.recording.store(on, Ordering::Release);
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn set_debug(&self, on: bool) {
        self.debug.store(on, Ordering::Relaxed);
    }

    /// Flip the debug flag and return the new value.
    pub fn toggle_debug(&self) -> bool {
        !self.debug.fetch_xor(true, Ordering::Relaxed)
    }
}

/// Link counters, updated by both contexts.
#[derive(Debug, Default)]
pub struct LinkStats {
    frames_received: AtomicU64,
    bytes_discarded: AtomicU64,
    checksum_failures: AtomicU64,
    unknown_types: AtomicU64,
    protocol_violations: AtomicU64,
    sink_errors: AtomicU64,
    samples_recorded: AtomicU64,
    frames_sent: AtomicU64,
}

impl LinkStats {
    /// Publish the reassembler's running totals.
    pub(crate) fn publish_framing(&self, stats: ReassemblerStats) {
        self.frames_received.store(stats.frames, Ordering::Relaxed);
        self.bytes_discarded
            .store(stats.discarded_bytes, Ordering::Relaxed);
        self.checksum_failures
            .store(stats.checksum_failures, Ordering::Relaxed);
        self.unknown_types
            .store(stats.unknown_types, Ordering::Relaxed);
    }

    pub(crate) fn protocol_violation(&self) {
        self.protocol_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sink_error(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sample_recorded(&self) {
        self.samples_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_discarded: self.bytes_discarded.load(Ordering::Relaxed),
            checksum_failures: self.checksum_failures.load(Ordering::Relaxed),
            unknown_types: self.unknown_types.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            samples_recorded: self.samples_recorded.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`LinkStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames_received: u64,
    pub bytes_discarded: u64,
    pub checksum_failures: u64,
    pub unknown_types: u64,
    pub protocol_violations: u64,
    pub sink_errors: u64,
    pub samples_recorded: u64,
    pub frames_sent: u64,
}
