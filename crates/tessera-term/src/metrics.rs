// SPDX-License-Identifier: MIT
//
// Render metrics: passive counters fed by the frame lifecycle.
//
// `Terminal::end_frame` records one `FrameSample` per rendered frame and
// bumps the skipped counter for frames that drew nothing. Recording is off
// unless the terminal enables it. Counters sit behind their own `RwLock`,
// separate from the render state, so a query holds the lock only for the
// copy into a `MetricsSnapshot`.

use std::time::Duration;

use parking_lot::RwLock;

/// Cost of one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameSample {
    pub duration: Duration,
    pub cells: u64,
    pub escape_codes: u64,
    pub bytes: u64,
    pub dirty_area: u64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Frames that produced output.
    pub frames: u64,
    /// Frames skipped because nothing was dirty.
    pub skipped_frames: u64,
    pub cells: u64,
    pub escape_codes: u64,
    pub bytes: u64,
    /// Cumulative render time of non-skipped frames.
    pub total_time: Duration,
    pub min_frame_time: Option<Duration>,
    pub max_frame_time: Option<Duration>,
    pub last_frame_time: Option<Duration>,
    pub total_dirty_area: u64,
    pub max_dirty_area: u64,
}

impl MetricsSnapshot {
    /// Rendered plus skipped frames.
    #[must_use]
    pub const fn total_frames(&self) -> u64 {
        self.frames + self.skipped_frames
    }

    #[must_use]
    pub fn avg_frame_time(&self) -> Duration {
        if self.frames == 0 {
            return Duration::ZERO;
        }
        self.total_time / u32::try_from(self.frames).unwrap_or(u32::MAX)
    }

    /// Rendered frames per second of cumulative render time.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fps(&self) -> f64 {
        let secs = self.total_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.frames as f64 / secs
        }
    }

    /// Percentage (0–100) of frames skipped for having no changes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn efficiency(&self) -> f64 {
        let total = self.total_frames();
        if total == 0 {
            0.0
        } else {
            self.skipped_frames as f64 * 100.0 / total as f64
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_cells_per_frame(&self) -> f64 {
        per_frame(self.cells, self.frames)
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_escape_codes_per_frame(&self) -> f64 {
        per_frame(self.escape_codes, self.frames)
    }

    #[must_use]
    pub fn avg_bytes_per_frame(&self) -> f64 {
        per_frame(self.bytes, self.frames)
    }

    #[must_use]
    pub fn avg_dirty_area(&self) -> f64 {
        per_frame(self.total_dirty_area, self.frames)
    }
}

#[allow(clippy::cast_precision_loss)]
fn per_frame(total: u64, frames: u64) -> f64 {
    if frames == 0 {
        0.0
    } else {
        total as f64 / frames as f64
    }
}

// ─── RenderMetrics ───────────────────────────────────────────────────────────

/// Thread-safe accumulator of frame costs.
#[derive(Debug, Default)]
pub struct RenderMetrics {
    inner: RwLock<MetricsSnapshot>,
}

impl RenderMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&self, sample: FrameSample) {
        let mut m = self.inner.write();
        m.frames += 1;
        m.cells += sample.cells;
        m.escape_codes += sample.escape_codes;
        m.bytes += sample.bytes;
        m.total_time += sample.duration;
        m.min_frame_time = Some(m.min_frame_time.map_or(sample.duration, |d| d.min(sample.duration)));
        m.max_frame_time = Some(m.max_frame_time.map_or(sample.duration, |d| d.max(sample.duration)));
        m.last_frame_time = Some(sample.duration);
        m.total_dirty_area += sample.dirty_area;
        m.max_dirty_area = m.max_dirty_area.max(sample.dirty_area);
    }

    pub fn record_skipped(&self) {
        self.inner.write().skipped_frames += 1;
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        *self.inner.read()
    }

    pub fn reset(&self) {
        *self.inner.write() = MetricsSnapshot::default();
    }

    #[must_use]
    pub fn avg_frame_time(&self) -> Duration {
        self.inner.read().avg_frame_time()
    }

    #[must_use]
    pub fn min_frame_time(&self) -> Duration {
        self.inner.read().min_frame_time.unwrap_or_default()
    }

    #[must_use]
    pub fn max_frame_time(&self) -> Duration {
        self.inner.read().max_frame_time.unwrap_or_default()
    }

    #[must_use]
    pub fn last_frame_time(&self) -> Duration {
        self.inner.read().last_frame_time.unwrap_or_default()
    }

    #[must_use]
    pub fn fps(&self) -> f64 {
        self.inner.read().fps()
    }

    /// Percentage of frames skipped. See [`MetricsSnapshot::efficiency`].
    #[must_use]
    pub fn efficiency(&self) -> f64 {
        self.inner.read().efficiency()
    }
}
