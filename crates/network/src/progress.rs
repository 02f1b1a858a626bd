//! Download progress tracking

use std::time::{Duration, Instant};

/// Download progress information
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    /// Total bytes to download (if known)
    pub total_bytes: Option<u64>,
    /// Bytes downloaded so far
    pub downloaded_bytes: u64,
    /// Download speed in bytes per second
    pub bytes_per_second: f64,
    /// Estimated time remaining
    pub estimated_remaining: Option<Duration>,
    start_time: Instant,
}

impl DownloadProgress {
    /// Creates a new progress tracker
    pub fn new(total_bytes: Option<u64>) -> Self {
        Self {
            total_bytes,
            downloaded_bytes: 0,
            bytes_per_second: 0.0,
            estimated_remaining: None,
            start_time: Instant::now(),
        }
    }

    /// Moves progress forward to `bytes_done`
    ///
    /// Returns false, leaving the progress untouched, unless `bytes_done` is
    /// strictly greater than the current count.
    pub fn advance_to(&mut self, bytes_done: u64, total_bytes: Option<u64>) -> bool {
        if bytes_done <= self.downloaded_bytes {
            return false;
        }

        self.downloaded_bytes = bytes_done;
        if total_bytes.is_some() {
            self.total_bytes = total_bytes;
        }

        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.bytes_per_second = self.downloaded_bytes as f64 / elapsed;
        }

        if let Some(total) = self.total_bytes {
            if self.bytes_per_second > 0.0 {
                let remaining_bytes = total.saturating_sub(self.downloaded_bytes);
                let seconds_remaining = remaining_bytes as f64 / self.bytes_per_second;
                self.estimated_remaining = Some(Duration::from_secs_f64(seconds_remaining));
            }
        }
        true
    }

    /// Returns progress as a fraction in `[0, 1]`
    pub fn fraction(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                1.0
            } else {
                (self.downloaded_bytes as f64 / total as f64).min(1.0)
            }
        })
    }

    /// Returns progress as a percentage (0-100)
    pub fn percentage(&self) -> Option<f64> {
        self.fraction().map(|f| f * 100.0)
    }

    /// Returns download speed in MB/s
    pub fn speed_mbps(&self) -> f64 {
        self.bytes_per_second / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_new() {
        let progress = DownloadProgress::new(Some(1000));
        assert_eq!(progress.total_bytes, Some(1000));
        assert_eq!(progress.downloaded_bytes, 0);
        assert_eq!(progress.speed_mbps(), 0.0);
    }

    #[test]
    fn test_progress_percentage() {
        let mut progress = DownloadProgress::new(Some(1000));
        assert_eq!(progress.percentage(), Some(0.0));

        assert!(progress.advance_to(500, None));
        assert_eq!(progress.percentage(), Some(50.0));

        assert!(progress.advance_to(1000, None));
        assert_eq!(progress.fraction(), Some(1.0));
    }

    #[test]
    fn test_progress_never_moves_backwards() {
        let mut progress = DownloadProgress::new(None);
        assert!(progress.advance_to(300, Some(1000)));
        assert!(!progress.advance_to(300, Some(1000)));
        assert!(!progress.advance_to(100, Some(1000)));
        assert_eq!(progress.downloaded_bytes, 300);
        assert_eq!(progress.total_bytes, Some(1000));
    }

    #[test]
    fn test_progress_unknown_size() {
        let progress = DownloadProgress::new(None);
        assert_eq!(progress.percentage(), None);
        assert_eq!(progress.estimated_remaining, None);
    }

    #[test]
    fn test_speed_calculation() {
        let mut progress = DownloadProgress::new(Some(1000));
        std::thread::sleep(Duration::from_millis(10));
        progress.advance_to(1000, None);

        assert!(progress.bytes_per_second > 0.0);
        assert!(progress.speed_mbps() > 0.0);
        assert_eq!(progress.estimated_remaining, Some(Duration::ZERO));
    }

    #[test]
    fn test_progress_zero_total() {
        let progress = DownloadProgress::new(Some(0));
        assert_eq!(progress.percentage(), Some(100.0));
    }
}
