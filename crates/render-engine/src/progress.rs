//! Encoder progress tracking.
//!
//! ffmpeg is run with `-progress pipe:1 -nostats`, which writes blocks of
//! `key=value` lines to stdout, each block terminated by a
//! `progress=continue` or `progress=end` line. [`ProgressState`] folds
//! those lines and [`ProgressState::report`] turns the state into a
//! [`JobProgress`] snapshot once per block.

use serde::Serialize;

/// Snapshot of one running encoder job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobProgress {
    /// Completion of this job in percent, when the output duration is known.
    pub percent: Option<f64>,

    /// Output timestamp reached so far.
    pub out_time_secs: f64,

    /// Frames written so far.
    pub frames: u64,

    /// Current encoding frame rate.
    pub fps: f64,

    /// Encoding speed relative to realtime (`1.0` = realtime).
    pub speed: Option<f64>,

    /// Estimated time remaining, when the output duration is known.
    pub eta_secs: Option<f64>,
}

impl JobProgress {
    /// The report sent once a job has finished.
    pub fn finished(out_time_secs: f64) -> Self {
        Self {
            percent: Some(100.0),
            out_time_secs,
            eta_secs: Some(0.0),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProgressState {
    pub out_time_secs: f64,
    pub frames: u64,
    pub fps: f64,
    pub speed: Option<f64>,
    pub complete: bool,
}

impl ProgressState {
    pub fn update(&mut self, key: &str, value: &str) {
        let value = value.trim();
        match key.trim() {
            // `out_time_ms` is in microseconds as well (long-standing ffmpeg quirk).
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    if us >= 0.0 {
                        self.out_time_secs = us / 1_000_000.0;
                    }
                }
            }
            "out_time" => {
                if let Some(secs) = parse_timestamp(value) {
                    self.out_time_secs = secs;
                }
            }
            "frame" => {
                if let Ok(frames) = value.parse::<u64>() {
                    self.frames = frames;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse::<f64>() {
                    self.fps = fps;
                }
            }
            "speed" => {
                self.speed = value.trim_end_matches('x').trim().parse::<f64>().ok();
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }

    /// Build a progress report against the expected output duration.
    pub fn report(&self, expected_duration_secs: Option<f64>, elapsed_secs: f64) -> JobProgress {
        let fraction = expected_duration_secs
            .filter(|d| *d > 0.0)
            .map(|d| (self.out_time_secs / d).clamp(0.0, 1.0));
        let fraction = if self.complete {
            Some(1.0)
        } else {
            fraction
        };

        let eta_secs = fraction.map(|f| {
            if f > 0.0 {
                ((elapsed_secs / f) - elapsed_secs).max(0.0)
            } else {
                0.0
            }
        });

        JobProgress {
            percent: fraction.map(|f| f * 100.0),
            out_time_secs: self.out_time_secs,
            frames: self.frames,
            fps: self.fps,
            speed: self.speed,
            eta_secs,
        }
    }
}

/// Overall session percentage after `index` of `total` jobs, with the
/// current job at `job_percent`.
pub fn overall_percent(index: usize, total: usize, job_percent: Option<f64>) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let job_fraction = job_percent.unwrap_or(0.0).clamp(0.0, 100.0) / 100.0;
    (((index as f64) + job_fraction) / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Parse the input duration from an ffmpeg diagnostic line such as
/// `  Duration: 00:01:02.50, start: 0.000000, bitrate: 1205 kb/s`.
pub fn parse_stderr_duration(line: &str) -> Option<f64> {
    let rest = line.trim_start().strip_prefix("Duration:")?;
    let stamp = rest.split(',').next()?.trim();
    parse_timestamp(stamp)
}

/// Parse `HH:MM:SS(.frac)` into seconds.
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.trim().splitn(3, ':');
    let hours = parts.next()?.parse::<f64>().ok()?;
    let minutes = parts.next()?.parse::<f64>().ok()?;
    let seconds = parts.next()?.parse::<f64>().ok()?;
    if hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
