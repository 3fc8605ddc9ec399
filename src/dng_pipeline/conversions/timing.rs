use std::fmt;
use std::time::{Duration, Instant};

use tracing::info;

/// The stages of one conversion, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ValidateDimensions,
    BuildNegative,
    RenderImage,
    RenderPreviews,
    WriteContainer,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::ValidateDimensions,
        Stage::BuildNegative,
        Stage::RenderImage,
        Stage::RenderPreviews,
        Stage::WriteContainer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::ValidateDimensions => "validate_dimensions",
            Stage::BuildNegative => "build_negative",
            Stage::RenderImage => "render_image",
            Stage::RenderPreviews => "render_previews",
            Stage::WriteContainer => "write_container",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wall-clock duration of each stage that ran. Skipped stages stay `None`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PipelineTimings {
    durations: [Option<Duration>; 5],
}

impl PipelineTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` as `stage` and records its duration, whether it succeeds or not.
    pub fn time<T>(&mut self, stage: Stage, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.durations[stage.index()] = Some(start.elapsed());
        out
    }

    pub fn get(&self, stage: Stage) -> Option<Duration> {
        self.durations[stage.index()]
    }

    /// Stages that ran, in execution order.
    pub fn completed(&self) -> impl Iterator<Item = (Stage, Duration)> + '_ {
        Stage::ALL
            .into_iter()
            .filter_map(|stage| self.get(stage).map(|d| (stage, d)))
    }

    pub fn total(&self) -> Duration {
        self.completed().map(|(_, d)| d).sum()
    }

    pub fn log_summary(&self) {
        let total = self.total().as_secs_f64();
        for (stage, duration) in self.completed() {
            let share = if total > 0.0 { duration.as_secs_f64() / total * 100.0 } else { 0.0 };
            info!(
                stage = stage.name(),
                ms = duration.as_secs_f64() * 1000.0,
                share = %format!("{:.1}%", share),
                "Stage timing"
            );
        }
        info!(ms = total * 1000.0, "Conversion timing");
    }
}
