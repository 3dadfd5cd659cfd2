//! Level progression rules
//!
//! A learner's level is a pure function of cumulative XP. The completion
//! transaction recomputes it after every XP credit through the injected
//! [`LevelProgression`].

/// XP required per level when no setting overrides it
pub const DEFAULT_XP_PER_LEVEL: i64 = 100;

/// Maps cumulative XP to a level
pub trait LevelProgression: Send + Sync {
    fn level_for(&self, xp: i64) -> i64;
}

/// One level per `xp_per_level` XP, starting at level 1 with 0 XP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearProgression {
    xp_per_level: i64,
}

impl LinearProgression {
    /// Non-positive values fall back to [`DEFAULT_XP_PER_LEVEL`]
    pub fn new(xp_per_level: i64) -> Self {
        let xp_per_level = if xp_per_level > 0 {
            xp_per_level
        } else {
            tracing::warn!(
                xp_per_level,
                "Invalid xp_per_level, using default {}",
                DEFAULT_XP_PER_LEVEL
            );
            DEFAULT_XP_PER_LEVEL
        };
        Self { xp_per_level }
    }

    pub fn xp_per_level(&self) -> i64 {
        self.xp_per_level
    }
}

impl Default for LinearProgression {
    fn default() -> Self {
        Self::new(DEFAULT_XP_PER_LEVEL)
    }
}

impl LevelProgression for LinearProgression {
    fn level_for(&self, xp: i64) -> i64 {
        1 + xp.max(0) / self.xp_per_level
    }
}
