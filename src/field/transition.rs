//! Timed blend between two wave component sets.

use super::waves::WaveComponent;

/// The field evaluates `(1 - b) · f(current) + b · f(target)` while a
/// transition runs; `b` ramps linearly from 0 to 1.
#[derive(Debug, Clone)]
pub struct WaveTransition {
    current: Vec<WaveComponent>,
    target: Option<Vec<WaveComponent>>,
    elapsed_s: f32,
    duration_s: f32,
}

impl WaveTransition {
    pub fn new(initial: Vec<WaveComponent>) -> Self {
        Self {
            current: initial,
            target: None,
            elapsed_s: 0.0,
            duration_s: 0.0,
        }
    }

    /// Start blending toward `target`. An unfinished transition snaps to
    /// its target first.
    pub fn begin(&mut self, target: Vec<WaveComponent>, duration_s: f32) {
        if let Some(pending) = self.target.take() {
            self.current = pending;
        }
        if duration_s <= 0.0 {
            self.current = target;
            return;
        }
        self.target = Some(target);
        self.elapsed_s = 0.0;
        self.duration_s = duration_s;
    }

    /// Advance by `dt` seconds and return the blend factor
    pub fn advance(&mut self, dt: f32) -> f32 {
        if self.target.is_none() {
            return 0.0;
        }
        self.elapsed_s += dt.max(0.0);
        if self.elapsed_s >= self.duration_s {
            if let Some(target) = self.target.take() {
                self.current = target;
            }
            return 0.0;
        }
        self.blend()
    }

    pub fn blend(&self) -> f32 {
        match self.target {
            Some(_) => (self.elapsed_s / self.duration_s).clamp(0.0, 1.0),
            None => 0.0,
        }
    }

    pub fn current(&self) -> &[WaveComponent] {
        &self.current
    }

    /// Blend target; equals `current` when idle
    pub fn target(&self) -> &[WaveComponent] {
        self.target.as_deref().unwrap_or(&self.current)
    }

    pub fn is_active(&self) -> bool {
        self.target.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn set(amplitude: f32) -> Vec<WaveComponent> {
        vec![WaveComponent::new(amplitude, 1, 2, 3)]
    }

    #[test]
    fn test_blend_ramps_then_completes() {
        let mut t = WaveTransition::new(set(1.0));
        t.begin(set(2.0), 1.0);
        assert!(t.is_active());
        assert_abs_diff_eq!(t.advance(0.25), 0.25);
        assert_abs_diff_eq!(t.advance(0.5), 0.75);
        assert_eq!(t.advance(0.5), 0.0);
        assert!(!t.is_active());
        assert_eq!(t.current(), set(2.0).as_slice());
        assert_eq!(t.target(), t.current());
    }

    #[test]
    fn test_zero_duration_switches_immediately() {
        let mut t = WaveTransition::new(set(1.0));
        t.begin(set(3.0), 0.0);
        assert!(!t.is_active());
        assert_eq!(t.current()[0].amplitude, 3.0);
    }

    #[test]
    fn test_interrupted_transition_snaps_forward() {
        let mut t = WaveTransition::new(set(1.0));
        t.begin(set(2.0), 1.0);
        t.advance(0.5);
        t.begin(set(3.0), 1.0);
        assert_eq!(t.current()[0].amplitude, 2.0);
        assert_eq!(t.target()[0].amplitude, 3.0);
        assert_eq!(t.blend(), 0.0);
    }

    #[test]
    fn test_frozen_clock_holds_blend() {
        let mut t = WaveTransition::new(set(1.0));
        t.begin(set(2.0), 1.0);
        t.advance(0.4);
        assert_abs_diff_eq!(t.advance(0.0), 0.4);
    }
}
