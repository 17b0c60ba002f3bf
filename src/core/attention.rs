use crate::core::OperatorConsole;
use crate::utils::error::Result;
use std::time::Duration;

pub const EXHAUSTION_TOGGLES: u32 = 8;
pub const PAUSE_TOGGLES: u32 = 4;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

/// 閃燈 + 提示音，有限次數且同步阻塞
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionSignal {
    pub toggles: u32,
    pub interval: Duration,
    pub tone: bool,
}

impl AttentionSignal {
    pub fn new(toggles: u32, interval: Duration, tone: bool) -> Self {
        Self {
            toggles,
            interval,
            tone,
        }
    }

    pub fn exhaustion() -> Self {
        Self::new(EXHAUSTION_TOGGLES, DEFAULT_INTERVAL, true)
    }

    pub fn pause() -> Self {
        Self::new(PAUSE_TOGGLES, DEFAULT_INTERVAL, true)
    }

    pub fn emit<C: OperatorConsole>(&self, console: &mut C) -> Result<()> {
        tracing::debug!("💡 Attention signal: {} toggles", self.toggles);
        for _ in 0..self.toggles {
            let next = !console.indicator_on();
            console.set_indicator(next)?;
            // 燈亮時才播放提示音
            if next && self.tone {
                console.play_tone()?;
            }
            console.delay(self.interval);
        }
        Ok(())
    }
}

impl Default for AttentionSignal {
    fn default() -> Self {
        Self::exhaustion()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingConsole {
        light: bool,
        flips: u32,
        tones: u32,
        delays: Vec<Duration>,
    }

    impl OperatorConsole for RecordingConsole {
        fn pause(&mut self, _message: &str) -> Result<()> {
            Ok(())
        }

        fn set_indicator(&mut self, on: bool) -> Result<()> {
            self.light = on;
            self.flips += 1;
            Ok(())
        }

        fn indicator_on(&self) -> bool {
            self.light
        }

        fn play_tone(&mut self) -> Result<()> {
            self.tones += 1;
            Ok(())
        }

        fn delay(&mut self, duration: Duration) {
            self.delays.push(duration);
        }
    }

    #[test]
    fn test_exhaustion_signal_flips_eight_times() {
        let mut console = RecordingConsole {
            light: true,
            ..Default::default()
        };
        AttentionSignal::exhaustion().emit(&mut console).unwrap();

        assert_eq!(console.flips, 8);
        // 從亮燈開始，第 2、4、6、8 次切換時亮燈
        assert_eq!(console.tones, 4);
        assert_eq!(console.delays.len(), 8);
        assert!(console.light);
    }

    #[test]
    fn test_silent_signal_plays_no_tone() {
        let mut console = RecordingConsole::default();
        AttentionSignal::new(PAUSE_TOGGLES, Duration::ZERO, false)
            .emit(&mut console)
            .unwrap();

        assert_eq!(console.flips, 4);
        assert_eq!(console.tones, 0);
        assert!(!console.light);
    }
}
