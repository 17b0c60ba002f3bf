use crate::core::OperatorConsole;
use crate::utils::error::{ProtocolError, Result};
use std::io::{BufRead, Write};
use std::process::{Command, Stdio};
use std::time::Duration;

/// 以外部播放器播放提示音 (預設 `mpg123 -q <file>`)
#[derive(Debug, Clone, PartialEq)]
pub struct ToneCommand {
    pub player: String,
    pub file: String,
}

impl ToneCommand {
    pub fn new(player: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            player: player.into(),
            file: file.into(),
        }
    }

    fn play(&self) -> Result<()> {
        let status = Command::new(&self.player)
            .arg("-q")
            .arg(&self.file)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| ProtocolError::AudioError {
                message: format!("failed to start {}: {}", self.player, e),
            })?;

        if !status.success() {
            return Err(ProtocolError::AudioError {
                message: format!("{} exited with {}", self.player, status),
            });
        }
        Ok(())
    }
}

/// 終端機操作介面：暫停時等待 Enter，指示燈狀態寫入日誌
pub struct TerminalConsole {
    input: Box<dyn BufRead>,
    auto_ack: bool,
    indicator: bool,
    tone: Option<ToneCommand>,
    sleep: bool,
}

impl TerminalConsole {
    pub fn new(auto_ack: bool) -> Self {
        Self::with_input(Box::new(std::io::BufReader::new(std::io::stdin())), auto_ack)
    }

    pub fn with_input(input: Box<dyn BufRead>, auto_ack: bool) -> Self {
        Self {
            input,
            auto_ack,
            indicator: false,
            tone: None,
            sleep: true,
        }
    }

    pub fn with_tone(mut self, tone: Option<ToneCommand>) -> Self {
        self.tone = tone;
        self
    }

    /// 關閉實際等待，模擬執行時使用
    pub fn without_sleep(mut self) -> Self {
        self.sleep = false;
        self
    }
}

impl OperatorConsole for TerminalConsole {
    fn pause(&mut self, message: &str) -> Result<()> {
        tracing::info!("⏸️ Paused: {}", message);
        if self.auto_ack {
            tracing::info!("▶️ Auto-acknowledged");
            return Ok(());
        }

        let mut stdout = std::io::stdout();
        writeln!(stdout, "⏸️  {}", message)?;
        write!(stdout, "Press Enter to continue... ")?;
        stdout.flush()?;

        let mut line = String::new();
        // 沒有逾時；輸入關閉代表無人可確認，整個執行中止
        if self.input.read_line(&mut line)? == 0 {
            return Err(ProtocolError::IoError(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "operator input closed while waiting for acknowledgement",
            )));
        }
        tracing::info!("▶️ Resumed by operator");
        Ok(())
    }

    fn set_indicator(&mut self, on: bool) -> Result<()> {
        tracing::debug!("💡 Indicator {}", if on { "on" } else { "off" });
        self.indicator = on;
        Ok(())
    }

    fn indicator_on(&self) -> bool {
        self.indicator
    }

    fn play_tone(&mut self) -> Result<()> {
        match &self.tone {
            Some(tone) => tone.play(),
            None => {
                tracing::debug!("🔔 Tone");
                Ok(())
            }
        }
    }

    fn delay(&mut self, duration: Duration) {
        if self.sleep {
            std::thread::sleep(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_pause_waits_for_a_line() {
        let mut console = TerminalConsole::with_input(Box::new(Cursor::new("\n")), false);
        assert!(console.pause("Replace empty tip racks").is_ok());
    }

    #[test]
    fn test_closed_input_aborts() {
        let mut console = TerminalConsole::with_input(Box::new(Cursor::new("")), false);
        assert!(matches!(
            console.pause("Replace empty tip racks"),
            Err(ProtocolError::IoError(_))
        ));
    }

    #[test]
    fn test_auto_ack_does_not_read_input() {
        let mut console = TerminalConsole::with_input(Box::new(Cursor::new("")), true);
        assert!(console.pause("Transfer plate").is_ok());
    }

    #[test]
    fn test_missing_player_is_an_audio_error() {
        let mut console = TerminalConsole::with_input(Box::new(Cursor::new("")), true)
            .with_tone(Some(ToneCommand::new(
                "libprep-no-such-player",
                "reminder_tone.mp3",
            )));
        assert!(matches!(
            console.play_tone(),
            Err(ProtocolError::AudioError { .. })
        ));
    }
}
