use std::io::{self, BufRead, StdinLock, Stdout, Write};

use light_control_core::{
    BridgeStatus, LightControlError, Result, RetryPrompt, SourceChooser, SourceInfo,
};

/// Entry of the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    HueDebug,
    VideoDebug,
    Exit,
}

/// Why a menu line was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuError {
    NotANumber,
    UnknownChoice,
}

impl MenuError {
    pub fn message(self) -> &'static str {
        match self {
            Self::NotANumber => "Invalid input. Please enter a number.",
            Self::UnknownChoice => "Invalid choice. Please select 1, 2, or 0.",
        }
    }
}

pub fn parse_choice(line: &str) -> std::result::Result<MenuChoice, MenuError> {
    match line.trim().parse::<i64>() {
        Ok(1) => Ok(MenuChoice::HueDebug),
        Ok(2) => Ok(MenuChoice::VideoDebug),
        Ok(0) => Ok(MenuChoice::Exit),
        Ok(_) => Err(MenuError::UnknownChoice),
        Err(_) => Err(MenuError::NotANumber),
    }
}

/// Line-oriented operator console.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<StdinLock<'static>, Stdout> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{text}")?;
        Ok(())
    }

    /// Shows `text` without a newline and reads the answer. `None` at end of
    /// input.
    pub fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        write!(self.output, "{text}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end().to_string()))
    }

    /// Waits for Enter.
    pub fn pause(&mut self, text: &str) -> Result<()> {
        self.prompt(text).map(|_| ())
    }

    pub fn show_menu(&mut self) -> Result<()> {
        self.say("\n================================")?;
        self.say("  Hue Light Control System")?;
        self.say("================================")?;
        self.say("Choose debug mode:")?;
        self.say("1. Hue Debug (Light Fading)")?;
        self.say("2. Video Debug (network source)")?;
        self.say("0. Exit")
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> RetryPrompt for Console<R, W> {
    fn wait_for_retry(&mut self, status: BridgeStatus) -> Result<()> {
        self.say(&format!("No streamable bridge configured: {status}"))?;
        match self.prompt("Press Enter to retry...")? {
            Some(_) => Ok(()),
            None => Err(LightControlError::msg(
                "no operator input, giving up on bridge retry",
            )),
        }
    }
}

impl<R: BufRead, W: Write> SourceChooser for Console<R, W> {
    fn choose(&mut self, sources: &[SourceInfo]) -> Result<usize> {
        for (index, source) in sources.iter().enumerate() {
            self.say(&format!("  [{index}] {}", source.name))?;
        }
        let last = sources.len().saturating_sub(1);
        loop {
            let line = self
                .prompt(&format!("\nEnter the number of the source to connect to (0-{last}): "))?
                .ok_or_else(|| LightControlError::Video("no source selected".to_string()))?;
            match line.trim().parse::<usize>() {
                Ok(index) if index < sources.len() => return Ok(index),
                _ => self.say("Invalid input. Please enter a valid number.")?,
            }
        }
    }
}

/// Chooser for a source index given on the command line.
#[derive(Debug, Clone, Copy)]
pub struct PresetChoice(pub usize);

impl SourceChooser for PresetChoice {
    fn choose(&mut self, _sources: &[SourceInfo]) -> Result<usize> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use light_control_core::{connect_bridge, BridgeConfig, ShutdownSignal, SimulatedBridge};

    use super::*;

    fn console(input: &str) -> Console<&[u8], Vec<u8>> {
        Console::new(input.as_bytes(), Vec::new())
    }

    fn sources() -> Vec<SourceInfo> {
        vec![
            SourceInfo {
                name: "A".to_string(),
            },
            SourceInfo {
                name: "B".to_string(),
            },
        ]
    }

    #[test]
    fn parses_menu_choices() {
        assert_eq!(parse_choice("1\n"), Ok(MenuChoice::HueDebug));
        assert_eq!(parse_choice(" 2 "), Ok(MenuChoice::VideoDebug));
        assert_eq!(parse_choice("0"), Ok(MenuChoice::Exit));
        assert_eq!(parse_choice("7"), Err(MenuError::UnknownChoice));
        assert_eq!(parse_choice("fade"), Err(MenuError::NotANumber));
    }

    #[test]
    fn prompt_returns_none_at_end_of_input() {
        let mut console = console("");
        assert_eq!(console.prompt("> ").unwrap(), None);
    }

    #[test]
    fn chooser_reprompts_until_valid() {
        let mut console = console("x\n5\n1\n");
        assert_eq!(console.choose(&sources()).unwrap(), 1);

        let output = String::from_utf8(console.into_output()).unwrap();
        assert_eq!(output.matches("Invalid input").count(), 2);
        assert!(output.contains("(0-1)"));
    }

    #[test]
    fn chooser_fails_at_end_of_input() {
        let mut console = console("9\n");
        assert!(console.choose(&sources()).is_err());
    }

    #[test]
    fn retry_prompt_reports_status() {
        let mut console = console("\n");
        console.wait_for_retry(BridgeStatus::NotAuthorized).unwrap();

        let output = String::from_utf8(console.into_output()).unwrap();
        assert!(output.contains("BRIDGE_NOT_AUTHORIZED"));
        assert!(output.contains("Press Enter to retry"));
    }

    #[test]
    fn retry_prompt_fails_at_end_of_input() {
        let mut console = console("");
        let err = console.wait_for_retry(BridgeStatus::NoBridgeFound).unwrap_err();
        assert!(matches!(err, LightControlError::Message(_)));
    }

    #[test]
    fn bridge_session_stops_when_input_runs_out() {
        let mut bridge = SimulatedBridge::new(&BridgeConfig {
            groups: Vec::new(),
            ..BridgeConfig::default()
        });
        let mut console = console("\n");

        let err = connect_bridge(&mut bridge, &mut console, &ShutdownSignal::new()).unwrap_err();

        assert!(matches!(err, LightControlError::Message(_)));
        assert_eq!(bridge.connects(), 2);
    }
}
