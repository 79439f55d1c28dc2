/// Reply tokens sent back over the wire
pub mod reply {
    pub const RECORDING_STARTED: &str = "RECORDING_STARTED";
    pub const RECORDING_STOPPED: &str = "RECORDING_STOPPED";
    pub const SERVER_STOPPING: &str = "SERVER_STOPPING";
    pub const UNKNOWN_COMMAND: &str = "UNKNOWN_COMMAND";
}

/// A parsed client command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Begin a session, optionally naming the final output path
    Start { path: Option<String> },
    /// Finalize the session; the path here overrides the one given at start
    Stop { path: Option<String> },
    /// Stop any session, release devices and terminate the server
    Exit,
    Unknown,
}

impl Command {
    /// Parse one delivered message. Only the first `:` separates the command
    /// name from its path argument; paths may themselves contain `:` (drive
    /// letters, URLs).
    pub fn parse(input: &str) -> Self {
        let input = input.trim();

        let (name, arg) = match input.find(':') {
            Some(idx) => (&input[..idx], Some(&input[idx + 1..])),
            None => (input, None),
        };
        let path = arg.filter(|p| !p.is_empty()).map(str::to_string);

        match name {
            "START_RECORDING" => Command::Start { path },
            "STOP_RECORDING" => Command::Stop { path },
            "EXIT" | "QUIT" => Command::Exit,
            _ => Command::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_without_path() {
        assert_eq!(
            Command::parse("START_RECORDING"),
            Command::Start { path: None }
        );
    }

    #[test]
    fn test_parse_start_with_path() {
        assert_eq!(
            Command::parse("START_RECORDING:/tmp/out.wav"),
            Command::Start {
                path: Some("/tmp/out.wav".to_string())
            }
        );
    }

    #[test]
    fn test_parse_path_may_contain_colons() {
        assert_eq!(
            Command::parse("STOP_RECORDING:C:\\recordings\\out.wav"),
            Command::Stop {
                path: Some("C:\\recordings\\out.wav".to_string())
            }
        );
    }

    #[test]
    fn test_parse_trailing_colon_means_no_path() {
        assert_eq!(
            Command::parse("START_RECORDING:"),
            Command::Start { path: None }
        );
    }

    #[test]
    fn test_parse_exit_aliases() {
        assert_eq!(Command::parse("EXIT"), Command::Exit);
        assert_eq!(Command::parse("QUIT"), Command::Exit);
    }

    #[test]
    fn test_parse_trims_line_endings() {
        assert_eq!(
            Command::parse("STOP_RECORDING\r\n"),
            Command::Stop { path: None }
        );
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(Command::parse("PAUSE_RECORDING"), Command::Unknown);
        assert_eq!(Command::parse(""), Command::Unknown);
        // Command names are exact, not prefixes
        assert_eq!(Command::parse("START_RECORDING_NOW"), Command::Unknown);
    }
}
