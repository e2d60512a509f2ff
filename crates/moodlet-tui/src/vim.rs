//! Vim mode handling

/// Current input mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VimMode {
    /// Typing into the login form
    #[default]
    Login,
    /// List navigation
    Normal,
    /// Command mode (: prefix)
    Command,
}

impl VimMode {
    /// Get the mode indicator string
    pub fn indicator(&self) -> &'static str {
        match self {
            VimMode::Login => "LOGIN",
            VimMode::Normal => "NORMAL",
            VimMode::Command => "COMMAND",
        }
    }
}

/// Parsed command from command mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Quit the application
    Quit,
    /// End the Moodle session and return to the login form
    Logout,
    /// Re-check the session and reload courses
    Refresh,
    /// Show the private files area
    Files,
    /// Open a course by id
    Course(String),
    /// Download the selected material, optionally into a directory
    Download(Option<String>),
    /// Set a configuration option
    Set(String, String),
    /// Unknown command
    Unknown(String),
    /// Empty command
    Empty,
}

impl Command {
    /// Parse a command string
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return Command::Empty;
        }

        let (cmd, arg) = match input.split_once(' ') {
            Some((cmd, arg)) => (cmd, Some(arg.trim().to_string()).filter(|a| !a.is_empty())),
            None => (input, None),
        };

        match cmd {
            "q" | "quit" | "exit" => Command::Quit,
            "logout" => Command::Logout,
            "r" | "refresh" => Command::Refresh,
            "files" | "private" => Command::Files,
            "c" | "course" => match arg {
                Some(id) if id.chars().all(|c| c.is_ascii_digit()) => Command::Course(id),
                Some(_) => Command::Unknown("course id must be numeric".to_string()),
                None => Command::Unknown("course requires an id".to_string()),
            },
            "w" | "write" | "download" => Command::Download(arg),
            "set" => match arg.as_deref().and_then(|s| s.split_once('=')) {
                Some((key, value)) => Command::Set(key.trim().to_string(), value.trim().to_string()),
                None if arg.is_some() => Command::Unknown("set requires key=value format".to_string()),
                None => Command::Unknown("set requires a setting".to_string()),
            },
            _ => Command::Unknown(cmd.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quit() {
        assert_eq!(Command::parse("q"), Command::Quit);
        assert_eq!(Command::parse(" quit "), Command::Quit);
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse("logout"), Command::Logout);
        assert_eq!(Command::parse("r"), Command::Refresh);
        assert_eq!(Command::parse("files"), Command::Files);
        assert_eq!(Command::parse(""), Command::Empty);
    }

    #[test]
    fn test_parse_course() {
        assert_eq!(Command::parse("course 12"), Command::Course("12".to_string()));
        assert!(matches!(Command::parse("course abc"), Command::Unknown(_)));
        assert!(matches!(Command::parse("c"), Command::Unknown(_)));
    }

    #[test]
    fn test_parse_download() {
        assert_eq!(Command::parse("w"), Command::Download(None));
        assert_eq!(
            Command::parse("w /tmp/notes"),
            Command::Download(Some("/tmp/notes".to_string()))
        );
    }

    #[test]
    fn test_parse_set() {
        assert_eq!(
            Command::parse("set timeout = 10"),
            Command::Set("timeout".to_string(), "10".to_string())
        );
        assert_eq!(
            Command::parse("set url=https://m.edu/?a=b"),
            Command::Set("url".to_string(), "https://m.edu/?a=b".to_string())
        );
        assert!(matches!(Command::parse("set timeout"), Command::Unknown(_)));
        assert!(matches!(Command::parse("set"), Command::Unknown(_)));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(Command::parse("tabnew x"), Command::Unknown("tabnew".to_string()));
    }
}
