use crate::core::message::{Message, Role};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Plain-text transcript log toggled with `/log`.
pub struct LoggingState {
    file_path: Option<PathBuf>,
    is_active: bool,
}

impl LoggingState {
    /// A log file given on the command line starts active.
    pub fn new(log_file: Option<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut logging = LoggingState {
            file_path: None,
            is_active: false,
        };
        if let Some(path) = log_file {
            logging.set_log_file(path)?;
        }
        Ok(logging)
    }

    pub fn set_log_file(&mut self, path: String) -> Result<String, Box<dyn std::error::Error>> {
        let path = PathBuf::from(path);
        Self::test_file_access(&path)?;

        let message = format!("Logging enabled to: {}", path.display());
        self.file_path = Some(path);
        self.is_active = true;
        Ok(message)
    }

    pub fn toggle_logging(&mut self) -> Result<String, Box<dyn std::error::Error>> {
        let Some(path) = &self.file_path else {
            return Err(
                "No log file specified. Use /log <filename> to enable logging first.".into(),
            );
        };
        let display = path.display().to_string();
        if self.is_active {
            self.log_message("## Logging paused")?;
            self.is_active = false;
            Ok(format!("Logging paused (file: {display})"))
        } else {
            self.is_active = true;
            self.log_message("## Logging resumed")?;
            Ok(format!("Logging resumed to: {display}"))
        }
    }

    /// Append one transcript entry. System notes are written with a `##` prefix.
    pub fn log_entry(&self, message: &Message) -> Result<(), Box<dyn std::error::Error>> {
        let line = match message.role {
            Role::User => format!("User: {}", message.content),
            Role::Assistant => format!("Assistant: {}", message.content),
            Role::System => format!("## {}", message.content),
        };
        self.log_message(&line)
    }

    pub fn log_message(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        match (&self.file_path, self.is_active) {
            (Some(path), true) => Self::write_to_log(path, content),
            _ => Ok(()),
        }
    }

    fn write_to_log(path: &Path, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn get_status_string(&self) -> String {
        let file_name = |path: &PathBuf| {
            path.file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned()
        };
        match (&self.file_path, self.is_active) {
            (None, _) => "disabled".to_string(),
            (Some(path), true) => format!("active ({})", file_name(path)),
            (Some(path), false) => format!("paused ({})", file_name(path)),
        }
    }

    fn test_file_access(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn inactive_logging_writes_nothing() {
        let logging = LoggingState::new(None).unwrap();
        assert!(!logging.is_active());
        assert_eq!(logging.get_status_string(), "disabled");
        logging.log_message("ignored").unwrap();
    }

    #[test]
    fn entries_are_appended_with_role_prefixes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.log");
        let logging = LoggingState::new(Some(path.to_string_lossy().into_owned())).unwrap();
        assert_eq!(logging.get_status_string(), "active (chat.log)");

        logging.log_entry(&Message::user("Hello")).unwrap();
        logging.log_entry(&Message::assistant("Hi!\nHow can I help?")).unwrap();
        logging.log_entry(&Message::system("Model loaded")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "User: Hello\n\nAssistant: Hi!\nHow can I help?\n\n## Model loaded\n\n"
        );
    }

    #[test]
    fn toggle_pauses_and_resumes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.log");

        let mut logging = LoggingState::new(None).unwrap();
        assert!(logging.toggle_logging().is_err());

        logging
            .set_log_file(path.to_string_lossy().into_owned())
            .unwrap();
        let message = logging.toggle_logging().unwrap();
        assert!(message.starts_with("Logging paused"));
        assert!(!logging.is_active());
        logging.log_message("not written").unwrap();

        logging.toggle_logging().unwrap();
        assert!(logging.is_active());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("## Logging paused"));
        assert!(contents.contains("## Logging resumed"));
        assert!(!contents.contains("not written"));
    }

    #[test]
    fn unwritable_path_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("chat.log");
        let mut logging = LoggingState::new(None).unwrap();
        assert!(logging
            .set_log_file(path.to_string_lossy().into_owned())
            .is_err());
        assert!(!logging.is_active());
    }
}
