use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::Message;

/// Append-only JSON-lines file backing the message log.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: File,
}

impl Journal {
    /// Open (or create) the journal and return the messages already in it.
    /// Unreadable lines are skipped with a warning.
    pub fn open(path: &Path) -> Result<(Self, Vec<Message>)> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut existing = Vec::new();
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            for (lineno, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Message>(&line) {
                    Ok(message) => existing.push(message),
                    Err(e) => log::warn!(
                        "skipping corrupt journal line {} in {}: {}",
                        lineno + 1,
                        path.display(),
                        e
                    ),
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok((
            Self {
                path: path.to_path_buf(),
                file,
            },
            existing,
        ))
    }

    pub fn append(&mut self, message: &Message) -> Result<()> {
        let line = serde_json::to_string(message)?;
        writeln!(self.file, "{}", line)?;
        self.file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Participant, Recipient};

    #[test]
    fn test_reopen_returns_appended_messages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log/messages.jsonl");

        let (mut journal, existing) = Journal::open(&path).unwrap();
        assert!(existing.is_empty());
        let message = Message::new(Participant::User, Recipient::agent("echo"), "query", "hi");
        journal.append(&message).unwrap();
        drop(journal);

        let (_journal, existing) = Journal::open(&path).unwrap();
        assert_eq!(existing, vec![message]);
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.jsonl");
        let message = Message::new(Participant::System, Recipient::All, "notice", "boot");
        std::fs::write(
            &path,
            format!("{{not json\n{}\n", serde_json::to_string(&message).unwrap()),
        )
        .unwrap();

        let (_journal, existing) = Journal::open(&path).unwrap();
        assert_eq!(existing.len(), 1);
        assert_eq!(existing[0].payload, "boot");
    }
}
