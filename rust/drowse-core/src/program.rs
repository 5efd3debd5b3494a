//! Compiled program container and its on-disk formats.

use crate::tree::Block;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid program JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid program image: {0}")]
    Binary(#[from] bincode::Error),
    #[error("unrecognised program format for '{0}' (expected .json or .dwc)")]
    UnknownFormat(String),
}

/// A compiled script: its name and top-level Block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub main: Arc<Block>,
}

impl Program {
    pub fn new(name: impl Into<String>, main: Block) -> Self {
        let name = name.into();
        let main = if main.source.is_none() {
            main.with_source(name.clone())
        } else {
            main
        };
        Program {
            name,
            main: Arc::new(main),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ProgramError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ProgramError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProgramError> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProgramError> {
        Ok(bincode::serialize(self)?)
    }

    /// Load a program, picking the format from the file extension.
    pub fn load(path: &Path) -> Result<Self, ProgramError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&std::fs::read_to_string(path)?),
            Some("dwc") | Some("bin") => Self::from_bytes(&std::fs::read(path)?),
            _ => Err(ProgramError::UnknownFormat(path.display().to_string())),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ProgramError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => std::fs::write(path, self.to_json()?)?,
            Some("dwc") | Some("bin") => std::fs::write(path, self.to_bytes()?)?,
            _ => return Err(ProgramError::UnknownFormat(path.display().to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Literal, Step, StepKind};

    fn sample() -> Program {
        Program::new(
            "sample",
            Block::new(vec![
                Step::new(1, StepKind::CreateFrame),
                Step::new(1, StepKind::Literal(Literal::Str("hi".into()))),
                Step::new(1, StepKind::Call {
                    function: "&println".into(),
                }),
            ]),
        )
    }

    #[test]
    fn test_program_takes_name_as_source() {
        assert_eq!(sample().main.source.as_deref(), Some("sample"));
    }

    #[test]
    fn test_json_and_binary_images_agree() {
        let program = sample();
        let json = program.to_json().unwrap();
        let bytes = program.to_bytes().unwrap();
        assert_eq!(Program::from_json(&json).unwrap(), Program::from_bytes(&bytes).unwrap());
    }

    #[test]
    fn test_save_and_load_from_disk() {
        let path = std::env::temp_dir().join(format!("drowse-program-{}.dwc", std::process::id()));
        sample().save(&path).unwrap();
        let loaded = Program::load(&path).unwrap();
        assert_eq!(loaded.name, "sample");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let err = Program::load(Path::new("script.sl")).unwrap_err();
        assert!(matches!(err, ProgramError::UnknownFormat(_)));
    }
}
