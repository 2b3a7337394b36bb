use std::fmt;

#[derive(Debug)]
pub enum DumperError {
    IoError(std::io::Error),
    CapstoneError(capstone::Error),
    RegexError(regex::Error),
    JsonError(serde_json::Error),
    Generic(String),
}

impl fmt::Display for DumperError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DumperError::IoError(e) => write!(f, "IO Error: {}", e),
            DumperError::CapstoneError(e) => write!(f, "Capstone Error: {}", e),
            DumperError::RegexError(e) => write!(f, "Regex Error: {}", e),
            DumperError::JsonError(e) => write!(f, "JSON Error: {}", e),
            DumperError::Generic(s) => write!(f, "Generic Error: {}", s),
        }
    }
}

impl std::error::Error for DumperError {}

impl From<std::io::Error> for DumperError {
    fn from(err: std::io::Error) -> DumperError {
        DumperError::IoError(err)
    }
}

impl From<capstone::Error> for DumperError {
    fn from(err: capstone::Error) -> DumperError {
        DumperError::CapstoneError(err)
    }
}

impl From<regex::Error> for DumperError {
    fn from(err: regex::Error) -> DumperError {
        DumperError::RegexError(err)
    }
}

impl From<serde_json::Error> for DumperError {
    fn from(err: serde_json::Error) -> DumperError {
        DumperError::JsonError(err)
    }
}
