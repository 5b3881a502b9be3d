use std::fmt;

#[derive(Debug, Clone)]
pub enum IntoAtomPathError {
    EmptyPath,
    EmptySegment,
    InvalidName(String),
}

impl std::error::Error for IntoAtomPathError {}

impl fmt::Display for IntoAtomPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntoAtomPathError::InvalidName(name) => {
                write!(f, "`{}` is not a four-byte atom name", name)
            }
            _ => f.write_str(self.as_str()),
        }
    }
}

impl IntoAtomPathError {
    pub fn as_str(&self) -> &str {
        match self {
            IntoAtomPathError::EmptyPath => "no path provided",
            IntoAtomPathError::EmptySegment => "empty segment in path",
            IntoAtomPathError::InvalidName(_) => "invalid atom name in path",
        }
    }
}
