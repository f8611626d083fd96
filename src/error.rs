/// An error that can occur when parsing inputs or constructing an index.
#[derive(Debug)]
pub enum Error {
    /// A graph, rGFA or permutation input was malformed.
    InputParse { line: usize, message: String },
    /// The permutation cardinality does not match the number of vertices.
    Mismatch(String),
    /// An I/O operation at a boundary failed.
    Io(std::io::Error),
    /// The requested mode or input is not supported.
    Unsupported(String),
    /// Index construction failed (suffix sorting or an inconsistent buffer).
    Construction(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InputParse { line, message } => {
                write!(f, "parse error on line {}: {}", line, message)
            }
            Error::Mismatch(message) => write!(f, "cardinality mismatch: {}", message),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Unsupported(message) => write!(f, "unsupported: {}", message),
            Error::Construction(message) => write!(f, "construction failed: {}", message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
