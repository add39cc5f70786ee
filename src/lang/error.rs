/// ## Compile-time diagnostic
///
/// Carries the source line the scanner was on when the parser noticed
/// the problem. The compiler collects these and keeps going; the count
/// of collected errors becomes the process exit status.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    line: usize,
    message: String,
}

impl Error {
    pub fn new(line: usize, message: impl Into<String>) -> Error {
        Error {
            line,
            message: message.into(),
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} near line {}", self.message, self.line)
    }
}
