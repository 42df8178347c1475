use std::fmt;

/// A unit of work handed from the workers to the consumer.
#[derive(Clone, PartialEq, Eq)]
pub enum Payload {
    /// Full content of an accepted file.
    File { path: String, content: Vec<u8> },
    /// The mirrored copy is already current; the source was not read.
    Unchanged { path: String },
}

impl Payload {
    /// Relative path of the file.
    pub fn path(&self) -> &str {
        match self {
            Self::File { path, .. } | Self::Unchanged { path } => path,
        }
    }

    /// Number of content bytes carried.
    pub fn len(&self) -> usize {
        match self {
            Self::File { content, .. } => content.len(),
            Self::Unchanged { .. } => 0,
        }
    }

    /// Returns true if no content bytes are carried.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path, content } => f
                .debug_struct("File")
                .field("path", path)
                .field("len", &content.len())
                .finish(),
            Self::Unchanged { path } => f.debug_struct("Unchanged").field("path", path).finish(),
        }
    }
}
