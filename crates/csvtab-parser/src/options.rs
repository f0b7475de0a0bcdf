/// Default ceiling on cells per row.
pub const DEFAULT_MAX_COLUMNS: usize = 1024;

/// Default row buffer size; also the largest row the parser accepts.
pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;

/// Default number of bytes requested from the reader per refill.
pub const DEFAULT_READ_CHUNK: usize = 64 * 1024;

/// Parser configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Cell separator byte.
    pub delimiter: u8,
    /// A row with more cells than this fails the parse.
    pub max_columns: usize,
    /// Size of the row buffer. The unescaped cells of a row must fit in it
    /// whole.
    pub buffer_size: usize,
    /// Bytes requested from the reader per refill.
    pub read_chunk: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            max_columns: DEFAULT_MAX_COLUMNS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            read_chunk: DEFAULT_READ_CHUNK,
        }
    }
}

impl ParserOptions {
    #[must_use]
    pub const fn with_max_columns(mut self, max_columns: usize) -> Self {
        self.max_columns = max_columns;
        self
    }

    #[must_use]
    pub const fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    #[must_use]
    pub const fn with_read_chunk(mut self, read_chunk: usize) -> Self {
        self.read_chunk = read_chunk;
        self
    }
}
