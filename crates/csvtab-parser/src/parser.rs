//! Incremental CSV tokenizer over [`csv_core::Reader`].
//!
//! Raw bytes are read in chunks into an input buffer and fed to
//! `csv_core`, which writes the unescaped bytes of each field into a
//! fixed-size row buffer. Every cell of a completed row is therefore a
//! contiguous slice of that buffer and can be described by a [`CellSpan`].
//! The row buffer is only compacted at the start of a later step, which is
//! when previously delivered spans stop being meaningful. Each call to
//! [`CsvParser::parse_more`] or [`CsvParser::finish`] therefore starts a new
//! generation, and [`CsvParser::resolve`] rejects spans from any other.
//!
//! `csv_core` does not report whether a field was quoted, so the first input
//! byte of each field is inspected before it is handed over.

use std::io::{ErrorKind, Read};

use csv_core::{ReadFieldResult, Reader, ReaderBuilder};
use csvtab_error::{CsvTabError, Result};
use tracing::{debug, trace};

use crate::options::ParserOptions;
use crate::row::{CellSpan, Row, RowHandler};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Result of a successful parser step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// A row was delivered; more may follow.
    Ok,
    /// The input is exhausted. A trailing row without a terminator is still
    /// pending and is delivered by [`CsvParser::finish`].
    NoMoreInput,
}

/// What one call into the tokenizer achieved.
enum Progress {
    Field,
    Row,
    NeedInput,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Status {
    Ready,
    Exhausted,
    Finished,
    Failed(String),
}

/// Push-style CSV parser over any [`Read`] source.
pub struct CsvParser<R> {
    reader: R,
    options: ParserOptions,
    core: Reader,
    input: Vec<u8>,
    in_pos: usize,
    in_len: usize,
    /// Unescaped bytes of the rows delivered in this generation and of the
    /// row being assembled.
    out: Vec<u8>,
    out_len: usize,
    /// First output byte of the row being assembled.
    row_start: usize,
    /// First output byte of the current cell.
    field_start: usize,
    /// Bytes of the current cell have already gone to `core`.
    field_open: bool,
    quoted: bool,
    spans: Vec<CellSpan>,
    generation: u64,
    rows: u64,
    bom_checked: bool,
    eof: bool,
    status: Status,
}

impl<R: Read> CsvParser<R> {
    /// Create a parser. Both buffers are allocated once, up front.
    ///
    /// # Errors
    ///
    /// [`CsvTabError::OutOfMemory`] if a buffer cannot be allocated, or
    /// [`CsvTabError::Internal`] for a zero-sized buffer or column limit.
    pub fn new(reader: R, options: ParserOptions) -> Result<Self> {
        if options.buffer_size == 0 || options.max_columns == 0 || options.read_chunk == 0 {
            return Err(CsvTabError::internal("parser options must be non-zero"));
        }
        let input = zeroed(options.read_chunk.max(UTF8_BOM.len()))?;
        let out = zeroed(options.buffer_size)?;
        let core = ReaderBuilder::new().delimiter(options.delimiter).build();
        debug!(
            buffer_size = options.buffer_size,
            max_columns = options.max_columns,
            "csv parser created"
        );
        Ok(Self {
            reader,
            options,
            core,
            input,
            in_pos: 0,
            in_len: 0,
            out,
            out_len: 0,
            row_start: 0,
            field_start: 0,
            field_open: false,
            quoted: false,
            spans: Vec::new(),
            generation: 0,
            rows: 0,
            bom_checked: false,
            eof: false,
            status: Status::Ready,
        })
    }

    /// Consume input until one row completes or the input ends.
    ///
    /// At most one row is handed to `handler` per call. Spans from rows
    /// delivered by earlier calls are invalidated.
    ///
    /// # Errors
    ///
    /// I/O failures, [`CsvTabError::TooManyColumns`],
    /// [`CsvTabError::RowTooLarge`], or whatever `handler` returns. After an
    /// error the parser stays failed.
    pub fn parse_more(&mut self, handler: &mut dyn RowHandler) -> Result<ParseStatus> {
        match &self.status {
            Status::Failed(desc) => return Err(CsvTabError::parse(desc.clone())),
            Status::Finished | Status::Exhausted => return Ok(ParseStatus::NoMoreInput),
            Status::Ready => {}
        }
        self.begin_generation();
        let outcome = self.step(handler);
        match &outcome {
            Ok(ParseStatus::NoMoreInput) => self.status = Status::Exhausted,
            Ok(ParseStatus::Ok) => {}
            Err(err) => self.fail(err),
        }
        outcome
    }

    /// Deliver a trailing row that has no terminator, if any.
    ///
    /// Idempotent. Buffered bytes are treated as the end of the input; the
    /// reader is not consulted again.
    ///
    /// # Errors
    ///
    /// Same as [`parse_more`](Self::parse_more).
    pub fn finish(&mut self, handler: &mut dyn RowHandler) -> Result<()> {
        match &self.status {
            Status::Finished => return Ok(()),
            Status::Failed(desc) => return Err(CsvTabError::parse(desc.clone())),
            Status::Ready | Status::Exhausted => {}
        }
        self.begin_generation();
        self.eof = true;
        let outcome = self.flush(handler);
        match &outcome {
            Ok(()) => self.status = Status::Finished,
            Err(err) => self.fail(err),
        }
        outcome
    }

    /// Bytes of a span delivered during the current generation.
    ///
    /// # Errors
    ///
    /// [`CsvTabError::StaleCell`] if `generation` is not the current one.
    pub fn resolve(&self, span: CellSpan, generation: u64) -> Result<&[u8]> {
        if generation != self.generation {
            return Err(CsvTabError::StaleCell {
                cached: generation,
                current: self.generation,
            });
        }
        self.out
            .get(span.offset..span.offset + span.len)
            .ok_or_else(|| CsvTabError::internal("cell span outside parser buffer"))
    }

    /// Current generation; advanced by every `parse_more` and `finish`.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of rows delivered so far.
    #[must_use]
    pub const fn rows_parsed(&self) -> u64 {
        self.rows
    }

    /// Human-readable parser status.
    #[must_use]
    pub fn status_description(&self) -> String {
        match &self.status {
            Status::Ready => "ok".to_owned(),
            Status::Exhausted => "no more input".to_owned(),
            Status::Finished => "finished".to_owned(),
            Status::Failed(desc) => desc.clone(),
        }
    }

    #[must_use]
    pub const fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Give back the reader, dropping the buffers.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn fail(&mut self, err: &CsvTabError) {
        debug!(rows = self.rows, error = %err, "csv parser failed");
        self.status = Status::Failed(err.to_string());
    }

    /// Start a new generation, moving the unfinished row to the front of the
    /// row buffer.
    fn begin_generation(&mut self) {
        self.generation += 1;
        let shift = self.row_start;
        if shift == 0 {
            return;
        }
        trace!(shift, pending = self.out_len - shift, "compacting row buffer");
        self.out.copy_within(shift..self.out_len, 0);
        self.out_len -= shift;
        self.field_start -= shift;
        self.row_start = 0;
        for span in &mut self.spans {
            span.offset -= shift;
        }
    }

    fn step(&mut self, handler: &mut dyn RowHandler) -> Result<ParseStatus> {
        if !self.bom_checked {
            self.check_bom()?;
        }
        loop {
            if self.in_pos == self.in_len {
                if self.eof {
                    return Ok(ParseStatus::NoMoreInput);
                }
                self.fill()?;
                continue;
            }
            match self.advance()? {
                Progress::Row => {
                    self.deliver(handler)?;
                    return Ok(ParseStatus::Ok);
                }
                Progress::Field | Progress::NeedInput => {}
                Progress::End => return Ok(ParseStatus::NoMoreInput),
            }
        }
    }

    fn flush(&mut self, handler: &mut dyn RowHandler) -> Result<()> {
        if !self.bom_checked {
            self.bom_checked = true;
            self.skip_bom();
        }
        loop {
            match self.advance()? {
                Progress::Row => self.deliver(handler)?,
                Progress::Field | Progress::NeedInput => {}
                Progress::End => return Ok(()),
            }
        }
    }

    fn check_bom(&mut self) -> Result<()> {
        while self.in_len < UTF8_BOM.len() && !self.eof {
            self.fill()?;
        }
        self.bom_checked = true;
        self.skip_bom();
        Ok(())
    }

    fn skip_bom(&mut self) {
        if self.rows == 0 && self.in_pos == 0 && self.input[..self.in_len].starts_with(UTF8_BOM) {
            trace!("skipping byte order mark");
            self.in_pos = UTF8_BOM.len();
        }
    }

    /// Read more bytes behind the pending ones. Sets `eof` on a zero read.
    fn fill(&mut self) -> Result<()> {
        if self.in_pos == self.in_len {
            self.in_pos = 0;
            self.in_len = 0;
        }
        let end = (self.in_len + self.options.read_chunk).min(self.input.len());
        loop {
            match self.reader.read(&mut self.input[self.in_len..end]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.in_len += n;
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Feed the pending input to the tokenizer until one field ends or the
    /// input runs out. Past end of input an empty slice is fed, which makes
    /// `core` close whatever row is open.
    fn advance(&mut self) -> Result<Progress> {
        if !self.field_open {
            if self.spans.is_empty() {
                // Line terminators between rows; blank lines vanish here.
                while self.in_pos < self.in_len
                    && matches!(self.input[self.in_pos], b'\r' | b'\n')
                {
                    self.in_pos += 1;
                }
                if self.in_pos == self.in_len && !self.eof {
                    return Ok(Progress::NeedInput);
                }
            }
            self.quoted = self.in_pos < self.in_len && self.input[self.in_pos] == b'"';
            self.field_open = true;
        }
        let pending = &self.input[self.in_pos..self.in_len];
        let (result, nin, nout) = self.core.read_field(pending, &mut self.out[self.out_len..]);
        self.in_pos += nin;
        self.out_len += nout;
        match result {
            ReadFieldResult::InputEmpty => Ok(Progress::NeedInput),
            ReadFieldResult::OutputFull => Err(CsvTabError::RowTooLarge {
                row: self.rows + 1,
                max: self.out.len(),
            }),
            ReadFieldResult::Field { record_end } => {
                self.end_field()?;
                Ok(if record_end {
                    Progress::Row
                } else {
                    Progress::Field
                })
            }
            ReadFieldResult::End => Ok(Progress::End),
        }
    }

    fn end_field(&mut self) -> Result<()> {
        if self.spans.len() >= self.options.max_columns {
            return Err(CsvTabError::TooManyColumns {
                row: self.rows + 1,
                max: self.options.max_columns,
            });
        }
        self.spans.push(CellSpan {
            offset: self.field_start,
            len: self.out_len - self.field_start,
            quoted: self.quoted,
        });
        self.field_start = self.out_len;
        self.field_open = false;
        self.quoted = false;
        Ok(())
    }

    fn deliver(&mut self, handler: &mut dyn RowHandler) -> Result<()> {
        self.rows += 1;
        let row = Row {
            buf: &self.out,
            spans: &self.spans,
            generation: self.generation,
            number: self.rows,
        };
        trace!(row = self.rows, cells = self.spans.len(), "row parsed");
        let outcome = handler.on_row(&row);
        self.spans.clear();
        self.row_start = self.out_len;
        outcome
    }
}

/// A zero-filled buffer of exactly `len` bytes.
fn zeroed(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| CsvTabError::OutOfMemory)?;
    buf.resize(len, 0);
    Ok(buf)
}

impl<R> std::fmt::Debug for CsvParser<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvParser")
            .field("generation", &self.generation)
            .field("rows", &self.rows)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
