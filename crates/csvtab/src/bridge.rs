//! Drives the push parser one step at a time on behalf of a pull cursor.

use std::io::{Seek, SeekFrom};

use csvtab_error::{CsvTabError, Result};
use csvtab_parser::{CellSpan, CsvParser, ParseStatus, ParserOptions, Row, RowHandler};
use tracing::{debug, warn};

use crate::cache::{CachedRow, RowCache, SpanSource};
use crate::params::Source;

/// Where the next delivered row goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    /// Copy into the header cache, then switch to `Data`.
    Header,
    /// The header is already cached: drop the re-parsed copy.
    SkipHeader,
    /// Append as a borrowed data row.
    Data,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeStatus {
    Ready,
    Exhausted,
    Failed(String),
}

/// Outcome of [`ParserBridge::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Progressed,
    Exhausted,
}

/// The row-completed callback: appends to whichever cache the sink selects.
struct Append<'a> {
    sink: &'a mut Sink,
    next_id: &'a mut i64,
    header: &'a mut RowCache,
    data: &'a mut RowCache,
}

impl RowHandler for Append<'_> {
    fn on_row(&mut self, row: &Row<'_>) -> Result<()> {
        match *self.sink {
            Sink::Header => {
                self.header.append(CachedRow::owned(row, 0)?)?;
                *self.sink = Sink::Data;
            }
            Sink::SkipHeader => *self.sink = Sink::Data,
            Sink::Data => {
                self.data.append(CachedRow::borrowed(row, *self.next_id)?)?;
                *self.next_id += 1;
            }
        }
        Ok(())
    }
}

/// One parse session over a rewindable source.
pub struct ParserBridge {
    parser: Option<CsvParser<Box<dyn Source>>>,
    options: ParserOptions,
    sink: Sink,
    status: BridgeStatus,
    finished: bool,
    next_id: i64,
}

impl ParserBridge {
    /// Start a session whose first row will be taken as the header.
    ///
    /// # Errors
    ///
    /// Propagates parser construction failures.
    pub fn new(source: Box<dyn Source>, options: ParserOptions) -> Result<Self> {
        let parser = CsvParser::new(source, options.clone())?;
        Ok(Self {
            parser: Some(parser),
            options,
            sink: Sink::Header,
            status: BridgeStatus::Ready,
            finished: false,
            next_id: 1,
        })
    }

    #[must_use]
    pub const fn status(&self) -> &BridgeStatus {
        &self.status
    }

    /// Exhausted or failed: no further rows will arrive.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        !matches!(self.status, BridgeStatus::Ready)
    }

    /// Take one parser step. At most one data row is appended to `data`.
    ///
    /// # Errors
    ///
    /// A parse or allocation failure. The bridge is then failed and repeats
    /// the error on every later call.
    pub fn advance(&mut self, header: &mut RowCache, data: &mut RowCache) -> Result<Advance> {
        match &self.status {
            BridgeStatus::Failed(desc) => return Err(CsvTabError::parse(desc.clone())),
            BridgeStatus::Exhausted => return Ok(Advance::Exhausted),
            BridgeStatus::Ready => {}
        }
        let Some(parser) = self.parser.as_mut() else {
            return Err(CsvTabError::internal("no parser session"));
        };
        loop {
            let skipping = self.sink == Sink::SkipHeader;
            let mut append = Append {
                sink: &mut self.sink,
                next_id: &mut self.next_id,
                header: &mut *header,
                data: &mut *data,
            };
            match parser.parse_more(&mut append) {
                Ok(ParseStatus::Ok) if skipping => {}
                Ok(ParseStatus::Ok) => return Ok(Advance::Progressed),
                Ok(ParseStatus::NoMoreInput) => {
                    debug!(rows = self.next_id - 1, "csv input exhausted");
                    self.status = BridgeStatus::Exhausted;
                    return Ok(Advance::Exhausted);
                }
                Err(err) => {
                    warn!(error = %err, "csv parse failed");
                    self.status = BridgeStatus::Failed(err.to_string());
                    return Err(err);
                }
            }
        }
    }

    /// Flush a trailing unterminated row. Runs the parser's finish at most
    /// once per session.
    ///
    /// # Errors
    ///
    /// Same as [`advance`](Self::advance).
    pub fn finish(&mut self, header: &mut RowCache, data: &mut RowCache) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let Some(parser) = self.parser.as_mut() else {
            return Ok(());
        };
        let mut append = Append {
            sink: &mut self.sink,
            next_id: &mut self.next_id,
            header,
            data,
        };
        if let Err(err) = parser.finish(&mut append) {
            warn!(error = %err, "csv parse failed at end of input");
            self.status = BridgeStatus::Failed(err.to_string());
            return Err(err);
        }
        Ok(())
    }

    /// Seek the source back to its start and begin a new session. Callers
    /// must drop every borrowed row first.
    ///
    /// # Errors
    ///
    /// Seek or parser construction failures; the bridge is then failed.
    pub fn rewind(&mut self, header_cached: bool) -> Result<()> {
        let outcome = self.restart();
        self.finished = false;
        self.next_id = 1;
        match outcome {
            Ok(()) => {
                self.sink = if header_cached {
                    Sink::SkipHeader
                } else {
                    Sink::Header
                };
                self.status = BridgeStatus::Ready;
                debug!("csv source rewound");
                Ok(())
            }
            Err(err) => {
                self.status = BridgeStatus::Failed(err.to_string());
                Err(err)
            }
        }
    }

    fn restart(&mut self) -> Result<()> {
        let parser = self
            .parser
            .take()
            .ok_or_else(|| CsvTabError::internal("no parser session"))?;
        let mut source = parser.into_inner();
        source.seek(SeekFrom::Start(0))?;
        self.parser = Some(CsvParser::new(source, self.options.clone())?);
        Ok(())
    }

    /// End the session and release the source.
    pub fn close(&mut self) {
        self.parser = None;
        self.status = BridgeStatus::Exhausted;
    }

    /// Human-readable parser status.
    #[must_use]
    pub fn status_description(&self) -> String {
        match (&self.status, &self.parser) {
            (BridgeStatus::Failed(desc), _) => desc.clone(),
            (_, Some(parser)) => parser.status_description(),
            (_, None) => "closed".to_owned(),
        }
    }
}

impl SpanSource for ParserBridge {
    fn resolve(&self, span: CellSpan, generation: u64) -> Result<&[u8]> {
        match &self.parser {
            Some(parser) => parser.resolve(span, generation),
            None => Err(CsvTabError::StaleCell {
                cached: generation,
                current: 0,
            }),
        }
    }
}

impl std::fmt::Debug for ParserBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserBridge")
            .field("sink", &self.sink)
            .field("status", &self.status)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn bridge(input: &str) -> ParserBridge {
        ParserBridge::new(
            Box::new(Cursor::new(input.as_bytes().to_vec())),
            ParserOptions::default(),
        )
        .unwrap()
    }

    fn head_text(data: &RowCache, bridge: &ParserBridge) -> Vec<String> {
        let row = data.head().unwrap();
        (0..row.cell_count())
            .map(|i| {
                let cell = row.cell(i, bridge).unwrap().unwrap();
                String::from_utf8_lossy(cell.bytes).into_owned()
            })
            .collect()
    }

    #[test]
    fn test_first_row_goes_to_header() {
        let mut b = bridge("a,b\n1,2\n");
        let (mut header, mut data) = (RowCache::new(), RowCache::new());
        assert_eq!(b.advance(&mut header, &mut data).unwrap(), Advance::Progressed);
        assert_eq!(header.head_id(), Some(0));
        assert!(data.is_empty());

        assert_eq!(b.advance(&mut header, &mut data).unwrap(), Advance::Progressed);
        assert_eq!(data.head_id(), Some(1));
        assert_eq!(head_text(&data, &b), ["1", "2"]);
    }

    #[test]
    fn test_rewind_skips_cached_header() {
        let mut b = bridge("a\nx\ny\n");
        let (mut header, mut data) = (RowCache::new(), RowCache::new());
        b.advance(&mut header, &mut data).unwrap();
        b.advance(&mut header, &mut data).unwrap();
        b.advance(&mut header, &mut data).unwrap();
        assert_eq!(data.len(), 2);

        data.clear();
        b.rewind(true).unwrap();
        assert_eq!(b.advance(&mut header, &mut data).unwrap(), Advance::Progressed);
        assert_eq!(header.len(), 1);
        assert_eq!(data.len(), 1);
        assert_eq!(data.head_id(), Some(1));
        assert_eq!(head_text(&data, &b), ["x"]);
    }

    #[test]
    fn test_finish_delivers_trailing_row_once() {
        let mut b = bridge("a\nlast");
        let (mut header, mut data) = (RowCache::new(), RowCache::new());
        b.advance(&mut header, &mut data).unwrap();
        assert_eq!(b.advance(&mut header, &mut data).unwrap(), Advance::Exhausted);
        assert!(b.is_done());
        b.finish(&mut header, &mut data).unwrap();
        b.finish(&mut header, &mut data).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(head_text(&data, &b), ["last"]);
    }

    #[test]
    fn test_failure_is_sticky() {
        let mut b = ParserBridge::new(
            Box::new(Cursor::new(b"a\n1,2\n".to_vec())),
            ParserOptions::default().with_max_columns(1),
        )
        .unwrap();
        let (mut header, mut data) = (RowCache::new(), RowCache::new());
        b.advance(&mut header, &mut data).unwrap();
        let first = b.advance(&mut header, &mut data).unwrap_err();
        assert!(matches!(first, CsvTabError::TooManyColumns { .. }));
        assert!(b.is_done());
        let again = b.advance(&mut header, &mut data).unwrap_err();
        assert_eq!(again.to_string(), first.to_string());
        assert_eq!(b.status_description(), first.to_string());
    }

    #[test]
    fn test_closed_bridge_resolves_nothing() {
        let mut b = bridge("a\n1\n");
        let (mut header, mut data) = (RowCache::new(), RowCache::new());
        b.advance(&mut header, &mut data).unwrap();
        b.advance(&mut header, &mut data).unwrap();
        b.close();
        let row = data.head().unwrap();
        assert!(matches!(
            row.cell(0, &b),
            Err(CsvTabError::StaleCell { .. })
        ));
        assert_eq!(b.status_description(), "closed");
    }
}
