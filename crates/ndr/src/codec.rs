//! Encoder and decoder façades
//!
//! A façade binds a format label and a byte sink or source. Each call looks
//! up (or compiles) the program for the value's type, then runs it against a
//! fresh [`State`] while holding the façade's stream lock, so concurrent
//! calls on one façade never interleave their bytes. Compilation happens
//! outside that lock.

use crate::cache::ProgramCache;
use crate::compile::Program;
use crate::format::FormatLabel;
use crate::options::CodecOptions;
use crate::shape::Shape;
use crate::state::State;
use crate::{DataError, NdrError, NdrReader, NdrType, NdrWriter, Result, Value};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::debug;

/// Outcome of one encode or decode call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Data errors recorded while the program ran
    pub errors: Vec<DataError>,
    /// Octets written or consumed, padding included
    pub octets: u64,
}

impl Report {
    /// True if no data error was recorded
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn finish(errors: Vec<DataError>, octets: u64, strict: bool) -> Result<Self> {
        if strict && !errors.is_empty() {
            return Err(NdrError::Data(errors));
        }
        Ok(Self { errors, octets })
    }
}

/// A decoded value and the report of the call that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub report: Report,
}

/// NDR encoder bound to one sink
#[derive(Debug)]
pub struct Encoder<W> {
    writer: Mutex<NdrWriter<W>>,
    options: CodecOptions,
    cache: Arc<ProgramCache>,
}

impl<W: Write> Encoder<W> {
    pub fn new(sink: W, format: FormatLabel) -> Result<Self> {
        Self::with_options(sink, format, CodecOptions::default())
    }

    pub fn with_options(sink: W, format: FormatLabel, options: CodecOptions) -> Result<Self> {
        Self::with_cache(sink, format, options, Arc::new(ProgramCache::new()))
    }

    /// Create an encoder sharing `cache` with other façades.
    pub fn with_cache(sink: W, format: FormatLabel, options: CodecOptions, cache: Arc<ProgramCache>) -> Result<Self> {
        Ok(Self {
            writer: Mutex::new(NdrWriter::new(sink, format)?),
            options,
            cache,
        })
    }

    pub fn format(&self) -> FormatLabel {
        self.writer.lock().format()
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<ProgramCache> {
        &self.cache
    }

    /// Encode `value`, compiling its program on first use.
    pub fn encode<T: NdrType>(&self, value: &T) -> Result<Report> {
        let program = self.cache.get_or_compile::<T>(self.options.syntax)?;
        self.run(&program, &value.to_value())
    }

    /// Encode a dynamic value of `shape`. The program is not cached.
    pub fn encode_value(&self, shape: &Shape, value: &Value) -> Result<Report> {
        let program = Program::compile(shape, self.options.syntax)?;
        self.run(&program, value)
    }

    fn run(&self, program: &Program, value: &Value) -> Result<Report> {
        let state = State::new();
        let octets = {
            let mut writer = self.writer.lock();
            let start = writer.offset();
            program.encode(&mut writer, &state, value)?;
            writer.offset() - start
        };
        debug!(octets, errors = state.error_count(), "encoded NDR value");
        Report::finish(state.take_errors(), octets, self.options.strict)
    }

    /// Octets written so far
    pub fn offset(&self) -> u64 {
        self.writer.lock().offset()
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().into_inner()
    }
}

/// NDR decoder bound to one source
#[derive(Debug)]
pub struct Decoder<R> {
    reader: Mutex<NdrReader<R>>,
    options: CodecOptions,
    cache: Arc<ProgramCache>,
}

impl<R: Read> Decoder<R> {
    pub fn new(source: R, format: FormatLabel) -> Result<Self> {
        Self::with_options(source, format, CodecOptions::default())
    }

    pub fn with_options(source: R, format: FormatLabel, options: CodecOptions) -> Result<Self> {
        Self::with_cache(source, format, options, Arc::new(ProgramCache::new()))
    }

    /// Create a decoder sharing `cache` with other façades.
    pub fn with_cache(source: R, format: FormatLabel, options: CodecOptions, cache: Arc<ProgramCache>) -> Result<Self> {
        Ok(Self {
            reader: Mutex::new(NdrReader::new(source, format)?),
            options,
            cache,
        })
    }

    pub fn format(&self) -> FormatLabel {
        self.reader.lock().format()
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<ProgramCache> {
        &self.cache
    }

    /// Decode the next value of type `T`.
    pub fn decode<T: NdrType>(&self) -> Result<Decoded<T>> {
        let program = self.cache.get_or_compile::<T>(self.options.syntax)?;
        let (value, report) = self.run(&program)?;
        Ok(Decoded {
            value: T::from_value(value)?,
            report,
        })
    }

    /// Decode the next value as a dynamic value of `shape`.
    pub fn decode_value(&self, shape: &Shape) -> Result<Decoded<Value>> {
        let program = Program::compile(shape, self.options.syntax)?;
        let (value, report) = self.run(&program)?;
        Ok(Decoded { value, report })
    }

    fn run(&self, program: &Program) -> Result<(Value, Report)> {
        let state = State::new();
        let (value, octets) = {
            let mut reader = self.reader.lock();
            let start = reader.offset();
            let value = program.decode(&mut reader, &state, self.options.max_elements)?;
            (value, reader.offset() - start)
        };
        debug!(octets, errors = state.error_count(), "decoded NDR value");
        let report = Report::finish(state.take_errors(), octets, self.options.strict)?;
        Ok((value, report))
    }

    /// Octets consumed so far
    pub fn offset(&self) -> u64 {
        self.reader.lock().offset()
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner().into_inner()
    }
}

/// Encode one value into a new buffer.
///
/// Runs in strict mode: any data error is returned as [`NdrError::Data`].
pub fn to_bytes<T: NdrType>(format: FormatLabel, value: &T) -> Result<Bytes> {
    let encoder = Encoder::with_options(
        BytesMut::new().writer(),
        format,
        CodecOptions::default().with_strict(true),
    )?;
    encoder.encode(value)?;
    Ok(encoder.into_inner().into_inner().freeze())
}

/// Decode one value from `bytes`.
///
/// Runs in strict mode: any data error is returned as [`NdrError::Data`].
pub fn from_bytes<T: NdrType>(format: FormatLabel, bytes: Bytes) -> Result<T> {
    let decoder = Decoder::with_options(bytes.reader(), format, CodecOptions::default().with_strict(true))?;
    Ok(decoder.decode::<T>()?.value)
}
