//! # Module for File IO (Reading and Writing)
//!
//! Every source format implements [`ReadInstance`] and every target dialect
//! implements [`WriteInstance`]. The implementations are independent of each
//! other; shared functionality (position tracking, number parsing, structural
//! checks of writers) lives in this module.

use std::{
    fmt, fs,
    io::{self, BufRead, Read, Seek, SeekFrom, Write},
    path::Path,
};

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{digit0, digit1, one_of},
    combinator::{opt, recognize},
    sequence::{pair, tuple},
    IResult,
};
use num_traits::{CheckedMul, Zero};
use thiserror::Error;

use crate::{
    instances::{Direction, Instance},
    options::{ConfigurationError, Options},
    transforms::strategy::STRATEGY_KEYS,
    types::{Coeff, LinConstraint},
};

pub mod aspartame;
pub mod casp;
pub mod fznimf;
pub mod inc;
pub mod lp;
pub mod mps;
pub mod pisinger;
pub mod sugar;
mod tabular;

/// A position in an input stream
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct Position {
    /// The 1-based line number
    pub line: usize,
    /// The byte offset from the start of the stream
    pub offset: u64,
}

impl Position {
    /// Creates a malformed input error at this position
    pub fn malformed<S: Into<String>>(self, cause: S) -> MalformedInput {
        MalformedInput {
            pos: self,
            cause: cause.into(),
        }
    }

    /// Creates an unsupported feature error at this position
    pub fn unsupported<S: Into<String>>(self, feature: S) -> UnsupportedFeature {
        UnsupportedFeature {
            pos: self,
            feature: feature.into(),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} (byte {})", self.line, self.offset)
    }
}

/// Syntax violation in the input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed input at {pos}: {cause}")]
pub struct MalformedInput {
    /// Where the violation was found
    pub pos: Position,
    /// What is wrong
    pub cause: String,
}

/// The input uses a construct that cannot be represented in an [`Instance`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported feature at {pos}: {feature}")]
pub struct UnsupportedFeature {
    /// Where the construct was found
    pub pos: Position,
    /// What is unsupported
    pub feature: String,
}

/// Decoding errors
#[derive(Error, Debug)]
pub enum Error {
    /// Syntax violation
    #[error(transparent)]
    Malformed(#[from] MalformedInput),
    /// Unrepresentable construct
    #[error(transparent)]
    Unsupported(#[from] UnsupportedFeature),
    /// Error while reading input data
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Resumable position of a reader in a multi-instance stream
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct StreamCursor {
    /// Byte offset of the first unconsumed byte
    pub offset: u64,
    /// The number of lines consumed so far
    pub line: usize,
    /// Whether the stream is exhausted
    pub eof: bool,
}

/// Buffered readers that can also seek
pub trait SeekBufRead: BufRead + Seek {}

impl<R: BufRead + Seek> SeekBufRead for R {}

enum Source<'r> {
    Plain(Box<dyn BufRead + 'r>),
    Seekable(Box<dyn SeekBufRead + 'r>),
}

/// An input byte stream that keeps track of the current line and byte offset
pub struct InputStream<'r> {
    source: Source<'r>,
    offset: u64,
    line: usize,
}

impl<'r> InputStream<'r> {
    /// Wraps a non-seekable reader, e.g., `stdin`
    pub fn new<R: BufRead + 'r>(reader: R) -> Self {
        InputStream {
            source: Source::Plain(Box::new(reader)),
            offset: 0,
            line: 0,
        }
    }

    /// Wraps a seekable reader. Seekable streams can be rewound with
    /// [`InputStream::seek_to`].
    pub fn seekable<R: BufRead + Seek + 'r>(reader: R) -> Self {
        InputStream {
            source: Source::Seekable(Box::new(reader)),
            offset: 0,
            line: 0,
        }
    }

    fn reader(&mut self) -> &mut dyn BufRead {
        match &mut self.source {
            Source::Plain(r) => r,
            Source::Seekable(r) => r,
        }
    }

    /// The position of the next unread byte. The line number is the one of
    /// the next line to be read.
    #[must_use]
    pub fn position(&self) -> Position {
        Position {
            line: self.line + 1,
            offset: self.offset,
        }
    }

    /// A cursor pointing at the next unread byte
    #[must_use]
    pub fn cursor(&self, eof: bool) -> StreamCursor {
        StreamCursor {
            offset: self.offset,
            line: self.line,
            eof,
        }
    }

    /// Reads a line into the buffer (appending), returns the number of bytes
    /// read. Zero means the stream is exhausted.
    ///
    /// # Errors
    ///
    /// If reading fails
    pub fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        let n = self.reader().read_line(buf)?;
        if n > 0 {
            self.offset += n as u64;
            self.line += 1;
        }
        Ok(n)
    }

    /// Skips over whitespace. Returns `true` if the stream ended.
    ///
    /// # Errors
    ///
    /// If reading fails
    pub fn skip_whitespace(&mut self) -> io::Result<bool> {
        loop {
            let reader = self.reader();
            let buf = reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(true);
            }
            let n_ws = buf
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count();
            let n_lines = buf[..n_ws].iter().filter(|b| **b == b'\n').count();
            let done = n_ws < buf.len();
            reader.consume(n_ws);
            self.offset += n_ws as u64;
            self.line += n_lines;
            if done {
                return Ok(false);
            }
        }
    }

    /// Moves the stream to a cursor. Seekable streams jump there directly,
    /// plain streams can only move forward by skipping bytes.
    ///
    /// # Errors
    ///
    /// If the cursor lies behind the current position of a plain stream, or
    /// if seeking fails.
    pub fn seek_to(&mut self, cursor: StreamCursor) -> io::Result<()> {
        if cursor.offset == self.offset {
            self.line = cursor.line;
            return Ok(());
        }
        match &mut self.source {
            Source::Seekable(r) => {
                r.seek(SeekFrom::Start(cursor.offset))?;
            }
            Source::Plain(r) => {
                if cursor.offset < self.offset {
                    return Err(io::Error::new(
                        io::ErrorKind::Unsupported,
                        "cannot rewind a non-seekable stream",
                    ));
                }
                let skip = cursor.offset - self.offset;
                let skipped = io::copy(&mut r.take(skip), &mut io::sink())?;
                if skipped < skip {
                    return Err(io::ErrorKind::UnexpectedEof.into());
                }
            }
        }
        self.offset = cursor.offset;
        self.line = cursor.line;
        Ok(())
    }
}

impl fmt::Debug for InputStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputStream")
            .field("offset", &self.offset)
            .field("line", &self.line)
            .finish_non_exhaustive()
    }
}

/// Trait for decoders of a source format
pub trait ReadInstance {
    /// Decodes the next complete instance from the input. Returns `Ok(None)`
    /// when the stream holds no further instance. Decoding is deterministic
    /// for identical input and cursor.
    ///
    /// # Errors
    ///
    /// [`Error::Malformed`] on syntax violations, [`Error::Unsupported`] for
    /// constructs the IR cannot represent, or [`Error::Io`].
    fn decode_next(&mut self, input: &mut InputStream<'_>) -> Result<Option<Instance>, Error>;

    /// Whether the format can hold more than one instance per stream
    fn is_multi_instance(&self) -> bool {
        false
    }

    /// The current cursor of the reader
    fn cursor(&self) -> StreamCursor;

    /// The byte offset after the last decoded instance
    fn offset(&self) -> u64 {
        self.cursor().offset
    }

    /// Whether the stream is exhausted
    fn at_end(&self) -> bool {
        self.cursor().eof
    }
}

/// Checks the keys of a reader configuration. All readers accept the
/// strategy keys in addition to their own.
pub(crate) fn check_reader_keys(
    opts: &Options,
    component: &'static str,
    own: &[&str],
) -> Result<(), ConfigurationError> {
    let known: Vec<&str> = own.iter().chain(STRATEGY_KEYS.iter()).copied().collect();
    opts.check_keys(component, &known)
}

/// Clears the buffer and reads the next line into it. Returns the position
/// of the line or `None` if the stream is exhausted.
pub(crate) fn next_line(
    input: &mut InputStream<'_>,
    buf: &mut String,
) -> io::Result<Option<Position>> {
    buf.clear();
    let pos = input.position();
    if input.read_line(buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(pos))
}

/// The instance cannot be encoded within the structural limits of a format
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("instance is not representable in {format}: {reason}")]
pub struct UnrepresentableInstance {
    /// The target format
    pub format: &'static str,
    /// The violated limit
    pub reason: String,
}

/// The objective has terms but no direction and the target has no default
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("objective has no optimization direction and {0} has no default direction")]
pub struct AmbiguousObjective(pub &'static str);

/// Encoding errors
#[derive(Error, Debug)]
pub enum WriteError {
    /// Structural limit violated
    #[error(transparent)]
    Unrepresentable(#[from] UnrepresentableInstance),
    /// Unresolved optimization direction
    #[error(transparent)]
    Ambiguous(#[from] AmbiguousObjective),
    /// Error while writing
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Trait for encoders of a target dialect
pub trait WriteInstance {
    /// The file extension used when writing one file per instance
    fn extension(&self) -> &'static str;

    /// Encodes an instance. Implementations check all structural limits
    /// before writing the first byte.
    ///
    /// # Errors
    ///
    /// [`WriteError::Unrepresentable`], [`WriteError::Ambiguous`] or
    /// [`WriteError::Io`].
    fn encode(&self, inst: &Instance, writer: &mut dyn Write) -> Result<(), WriteError>;
}

/// Checks that no constraint has a higher arity than `max`
pub(crate) fn check_arity(
    inst: &Instance,
    format: &'static str,
    max: usize,
) -> Result<(), UnrepresentableInstance> {
    for (idx, constr) in inst.iter_constrs().enumerate() {
        let arity = constr.arity().map_err(|err| UnrepresentableInstance {
            format,
            reason: format!("constraint {}: {err}", idx + 1),
        })?;
        if arity > max {
            return Err(UnrepresentableInstance {
                format,
                reason: format!(
                    "constraint {} has arity {arity}, at most {max} is supported",
                    idx + 1
                ),
            });
        }
    }
    Ok(())
}

/// Checks that all coefficients and right-hand sides are integral
pub(crate) fn check_integral(
    inst: &Instance,
    format: &'static str,
) -> Result<(), UnrepresentableInstance> {
    if let Some(idx) = inst.iter_constrs().position(|c| !c.is_integral()) {
        return Err(UnrepresentableInstance {
            format,
            reason: format!(
                "constraint {} has fractional coefficients, enable normalization",
                idx + 1
            ),
        });
    }
    if !inst.objective().is_integral() {
        return Err(UnrepresentableInstance {
            format,
            reason: String::from("objective has fractional coefficients, enable normalization"),
        });
    }
    Ok(())
}

/// Gets the direction a writer has to encode. `None` for satisfaction
/// instances, the writer's default (if any) for unspecified directions.
pub(crate) fn objective_direction(
    inst: &Instance,
    format: &'static str,
    default: Option<Direction>,
) -> Result<Option<Direction>, AmbiguousObjective> {
    let obj = inst.objective();
    if obj.is_empty() {
        return Ok(None);
    }
    match (obj.direction(), default) {
        (Direction::Unspecified, Some(def)) => {
            tracing::warn!(
                format = format,
                direction = %def,
                "objective direction unspecified, applying writer default"
            );
            Ok(Some(def))
        }
        (Direction::Unspecified, None) => Err(AmbiguousObjective(format)),
        (dir, _) => Ok(Some(dir)),
    }
}

/// Converts a coefficient known to be integral
pub(crate) fn int(c: Coeff) -> i64 {
    debug_assert!(c.is_integer());
    c.to_integer()
}

/// Gets the constraints with zero terms removed and duplicates merged, as
/// written by integer dialects
pub(crate) fn merged(constr: &LinConstraint) -> Vec<crate::types::Term> {
    // overflow was ruled out by `check_arity`
    constr
        .merged_terms()
        .unwrap_or_else(|_| constr.terms().to_vec())
}

/// Problems converting a numeric token into a [`Coeff`]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumError {
    /// Not a number
    #[error("invalid number")]
    Invalid,
    /// Outside the representable range
    #[error("number outside of the supported range")]
    OutOfRange,
}

/// Recognizes a decimal number token `[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?`
pub(crate) fn decimal_token(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(tag("."), digit0)))),
            recognize(pair(tag("."), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)
}

/// Parses a decimal or fraction (`p/q`) token exactly into a [`Coeff`]
pub(crate) fn parse_coeff(token: &str) -> Result<Coeff, NumError> {
    if let Some((num, den)) = token.split_once('/') {
        let num: i64 = num.parse().map_err(|_| NumError::Invalid)?;
        let den: i64 = den.parse().map_err(|_| NumError::Invalid)?;
        if den == 0 {
            return Err(NumError::Invalid);
        }
        return Ok(Coeff::new(num, den));
    }
    let (mantissa, exp) = match token.find(['e', 'E']) {
        Some(pos) => (
            &token[..pos],
            token[pos + 1..]
                .parse::<i32>()
                .map_err(|_| NumError::Invalid)?,
        ),
        None => (token, 0),
    };
    let (neg, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if (int_part.is_empty() && frac_part.is_empty())
        || !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit())
    {
        return Err(NumError::Invalid);
    }
    let digits = format!("{int_part}{frac_part}");
    let digits = digits.trim_start_matches('0');
    let mut num: i64 = if digits.is_empty() {
        0
    } else {
        digits.parse().map_err(|_| NumError::OutOfRange)?
    };
    if neg {
        num = -num;
    }
    let frac_len = i32::try_from(frac_part.len()).map_err(|_| NumError::OutOfRange)?;
    let scale = exp - frac_len;
    if num == 0 {
        return Ok(Coeff::zero());
    }
    let pow = 10i64
        .checked_pow(scale.unsigned_abs())
        .ok_or(NumError::OutOfRange)?;
    if scale >= 0 {
        Coeff::from_integer(num)
            .checked_mul(&Coeff::from_integer(pow))
            .ok_or(NumError::OutOfRange)
    } else {
        Ok(Coeff::new(num, pow))
    }
}

/// Parses a numeric token at a position of the input
pub(crate) fn coeff_at(pos: Position, token: &str) -> Result<Coeff, Error> {
    parse_coeff(token).map_err(|err| match err {
        NumError::Invalid => pos.malformed(format!("invalid number `{token}`")).into(),
        NumError::OutOfRange => pos
            .unsupported(format!("number `{token}` out of range"))
            .into(),
    })
}

/// Opens a reader for the file at Path.
/// With feature `compression` supports bzip2, gzip and xz compression.
///
/// # Errors
///
/// If the file cannot be opened
pub fn open_compressed_uncompressed_read<P: AsRef<Path>>(
    path: P,
) -> Result<InputStream<'static>, io::Error> {
    let path = path.as_ref();
    let raw_reader = fs::File::open(path)?;
    #[cfg(feature = "compression")]
    if let Some(ext) = path.extension() {
        if ext.eq_ignore_ascii_case(std::ffi::OsStr::new("bz2")) {
            return Ok(InputStream::new(io::BufReader::new(
                bzip2::read::BzDecoder::new(raw_reader),
            )));
        }
        if ext.eq_ignore_ascii_case(std::ffi::OsStr::new("gz")) {
            return Ok(InputStream::new(io::BufReader::new(
                flate2::read::GzDecoder::new(raw_reader),
            )));
        }
        if ext.eq_ignore_ascii_case(std::ffi::OsStr::new("xz")) {
            return Ok(InputStream::new(io::BufReader::new(
                xz2::read::XzDecoder::new(raw_reader),
            )));
        }
    }
    Ok(InputStream::seekable(io::BufReader::new(raw_reader)))
}

/// Wraps a writer for the file at Path.
/// With feature `compression` supports bzip2, gzip and xz compression.
pub(crate) fn compressed_uncompressed_write<W: Write + 'static>(
    path: &Path,
    raw_writer: W,
) -> Box<dyn Write> {
    #[cfg(feature = "compression")]
    if let Some(ext) = path.extension() {
        if ext.eq_ignore_ascii_case(std::ffi::OsStr::new("bz2")) {
            return Box::new(io::BufWriter::new(bzip2::write::BzEncoder::new(
                raw_writer,
                bzip2::Compression::fast(),
            )));
        }
        if ext.eq_ignore_ascii_case(std::ffi::OsStr::new("gz")) {
            return Box::new(io::BufWriter::new(flate2::write::GzEncoder::new(
                raw_writer,
                flate2::Compression::fast(),
            )));
        }
        if ext.eq_ignore_ascii_case(std::ffi::OsStr::new("xz")) {
            return Box::new(io::BufWriter::new(xz2::write::XzEncoder::new(
                raw_writer, 1,
            )));
        }
    }
    #[cfg(not(feature = "compression"))]
    let _ = path;
    Box::new(io::BufWriter::new(raw_writer))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{decimal_token, parse_coeff, InputStream, NumError, StreamCursor};
    use crate::coeff;

    #[test]
    fn decimal_tokens() {
        assert_eq!(decimal_token("12 x"), Ok((" x", "12")));
        assert_eq!(decimal_token("-1.5e3,"), Ok((",", "-1.5e3")));
        assert_eq!(decimal_token(".25"), Ok(("", ".25")));
        assert_eq!(decimal_token("+3."), Ok(("", "+3.")));
        assert!(decimal_token("x1").is_err());
    }

    #[test]
    fn exact_coeffs() {
        assert_eq!(parse_coeff("12"), Ok(coeff![12]));
        assert_eq!(parse_coeff("-0.25"), Ok(coeff![-1, 4]));
        assert_eq!(parse_coeff("1.5e2"), Ok(coeff![150]));
        assert_eq!(parse_coeff("15e-1"), Ok(coeff![3, 2]));
        assert_eq!(parse_coeff("3/6"), Ok(coeff![1, 2]));
        assert_eq!(parse_coeff("0.000"), Ok(coeff![0]));
        assert_eq!(parse_coeff("1e40"), Err(NumError::OutOfRange));
        assert_eq!(parse_coeff("1/0"), Err(NumError::Invalid));
        assert_eq!(parse_coeff("abc"), Err(NumError::Invalid));
    }

    #[test]
    fn track_position() {
        let mut input = InputStream::new(Cursor::new("ab\ncd\n\n  \nef"));
        let mut buf = String::new();
        assert_eq!(input.read_line(&mut buf).unwrap(), 3);
        assert_eq!(input.position().line, 2);
        assert_eq!(input.position().offset, 3);
        buf.clear();
        input.read_line(&mut buf).unwrap();
        assert!(!input.skip_whitespace().unwrap());
        assert_eq!(input.position().offset, 10);
        assert_eq!(input.position().line, 5);
        buf.clear();
        input.read_line(&mut buf).unwrap();
        assert_eq!(buf, "ef");
        assert!(input.skip_whitespace().unwrap());
    }

    #[test]
    fn seek_seekable() {
        let mut input = InputStream::seekable(Cursor::new("one\ntwo\n"));
        let mut buf = String::new();
        input.read_line(&mut buf).unwrap();
        let cursor = input.cursor(false);
        buf.clear();
        input.read_line(&mut buf).unwrap();
        input
            .seek_to(StreamCursor {
                offset: 0,
                line: 0,
                eof: false,
            })
            .unwrap();
        buf.clear();
        input.read_line(&mut buf).unwrap();
        assert_eq!(buf, "one\n");
        input.seek_to(cursor).unwrap();
        buf.clear();
        input.read_line(&mut buf).unwrap();
        assert_eq!(buf, "two\n");
    }

    #[test]
    fn seek_plain_forward_only() {
        let mut input = InputStream::new(Cursor::new("one\ntwo\n"));
        input
            .seek_to(StreamCursor {
                offset: 4,
                line: 1,
                eof: false,
            })
            .unwrap();
        let mut buf = String::new();
        input.read_line(&mut buf).unwrap();
        assert_eq!(buf, "two\n");
        assert!(input.seek_to(StreamCursor::default()).is_err());
    }
}
