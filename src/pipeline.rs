//! # Conversion Pipeline
//!
//! Drives instances from a reader through the transformations to a writer.
//! A [`Converter`] owns one reader and one writer and converts one input
//! stream at a time:
//!
//! ```text
//! Idle -> Reading -> Resolving -> Normalizing -> Splitting -> Writing -> (Reading | Exhausted)
//! ```
//!
//! Any stage can fail, which aborts the stream. Instances written before the
//! failure stay written, the failing instance is never partially written.
//!
//! ## Example Usage
//!
//! ```
//! use std::io::Cursor;
//!
//! use ilpconv::{
//!     instances::fio::InputStream,
//!     options::Options,
//!     pipeline::{Job, Registry, StreamSink},
//! };
//!
//! let mut job = Job::new("inc", "sugar");
//! job.reader_opts = Options::parse("default_opt_strategy=min").unwrap();
//! let mut converter = Registry::default().converter(&job).unwrap();
//!
//! let input = "v 1 x i 0 3\nk <= 2 1 1\no none 2 1\n";
//! let mut input = InputStream::new(Cursor::new(input));
//! let mut sink = StreamSink::new(Vec::new());
//! let summary = converter.run(&mut input, "<stdin>", &mut sink).unwrap();
//! assert_eq!(summary.n_written, 1);
//! assert!(String::from_utf8(sink.into_inner())
//!     .unwrap()
//!     .contains("(objective minimize _obj)"));
//! ```

use std::{fmt, io, num::NonZeroUsize, path::PathBuf};

use thiserror::Error;

use crate::{
    instances::{
        fio::{
            self, open_compressed_uncompressed_read, InputStream, ReadInstance, WriteError,
            WriteInstance,
        },
        Instance,
    },
    options::{ConfigurationError, Options},
    transforms::{
        normalize::{Normalizer, PrecisionLoss},
        split::{split_instance, SplitError},
        strategy::Strategy,
    },
};

mod registry;
mod sink;

pub use registry::{ReaderCtor, Registry, WriterCtor};
pub use sink::{DirSink, Sink, StreamSink};

/// The state of a [`Converter`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Not running, or stopped at the requested instance count
    #[default]
    Idle,
    /// Decoding the next instance
    Reading,
    /// Resolving the optimization direction
    Resolving,
    /// Scaling to integer coefficients
    Normalizing,
    /// Splitting constraints
    Splitting,
    /// Encoding and committing an instance
    Writing,
    /// The input stream holds no further instance
    Exhausted,
    /// A stage failed
    Failed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Idle => "idle",
            State::Reading => "reading",
            State::Resolving => "resolving",
            State::Normalizing => "normalizing",
            State::Splitting => "splitting",
            State::Writing => "writing",
            State::Exhausted => "exhausted",
            State::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// What went wrong in a stage
#[derive(Error, Debug)]
pub enum StageError {
    /// Decoding failed
    #[error(transparent)]
    Decode(#[from] fio::Error),
    /// The instance cannot be scaled to integer coefficients
    #[error(transparent)]
    Precision(#[from] PrecisionLoss),
    /// Splitting failed
    #[error(transparent)]
    Split(#[from] SplitError),
    /// Encoding failed
    #[error(transparent)]
    Write(#[from] WriteError),
    /// Committing to the sink failed
    #[error("output error: {0}")]
    Output(#[from] io::Error),
}

/// A failed stage of a conversion run
#[derive(Error, Debug)]
#[error("{label} (instance {index}, {stage}): {source}")]
pub struct RunError {
    /// The instance label, or the input name if decoding failed
    pub label: String,
    /// The 1-based index of the instance in the stream
    pub index: usize,
    /// The stage that failed
    pub stage: State,
    /// The underlying error
    pub source: StageError,
}

/// Settings of the transformation stages
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Direction override and default
    pub strategy: Strategy,
    /// Skip splitting
    pub no_split: bool,
    /// Scale to integer coefficients, if set
    pub normalizer: Option<Normalizer>,
    /// The maximum number of instances to convert per stream, unbounded if
    /// `None`
    pub count: Option<NonZeroUsize>,
}

/// What a conversion run did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// The number of written instances
    pub n_written: usize,
    /// The number of auxiliary variables introduced by splitting
    pub n_aux: usize,
    /// Paths of written files, for sinks that write files
    pub outputs: Vec<PathBuf>,
    /// Whether the input stream was read to its end
    pub exhausted: bool,
}

/// Converts input streams with one reader and one writer
pub struct Converter {
    reader: Box<dyn ReadInstance>,
    writer: Box<dyn WriteInstance>,
    settings: PipelineSettings,
    state: State,
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// Creates a converter from a reader and a writer
    #[must_use]
    pub fn new(
        reader: Box<dyn ReadInstance>,
        writer: Box<dyn WriteInstance>,
        settings: PipelineSettings,
    ) -> Self {
        Converter {
            reader,
            writer,
            settings,
            state: State::Idle,
        }
    }

    /// The current state
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// The transformation settings
    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs the transformation stages on a decoded instance
    fn transform(&mut self, inst: &mut Instance) -> Result<usize, StageError> {
        self.state = State::Resolving;
        self.settings.strategy.apply(inst);

        self.state = State::Normalizing;
        if let Some(normalizer) = self.settings.normalizer {
            normalizer.normalize(inst)?;
        }

        self.state = State::Splitting;
        if self.settings.no_split {
            return Ok(0);
        }
        Ok(split_instance(inst)?.n_aux)
    }

    /// Converts the instances of an input stream. `source` names the input
    /// in log messages and errors, e.g., a path or `<stdin>`.
    ///
    /// Single-instance readers stop after one instance. Multi-instance
    /// readers continue until the stream ends or the requested count is
    /// reached. In the latter case the converter is [`State::Idle`] again and
    /// the summary reports a stream that is not exhausted.
    ///
    /// # Errors
    ///
    /// The first failing stage. Instances committed before stay committed.
    pub fn run(
        &mut self,
        input: &mut InputStream<'_>,
        source: &str,
        sink: &mut dyn Sink,
    ) -> Result<RunSummary, RunError> {
        let mut summary = RunSummary::default();
        loop {
            let index = summary.n_written + 1;
            self.state = State::Reading;
            let mut inst = match self.reader.decode_next(input) {
                Ok(Some(inst)) => inst,
                Ok(None) => {
                    self.state = State::Exhausted;
                    summary.exhausted = true;
                    return Ok(summary);
                }
                Err(err) => return Err(self.fail(source.to_owned(), index, err.into())),
            };
            let label = match inst.name() {
                Some(name) => name.to_owned(),
                None if self.reader.is_multi_instance() => {
                    format!("<stream instance #{index}>")
                }
                None => source.to_owned(),
            };

            let n_aux = match self.transform(&mut inst) {
                Ok(n_aux) => n_aux,
                Err(err) => return Err(self.fail(label, index, err)),
            };

            self.state = State::Writing;
            let mut buf = Vec::new();
            if let Err(err) = self.writer.encode(&inst, &mut buf) {
                return Err(self.fail(label, index, err.into()));
            }
            let output = match sink.commit(inst.name(), self.writer.extension(), &buf) {
                Ok(output) => output,
                Err(err) => return Err(self.fail(label, index, err.into())),
            };
            match &output {
                Some(path) => tracing::info!(
                    instance = %label,
                    output = %path.display(),
                    "wrote instance"
                ),
                None => tracing::info!(instance = %label, "wrote instance"),
            }
            summary.n_written += 1;
            summary.n_aux += n_aux;
            summary.outputs.extend(output);

            if !self.reader.is_multi_instance() || self.reader.at_end() {
                self.state = State::Exhausted;
                summary.exhausted = true;
                return Ok(summary);
            }
            if self
                .settings
                .count
                .is_some_and(|count| summary.n_written >= count.get())
            {
                tracing::debug!(
                    source,
                    offset = self.reader.offset(),
                    "reached requested instance count"
                );
                self.state = State::Idle;
                return Ok(summary);
            }
        }
    }

    fn fail(&mut self, label: String, index: usize, source: StageError) -> RunError {
        let stage = self.state;
        self.state = State::Failed;
        RunError {
            label,
            index,
            stage,
            source,
        }
    }
}

/// A conversion job: the formats, their options and the pipeline settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Reader key
    pub reader: String,
    /// Reader options, including the direction keys of [`Strategy`]
    pub reader_opts: Options,
    /// Writer key
    pub writer: String,
    /// Writer options
    pub writer_opts: Options,
    /// Pipeline settings. The strategy is merged with the one from the reader
    /// options, where the reader options take precedence.
    pub settings: PipelineSettings,
}

impl Job {
    /// Creates a job with empty options and default settings
    pub fn new<R: Into<String>, W: Into<String>>(reader: R, writer: W) -> Self {
        Job {
            reader: reader.into(),
            reader_opts: Options::new(),
            writer: writer.into(),
            writer_opts: Options::new(),
            settings: PipelineSettings::default(),
        }
    }
}

impl Registry {
    /// Constructs a converter for a job
    ///
    /// # Errors
    ///
    /// If a format is unknown or an option is invalid
    pub fn converter(&self, job: &Job) -> Result<Converter, ConfigurationError> {
        let reader = self.reader(&job.reader, &job.reader_opts)?;
        let writer = self.writer(&job.writer, &job.writer_opts)?;
        let from_opts = Strategy::from_options(&job.reader_opts)?;
        let mut settings = job.settings;
        settings.strategy = Strategy {
            override_dir: from_opts.override_dir.or(settings.strategy.override_dir),
            default_dir: from_opts.default_dir.or(settings.strategy.default_dir),
        };
        Ok(Converter::new(reader, writer, settings))
    }
}

/// An input of a batch conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Standard input
    Stdin,
    /// A file, possibly compressed
    File(PathBuf),
}

impl Input {
    /// Interprets `-` as standard input and anything else as a path
    pub fn from_arg<S: AsRef<str>>(arg: S) -> Self {
        match arg.as_ref() {
            "-" => Input::Stdin,
            path => Input::File(PathBuf::from(path)),
        }
    }

    fn open(&self) -> io::Result<InputStream<'static>> {
        match self {
            Input::Stdin => Ok(InputStream::new(io::stdin().lock())),
            Input::File(path) => open_compressed_uncompressed_read(path),
        }
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Stdin => write!(f, "<stdin>"),
            Input::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Errors converting one input of a batch
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The job is misconfigured
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// The input cannot be opened
    #[error("cannot open {input}: {source}")]
    Open {
        /// The input
        input: String,
        /// The underlying error
        source: io::Error,
    },
    /// A stage failed
    #[error(transparent)]
    Run(#[from] RunError),
}

/// The outcome of a batch conversion, one entry per input in order
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// The inputs with the result of their conversion
    pub results: Vec<(Input, Result<RunSummary, ConvertError>)>,
}

impl BatchSummary {
    /// The number of failed inputs
    #[must_use]
    pub fn n_failed(&self) -> usize {
        self.results.iter().filter(|(_, res)| res.is_err()).count()
    }

    /// The number of instances written over all inputs
    #[must_use]
    pub fn n_written(&self) -> usize {
        self.results
            .iter()
            .filter_map(|(_, res)| res.as_ref().ok())
            .map(|sum| sum.n_written)
            .sum()
    }
}

/// Converts inputs one after another. Every input gets its own reader and
/// writer; a failing input does not stop the remaining ones.
pub fn convert_batch<I>(
    registry: &Registry,
    job: &Job,
    inputs: I,
    sink: &mut dyn Sink,
) -> BatchSummary
where
    I: IntoIterator<Item = Input>,
{
    let mut batch = BatchSummary::default();
    for input in inputs {
        let res = convert_input(registry, job, &input, sink);
        match &res {
            Ok(summary) => tracing::debug!(
                input = %input,
                written = summary.n_written,
                exhausted = summary.exhausted,
                "converted input"
            ),
            Err(err) => tracing::error!(input = %input, "{err}"),
        }
        batch.results.push((input, res));
    }
    batch
}

fn convert_input(
    registry: &Registry,
    job: &Job,
    input: &Input,
    sink: &mut dyn Sink,
) -> Result<RunSummary, ConvertError> {
    let mut converter = registry.converter(job)?;
    let mut stream = input.open().map_err(|source| ConvertError::Open {
        input: input.to_string(),
        source,
    })?;
    Ok(converter.run(&mut stream, &input.to_string(), sink)?)
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, num::NonZeroUsize};

    use super::{Converter, Job, PipelineSettings, Registry, StageError, State, StreamSink};
    use crate::{
        instances::fio::{InputStream, WriteError},
        options::Options,
    };

    const KNAPSACKS: &str = "\
knap1
n 2
c 5
1,3,4,0
2,2,2,0
-----

knap2
n 1
c 1
1,7,1,0
-----
";

    fn converter(reader: &str, writer: &str, settings: PipelineSettings) -> Converter {
        let mut job = Job::new(reader, writer);
        job.settings = settings;
        Registry::default().converter(&job).unwrap()
    }

    #[test]
    fn stream_to_end() {
        let mut conv = converter("pisinger", "inc", PipelineSettings::default());
        let mut input = InputStream::new(Cursor::new(KNAPSACKS));
        let mut sink = StreamSink::new(Vec::new());
        let summary = conv.run(&mut input, "<stdin>", &mut sink).unwrap();
        assert_eq!(summary.n_written, 2);
        assert!(summary.exhausted);
        assert!(summary.outputs.is_empty());
        assert_eq!(conv.state(), State::Exhausted);
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.contains("n knap1\n"));
        assert!(out.contains("n knap2\n"));
    }

    #[test]
    fn stops_at_count() {
        let settings = PipelineSettings {
            count: NonZeroUsize::new(1),
            ..PipelineSettings::default()
        };
        let mut conv = converter("pisinger", "inc", settings);
        let mut input = InputStream::new(Cursor::new(KNAPSACKS));
        let mut sink = StreamSink::new(Vec::new());
        let summary = conv.run(&mut input, "<stdin>", &mut sink).unwrap();
        assert_eq!(summary.n_written, 1);
        assert!(!summary.exhausted);
        assert_eq!(conv.state(), State::Idle);
        // resuming picks up the next instance
        let summary = conv.run(&mut input, "<stdin>", &mut sink).unwrap();
        assert_eq!(summary.n_written, 1);
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.contains("n knap2\n"));
    }

    #[test]
    fn failure_keeps_earlier_output() {
        let input = format!("{KNAPSACKS}\nknap3\nn 1\n");
        let mut conv = converter("pisinger", "inc", PipelineSettings::default());
        let mut input = InputStream::new(Cursor::new(input));
        let mut sink = StreamSink::new(Vec::new());
        let err = conv.run(&mut input, "<stdin>", &mut sink).unwrap_err();
        assert_eq!(err.stage, State::Reading);
        assert_eq!(err.index, 3);
        assert!(matches!(err.source, StageError::Decode(_)));
        assert_eq!(conv.state(), State::Failed);
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.contains("n knap2\n"));
    }

    #[test]
    fn ambiguous_objective_writes_nothing() {
        let mut conv = converter("inc", "sugar", PipelineSettings::default());
        let mut input = InputStream::new(Cursor::new("v 1 x b\no none 1 1\n"));
        let mut sink = StreamSink::new(Vec::new());
        let err = conv.run(&mut input, "model.inc", &mut sink).unwrap_err();
        assert_eq!(err.stage, State::Writing);
        assert_eq!(err.label, "model.inc");
        assert!(matches!(
            err.source,
            StageError::Write(WriteError::Ambiguous(_))
        ));
        assert!(sink.into_inner().is_empty());
    }

    #[test]
    fn strategy_from_reader_options() {
        let mut job = Job::new("inc", "sugar");
        job.reader_opts = Options::parse("opt_strategy=max").unwrap();
        let conv = Registry::default().converter(&job).unwrap();
        assert_eq!(
            conv.settings().strategy.override_dir,
            Some(crate::instances::Direction::Maximize)
        );
        job.reader_opts = Options::parse("opt_strategy=sideways").unwrap();
        assert!(Registry::default().converter(&job).is_err());
    }
}
