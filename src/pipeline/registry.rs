//! # Format Registry
//!
//! Maps format keys to reader and writer constructors. The registry is
//! built once and handed to every conversion; each conversion constructs its
//! own reader and writer from it.

use std::collections::BTreeMap;

use crate::{
    instances::fio::{
        aspartame, casp, fznimf, inc, lp, mps, pisinger, sugar, ReadInstance, WriteInstance,
    },
    options::{ConfigurationError, Options},
};

/// Constructs a reader from its options
pub type ReaderCtor = fn(&Options) -> Result<Box<dyn ReadInstance>, ConfigurationError>;

/// Constructs a writer from its options
pub type WriterCtor = fn(&Options) -> Result<Box<dyn WriteInstance>, ConfigurationError>;

fn boxed_reader<R: ReadInstance + 'static>(
    reader: Result<R, ConfigurationError>,
) -> Result<Box<dyn ReadInstance>, ConfigurationError> {
    let reader: Box<dyn ReadInstance> = Box::new(reader?);
    Ok(reader)
}

fn boxed_writer<W: WriteInstance + 'static>(
    writer: Result<W, ConfigurationError>,
) -> Result<Box<dyn WriteInstance>, ConfigurationError> {
    let writer: Box<dyn WriteInstance> = Box::new(writer?);
    Ok(writer)
}

/// Known readers and writers by key
#[derive(Clone)]
pub struct Registry {
    readers: BTreeMap<&'static str, ReaderCtor>,
    writers: BTreeMap<&'static str, WriterCtor>,
}

impl Default for Registry {
    /// The registry with all built-in formats
    fn default() -> Self {
        let mut reg = Registry::empty();
        reg.register_reader("mps", |opts| boxed_reader(mps::Reader::new(opts)));
        reg.register_reader("lp", |opts| boxed_reader(lp::Reader::new(opts)));
        reg.register_reader("pisinger", |opts| {
            boxed_reader(pisinger::Reader::new(opts))
        });
        reg.register_reader("fznimf", |opts| boxed_reader(fznimf::Reader::new(opts)));
        reg.register_reader("inc", |opts| boxed_reader(inc::Reader::new(opts)));
        reg.register_writer("sugar", |opts| boxed_writer(sugar::Writer::new(opts)));
        reg.register_writer("aspartame", |opts| {
            boxed_writer(aspartame::Writer::new(opts))
        });
        reg.register_writer("casp", |opts| boxed_writer(casp::Writer::new(opts)));
        reg.register_writer("inc", |opts| boxed_writer(inc::Writer::new(opts)));
        reg
    }
}

impl Registry {
    /// Creates a registry without any formats
    #[must_use]
    pub fn empty() -> Self {
        Registry {
            readers: BTreeMap::new(),
            writers: BTreeMap::new(),
        }
    }

    /// Registers a reader, replacing a previous one with the same key
    pub fn register_reader(&mut self, key: &'static str, ctor: ReaderCtor) {
        self.readers.insert(key, ctor);
    }

    /// Registers a writer, replacing a previous one with the same key
    pub fn register_writer(&mut self, key: &'static str, ctor: WriterCtor) {
        self.writers.insert(key, ctor);
    }

    /// Constructs the reader registered under a key
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::UnknownFormat`] for unregistered keys, or the
    /// error of the reader's constructor
    pub fn reader(
        &self,
        key: &str,
        opts: &Options,
    ) -> Result<Box<dyn ReadInstance>, ConfigurationError> {
        let ctor = self
            .readers
            .get(key)
            .ok_or_else(|| ConfigurationError::UnknownFormat {
                kind: "reader",
                key: key.to_owned(),
            })?;
        ctor(opts)
    }

    /// Constructs the writer registered under a key
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::UnknownFormat`] for unregistered keys, or the
    /// error of the writer's constructor
    pub fn writer(
        &self,
        key: &str,
        opts: &Options,
    ) -> Result<Box<dyn WriteInstance>, ConfigurationError> {
        let ctor = self
            .writers
            .get(key)
            .ok_or_else(|| ConfigurationError::UnknownFormat {
                kind: "writer",
                key: key.to_owned(),
            })?;
        ctor(opts)
    }

    /// The registered reader keys in order
    pub fn reader_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.readers.keys().copied()
    }

    /// The registered writer keys in order
    pub fn writer_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.writers.keys().copied()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("readers", &self.readers.keys().collect::<Vec<_>>())
            .field("writers", &self.writers.keys().collect::<Vec<_>>())
            .finish()
    }
}
