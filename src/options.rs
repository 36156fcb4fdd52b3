//! # String Options for Readers and Writers
//!
//! Readers and writers are configured through a mapping of string keys to
//! string values. The mapping is usually parsed from a `key=value;key=value`
//! command line argument. Every component validates its keys when it is
//! constructed, so a typo fails before any input is read.

use std::{collections::BTreeMap, fmt, str::FromStr};

use thiserror::Error;

/// Errors in the configuration of a component
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A key that the component does not know
    #[error("unknown option `{key}` for {component}")]
    UnknownKey {
        /// The component being configured
        component: &'static str,
        /// The offending key
        key: String,
    },
    /// A value that cannot be interpreted
    #[error("invalid value `{value}` for option `{key}`: {reason}")]
    InvalidValue {
        /// The option key
        key: String,
        /// The offending value
        value: String,
        /// Why it was rejected
        reason: String,
    },
    /// An option string that is not a list of `key=value` pairs
    #[error("invalid option syntax `{0}`, expected `key=value`")]
    Syntax(String),
    /// A format key that is not registered
    #[error("unknown {kind} format `{key}`")]
    UnknownFormat {
        /// Either "reader" or "writer"
        kind: &'static str,
        /// The requested format
        key: String,
    },
}

/// An ordered mapping of option keys to values
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Options(BTreeMap<String, String>);

impl Options {
    /// Creates an empty option mapping
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a semicolon separated list of `key=value` pairs. Empty entries
    /// are skipped; later duplicates overwrite earlier ones.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::Syntax`] if an entry has no `=` or an empty key
    pub fn parse(spec: &str) -> Result<Self, ConfigurationError> {
        let mut opts = Options::new();
        for entry in spec.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((key, value)) = entry.split_once('=') else {
                return Err(ConfigurationError::Syntax(entry.to_owned()));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigurationError::Syntax(entry.to_owned()));
            }
            opts.insert(key, value.trim());
        }
        Ok(opts)
    }

    /// Sets an option
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    /// Gets the raw value of an option
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Checks if no options are set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all options in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Checks that only known keys are set
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::UnknownKey`] for the first unknown key
    pub fn check_keys(
        &self,
        component: &'static str,
        known: &[&str],
    ) -> Result<(), ConfigurationError> {
        match self.0.keys().find(|k| !known.contains(&k.as_str())) {
            Some(key) => Err(ConfigurationError::UnknownKey {
                component,
                key: key.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Gets an option parsed into a type
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::InvalidValue`] if the value does not parse
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigurationError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get(key)
            .map(|value| {
                value
                    .parse()
                    .map_err(|err: T::Err| ConfigurationError::InvalidValue {
                        key: key.to_owned(),
                        value: value.to_owned(),
                        reason: err.to_string(),
                    })
            })
            .transpose()
    }

    /// Gets a boolean option. Accepts `true`/`false`, `yes`/`no`, `1`/`0`.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::InvalidValue`] for other values
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigurationError> {
        self.get(key)
            .map(|value| match value.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(ConfigurationError::InvalidValue {
                    key: key.to_owned(),
                    value: value.to_owned(),
                    reason: String::from("expected a boolean"),
                }),
            })
            .transpose()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Options {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Options(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
