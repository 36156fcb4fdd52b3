//! Column bookkeeping shared by the MPS and LP readers

use crate::{
    options::{ConfigurationError, Options},
    types::{Coeff, Domain, RsHashMap},
};

use super::{check_reader_keys, Error, Position};

/// Reader options of the tabular formats
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TabularOptions {
    /// Upper bound for integer columns without one
    pub default_ub: Option<i64>,
    /// Treat columns without integrality marker as integer
    pub all_integer: bool,
}

impl TabularOptions {
    pub const KEYS: [&'static str; 2] = ["default_ub", "all_integer"];

    pub fn from_options(opts: &Options, component: &'static str) -> Result<Self, ConfigurationError> {
        check_reader_keys(opts, component, &Self::KEYS)?;
        Ok(TabularOptions {
            default_ub: opts.get_parsed("default_ub")?,
            all_integer: opts.get_bool("all_integer")?.unwrap_or(false),
        })
    }
}

/// A column (variable) of a tabular instance. Bounds of `None` are infinite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Column {
    pub name: String,
    pub integer: bool,
    pub binary: bool,
    pub lb: Option<Coeff>,
    pub ub: Option<Coeff>,
    /// Where the column was first seen
    pub pos: Position,
}

impl Column {
    fn new(name: &str, pos: Position) -> Self {
        Column {
            name: name.to_owned(),
            integer: false,
            binary: false,
            lb: Some(Coeff::from_integer(0)),
            ub: None,
            pos,
        }
    }

    pub fn set_binary(&mut self) {
        self.integer = true;
        self.binary = true;
        self.lb = Some(Coeff::from_integer(0));
        self.ub = Some(Coeff::from_integer(1));
    }

    /// Derives the integer domain. Fractional bounds are rounded inwards.
    pub fn domain(&self, opts: TabularOptions) -> Result<Domain, Error> {
        if !self.integer && !opts.all_integer {
            return Err(self
                .pos
                .unsupported(format!("continuous variable `{}`", self.name))
                .into());
        }
        if self.binary && self.lb == Some(Coeff::from_integer(0)) && self.ub == Some(Coeff::from_integer(1)) {
            return Ok(Domain::Bool);
        }
        let Some(lb) = self.lb else {
            return Err(self
                .pos
                .unsupported(format!("variable `{}` has no lower bound", self.name))
                .into());
        };
        let ub = match (self.ub, opts.default_ub) {
            (Some(ub), _) => ub.floor().to_integer(),
            (None, Some(ub)) => ub,
            (None, None) => {
                return Err(self
                    .pos
                    .unsupported(format!(
                        "variable `{}` has no upper bound and no `default_ub` is set",
                        self.name
                    ))
                    .into())
            }
        };
        Domain::int(lb.ceil().to_integer(), ub)
            .map_err(|err| self.pos.malformed(format!("variable `{}`: {err}", self.name)).into())
    }
}

/// Columns in order of first appearance
#[derive(Debug, Default)]
pub(crate) struct Columns {
    cols: Vec<Column>,
    index: RsHashMap<String, usize>,
}

impl Columns {
    /// Gets the index of a column, adding it if it is new
    pub fn get_or_insert(&mut self, name: &str, pos: Position) -> usize {
        if let Some(idx) = self.index.get(name) {
            return *idx;
        }
        let idx = self.cols.len();
        self.cols.push(Column::new(name, pos));
        self.index.insert(name.to_owned(), idx);
        idx
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn col_mut(&mut self, idx: usize) -> &mut Column {
        &mut self.cols[idx]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.cols.iter()
    }
}
