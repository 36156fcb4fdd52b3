//! # Free MPS Reader
//!
//! Reads integer linear programs in free MPS format. Fields are separated by
//! whitespace, section headers start in the first column and lines starting
//! with `*` are comments.
//!
//! Columns are continuous unless they appear between `INTORG`/`INTEND`
//! markers or have an integer bound type (`BV`, `LI`, `UI`). Continuous
//! columns are rejected unless option `all_integer` is set; integer columns
//! without an upper bound need option `default_ub`.
//!
//! ## References
//!
//! - [MPS format](https://lpsolve.sourceforge.net/5.5/mps-format.htm)

use crate::{
    instances::{Direction, Instance, Objective},
    options::{ConfigurationError, Options},
    types::{Coeff, LinConstraint, Relation, RsHashMap, Term, Var},
};

use super::{
    coeff_at, next_line,
    tabular::{Columns, TabularOptions},
    Error, InputStream, Position, ReadInstance, StreamCursor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Name,
    ObjSense,
    Rows,
    Columns,
    Rhs,
    Bounds,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowKind {
    Objective,
    Free,
    Constr(Relation),
}

#[derive(Debug)]
struct Row {
    kind: RowKind,
    terms: Vec<(usize, Coeff)>,
    rhs: Coeff,
}

/// Everything collected while scanning the sections
#[derive(Debug, Default)]
struct MpsData {
    name: Option<String>,
    direction: Direction,
    rows: Vec<Row>,
    row_index: RsHashMap<String, usize>,
    cols: Columns,
    in_int_block: bool,
}

impl MpsData {
    fn row(&mut self, pos: Position, name: &str) -> Result<&mut Row, Error> {
        match self.row_index.get(name) {
            Some(idx) => Ok(&mut self.rows[*idx]),
            None => Err(pos.malformed(format!("unknown row `{name}`")).into()),
        }
    }

    fn add_row(&mut self, pos: Position, kind: &str, name: &str) -> Result<(), Error> {
        let kind = match kind.to_ascii_uppercase().as_str() {
            "N" if self.rows.iter().any(|r| r.kind == RowKind::Objective) => RowKind::Free,
            "N" => RowKind::Objective,
            "L" => RowKind::Constr(Relation::Le),
            "G" => RowKind::Constr(Relation::Ge),
            "E" => RowKind::Constr(Relation::Eq),
            _ => return Err(pos.malformed(format!("invalid row type `{kind}`")).into()),
        };
        if self.row_index.contains_key(name) {
            return Err(pos.malformed(format!("row `{name}` declared twice")).into());
        }
        self.row_index.insert(name.to_owned(), self.rows.len());
        self.rows.push(Row {
            kind,
            terms: vec![],
            rhs: Coeff::from_integer(0),
        });
        Ok(())
    }

    fn column_line(&mut self, pos: Position, fields: &[&str]) -> Result<(), Error> {
        if fields.len() >= 3 && fields[1].eq_ignore_ascii_case("'MARKER'") {
            match fields[2].to_ascii_uppercase().as_str() {
                "'INTORG'" => self.in_int_block = true,
                "'INTEND'" => self.in_int_block = false,
                other => return Err(pos.malformed(format!("invalid marker {other}")).into()),
            }
            return Ok(());
        }
        if fields.len() != 3 && fields.len() != 5 {
            return Err(pos
                .malformed("expected a column name followed by one or two row/value pairs")
                .into());
        }
        let col = self.cols.get_or_insert(fields[0], pos);
        if self.in_int_block {
            self.cols.col_mut(col).integer = true;
        }
        for pair in fields[1..].chunks(2) {
            let val = coeff_at(pos, pair[1])?;
            self.row(pos, pair[0])?.terms.push((col, val));
        }
        Ok(())
    }

    fn rhs_line(&mut self, pos: Position, fields: &[&str]) -> Result<(), Error> {
        // the rhs set name is optional in free MPS
        let pairs = if fields.len() % 2 == 1 {
            &fields[1..]
        } else {
            fields
        };
        if pairs.is_empty() {
            return Err(pos.malformed("expected row/value pairs").into());
        }
        for pair in pairs.chunks(2) {
            let val = coeff_at(pos, pair[1])?;
            let row = self.row(pos, pair[0])?;
            match row.kind {
                RowKind::Objective if val != Coeff::from_integer(0) => {
                    return Err(pos.unsupported("objective offset").into())
                }
                RowKind::Objective | RowKind::Free => (),
                RowKind::Constr(_) => row.rhs = val,
            }
        }
        Ok(())
    }

    fn bound_line(&mut self, pos: Position, fields: &[&str]) -> Result<(), Error> {
        let Some(kind) = fields.first().map(|k| k.to_ascii_uppercase()) else {
            return Err(pos.malformed("empty bound").into());
        };
        let has_value = !matches!(kind.as_str(), "BV" | "FR" | "MI" | "PL");
        // the bound set name is optional in free MPS
        let (col, value) = match (has_value, fields.len()) {
            (true, 4) => (fields[2], Some(fields[3])),
            (true, 3) => (fields[1], Some(fields[2])),
            (false, 3) => (fields[2], None),
            (false, 2) => (fields[1], None),
            _ => return Err(pos.malformed(format!("invalid {kind} bound")).into()),
        };
        let Some(col) = self.cols.get(col) else {
            return Err(pos.malformed(format!("bound on unknown column `{col}`")).into());
        };
        let value = match value {
            Some(token) => bound_value(pos, token)?,
            None => None,
        };
        let col = self.cols.col_mut(col);
        match kind.as_str() {
            "UP" => col.ub = value,
            "LO" => col.lb = value,
            "FX" => {
                col.lb = value;
                col.ub = value;
            }
            "BV" => col.set_binary(),
            "LI" => {
                col.integer = true;
                col.lb = value;
            }
            "UI" => {
                col.integer = true;
                col.ub = value;
            }
            "MI" => col.lb = None,
            "PL" => col.ub = None,
            "FR" => {
                col.lb = None;
                col.ub = None;
            }
            _ => return Err(pos.malformed(format!("invalid bound type `{kind}`")).into()),
        }
        Ok(())
    }

    fn into_instance(self, opts: TabularOptions) -> Result<Instance, Error> {
        let mut inst = match self.name {
            Some(name) => Instance::with_name(name),
            None => Instance::new(),
        };
        let mut vars: Vec<Var> = Vec::new();
        for col in self.cols.iter() {
            let domain = col.domain(opts)?;
            let var = inst
                .declare_var(col.name.as_str(), domain)
                .map_err(|err| col.pos.malformed(err.to_string()))?;
            vars.push(var);
        }
        let mut obj = Objective::new();
        obj.set_direction(self.direction);
        for row in self.rows {
            let terms = row
                .terms
                .into_iter()
                .map(|(col, coeff)| Term::new(coeff, vars[col]));
            match row.kind {
                RowKind::Objective => terms.for_each(|t| obj.add_term(t)),
                RowKind::Free => (),
                RowKind::Constr(rel) => {
                    let constr = LinConstraint::new(terms, rel, row.rhs);
                    // all columns were declared above
                    inst.add_constr(constr)
                        .map_err(|err| Position::default().malformed(err.to_string()))?;
                }
            }
        }
        inst.set_objective(obj)
            .map_err(|err| Position::default().malformed(err.to_string()))?;
        Ok(inst)
    }
}

/// Parses a bound value, magnitudes from `1e30` on mean infinity
fn bound_value(pos: Position, token: &str) -> Result<Option<Coeff>, Error> {
    let lower = token.to_ascii_lowercase();
    if matches!(
        lower.trim_start_matches(['+', '-']),
        "inf" | "infinity"
    ) {
        return Ok(None);
    }
    if let Ok(val) = token.parse::<f64>() {
        if val.abs() >= 1e30 {
            return Ok(None);
        }
    }
    coeff_at(pos, token).map(Some)
}

/// Reader for free MPS files
#[derive(Debug, Default)]
pub struct Reader {
    opts: TabularOptions,
    cursor: StreamCursor,
}

impl Reader {
    /// Creates a reader. Accepts the options `default_ub` and `all_integer`.
    ///
    /// # Errors
    ///
    /// On unknown option keys or invalid values
    pub fn new(opts: &Options) -> Result<Self, ConfigurationError> {
        Ok(Reader {
            opts: TabularOptions::from_options(opts, "mps")?,
            cursor: StreamCursor::default(),
        })
    }
}

fn section_header(pos: Position, line: &str) -> Result<(Section, Option<&str>), Error> {
    let mut fields = line.splitn(2, char::is_whitespace);
    let keyword = fields.next().unwrap_or_default();
    let rest = fields.next().map(str::trim).filter(|r| !r.is_empty());
    let section = match keyword.to_ascii_uppercase().as_str() {
        "NAME" => Section::Name,
        "OBJSENSE" => Section::ObjSense,
        "ROWS" => Section::Rows,
        "COLUMNS" => Section::Columns,
        "RHS" => Section::Rhs,
        "BOUNDS" => Section::Bounds,
        "ENDATA" => Section::End,
        "RANGES" => return Err(pos.unsupported("RANGES section").into()),
        _ => return Err(pos.malformed(format!("unknown section `{keyword}`")).into()),
    };
    Ok((section, rest))
}

fn objective_sense(pos: Position, token: &str) -> Result<Direction, Error> {
    match token.to_ascii_uppercase().as_str() {
        "MIN" | "MINIMIZE" => Ok(Direction::Minimize),
        "MAX" | "MAXIMIZE" => Ok(Direction::Maximize),
        _ => Err(pos.malformed(format!("invalid objective sense `{token}`")).into()),
    }
}

impl ReadInstance for Reader {
    fn decode_next(&mut self, input: &mut InputStream<'_>) -> Result<Option<Instance>, Error> {
        if self.cursor.eof {
            return Ok(None);
        }
        let mut data = MpsData::default();
        let mut section = Section::Preamble;
        let mut buf = String::new();
        let mut end_pos = input.position();
        while let Some(pos) = next_line(input, &mut buf)? {
            end_pos = pos;
            let line = buf.trim_end();
            if line.trim_start().is_empty() || line.starts_with('*') {
                continue;
            }
            if !line.starts_with(char::is_whitespace) {
                let (next, rest) = section_header(pos, line)?;
                section = next;
                match (section, rest) {
                    (Section::Name, rest) => data.name = rest.map(str::to_owned),
                    (Section::ObjSense, Some(sense)) => {
                        data.direction = objective_sense(pos, sense)?;
                    }
                    (Section::End, _) => break,
                    (_, None) => (),
                    (_, Some(rest)) => {
                        return Err(pos.malformed(format!("unexpected `{rest}` after header")).into())
                    }
                }
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            match section {
                Section::Preamble | Section::Name | Section::End => {
                    return Err(pos.malformed("data line outside of a section").into())
                }
                Section::ObjSense => data.direction = objective_sense(pos, fields[0])?,
                Section::Rows => {
                    let [kind, name] = fields[..] else {
                        return Err(pos.malformed("expected row type and name").into());
                    };
                    data.add_row(pos, kind, name)?;
                }
                Section::Columns => data.column_line(pos, &fields)?,
                Section::Rhs => data.rhs_line(pos, &fields)?,
                Section::Bounds => data.bound_line(pos, &fields)?,
            }
        }
        if section != Section::End {
            return Err(end_pos.malformed("missing ENDATA").into());
        }
        let inst = data.into_instance(self.opts)?;
        tracing::debug!(
            vars = inst.n_vars(),
            constrs = inst.n_constrs(),
            "decoded mps instance"
        );
        self.cursor = input.cursor(true);
        Ok(Some(inst))
    }

    fn cursor(&self) -> StreamCursor {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::Reader;
    use crate::{
        coeff,
        instances::{
            fio::{Error, InputStream, ReadInstance},
            Direction,
        },
        options::Options,
        types::{Domain, Relation},
    };

    const SMALL: &str = "\
* a small example
NAME small
OBJSENSE
    MAX
ROWS
 N obj
 L c1
 G c2
COLUMNS
    MARKER 'MARKER' 'INTORG'
    x obj 1 c1 1
    x c2 1
    y obj 2.5 c1 1
    MARKER 'MARKER' 'INTEND'
RHS
    rhs c1 4 c2 1
BOUNDS
 UP bnd x 3
 BV bnd y
ENDATA
";

    fn read(data: &str, opts: &Options) -> Result<Option<crate::instances::Instance>, Error> {
        let mut reader = Reader::new(opts).unwrap();
        reader.decode_next(&mut InputStream::new(Cursor::new(data.to_owned())))
    }

    #[test]
    fn small() {
        let mut reader = Reader::new(&Options::new()).unwrap();
        let mut input = InputStream::new(Cursor::new(SMALL));
        let inst = reader.decode_next(&mut input).unwrap().unwrap();
        assert_eq!(inst.name(), Some("small"));
        let x = inst.var_by_name("x").unwrap();
        let y = inst.var_by_name("y").unwrap();
        assert_eq!(inst.domain(x), Some(Domain::int(0, 3).unwrap()));
        assert_eq!(inst.domain(y), Some(Domain::Bool));
        assert_eq!(inst.n_constrs(), 2);
        assert_eq!(inst.constrs()[0].rel(), Relation::Le);
        assert_eq!(inst.constrs()[0].rhs(), coeff![4]);
        assert_eq!(inst.constrs()[1].rel(), Relation::Ge);
        assert_eq!(inst.objective().direction(), Direction::Maximize);
        assert_eq!(inst.objective().terms()[1].coeff, coeff![5, 2]);
        assert!(reader.at_end());
        assert!(reader.decode_next(&mut input).unwrap().is_none());
    }

    #[test]
    fn no_sense_is_unspecified() {
        let data = SMALL.replace("OBJSENSE\n    MAX\n", "");
        let inst = read(&data, &Options::new()).unwrap().unwrap();
        assert_eq!(inst.objective().direction(), Direction::Unspecified);
    }

    #[test]
    fn continuous_column() {
        let data = SMALL.replace("    MARKER 'MARKER' 'INTORG'\n", "");
        match read(&data, &Options::new()) {
            Err(Error::Unsupported(err)) => assert!(err.feature.contains("continuous")),
            other => panic!("unexpected result {other:?}"),
        }
        let opts = Options::parse("all_integer=true").unwrap();
        assert!(read(&data, &opts).unwrap().is_some());
    }

    #[test]
    fn unbounded_integer() {
        let data = SMALL.replace(" UP bnd x 3\n", "");
        assert!(matches!(
            read(&data, &Options::new()),
            Err(Error::Unsupported(_))
        ));
        let opts = Options::parse("default_ub=7").unwrap();
        let inst = read(&data, &opts).unwrap().unwrap();
        let x = inst.var_by_name("x").unwrap();
        assert_eq!(inst.domain(x), Some(Domain::int(0, 7).unwrap()));
    }

    #[test]
    fn ranges_unsupported() {
        let data = SMALL.replace("BOUNDS\n", "RANGES\n    rng c1 2\nBOUNDS\n");
        match read(&data, &Options::new()) {
            Err(Error::Unsupported(err)) => assert_eq!(err.pos.line, 17),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn unknown_row() {
        let data = SMALL.replace("    x c2 1\n", "    x c3 1\n");
        match read(&data, &Options::new()) {
            Err(Error::Malformed(err)) => assert_eq!(err.pos.line, 12),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn missing_endata() {
        let data = SMALL.replace("ENDATA\n", "");
        assert!(matches!(
            read(&data, &Options::new()),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn unknown_option() {
        let opts = Options::parse("default_lb=3").unwrap();
        assert!(Reader::new(&opts).is_err());
        let opts = Options::parse("opt_strategy=minimize").unwrap();
        assert!(Reader::new(&opts).is_ok());
    }
}
