//! # Internal Exchange Format
//!
//! A line oriented format that stores an [`Instance`] without loss, including
//! auxiliary variables introduced by transformations and rational
//! coefficients. It is meant for handing instances between tools.
//!
//! ```text
//! c comment
//! n <instance name>
//! v <id> <name> b [aux]
//! v <id> <name> i <lb> <ub> [aux]
//! o min|max|none [<coeff> <id>]*
//! k <=|=|>= <rhs> [<coeff> <id>]*
//! ```
//!
//! Coefficients are integers or fractions `p/q`. Variables must be declared
//! before they are referenced.

use std::io::Write;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, i64 as int, one_of, space0, space1, u32 as uint},
    combinator::{all_consuming, map, opt, recognize, rest, value},
    multi::many0,
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};

use crate::{
    instances::{Direction, Instance, Objective},
    options::{ConfigurationError, Options},
    types::{Domain, LinConstraint, Origin, Relation, Term, Var},
};

use super::{
    check_reader_keys, coeff_at, next_line, Error, InputStream, Position, ReadInstance,
    StreamCursor, WriteError, WriteInstance,
};

/// One line of the exchange format
#[derive(Debug, Clone, PartialEq, Eq)]
enum IncLine<'input> {
    Comment,
    Name(&'input str),
    Var {
        id: u32,
        name: &'input str,
        bounds: Option<(i64, i64)>,
        aux: bool,
    },
    Obj(Direction, Vec<(&'input str, u32)>),
    Constr(Relation, &'input str, Vec<(&'input str, u32)>),
}

/// Reader for the exchange format
#[derive(Debug, Default)]
pub struct Reader {
    cursor: StreamCursor,
}

impl Reader {
    /// Creates a reader. The format has no options of its own.
    ///
    /// # Errors
    ///
    /// On unknown option keys
    pub fn new(opts: &Options) -> Result<Self, ConfigurationError> {
        check_reader_keys(opts, "inc", &[])?;
        Ok(Self::default())
    }
}

fn terms_at(
    pos: Position,
    inst: &Instance,
    raw: Vec<(&str, u32)>,
) -> Result<Vec<Term>, Error> {
    raw.into_iter()
        .map(|(c, id)| {
            let var = Var::new_with_error(id)
                .map_err(|err| pos.malformed(err.to_string()))?;
            if inst.var_info(var).is_none() {
                return Err(pos.malformed(format!("undeclared variable id {id}")).into());
            }
            Ok(Term::new(coeff_at(pos, c)?, var))
        })
        .collect()
}

impl ReadInstance for Reader {
    fn decode_next(&mut self, input: &mut InputStream<'_>) -> Result<Option<Instance>, Error> {
        if self.cursor.eof {
            return Ok(None);
        }
        let mut inst = Instance::new();
        let mut seen_obj = false;
        let mut buf = String::new();
        while let Some(pos) = next_line(input, &mut buf)? {
            if buf.trim().is_empty() {
                continue;
            }
            let (_, line) = inc_line(buf.trim_end())
                .map_err(|_| pos.malformed(format!("invalid line `{}`", buf.trim_end())))?;
            match line {
                IncLine::Comment => (),
                IncLine::Name(name) => inst.set_name(name),
                IncLine::Var {
                    id,
                    name,
                    bounds,
                    aux,
                } => {
                    let var =
                        Var::new_with_error(id).map_err(|err| pos.malformed(err.to_string()))?;
                    let domain = match bounds {
                        None => Domain::Bool,
                        Some((lb, ub)) => {
                            Domain::int(lb, ub).map_err(|err| pos.malformed(err.to_string()))?
                        }
                    };
                    let origin = if aux { Origin::Auxiliary } else { Origin::User };
                    inst.restore_var(var, name, domain, origin)
                        .map_err(|err| pos.malformed(err.to_string()))?;
                }
                IncLine::Obj(direction, raw) => {
                    if seen_obj {
                        return Err(pos.malformed("more than one objective").into());
                    }
                    seen_obj = true;
                    let terms = terms_at(pos, &inst, raw)?;
                    inst.set_objective(Objective::with_terms(direction, terms))
                        .map_err(|err| pos.malformed(err.to_string()))?;
                }
                IncLine::Constr(rel, rhs, raw) => {
                    let rhs = coeff_at(pos, rhs)?;
                    let terms = terms_at(pos, &inst, raw)?;
                    inst.add_constr(LinConstraint::new(terms, rel, rhs))
                        .map_err(|err| pos.malformed(err.to_string()))?;
                }
            }
        }
        self.cursor = input.cursor(true);
        Ok(Some(inst))
    }

    fn cursor(&self) -> StreamCursor {
        self.cursor
    }
}

/// Parses a coefficient token, an integer or a fraction
fn coeff_token(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(one_of("+-")),
        digit1,
        opt(pair(char('/'), digit1)),
    )))(input)
}

fn name_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace())(input)
}

fn term_list(input: &str) -> IResult<&str, Vec<(&str, u32)>> {
    many0(preceded(
        space1,
        map(tuple((coeff_token, space1, uint)), |(c, _, id)| (c, id)),
    ))(input)
}

fn relation(input: &str) -> IResult<&str, Relation> {
    alt((
        value(Relation::Le, tag("<=")),
        value(Relation::Ge, tag(">=")),
        value(Relation::Eq, tag("=")),
    ))(input)
}

fn inc_line(input: &str) -> IResult<&str, IncLine<'_>> {
    all_consuming(terminated(
        alt((
            value(IncLine::Comment, pair(char('c'), opt(pair(space1, rest)))),
            map(
                preceded(pair(char('n'), space1), rest),
                |name: &str| IncLine::Name(name.trim()),
            ),
            map(
                tuple((
                    preceded(pair(char('v'), space1), uint),
                    preceded(space1, name_token),
                    preceded(
                        space1,
                        alt((
                            value(None, char('b')),
                            map(
                                tuple((char('i'), space1, int, space1, int)),
                                |(_, _, lb, _, ub)| Some((lb, ub)),
                            ),
                        )),
                    ),
                    opt(preceded(space1, tag("aux"))),
                )),
                |(id, name, bounds, aux)| IncLine::Var {
                    id,
                    name,
                    bounds,
                    aux: aux.is_some(),
                },
            ),
            map(
                tuple((
                    preceded(
                        pair(char('o'), space1),
                        alt((
                            value(Direction::Minimize, tag("min")),
                            value(Direction::Maximize, tag("max")),
                            value(Direction::Unspecified, tag("none")),
                        )),
                    ),
                    term_list,
                )),
                |(dir, terms)| IncLine::Obj(dir, terms),
            ),
            map(
                tuple((
                    preceded(pair(char('k'), space1), relation),
                    preceded(space1, coeff_token),
                    term_list,
                )),
                |(rel, rhs, terms)| IncLine::Constr(rel, rhs, terms),
            ),
        )),
        space0,
    ))(input)
}

/// Writer for the exchange format
#[derive(Debug)]
pub struct Writer {
    comments: bool,
}

impl Writer {
    /// Creates a writer. Option `comments` (default `true`) controls the
    /// header comment.
    ///
    /// # Errors
    ///
    /// On unknown option keys or invalid values
    pub fn new(opts: &Options) -> Result<Self, ConfigurationError> {
        opts.check_keys("inc", &["comments"])?;
        Ok(Writer {
            comments: opts.get_bool("comments")?.unwrap_or(true),
        })
    }
}

fn write_terms(writer: &mut dyn Write, terms: &[Term]) -> std::io::Result<()> {
    terms
        .iter()
        .try_for_each(|t| write!(writer, " {} {}", t.coeff, t.var.idx32()))
}

impl WriteInstance for Writer {
    fn extension(&self) -> &'static str {
        "inc"
    }

    fn encode(&self, inst: &Instance, writer: &mut dyn Write) -> Result<(), WriteError> {
        if self.comments {
            writeln!(
                writer,
                "c {} variables, {} constraints, written by ilpconv",
                inst.n_vars(),
                inst.n_constrs()
            )?;
        }
        if let Some(name) = inst.name() {
            writeln!(writer, "n {name}")?;
        }
        for (var, info) in inst.vars() {
            write!(writer, "v {} {} ", var.idx32(), info.name)?;
            match info.domain {
                Domain::Bool => write!(writer, "b")?,
                Domain::Int { lb, ub } => write!(writer, "i {lb} {ub}")?,
            }
            if info.origin == Origin::Auxiliary {
                write!(writer, " aux")?;
            }
            writeln!(writer)?;
        }
        let obj = inst.objective();
        if !obj.is_empty() || obj.direction().is_specified() {
            let dir = match obj.direction() {
                Direction::Minimize => "min",
                Direction::Maximize => "max",
                Direction::Unspecified => "none",
            };
            write!(writer, "o {dir}")?;
            write_terms(writer, obj.terms())?;
            writeln!(writer)?;
        }
        for constr in inst.iter_constrs() {
            write!(writer, "k {} {}", constr.rel(), constr.rhs())?;
            write_terms(writer, constr.terms())?;
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{inc_line, IncLine, Reader, Writer};
    use crate::{
        coeff,
        instances::{
            fio::{Error, InputStream, ReadInstance, WriteInstance},
            Direction, Instance, Objective,
        },
        options::Options,
        types::{Domain, LinConstraint, Relation, Term},
    };

    #[test]
    fn parse_lines() {
        assert_eq!(inc_line("c hello there"), Ok(("", IncLine::Comment)));
        assert_eq!(inc_line("n my inst "), Ok(("", IncLine::Name("my inst"))));
        assert_eq!(
            inc_line("v 3 x3 i -2 5 aux"),
            Ok((
                "",
                IncLine::Var {
                    id: 3,
                    name: "x3",
                    bounds: Some((-2, 5)),
                    aux: true
                }
            ))
        );
        assert_eq!(
            inc_line("k >= -1/2 3 1 -1 2"),
            Ok((
                "",
                IncLine::Constr(Relation::Ge, "-1/2", vec![("3", 1), ("-1", 2)])
            ))
        );
        assert_eq!(
            inc_line("o none"),
            Ok(("", IncLine::Obj(Direction::Unspecified, vec![])))
        );
        assert!(inc_line("k < 3 1 1").is_err());
    }

    #[test]
    fn undeclared_reference() {
        let mut reader = Reader::default();
        let mut input = InputStream::new(Cursor::new("v 1 x b\nk <= 1 1 1 1 2\n"));
        match reader.decode_next(&mut input) {
            Err(Error::Malformed(err)) => assert_eq!(err.pos.line, 2),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn round_trip() {
        let mut inst = Instance::with_name("rt");
        let x = inst.declare_var("x", Domain::Bool).unwrap();
        let y = inst.declare_var("y", Domain::int(-3, 7).unwrap()).unwrap();
        let a = inst.new_aux_var(Domain::int(0, 4).unwrap()).unwrap();
        inst.add_constr(LinConstraint::new_eq(
            [Term::int(1, x), Term::int(3, y), Term::int(-1, a)],
            coeff![0],
        ))
        .unwrap();
        inst.add_constr(LinConstraint::new(
            [Term::new(coeff![1, 3], a)],
            Relation::Le,
            coeff![5, 2],
        ))
        .unwrap();
        inst.set_objective(Objective::with_terms(
            Direction::Maximize,
            [Term::int(2, x), Term::int(-1, y)],
        ))
        .unwrap();

        let writer = Writer::new(&Options::new()).unwrap();
        let mut buf = Vec::new();
        writer.encode(&inst, &mut buf).unwrap();

        let mut reader = Reader::new(&Options::new()).unwrap();
        let mut input = InputStream::new(Cursor::new(buf));
        let parsed = reader.decode_next(&mut input).unwrap().unwrap();
        assert_eq!(parsed, inst);
        assert!(reader.at_end());
        assert!(reader.decode_next(&mut input).unwrap().is_none());
    }
}
