//! # FlatZinc Reader
//!
//! Reads flattened constraint models in FlatZinc that only use linear
//! constraints over integer and Boolean variables. Supported items are
//!
//! - Boolean and integer parameters and parameter arrays,
//! - `var bool`, `var L..U` and `var int` declarations, optionally with an
//!   assigned value or alias,
//! - variable arrays,
//! - the constraints `int_lin_le`, `int_lin_eq`, `int_lin_ge`, `bool_lin_le`
//!   and `bool_lin_eq`,
//! - `solve satisfy`, `solve minimize x` and `solve maximize x`.
//!
//! Annotations are skipped. Everything else is reported as unsupported.
//! Unbounded `var int` declarations get the domain `-u..u` where `u` is the
//! value of option `default_ub`.
//!
//! ## References
//!
//! - [FlatZinc](https://docs.minizinc.dev/en/stable/fzn-spec.html)

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1, take_while, take_while1},
    character::complete::{char, i64 as int, multispace0, multispace1},
    combinator::{all_consuming, map, opt, recognize, value},
    error::{Error as NomError, ErrorKind},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

use crate::{
    instances::{Direction, Instance, Objective},
    options::{ConfigurationError, Options},
    types::{Coeff, Domain, LinConstraint, Relation, RsHashMap, Term, Var},
};

use super::{check_reader_keys, next_line, Error, InputStream, Position, ReadInstance, StreamCursor};

/// A FlatZinc expression as it appears in items
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr<'a> {
    Bool(bool),
    Int(i64),
    Ident(&'a str),
    Array(Vec<Expr<'a>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum VarType<'a> {
    Bool,
    Int,
    Range(i64, i64),
    Other(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Goal<'a> {
    Satisfy,
    Optimize(Direction, Expr<'a>),
}

/// The supported items
#[derive(Debug, Clone, PartialEq, Eq)]
enum Item<'a> {
    Param {
        name: &'a str,
        value: Expr<'a>,
    },
    Var {
        ty: VarType<'a>,
        name: &'a str,
        value: Option<Expr<'a>>,
    },
    Array {
        is_var: bool,
        name: &'a str,
        value: Expr<'a>,
    },
    Constraint {
        name: &'a str,
        args: Vec<Expr<'a>>,
    },
    Solve(Goal<'a>),
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn ident(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn expr(input: &str) -> IResult<&str, Expr<'_>> {
    alt((
        map(
            delimited(
                char('['),
                separated_list0(char(','), ws(expr)),
                preceded(multispace0, char(']')),
            ),
            Expr::Array,
        ),
        map(int, Expr::Int),
        map(ident, |id| match id {
            "true" => Expr::Bool(true),
            "false" => Expr::Bool(false),
            _ => Expr::Ident(id),
        }),
    ))(input)
}

/// Skips a balanced parenthesized argument list, if there is one
fn skip_args(input: &str) -> IResult<&str, ()> {
    let (args, _) = multispace0(input)?;
    if !args.starts_with('(') {
        return Ok((input, ()));
    }
    let mut depth = 0usize;
    for (idx, c) in args.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&args[idx + 1..], ()));
                }
            }
            _ => (),
        }
    }
    Err(nom::Err::Error(NomError::new(args, ErrorKind::Char)))
}

/// Skips any number of `:: annotation` suffixes
fn annotations(mut input: &str) -> IResult<&str, ()> {
    loop {
        let (rest, _) = multispace0(input)?;
        let Some(rest) = rest.strip_prefix("::") else {
            return Ok((input, ()));
        };
        let (rest, _) = preceded(multispace0, ident)(rest)?;
        let (rest, ()) = skip_args(rest)?;
        input = rest;
    }
}

fn var_type(input: &str) -> IResult<&str, VarType<'_>> {
    alt((
        value(VarType::Bool, terminated(tag("bool"), multispace0)),
        value(VarType::Int, terminated(tag("int"), multispace0)),
        map(
            ws(separated_pair(int, ws(tag("..")), int)),
            |(lb, ub)| VarType::Range(lb, ub),
        ),
        map(take_till1(|c: char| c == ':'), |ty: &str| VarType::Other(ty.trim())),
    ))(input)
}

fn var_item(input: &str) -> IResult<&str, Item<'_>> {
    map(
        tuple((
            preceded(pair(tag("var"), multispace1), var_type),
            preceded(ws(char(':')), ident),
            annotations,
            opt(preceded(ws(char('=')), expr)),
        )),
        |(ty, name, (), value)| Item::Var { ty, name, value },
    )(input)
}

fn array_item(input: &str) -> IResult<&str, Item<'_>> {
    map(
        tuple((
            preceded(
                tuple((
                    tag("array"),
                    ws(char('[')),
                    separated_pair(int, ws(tag("..")), int),
                    ws(char(']')),
                    tag("of"),
                    multispace1,
                )),
                opt(terminated(tag("var"), multispace1)),
            ),
            terminated(take_till1(|c: char| c == ':'), char(':')),
            ws(ident),
            annotations,
            preceded(ws(char('=')), expr),
        )),
        |(is_var, _, name, (), value)| Item::Array {
            is_var: is_var.is_some(),
            name,
            value,
        },
    )(input)
}

fn param_item(input: &str) -> IResult<&str, Item<'_>> {
    map(
        tuple((
            alt((tag("int"), tag("bool"))),
            preceded(ws(char(':')), ident),
            annotations,
            preceded(ws(char('=')), expr),
        )),
        |(_, name, (), value)| Item::Param { name, value },
    )(input)
}

fn constraint_item(input: &str) -> IResult<&str, Item<'_>> {
    map(
        tuple((
            preceded(pair(tag("constraint"), multispace1), ident),
            delimited(
                ws(char('(')),
                separated_list0(char(','), ws(expr)),
                char(')'),
            ),
            annotations,
        )),
        |(name, args, ())| Item::Constraint { name, args },
    )(input)
}

fn solve_item(input: &str) -> IResult<&str, Item<'_>> {
    map(
        preceded(
            pair(tag("solve"), annotations),
            preceded(
                multispace0,
                alt((
                    value(Goal::Satisfy, tag("satisfy")),
                    map(
                        separated_pair(
                            alt((
                                value(Direction::Minimize, tag("minimize")),
                                value(Direction::Maximize, tag("maximize")),
                            )),
                            multispace1,
                            expr,
                        ),
                        |(dir, obj)| Goal::Optimize(dir, obj),
                    ),
                )),
            ),
        ),
        Item::Solve,
    )(input)
}

/// Parses one item (without the terminating `;`)
fn item(pos: Position, stmt: &str) -> Result<Item<'_>, Error> {
    let keyword = ident(stmt).map_or("", |(_, kw)| kw);
    let parser = match keyword {
        "var" => var_item,
        "array" => array_item,
        "int" | "bool" => param_item,
        "constraint" => constraint_item,
        "solve" => solve_item,
        "predicate" | "set" | "float" => {
            return Err(pos.unsupported(format!("`{keyword}` item")).into())
        }
        _ => return Err(pos.malformed(format!("unknown item `{stmt}`")).into()),
    };
    all_consuming(terminated(parser, multispace0))(stmt)
        .map(|(_, item)| item)
        .map_err(|_| pos.malformed(format!("invalid {keyword} item")).into())
}

/// Either a variable or a constant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Var(Var),
    Const(i64),
}

/// Named entities declared so far
#[derive(Debug, Default)]
struct Scope {
    params: RsHashMap<String, i64>,
    param_arrays: RsHashMap<String, Vec<i64>>,
    var_arrays: RsHashMap<String, Vec<Operand>>,
}

impl Scope {
    fn int(&self, pos: Position, e: &Expr<'_>) -> Result<i64, Error> {
        match e {
            Expr::Int(i) => Ok(*i),
            Expr::Bool(b) => Ok(i64::from(*b)),
            Expr::Ident(name) => self
                .params
                .get(*name)
                .copied()
                .ok_or_else(|| pos.malformed(format!("`{name}` is not a parameter")).into()),
            Expr::Array(_) => Err(pos.malformed("expected a number").into()),
        }
    }

    fn int_array(&self, pos: Position, e: &Expr<'_>) -> Result<Vec<i64>, Error> {
        match e {
            Expr::Array(elems) => elems.iter().map(|e| self.int(pos, e)).collect(),
            Expr::Ident(name) => self
                .param_arrays
                .get(*name)
                .cloned()
                .ok_or_else(|| pos.malformed(format!("`{name}` is not a parameter array")).into()),
            _ => Err(pos.malformed("expected an array").into()),
        }
    }

    fn operand(&self, inst: &Instance, pos: Position, e: &Expr<'_>) -> Result<Operand, Error> {
        if let Expr::Ident(name) = e {
            if let Some(var) = inst.var_by_name(name) {
                return Ok(Operand::Var(var));
            }
        }
        self.int(pos, e).map(Operand::Const)
    }

    fn operand_array(
        &self,
        inst: &Instance,
        pos: Position,
        e: &Expr<'_>,
    ) -> Result<Vec<Operand>, Error> {
        match e {
            Expr::Array(elems) => elems.iter().map(|e| self.operand(inst, pos, e)).collect(),
            Expr::Ident(name) => match self.var_arrays.get(*name) {
                Some(ops) => Ok(ops.clone()),
                None => Ok(self
                    .int_array(pos, e)?
                    .into_iter()
                    .map(Operand::Const)
                    .collect()),
            },
            _ => Err(pos.malformed("expected an array").into()),
        }
    }
}

fn overflow(pos: Position) -> Error {
    pos.unsupported("integer overflow in constraint").into()
}

/// Builds `sum coeffs * ops rel rhs`, moving constants to the right-hand
/// side and a variable right-hand side to the left
fn linear(
    pos: Position,
    coeffs: &[i64],
    ops: &[Operand],
    rel: Relation,
    rhs: Operand,
) -> Result<LinConstraint, Error> {
    if coeffs.len() != ops.len() {
        return Err(pos
            .malformed(format!(
                "{} coefficients for {} variables",
                coeffs.len(),
                ops.len()
            ))
            .into());
    }
    let mut terms = Vec::with_capacity(ops.len() + 1);
    let mut bound: i64 = 0;
    for (c, op) in coeffs.iter().zip(ops) {
        match op {
            Operand::Var(v) => terms.push(Term::int(*c, *v)),
            Operand::Const(k) => {
                let prod = c.checked_mul(*k).ok_or_else(|| overflow(pos))?;
                bound = bound.checked_sub(prod).ok_or_else(|| overflow(pos))?;
            }
        }
    }
    match rhs {
        Operand::Var(v) => terms.push(Term::int(-1, v)),
        Operand::Const(k) => bound = bound.checked_add(k).ok_or_else(|| overflow(pos))?,
    }
    Ok(LinConstraint::new(terms, rel, Coeff::from_integer(bound)))
}

/// Reader for FlatZinc files
#[derive(Debug, Default)]
pub struct Reader {
    default_ub: Option<i64>,
    cursor: StreamCursor,
}

impl Reader {
    /// Creates a reader. Accepts the option `default_ub`.
    ///
    /// # Errors
    ///
    /// On unknown option keys or invalid values
    pub fn new(opts: &Options) -> Result<Self, ConfigurationError> {
        check_reader_keys(opts, "fznimf", &["default_ub"])?;
        let default_ub: Option<i64> = opts.get_parsed("default_ub")?;
        if let Some(ub) = default_ub {
            if ub < 0 {
                return Err(ConfigurationError::InvalidValue {
                    key: String::from("default_ub"),
                    value: ub.to_string(),
                    reason: String::from("must not be negative"),
                });
            }
        }
        Ok(Reader {
            default_ub,
            cursor: StreamCursor::default(),
        })
    }

    fn declare(
        &self,
        inst: &mut Instance,
        pos: Position,
        ty: &VarType<'_>,
        name: &str,
    ) -> Result<Var, Error> {
        let domain = match ty {
            VarType::Bool => Domain::Bool,
            VarType::Range(lb, ub) => {
                Domain::int(*lb, *ub).map_err(|err| pos.malformed(err.to_string()))?
            }
            VarType::Int => match self.default_ub {
                Some(ub) => Domain::int(-ub, ub).map_err(|err| pos.malformed(err.to_string()))?,
                None => {
                    return Err(pos
                        .unsupported(format!(
                            "unbounded variable `{name}` and no `default_ub` is set"
                        ))
                        .into())
                }
            },
            VarType::Other(ty) => {
                return Err(pos.unsupported(format!("variable type `{ty}`")).into())
            }
        };
        inst.declare_var(name, domain)
            .map_err(|err| pos.malformed(err.to_string()).into())
    }
}

/// Splits the model text into items with their positions, dropping
/// `%` comments
fn split_items(
    text: &str,
    line_starts: &[usize],
    base: Position,
) -> Result<Vec<(Position, String)>, Error> {
    let to_pos = |off: usize| Position {
        line: base.line + line_starts.partition_point(|s| *s <= off) - 1,
        offset: base.offset + off as u64,
    };
    let mut items = vec![];
    let mut current = String::new();
    let mut start = None;
    let mut in_comment = false;
    for (off, c) in text.char_indices() {
        if in_comment {
            in_comment = c != '\n';
            continue;
        }
        match c {
            '%' => in_comment = true,
            ';' => {
                let pos = to_pos(start.unwrap_or(off));
                items.push((pos, std::mem::take(&mut current)));
                start = None;
            }
            c => {
                if start.is_none() && !c.is_whitespace() {
                    start = Some(off);
                }
                current.push(c);
            }
        }
    }
    if let Some(off) = start {
        return Err(to_pos(off).malformed("item is not terminated by `;`").into());
    }
    Ok(items)
}

impl ReadInstance for Reader {
    fn decode_next(&mut self, input: &mut InputStream<'_>) -> Result<Option<Instance>, Error> {
        if self.cursor.eof {
            return Ok(None);
        }
        let base = input.position();
        let mut text = String::new();
        let mut line_starts = vec![];
        let mut buf = String::new();
        while next_line(input, &mut buf)?.is_some() {
            line_starts.push(text.len());
            text.push_str(&buf);
        }
        if line_starts.is_empty() {
            line_starts.push(0);
        }

        let mut inst = Instance::new();
        let mut scope = Scope::default();
        let mut solved = false;
        for (pos, stmt) in split_items(&text, &line_starts, base)? {
            if stmt.trim().is_empty() {
                continue;
            }
            if solved {
                return Err(pos.malformed("item after the solve item").into());
            }
            match item(pos, stmt.trim())? {
                Item::Param { name, value } => match value {
                    Expr::Array(_) => {
                        return Err(pos.malformed("array value for scalar parameter").into())
                    }
                    val => {
                        let val = scope.int(pos, &val)?;
                        scope.params.insert(name.to_owned(), val);
                    }
                },
                Item::Var { ty, name, value } => {
                    let var = self.declare(&mut inst, pos, &ty, name)?;
                    if let Some(value) = value {
                        // fixed values and aliases become equalities
                        let rhs = scope.operand(&inst, pos, &value)?;
                        let constr = linear(pos, &[1], &[Operand::Var(var)], Relation::Eq, rhs)?;
                        inst.add_constr(constr)
                            .map_err(|err| pos.malformed(err.to_string()))?;
                    }
                }
                Item::Array {
                    is_var: true,
                    name,
                    value,
                } => {
                    let ops = scope.operand_array(&inst, pos, &value)?;
                    scope.var_arrays.insert(name.to_owned(), ops);
                }
                Item::Array {
                    is_var: false,
                    name,
                    value,
                } => {
                    let vals = scope.int_array(pos, &value)?;
                    scope.param_arrays.insert(name.to_owned(), vals);
                }
                Item::Constraint { name, args } => {
                    let rel = match name {
                        "int_lin_le" | "bool_lin_le" => Relation::Le,
                        "int_lin_eq" | "bool_lin_eq" => Relation::Eq,
                        "int_lin_ge" => Relation::Ge,
                        _ => return Err(pos.unsupported(format!("constraint `{name}`")).into()),
                    };
                    let [coeffs, ops, rhs] = &args[..] else {
                        return Err(pos
                            .malformed(format!("`{name}` expects three arguments"))
                            .into());
                    };
                    let coeffs = scope.int_array(pos, coeffs)?;
                    let ops = scope.operand_array(&inst, pos, ops)?;
                    let rhs = scope.operand(&inst, pos, rhs)?;
                    let constr = linear(pos, &coeffs, &ops, rel, rhs)?;
                    inst.add_constr(constr)
                        .map_err(|err| pos.malformed(err.to_string()))?;
                }
                Item::Solve(goal) => {
                    solved = true;
                    if let Goal::Optimize(dir, obj) = goal {
                        let Operand::Var(var) = scope.operand(&inst, pos, &obj)? else {
                            return Err(pos.unsupported("constant objective").into());
                        };
                        inst.set_objective(Objective::with_terms(dir, [Term::int(1, var)]))
                            .map_err(|err| pos.malformed(err.to_string()))?;
                    }
                }
            }
        }
        if !solved {
            return Err(input.position().malformed("missing solve item").into());
        }
        tracing::debug!(
            vars = inst.n_vars(),
            constrs = inst.n_constrs(),
            "decoded flatzinc instance"
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

    use super::{annotations, expr, item, Expr, Goal, Item, Reader, VarType};
    use crate::{
        coeff,
        instances::{
            fio::{Error, InputStream, Position, ReadInstance},
            Direction, Instance,
        },
        options::Options,
        types::{Domain, Relation, Term},
    };

    const MODEL: &str = "\
% a small model
array [1..3] of int: cs = [2, 3, -1];
var bool: b :: output_var;
var 0..5: x :: output_var;
var 1..4: y;
var 0..10: z = 4;
array [1..2] of var int: out :: output_array([1..2]) = [x, y];
constraint int_lin_le(cs, [x, y, z], 12);
constraint int_lin_eq([1, 1], out, 5) :: domain;
constraint bool_lin_le([1, 1], [b, true], 1);
solve :: int_search([x, y], input_order, indomain_min, complete) maximize x;
";

    fn read(data: &str, opts: &Options) -> Result<Option<Instance>, Error> {
        let mut reader = Reader::new(opts).unwrap();
        reader.decode_next(&mut InputStream::new(Cursor::new(data.to_owned())))
    }

    #[test]
    fn expressions() {
        assert_eq!(
            expr("[1, -2 ,x]"),
            Ok((
                "",
                Expr::Array(vec![Expr::Int(1), Expr::Int(-2), Expr::Ident("x")])
            ))
        );
        assert_eq!(expr("true"), Ok(("", Expr::Bool(true))));
        assert_eq!(annotations(" :: a(b(1), [c]) :: d rest"), Ok((" rest", ())));
    }

    #[test]
    fn items() {
        let pos = Position::default();
        assert_eq!(
            item(pos, "var -3..3: v :: output_var").unwrap(),
            Item::Var {
                ty: VarType::Range(-3, 3),
                name: "v",
                value: None
            }
        );
        assert_eq!(
            item(pos, "solve minimize obj").unwrap(),
            Item::Solve(Goal::Optimize(Direction::Minimize, Expr::Ident("obj")))
        );
        assert!(matches!(
            item(pos, "predicate my_pred(var int: x)"),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(item(pos, "var 0..3 x"), Err(Error::Malformed(_))));
    }

    #[test]
    fn model() {
        let inst = read(MODEL, &Options::new()).unwrap().unwrap();
        assert_eq!(inst.n_vars(), 4);
        let b = inst.var_by_name("b").unwrap();
        let x = inst.var_by_name("x").unwrap();
        let y = inst.var_by_name("y").unwrap();
        let z = inst.var_by_name("z").unwrap();
        assert_eq!(inst.domain(b), Some(Domain::Bool));
        assert_eq!(inst.domain(y), Some(Domain::int(1, 4).unwrap()));
        // z = 4, the linear le, the linear eq and the bool constraint
        assert_eq!(inst.n_constrs(), 4);
        assert_eq!(inst.constrs()[0].terms(), &[Term::int(1, z)]);
        assert_eq!(inst.constrs()[0].rhs(), coeff![4]);
        assert_eq!(
            inst.constrs()[1].terms(),
            &[Term::int(2, x), Term::int(3, y), Term::int(-1, z)]
        );
        assert_eq!(inst.constrs()[2].rel(), Relation::Eq);
        assert_eq!(inst.constrs()[3].terms(), &[Term::int(1, b)]);
        assert_eq!(inst.constrs()[3].rhs(), coeff![0]);
        assert_eq!(inst.objective().direction(), Direction::Maximize);
        assert_eq!(inst.objective().terms(), &[Term::int(1, x)]);
    }

    #[test]
    fn unbounded_int() {
        let data = "var int: x;\nsolve satisfy;\n";
        assert!(matches!(
            read(data, &Options::new()),
            Err(Error::Unsupported(_))
        ));
        let inst = read(data, &Options::parse("default_ub=8").unwrap())
            .unwrap()
            .unwrap();
        let x = inst.var_by_name("x").unwrap();
        assert_eq!(inst.domain(x), Some(Domain::int(-8, 8).unwrap()));
        assert!(inst.objective().is_empty());
    }

    #[test]
    fn unknown_constraint() {
        let data = "var 0..3: x;\nvar 0..3: y;\nconstraint int_lin_ne([1, 1], [x, y], 2);\nsolve satisfy;\n";
        match read(data, &Options::new()) {
            Err(Error::Unsupported(err)) => {
                assert_eq!(err.pos.line, 3);
                assert!(err.feature.contains("int_lin_ne"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn missing_solve() {
        assert!(matches!(
            read("var bool: b;\n", &Options::new()),
            Err(Error::Malformed(_))
        ));
        assert!(matches!(
            read("var bool: b", &Options::new()),
            Err(Error::Malformed(_))
        ));
    }
}
