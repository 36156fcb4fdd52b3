//! # CPLEX LP Reader
//!
//! Reads the subset of the CPLEX LP format that describes integer linear
//! programs: an objective section, `Subject To`, `Bounds`, `General` and
//! `Binary` sections and a final `End`. Expressions may span several lines,
//! comments start with `\`.
//!
//! ```text
//! \ example
//! Maximize
//!  obj: 3 x + 2 y
//! Subject To
//!  c1: x + y <= 4
//!  c2: x - y >= -2
//! Bounds
//!  0 <= x <= 3
//!  y <= 5
//! General
//!  x y
//! End
//! ```
//!
//! ## References
//!
//! - [LP format](https://www.ibm.com/docs/en/icos/22.1.1?topic=cplex-lp-file-format-algebraic-representation)

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, space0},
    combinator::{map, recognize, value},
    sequence::pair,
    IResult,
};

use crate::{
    instances::{Direction, Instance, Objective},
    options::{ConfigurationError, Options},
    types::{Coeff, LinConstraint, Relation, Term, Var},
};

use super::{
    coeff_at, decimal_token, next_line,
    tabular::{Columns, TabularOptions},
    Error, InputStream, Position, ReadInstance, StreamCursor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Objective,
    Constraints,
    Bounds,
    General,
    Binary,
    End,
}

/// Recognizes a section keyword at the start of a line, returns the
/// remainder of the line
fn section_keyword(line: &str) -> Option<(Section, Option<Direction>, &str)> {
    const KEYWORDS: [(&str, Section, Option<Direction>); 19] = [
        ("minimize", Section::Objective, Some(Direction::Minimize)),
        ("minimum", Section::Objective, Some(Direction::Minimize)),
        ("min", Section::Objective, Some(Direction::Minimize)),
        ("maximize", Section::Objective, Some(Direction::Maximize)),
        ("maximum", Section::Objective, Some(Direction::Maximize)),
        ("max", Section::Objective, Some(Direction::Maximize)),
        ("subject to", Section::Constraints, None),
        ("such that", Section::Constraints, None),
        ("s.t.", Section::Constraints, None),
        ("st", Section::Constraints, None),
        ("bounds", Section::Bounds, None),
        ("bound", Section::Bounds, None),
        ("generals", Section::General, None),
        ("general", Section::General, None),
        ("gen", Section::General, None),
        ("binaries", Section::Binary, None),
        ("binary", Section::Binary, None),
        ("bin", Section::Binary, None),
        ("end", Section::End, None),
    ];
    let lower = line.to_ascii_lowercase();
    KEYWORDS.iter().find_map(|(kw, section, dir)| {
        let rest = lower.strip_prefix(kw)?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        Some((*section, *dir, &line[kw.len()..]))
    })
}

fn is_infinity(token: &str) -> bool {
    token.eq_ignore_ascii_case("inf") || token.eq_ignore_ascii_case("infinity")
}

/// Lexical tokens of LP expressions
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Num(&'a str),
    Ident(&'a str),
    Sign(bool),
    Rel(Relation),
    Colon,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || "_!\"#$%&()/,;?@'{}|~".contains(c)
}

fn is_ident_char(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit() || c == '.'
}

fn ident(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(is_ident_start),
        take_while(is_ident_char),
    ))(input)
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        value(Token::Rel(Relation::Le), alt((tag("<="), tag("=<"), tag("<")))),
        value(Token::Rel(Relation::Ge), alt((tag(">="), tag("=>"), tag(">")))),
        value(Token::Rel(Relation::Eq), tag("=")),
        value(Token::Sign(true), char('-')),
        value(Token::Sign(false), char('+')),
        value(Token::Colon, char(':')),
        map(decimal_token, Token::Num),
        map(ident, Token::Ident),
    ))(input)
}

/// Splits a line into tokens
fn tokenize(pos: Position, line: &str) -> Result<Vec<(Token<'_>, Position)>, Error> {
    let mut tokens = vec![];
    let mut rest = line;
    loop {
        let (trimmed, _) = space0::<_, nom::error::Error<&str>>(rest)
            .map_err(|_| pos.malformed("invalid whitespace"))?;
        if trimmed.is_empty() {
            return Ok(tokens);
        }
        let (remain, tok) = token(trimmed)
            .map_err(|_| pos.malformed(format!("unexpected input `{trimmed}`")))?;
        tokens.push((tok, pos));
        rest = remain;
    }
}

/// Tokens of a whole section, owned so they can span lines
#[derive(Debug, Clone, PartialEq, Eq)]
enum OwnedToken {
    Num(String),
    Ident(String),
    Sign(bool),
    Rel(Relation),
    Colon,
}

impl From<Token<'_>> for OwnedToken {
    fn from(tok: Token<'_>) -> Self {
        match tok {
            Token::Num(n) => OwnedToken::Num(n.to_owned()),
            Token::Ident(i) => OwnedToken::Ident(i.to_owned()),
            Token::Sign(neg) => OwnedToken::Sign(neg),
            Token::Rel(rel) => OwnedToken::Rel(rel),
            Token::Colon => OwnedToken::Colon,
        }
    }
}

type Tokens = Vec<(OwnedToken, Position)>;

/// Reader for CPLEX LP files
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
            opts: TabularOptions::from_options(opts, "lp")?,
            cursor: StreamCursor::default(),
        })
    }
}

/// A linear expression over column indices
type Expr = Vec<(usize, Coeff)>;

#[derive(Debug, Default)]
struct LpData {
    direction: Direction,
    obj: Expr,
    constrs: Vec<(Expr, Relation, Coeff)>,
    cols: Columns,
}

/// Cursor over the tokens of one section
struct TokenIter<'t> {
    tokens: &'t [(OwnedToken, Position)],
    idx: usize,
    end: Position,
}

impl<'t> TokenIter<'t> {
    fn peek(&self) -> Option<&'t OwnedToken> {
        self.tokens.get(self.idx).map(|(t, _)| t)
    }

    fn peek_at(&self, ahead: usize) -> Option<&'t OwnedToken> {
        self.tokens.get(self.idx + ahead).map(|(t, _)| t)
    }

    fn pos(&self) -> Position {
        self.tokens.get(self.idx).map_or(self.end, |(_, p)| *p)
    }

    fn bump(&mut self) {
        self.idx += 1;
    }

    fn skip_label(&mut self) {
        if matches!(self.peek(), Some(OwnedToken::Ident(_)))
            && matches!(self.peek_at(1), Some(OwnedToken::Colon))
        {
            self.idx += 2;
        }
    }

    fn signs(&mut self) -> bool {
        let mut neg = false;
        while let Some(OwnedToken::Sign(n)) = self.peek() {
            neg ^= *n;
            self.bump();
        }
        neg
    }
}

impl LpData {
    /// Parses `[+-] [coeff] var` terms until a relation or the end
    fn expr(&mut self, iter: &mut TokenIter<'_>) -> Result<Expr, Error> {
        let mut expr = vec![];
        loop {
            match iter.peek() {
                None | Some(OwnedToken::Rel(_)) => return Ok(expr),
                // the next labelled statement starts
                Some(OwnedToken::Ident(_)) if matches!(iter.peek_at(1), Some(OwnedToken::Colon)) => {
                    return Ok(expr)
                }
                _ => (),
            }
            let pos = iter.pos();
            let neg = iter.signs();
            let mut coeff = Coeff::from_integer(1);
            if let Some(OwnedToken::Num(n)) = iter.peek() {
                coeff = coeff_at(iter.pos(), n)?;
                iter.bump();
            }
            match iter.peek() {
                Some(OwnedToken::Ident(name)) => {
                    let col = self.cols.get_or_insert(name, iter.pos());
                    iter.bump();
                    expr.push((col, if neg { -coeff } else { coeff }));
                }
                Some(OwnedToken::Rel(_)) | None => {
                    return Err(pos.unsupported("constant term in expression").into())
                }
                Some(tok) => return Err(pos.malformed(format!("unexpected token {tok:?}")).into()),
            }
        }
    }

    fn objective(&mut self, tokens: &Tokens, end: Position) -> Result<(), Error> {
        let mut iter = TokenIter {
            tokens,
            idx: 0,
            end,
        };
        iter.skip_label();
        self.obj = self.expr(&mut iter)?;
        if iter.peek().is_some() {
            return Err(iter.pos().malformed("unexpected token in objective").into());
        }
        Ok(())
    }

    fn constraints(&mut self, tokens: &Tokens, end: Position) -> Result<(), Error> {
        let mut iter = TokenIter {
            tokens,
            idx: 0,
            end,
        };
        while iter.peek().is_some() {
            iter.skip_label();
            let expr = self.expr(&mut iter)?;
            let Some(OwnedToken::Rel(rel)) = iter.peek() else {
                return Err(iter.pos().malformed("expected a relational operator").into());
            };
            iter.bump();
            let pos = iter.pos();
            let neg = iter.signs();
            let Some(OwnedToken::Num(rhs)) = iter.peek() else {
                return Err(pos.malformed("expected a numeric right-hand side").into());
            };
            let rhs = coeff_at(pos, rhs)?;
            iter.bump();
            self.constrs
                .push((expr, *rel, if neg { -rhs } else { rhs }));
        }
        Ok(())
    }

    /// Parses a single bound line
    fn bound(&mut self, tokens: &[(Token<'_>, Position)], pos: Position) -> Result<(), Error> {
        use Token::{Ident, Num, Rel, Sign};

        let value = |neg: bool, tok: &Token<'_>| -> Result<Option<Coeff>, Error> {
            match tok {
                Num(n) => {
                    let v = coeff_at(pos, n)?;
                    Ok(Some(if neg { -v } else { v }))
                }
                Ident(i) if is_infinity(i) => Ok(None),
                _ => Err(pos.malformed("expected a bound value").into()),
            }
        };
        // strip signs into flags so the patterns stay short
        let mut simple: Vec<(bool, &Token<'_>)> = vec![];
        let mut neg = false;
        for (tok, _) in tokens {
            if let Sign(n) = tok {
                neg ^= *n;
            } else {
                simple.push((neg, tok));
                neg = false;
            }
        }
        match simple[..] {
            [(_, Ident(x)), (_, Ident(free))] if free.eq_ignore_ascii_case("free") => {
                let col = self.cols.get_or_insert(x, pos);
                let col = self.cols.col_mut(col);
                col.lb = None;
                col.ub = None;
            }
            [(ln, l), (_, Rel(r1)), (_, Ident(x)), (_, Rel(r2)), (un, u)]
                if *r1 == Relation::Le && *r2 == Relation::Le =>
            {
                let (lb, ub) = (value(ln, l)?, value(un, u)?);
                let col = self.cols.get_or_insert(x, pos);
                let col = self.cols.col_mut(col);
                col.lb = lb;
                col.ub = ub;
            }
            [(_, Ident(x)), (_, Rel(rel)), (vn, v)] if !is_infinity(x) => {
                let v = value(vn, v)?;
                let col = self.cols.get_or_insert(x, pos);
                let col = self.cols.col_mut(col);
                match rel {
                    Relation::Le => col.ub = v,
                    Relation::Ge => col.lb = v,
                    Relation::Eq => {
                        col.lb = v;
                        col.ub = v;
                    }
                }
            }
            [(vn, v @ (Num(_) | Ident(_))), (_, Rel(rel)), (_, Ident(x))] => {
                let v = value(vn, v)?;
                let col = self.cols.get_or_insert(x, pos);
                let col = self.cols.col_mut(col);
                match rel {
                    Relation::Le => col.lb = v,
                    Relation::Ge => col.ub = v,
                    Relation::Eq => {
                        col.lb = v;
                        col.ub = v;
                    }
                }
            }
            _ => return Err(pos.malformed("invalid bound").into()),
        }
        Ok(())
    }

    fn into_instance(self, opts: TabularOptions) -> Result<Instance, Error> {
        let mut inst = Instance::new();
        let mut vars: Vec<Var> = Vec::new();
        for col in self.cols.iter() {
            let domain = col.domain(opts)?;
            let var = inst
                .declare_var(col.name.as_str(), domain)
                .map_err(|err| col.pos.malformed(err.to_string()))?;
            vars.push(var);
        }
        let to_terms =
            |expr: Expr| -> Vec<Term> { expr.into_iter().map(|(c, k)| Term::new(k, vars[c])).collect() };
        for (expr, rel, rhs) in self.constrs {
            inst.add_constr(LinConstraint::new(to_terms(expr), rel, rhs))
                .map_err(|err| Position::default().malformed(err.to_string()))?;
        }
        inst.set_objective(Objective::with_terms(self.direction, to_terms(self.obj)))
            .map_err(|err| Position::default().malformed(err.to_string()))?;
        Ok(inst)
    }
}

impl ReadInstance for Reader {
    fn decode_next(&mut self, input: &mut InputStream<'_>) -> Result<Option<Instance>, Error> {
        if self.cursor.eof {
            return Ok(None);
        }
        let mut data = LpData::default();
        let mut section = Section::Preamble;
        let mut pending: Tokens = vec![];
        let mut buf = String::new();
        let mut end_pos = input.position();

        let flush = |data: &mut LpData, section: Section, pending: &mut Tokens, end: Position| {
            let tokens = std::mem::take(pending);
            match section {
                Section::Objective => data.objective(&tokens, end),
                Section::Constraints => data.constraints(&tokens, end),
                _ => Ok(()),
            }
        };

        while let Some(pos) = next_line(input, &mut buf)? {
            end_pos = pos;
            let line = match buf.find('\\') {
                Some(idx) => &buf[..idx],
                None => buf.as_str(),
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            let line = match section_keyword(line) {
                Some((next, dir, rest)) => {
                    flush(&mut data, section, &mut pending, pos)?;
                    if next == Section::Objective {
                        if section != Section::Preamble {
                            return Err(pos.malformed("objective section must come first").into());
                        }
                        data.direction = dir.unwrap_or_default();
                    }
                    section = next;
                    if section == Section::End {
                        break;
                    }
                    rest.trim()
                }
                None => line,
            };
            if line.is_empty() {
                continue;
            }
            let tokens = tokenize(pos, line)?;
            match section {
                Section::Preamble => {
                    return Err(pos.malformed("expected an objective section").into())
                }
                Section::Objective | Section::Constraints => pending
                    .extend(tokens.into_iter().map(|(t, p)| (OwnedToken::from(t), p))),
                Section::Bounds => data.bound(&tokens, pos)?,
                Section::General | Section::Binary => {
                    for (tok, _) in tokens {
                        let Token::Ident(name) = tok else {
                            return Err(pos.malformed("expected variable names").into());
                        };
                        let col = data.cols.get_or_insert(name, pos);
                        let col = data.cols.col_mut(col);
                        if section == Section::Binary {
                            col.set_binary();
                        } else {
                            col.integer = true;
                        }
                    }
                }
                Section::End => unreachable!("reading stops at the end section"),
            }
        }
        if section != Section::End {
            return Err(end_pos.malformed("missing End").into());
        }
        let inst = data.into_instance(self.opts)?;
        tracing::debug!(
            vars = inst.n_vars(),
            constrs = inst.n_constrs(),
            "decoded lp instance"
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

    use super::{section_keyword, token, Reader, Section, Token};
    use crate::{
        coeff,
        instances::{
            fio::{Error, InputStream, ReadInstance},
            Direction, Instance,
        },
        options::Options,
        types::{Domain, Relation},
    };

    const SMALL: &str = "\\ example
Maximize
 obj: 3 x + 2.5 y
Subject To
 c1: x + y
     <= 4
 c2: x - 2 y >= -2
 -x + z = 1
Bounds
 0 <= x <= 3
 y <= 5
 z = 2
General
 x y z
End
";

    fn read(data: &str, opts: &Options) -> Result<Option<Instance>, Error> {
        let mut reader = Reader::new(opts).unwrap();
        reader.decode_next(&mut InputStream::new(Cursor::new(data.to_owned())))
    }

    #[test]
    fn keywords() {
        assert_eq!(
            section_keyword("Subject To"),
            Some((Section::Constraints, None, ""))
        );
        assert_eq!(
            section_keyword("MINIMIZE obj: x"),
            Some((Section::Objective, Some(Direction::Minimize), " obj: x"))
        );
        assert_eq!(section_keyword("st1: x <= 3"), None);
        assert_eq!(section_keyword("binvar + x >= 1"), None);
    }

    #[test]
    fn tokens() {
        assert_eq!(token("<= 4"), Ok((" 4", Token::Rel(Relation::Le))));
        assert_eq!(token("2.5y"), Ok(("y", Token::Num("2.5"))));
        assert_eq!(token("x_1.a + y"), Ok((" + y", Token::Ident("x_1.a"))));
    }

    #[test]
    fn small() {
        let inst = read(SMALL, &Options::new()).unwrap().unwrap();
        assert_eq!(inst.n_vars(), 3);
        assert_eq!(inst.n_constrs(), 3);
        let x = inst.var_by_name("x").unwrap();
        let z = inst.var_by_name("z").unwrap();
        assert_eq!(inst.domain(x), Some(Domain::int(0, 3).unwrap()));
        assert_eq!(inst.domain(z), Some(Domain::int(2, 2).unwrap()));
        let c2 = &inst.constrs()[1];
        assert_eq!(c2.rel(), Relation::Ge);
        assert_eq!(c2.rhs(), coeff![-2]);
        assert_eq!(c2.terms()[1].coeff, coeff![-2]);
        let c3 = &inst.constrs()[2];
        assert_eq!(c3.terms()[0].coeff, coeff![-1]);
        assert_eq!(inst.objective().direction(), Direction::Maximize);
        assert_eq!(inst.objective().terms()[1].coeff, coeff![5, 2]);
    }

    #[test]
    fn continuous_and_unbounded() {
        let data = SMALL.replace(" x y z\n", " x z\n");
        assert!(matches!(read(&data, &Options::new()), Err(Error::Unsupported(_))));
        let data = SMALL.replace(" y <= 5\n", "");
        assert!(matches!(read(&data, &Options::new()), Err(Error::Unsupported(_))));
        let opts = Options::parse("default_ub=10").unwrap();
        let inst = read(&data, &opts).unwrap().unwrap();
        let y = inst.var_by_name("y").unwrap();
        assert_eq!(inst.domain(y), Some(Domain::int(0, 10).unwrap()));
    }

    #[test]
    fn binaries() {
        let data = "min\n x + y\nst\n x + y >= 1\nbinary\n x y\nend\n";
        let inst = read(data, &Options::new()).unwrap().unwrap();
        let x = inst.var_by_name("x").unwrap();
        assert_eq!(inst.domain(x), Some(Domain::Bool));
        assert_eq!(inst.objective().direction(), Direction::Minimize);
    }

    #[test]
    fn malformed_constraint() {
        let data = SMALL.replace(" c2: x - 2 y >= -2\n", " c2: x - 2 y >= \n");
        match read(&data, &Options::new()) {
            Err(Error::Malformed(err)) => assert_eq!(err.pos.line, 8),
            other => panic!("unexpected result {other:?}"),
        }
    }
}
