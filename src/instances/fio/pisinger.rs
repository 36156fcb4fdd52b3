//! # Pisinger Knapsack Streams
//!
//! Reader for the CSV knapsack instance collections published by D. Pisinger.
//! A file holds several instances, each of the form
//!
//! ```text
//! knapPI_1_50_1000_1
//! n 50
//! c 995
//! z 8373
//! time 0.00
//! 1,94,485,0
//! 2,506,326,0
//! ...
//! -----
//! ```
//!
//! Item lines are `index,profit,weight[,solution]`. The header lines after
//! `n` are optional. Each instance becomes the binary knapsack problem
//! `max sum p_i x_i s.t. sum w_i x_i <= c`.
//!
//! ## References
//!
//! - [Pisinger instances](http://hjemmesider.diku.dk/~pisinger/codes.html)

use std::io::{self, Write};

use nom::{
    bytes::complete::{tag, take_while1},
    character::complete::{char, i64 as int, space0, space1, u32 as uint},
    combinator::{all_consuming, opt},
    sequence::{preceded, terminated, tuple},
    IResult,
};

use crate::{
    instances::{Direction, Instance, Objective},
    options::{ConfigurationError, Options},
    types::{Coeff, Domain, LinConstraint, Term, Var},
};

use super::{check_reader_keys, next_line, Error, InputStream, ReadInstance, StreamCursor};

/// The line separating two instances
const SEPARATOR: &str = "-----";

/// One knapsack item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    /// The profit of the item
    pub profit: i64,
    /// The weight of the item
    pub weight: i64,
}

/// A binary knapsack instance as stored in the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Knapsack {
    /// The instance name
    pub name: String,
    /// The knapsack capacity
    pub capacity: i64,
    /// The items, numbered from 1
    pub items: Vec<Item>,
}

impl Knapsack {
    /// Converts the knapsack into an instance over Boolean variables `x1..xn`
    ///
    /// # Panics
    ///
    /// If there are more than [`Var::MAX_IDX`] items
    #[must_use]
    pub fn into_instance(self) -> Instance {
        let mut inst = Instance::with_name(self.name);
        let mut weights = Vec::with_capacity(self.items.len());
        let mut obj = Objective::with_terms(Direction::Maximize, []);
        for (idx, item) in self.items.into_iter().enumerate() {
            let id = u32::try_from(idx + 1).expect("too many knapsack items");
            let var = Var::new(id);
            inst.declare_var_with_id(var, format!("x{id}"), Domain::Bool)
                .expect("item ids are unique");
            weights.push(Term::int(item.weight, var));
            obj.add_term(Term::int(item.profit, var));
        }
        inst.add_constr(LinConstraint::new_ub(
            weights,
            Coeff::from_integer(self.capacity),
        ))
        .expect("all items are declared");
        inst.set_objective(obj).expect("all items are declared");
        inst
    }

    /// Writes the knapsack as one entry of a stream, including the separator
    ///
    /// # Errors
    ///
    /// If writing fails
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "{}", self.name)?;
        writeln!(writer, "n {}", self.items.len())?;
        writeln!(writer, "c {}", self.capacity)?;
        for (idx, item) in self.items.iter().enumerate() {
            writeln!(writer, "{},{},{},0", idx + 1, item.profit, item.weight)?;
        }
        writeln!(writer, "{SEPARATOR}")?;
        writeln!(writer)
    }
}

/// Reader for Pisinger knapsack streams. This is a multi-instance reader:
/// every call to [`ReadInstance::decode_next`] decodes the next instance.
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
        check_reader_keys(opts, "pisinger", &[])?;
        Ok(Self::default())
    }

    /// Parses the next knapsack from the stream
    fn parse_knapsack(&mut self, input: &mut InputStream<'_>) -> Result<Knapsack, Error> {
        let mut buf = String::new();
        let Some(pos) = next_line(input, &mut buf)? else {
            return Err(input.position().malformed("expected instance name").into());
        };
        let name = buf.trim().to_owned();
        if name.is_empty() || name.contains(char::is_whitespace) || name.contains(',') {
            return Err(pos.malformed(format!("invalid instance name `{name}`")).into());
        }

        let Some(pos) = next_line(input, &mut buf)? else {
            return Err(input.position().malformed("expected `n <items>` line").into());
        };
        let (_, n_items) = header_line("n", uint)(buf.trim_end())
            .map_err(|_| pos.malformed("expected `n <items>` line"))?;

        let mut capacity = None;
        // grown per item, the header count is only checked
        let mut items = Vec::new();
        loop {
            let Some(pos) = next_line(input, &mut buf)? else {
                break;
            };
            let line = buf.trim();
            if line == SEPARATOR {
                break;
            }
            if line.is_empty() {
                continue;
            }
            if let Ok((_, (idx, profit, weight))) = item_line(line) {
                if capacity.is_none() {
                    return Err(pos.malformed("item before capacity line").into());
                }
                if idx as usize != items.len() + 1 {
                    return Err(pos
                        .malformed(format!(
                            "expected item {}, found item {idx}",
                            items.len() + 1
                        ))
                        .into());
                }
                if items.len() == n_items as usize {
                    return Err(pos.malformed(format!("more than {n_items} items")).into());
                }
                items.push(Item { profit, weight });
                continue;
            }
            if let Ok((_, cap)) = header_line("c", int)(line) {
                if !items.is_empty() || capacity.is_some() {
                    return Err(pos.malformed("unexpected capacity line").into());
                }
                capacity = Some(cap);
                continue;
            }
            if !items.is_empty() {
                return Err(pos.malformed(format!("invalid item line `{line}`")).into());
            }
            // Other header lines, e.g., optimal value `z` or `time`, carry no
            // constraint data
            generic_header(line)
                .map_err(|_| pos.malformed(format!("invalid header line `{line}`")))?;
        }
        let Some(capacity) = capacity else {
            return Err(input.position().malformed("missing capacity line").into());
        };
        if items.len() != n_items as usize {
            return Err(input
                .position()
                .malformed(format!(
                    "expected {n_items} items, found {}",
                    items.len()
                ))
                .into());
        }
        Ok(Knapsack {
            name,
            capacity,
            items,
        })
    }
}

impl ReadInstance for Reader {
    fn decode_next(&mut self, input: &mut InputStream<'_>) -> Result<Option<Instance>, Error> {
        if self.cursor.eof {
            return Ok(None);
        }
        if input.skip_whitespace()? {
            self.cursor = input.cursor(true);
            return Ok(None);
        }
        let knapsack = self.parse_knapsack(input)?;
        let eof = input.skip_whitespace()?;
        self.cursor = input.cursor(eof);
        tracing::debug!(
            name = %knapsack.name,
            items = knapsack.items.len(),
            offset = self.cursor.offset,
            "decoded knapsack"
        );
        Ok(Some(knapsack.into_instance()))
    }

    fn is_multi_instance(&self) -> bool {
        true
    }

    fn cursor(&self) -> StreamCursor {
        self.cursor
    }
}

/// Parses a `<key> <value>` header line
fn header_line<'input, T, P>(
    key: &'static str,
    value: P,
) -> impl FnMut(&'input str) -> IResult<&'input str, T>
where
    P: FnMut(&'input str) -> IResult<&'input str, T>,
{
    all_consuming(preceded(
        tuple((space0, tag(key), space1)),
        terminated(value, space0),
    ))
}

/// Matches any `<key> <value>` header line
fn generic_header(input: &str) -> IResult<&str, (&str, &str)> {
    all_consuming(tuple((
        take_while1(|c: char| c.is_ascii_alphabetic()),
        preceded(space1, take_while1(|c: char| !c.is_whitespace())),
    )))(input)
}

/// Parses an `index,profit,weight[,solution]` item line
fn item_line(input: &str) -> IResult<&str, (u32, i64, i64)> {
    let (rest, (idx, _, profit, _, weight, _)) = all_consuming(tuple((
        uint,
        char(','),
        int,
        char(','),
        int,
        opt(preceded(char(','), uint)),
    )))(input)?;
    Ok((rest, (idx, profit, weight)))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{generic_header, header_line, item_line, Item, Knapsack, Reader};
    use crate::{
        coeff,
        instances::{
            fio::{Error, InputStream, ReadInstance},
            Direction,
        },
        options::Options,
        types::Relation,
        var,
    };

    const TWO: &str = "knap_a\nn 3\nc 10\nz 12\ntime 0.00\n1,5,4,1\n2,3,3,0\n3,7,6,1\n-----\n\n\
                       knap_b\nn 2\nc 5\n1,1,2\n2,2,3\n-----\n\n";

    #[test]
    fn parse_lines() {
        assert_eq!(header_line("n", nom::character::complete::u32)("n 50"), Ok(("", 50)));
        assert_eq!(item_line("3,94,485,0"), Ok(("", (3, 94, 485))));
        assert_eq!(item_line("3,94,485"), Ok(("", (3, 94, 485))));
        assert!(item_line("3,94").is_err());
        assert!(generic_header("time 0.00").is_ok());
        assert!(generic_header("1,2,3").is_err());
    }

    #[test]
    fn decode_stream() {
        let mut input = InputStream::new(Cursor::new(TWO));
        let mut reader = Reader::new(&Options::new()).unwrap();
        assert!(reader.is_multi_instance());

        let first = reader.decode_next(&mut input).unwrap().unwrap();
        assert_eq!(first.name(), Some("knap_a"));
        assert_eq!(first.n_vars(), 3);
        assert_eq!(first.var_by_name("x2"), Some(var![2]));
        let constr = &first.constrs()[0];
        assert_eq!(constr.rel(), Relation::Le);
        assert_eq!(constr.rhs(), coeff![10]);
        assert_eq!(constr.terms()[2].coeff, coeff![6]);
        assert_eq!(first.objective().direction(), Direction::Maximize);
        assert_eq!(first.objective().terms()[0].coeff, coeff![5]);
        assert!(!reader.at_end());
        let offset = reader.offset();
        assert_eq!(offset, TWO.find("knap_b").unwrap() as u64);

        let second = reader.decode_next(&mut input).unwrap().unwrap();
        assert_eq!(second.name(), Some("knap_b"));
        assert!(reader.at_end());
        assert!(reader.decode_next(&mut input).unwrap().is_none());
    }

    #[test]
    fn item_count_mismatch() {
        let mut input = InputStream::new(Cursor::new("k\nn 3\nc 4\n1,1,1\n2,1,1\n-----\n"));
        let mut reader = Reader::default();
        match reader.decode_next(&mut input) {
            Err(Error::Malformed(err)) => assert!(err.cause.contains("expected 3 items")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn huge_item_count() {
        let mut input = InputStream::new(Cursor::new("k\nn 4000000000\nc 4\n1,1,1\n-----\n"));
        let mut reader = Reader::default();
        match reader.decode_next(&mut input) {
            Err(Error::Malformed(err)) => {
                assert!(err.cause.contains("expected 4000000000 items"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn out_of_order_item() {
        let mut input = InputStream::new(Cursor::new("k\nn 2\nc 4\n2,1,1\n1,1,1\n-----\n"));
        let mut reader = Reader::default();
        match reader.decode_next(&mut input) {
            Err(Error::Malformed(err)) => assert_eq!(err.pos.line, 4),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn write_read() {
        let knap = Knapsack {
            name: String::from("gen_1"),
            capacity: 7,
            items: vec![
                Item {
                    profit: 3,
                    weight: 2,
                },
                Item {
                    profit: 4,
                    weight: 6,
                },
            ],
        };
        let mut buf = Vec::new();
        knap.write(&mut buf).unwrap();
        let mut input = InputStream::new(Cursor::new(buf));
        let mut reader = Reader::default();
        let inst = reader.decode_next(&mut input).unwrap().unwrap();
        assert_eq!(inst, knap.into_instance());
        assert!(reader.at_end());
    }

    #[test]
    fn unknown_option() {
        let opts = Options::parse("default_ub=3").unwrap();
        assert!(Reader::new(&opts).is_err());
        let opts = Options::parse("opt_strategy=minimize").unwrap();
        assert!(Reader::new(&opts).is_ok());
    }
}
