//! # Aspartame Fact Writer
//!
//! Writes instances as ASP facts in the input language of the aspartame
//! CSP-to-ASP translator. Constraints are numbered from 1 and may have at
//! most three terms.
//!
//! ```text
//! var(int,"x",range(0,5)).
//! constraint(1,le,10).
//! term(1,2,"x").
//! objective(minimize).
//! objterm(1,"x").
//! ```

use std::io::Write;

use crate::{
    instances::{Direction, Instance},
    options::{ConfigurationError, Options},
    types::Relation,
};

use super::{
    check_arity, check_integral, int, merged, objective_direction, WriteError, WriteInstance,
};

const FORMAT: &str = "aspartame";

/// Quotes a name as an ASP string
pub(crate) fn asp_string(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn relation_atom(rel: Relation) -> &'static str {
    match rel {
        Relation::Le => "le",
        Relation::Eq => "eq",
        Relation::Ge => "ge",
    }
}

/// Writer for aspartame facts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Writer;

impl Writer {
    /// Creates a writer. There are no options.
    ///
    /// # Errors
    ///
    /// On any option key
    pub fn new(opts: &Options) -> Result<Self, ConfigurationError> {
        opts.check_keys(FORMAT, &[])?;
        Ok(Writer)
    }
}

impl WriteInstance for Writer {
    fn extension(&self) -> &'static str {
        "lp"
    }

    fn encode(&self, inst: &Instance, writer: &mut dyn Write) -> Result<(), WriteError> {
        check_arity(inst, FORMAT, 3)?;
        check_integral(inst, FORMAT)?;
        let direction = objective_direction(inst, FORMAT, None)?;

        if let Some(name) = inst.name() {
            writeln!(writer, "% {name}")?;
        }
        for (_, info) in inst.vars() {
            let (lb, ub) = info.domain.bounds();
            writeln!(
                writer,
                "var(int,{},range({lb},{ub})).",
                asp_string(&info.name)
            )?;
        }
        for (idx, constr) in inst.iter_constrs().enumerate() {
            let id = idx + 1;
            writeln!(
                writer,
                "constraint({id},{},{}).",
                relation_atom(constr.rel()),
                int(constr.rhs())
            )?;
            for t in merged(constr) {
                writeln!(
                    writer,
                    "term({id},{},{}).",
                    int(t.coeff),
                    asp_string(inst.var_name(t.var))
                )?;
            }
        }
        if let Some(direction) = direction {
            let keyword = match direction {
                Direction::Maximize => "maximize",
                _ => "minimize",
            };
            writeln!(writer, "objective({keyword}).")?;
            for t in inst.objective().terms() {
                writeln!(
                    writer,
                    "objterm({},{}).",
                    int(t.coeff),
                    asp_string(inst.var_name(t.var))
                )?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{asp_string, Writer};
    use crate::{
        coeff,
        instances::{
            fio::{WriteError, WriteInstance},
            Direction, Instance, Objective,
        },
        options::Options,
        types::{Domain, LinConstraint, Term},
    };

    fn encode(inst: &Instance) -> Result<String, WriteError> {
        let mut buf = Vec::new();
        Writer.encode(inst, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap())
    }

    #[test]
    fn quoting() {
        assert_eq!(asp_string("x"), "\"x\"");
        assert_eq!(asp_string("a\"b\\"), "\"a\\\"b\\\\\"");
    }

    #[test]
    fn facts() {
        let mut inst = Instance::with_name("small");
        let x = inst.declare_var("x", Domain::int(0, 5).unwrap()).unwrap();
        let y = inst.declare_var("y", Domain::Bool).unwrap();
        inst.add_constr(LinConstraint::new_lb(
            [Term::int(2, x), Term::int(1, y), Term::int(1, y)],
            coeff![3],
        ))
        .unwrap();
        inst.set_objective(Objective::with_terms(Direction::Minimize, [Term::int(4, y)]))
            .unwrap();
        assert_eq!(
            encode(&inst).unwrap(),
            "% small\nvar(int,\"x\",range(0,5)).\nvar(int,\"y\",range(0,1)).\n\
             constraint(1,ge,3).\nterm(1,2,\"x\").\nterm(1,2,\"y\").\n\
             objective(minimize).\nobjterm(4,\"y\").\n"
        );
    }

    #[test]
    fn arity_limit() {
        let mut inst = Instance::new();
        let vars: Vec<_> = (0..4)
            .map(|i| inst.declare_var(format!("x{i}"), Domain::Bool).unwrap())
            .collect();
        inst.add_constr(LinConstraint::new_ub(
            vars.iter().map(|v| Term::int(1, *v)),
            coeff![2],
        ))
        .unwrap();
        assert!(matches!(encode(&inst), Err(WriteError::Unrepresentable(_))));
    }

    #[test]
    fn no_options() {
        assert!(Writer::new(&Options::new()).is_ok());
        assert!(Writer::new(&Options::parse("anything=1").unwrap()).is_err());
    }
}
