//! # Clingcon Writer
//!
//! Writes instances in the constraint answer set programming language of
//! clingcon. Constraints may have at most three terms. Objectives without a
//! direction get the writer's default direction.
//!
//! ```text
//! &dom{0..5} = "x".
//! &sum{ 2*"x"; 3*"y" } <= 12.
//! &minimize{ 1*"x" }.
//! ```

use std::io::Write;

use crate::{
    instances::{Direction, Instance},
    options::{ConfigurationError, Options},
    types::Term,
};

use super::{
    aspartame::asp_string, check_arity, check_integral, int, merged, objective_direction,
    WriteError, WriteInstance,
};

const FORMAT: &str = "casp";

/// Writer for clingcon programs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Writer {
    default_direction: Direction,
}

impl Default for Writer {
    fn default() -> Self {
        Writer {
            default_direction: Direction::Minimize,
        }
    }
}

impl Writer {
    /// Creates a writer. Option `default_direction` (`minimize` or
    /// `maximize`, default `minimize`) is used for objectives without a
    /// direction.
    ///
    /// # Errors
    ///
    /// On unknown option keys or invalid directions
    pub fn new(opts: &Options) -> Result<Self, ConfigurationError> {
        opts.check_keys(FORMAT, &["default_direction"])?;
        let mut writer = Writer::default();
        if let Some(dir) = opts.get_parsed::<Direction>("default_direction")? {
            writer.default_direction = dir;
        }
        Ok(writer)
    }
}

fn write_elements(inst: &Instance, terms: &[Term], writer: &mut dyn Write) -> std::io::Result<()> {
    if terms.is_empty() {
        return write!(writer, " 0 ");
    }
    for (idx, t) in terms.iter().enumerate() {
        let sep = if idx == 0 { " " } else { "; " };
        write!(
            writer,
            "{sep}{}*{}",
            int(t.coeff),
            asp_string(inst.var_name(t.var))
        )?;
    }
    write!(writer, " ")
}

impl WriteInstance for Writer {
    fn extension(&self) -> &'static str {
        "lp"
    }

    fn encode(&self, inst: &Instance, writer: &mut dyn Write) -> Result<(), WriteError> {
        check_arity(inst, FORMAT, 3)?;
        check_integral(inst, FORMAT)?;
        let direction = objective_direction(inst, FORMAT, Some(self.default_direction))?;

        if let Some(name) = inst.name() {
            writeln!(writer, "% {name}")?;
        }
        for (_, info) in inst.vars() {
            let (lb, ub) = info.domain.bounds();
            writeln!(writer, "&dom{{{lb}..{ub}}} = {}.", asp_string(&info.name))?;
        }
        for constr in inst.iter_constrs() {
            write!(writer, "&sum{{")?;
            write_elements(inst, &merged(constr), writer)?;
            writeln!(writer, "}} {} {}.", constr.rel(), int(constr.rhs()))?;
        }
        if let Some(direction) = direction {
            let keyword = match direction {
                Direction::Maximize => "maximize",
                _ => "minimize",
            };
            write!(writer, "&{keyword}{{")?;
            write_elements(inst, inst.objective().terms(), writer)?;
            writeln!(writer, "}}.")?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Writer;
    use crate::{
        coeff,
        instances::{
            fio::{WriteError, WriteInstance},
            Direction, Instance, Objective,
        },
        options::Options,
        types::{Domain, LinConstraint, Term},
    };

    fn instance(direction: Direction) -> Instance {
        let mut inst = Instance::new();
        let x = inst.declare_var("x", Domain::int(0, 5).unwrap()).unwrap();
        let y = inst.declare_var("y", Domain::int(1, 4).unwrap()).unwrap();
        inst.add_constr(LinConstraint::new_ub(
            [Term::int(2, x), Term::int(3, y)],
            coeff![12],
        ))
        .unwrap();
        inst.set_objective(Objective::with_terms(direction, [Term::int(1, x)]))
            .unwrap();
        inst
    }

    fn encode(writer: &Writer, inst: &Instance) -> Result<String, WriteError> {
        let mut buf = Vec::new();
        writer.encode(inst, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap())
    }

    #[test]
    fn program() {
        let out = encode(&Writer::default(), &instance(Direction::Maximize)).unwrap();
        assert_eq!(
            out,
            "&dom{0..5} = \"x\".\n&dom{1..4} = \"y\".\n\
             &sum{ 2*\"x\"; 3*\"y\" } <= 12.\n&maximize{ 1*\"x\" }.\n"
        );
    }

    #[test]
    fn default_direction() {
        let out = encode(&Writer::default(), &instance(Direction::Unspecified)).unwrap();
        assert!(out.ends_with("&minimize{ 1*\"x\" }.\n"));
        let writer = Writer::new(&Options::parse("default_direction=max").unwrap()).unwrap();
        let out = encode(&writer, &instance(Direction::Unspecified)).unwrap();
        assert!(out.ends_with("&maximize{ 1*\"x\" }.\n"));
        assert!(Writer::new(&Options::parse("default_direction=up").unwrap()).is_err());
    }
}
