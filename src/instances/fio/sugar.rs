//! # Sugar CSP Writer
//!
//! Writes instances as Sugar constraint programs. Every variable becomes an
//! integer variable, every constraint a comparison of a weighted sum. The
//! objective is expressed through an additional variable that is fixed to
//! the objective sum.
//!
//! ```text
//! (int x 0 5)
//! (int y 1 4)
//! (<= (+ (* 2 x) (* 3 y)) 12)
//! (int _obj 0 10)
//! (= _obj (+ (* 1 x) (* 1 y)))
//! (objective maximize _obj)
//! ```
//!
//! ## References
//!
//! - [Sugar](https://cspsat.gitlab.io/sugar/)

use std::io::Write;

use crate::{
    instances::{Direction, Instance},
    options::{ConfigurationError, Options},
    types::{checked_add, Coeff, Domain, Term},
};

use super::{
    check_integral, int, merged, objective_direction, UnrepresentableInstance, WriteError,
    WriteInstance,
};

const FORMAT: &str = "sugar";

/// Writer for Sugar CSP files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Writer {
    objective_var: String,
}

impl Default for Writer {
    fn default() -> Self {
        Writer {
            objective_var: String::from("_obj"),
        }
    }
}

impl Writer {
    /// Creates a writer. Option `objective_var` names the variable holding
    /// the objective value (default `_obj`).
    ///
    /// # Errors
    ///
    /// On unknown option keys or a variable name that is not a symbol
    pub fn new(opts: &Options) -> Result<Self, ConfigurationError> {
        opts.check_keys(FORMAT, &["objective_var"])?;
        let mut writer = Writer::default();
        if let Some(name) = opts.get("objective_var") {
            if !is_symbol(name) {
                return Err(ConfigurationError::InvalidValue {
                    key: String::from("objective_var"),
                    value: name.to_owned(),
                    reason: String::from("expected a Sugar symbol"),
                });
            }
            name.clone_into(&mut writer.objective_var);
        }
        Ok(writer)
    }

    /// The name of the objective variable, made unique within the instance
    fn objective_name(&self, inst: &Instance) -> String {
        let mut name = self.objective_var.clone();
        while inst.var_by_name(&name).is_some() {
            name.insert(0, '_');
        }
        name
    }
}

/// Whether a name can be written as a Sugar symbol. Symbols must not contain
/// S-expression delimiters and must not read as an integer.
fn is_symbol(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(|c: char| c.is_whitespace() || "();\"".contains(c))
        && name.parse::<i64>().is_err()
}

/// Checks that all variable names are symbols
fn check_names(inst: &Instance) -> Result<(), UnrepresentableInstance> {
    match inst.vars().find(|(_, info)| !is_symbol(&info.name)) {
        Some((_, info)) => Err(UnrepresentableInstance {
            format: FORMAT,
            reason: format!("variable name `{}` is not a Sugar symbol", info.name),
        }),
        None => Ok(()),
    }
}

/// Writes `(+ (* c x) ...)`, a single product or `0`
fn write_sum(inst: &Instance, terms: &[Term], writer: &mut dyn Write) -> std::io::Result<()> {
    let product = |t: &Term| format!("(* {} {})", int(t.coeff), inst.var_name(t.var));
    match terms {
        [] => write!(writer, "0"),
        [t] => write!(writer, "{}", product(t)),
        _ => {
            write!(writer, "(+")?;
            for t in terms {
                write!(writer, " {}", product(t))?;
            }
            write!(writer, ")")
        }
    }
}

/// The range of values a sum of terms can take
fn sum_range(inst: &Instance, terms: &[Term]) -> Result<(Coeff, Coeff), UnrepresentableInstance> {
    let overflow = |_| UnrepresentableInstance {
        format: FORMAT,
        reason: String::from("objective value range overflows"),
    };
    terms.iter().try_fold(
        (Coeff::from_integer(0), Coeff::from_integer(0)),
        |(lo, hi), t| {
            let dom = inst.domain(t.var).unwrap_or(Domain::Bool);
            let (tlo, thi) = t.value_range(dom).map_err(overflow)?;
            Ok((
                checked_add(lo, tlo).map_err(overflow)?,
                checked_add(hi, thi).map_err(overflow)?,
            ))
        },
    )
}

impl WriteInstance for Writer {
    fn extension(&self) -> &'static str {
        "csp"
    }

    fn encode(&self, inst: &Instance, writer: &mut dyn Write) -> Result<(), WriteError> {
        check_integral(inst, FORMAT)?;
        check_names(inst)?;
        let direction = objective_direction(inst, FORMAT, None)?;
        let obj_range = match direction {
            Some(_) => Some(sum_range(inst, inst.objective().terms())?),
            None => None,
        };

        if let Some(name) = inst.name() {
            writeln!(writer, "; {name}")?;
        }
        for (_, info) in inst.vars() {
            let (lb, ub) = info.domain.bounds();
            writeln!(writer, "(int {} {lb} {ub})", info.name)?;
        }
        for constr in inst.iter_constrs() {
            write!(writer, "({} ", constr.rel())?;
            write_sum(inst, &merged(constr), writer)?;
            writeln!(writer, " {})", int(constr.rhs()))?;
        }
        if let (Some(direction), Some((lo, hi))) = (direction, obj_range) {
            let obj_var = self.objective_name(inst);
            writeln!(writer, "(int {obj_var} {} {})", int(lo), int(hi))?;
            write!(writer, "(= {obj_var} ")?;
            write_sum(inst, inst.objective().terms(), writer)?;
            writeln!(writer, ")")?;
            let keyword = match direction {
                Direction::Maximize => "maximize",
                _ => "minimize",
            };
            writeln!(writer, "(objective {keyword} {obj_var})")?;
        }
        writer.flush()?;
        Ok(())
    }
}
