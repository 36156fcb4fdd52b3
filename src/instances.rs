//! # Linear Instance Representation
//!
//! The format independent representation of an integer/pseudo-Boolean linear
//! optimization instance. Readers in [`fio`] populate an [`Instance`],
//! transformations in [`crate::transforms`] rewrite it, and writers in
//! [`fio`] encode it.

use std::{fmt, slice};

use thiserror::Error;

use crate::types::{Domain, LinConstraint, Origin, RsHashMap, Term, TypeError, Var, VarInfo};

pub mod fio;

mod objective;
pub use objective::{Direction, Objective};

/// Trait for variable managers keeping track of used variable ids
pub trait ManageVars {
    /// Uses up the next free variable
    fn new_var(&mut self) -> Var;
    /// Gets the used variable with the highest index
    fn max_var(&self) -> Option<Var>;
    /// Increases the next free variable index if the provided variable has a
    /// higher index than the next variable in the manager.
    /// Returns true if the next free index has been increased and false otherwise.
    fn increase_next_free(&mut self, v: Var) -> bool;
    /// Marks variables up to the given one as used. Returns true if the next
    /// free index has been increased and false otherwise.
    fn mark_used(&mut self, v: Var) -> bool {
        self.increase_next_free(v + 1)
    }
    /// Gets the number of used variable ids. Typically this is just the index
    /// of the next free variable.
    fn n_used(&self) -> u32;
}

/// Simple counting variable manager. The counter only ever increases, so
/// variables handed out by [`ManageVars::new_var`] never collide with
/// variables previously marked as used.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicVarManager {
    next_var: u32,
}

impl BasicVarManager {
    /// Creates a new variable manager from a next free variable
    #[must_use]
    pub fn from_next_free(next_var: Var) -> BasicVarManager {
        BasicVarManager {
            next_var: next_var.idx32(),
        }
    }
}

impl ManageVars for BasicVarManager {
    fn new_var(&mut self) -> Var {
        let v = Var::new(self.next_var);
        self.next_var += 1;
        v
    }

    fn max_var(&self) -> Option<Var> {
        if self.next_var == 0 {
            None
        } else {
            Some(Var::new(self.next_var - 1))
        }
    }

    fn increase_next_free(&mut self, v: Var) -> bool {
        if v.idx32() > self.next_var {
            self.next_var = v.idx32();
            return true;
        }
        false
    }

    fn n_used(&self) -> u32 {
        self.next_var
    }
}

/// Errors when building an instance
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstanceError {
    /// A variable name was declared twice
    #[error("variable `{0}` declared more than once")]
    DuplicateName(String),
    /// A variable id was declared twice
    #[error("variable id {0} declared more than once")]
    DuplicateId(u32),
    /// A term references a variable that is not declared in the instance
    #[error("reference to undeclared variable {0}")]
    UndeclaredVar(Var),
    /// No variable id is left
    #[error(transparent)]
    Index(#[from] TypeError),
}

/// Type representing a linear optimization instance.
///
/// Variables are kept in declaration order, as are constraints. All
/// variables referenced by constraints or the objective must be declared,
/// which [`Instance::add_constr`] and [`Instance::set_objective`] enforce.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instance {
    name: Option<String>,
    var_order: Vec<Var>,
    vars: RsHashMap<Var, VarInfo>,
    names: RsHashMap<String, Var>,
    constrs: Vec<LinConstraint>,
    obj: Objective,
    var_manager: BasicVarManager,
    n_aux: u32,
}

impl Instance {
    /// Creates a new empty instance
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty instance with a name
    #[must_use]
    pub fn with_name<S: Into<String>>(name: S) -> Self {
        Instance {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Gets the name of the instance, if it has one
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sets the name of the instance
    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = Some(name.into());
    }

    /// Declares a user variable with the next free id
    ///
    /// # Errors
    ///
    /// If the name is already declared
    pub fn declare_var<S: Into<String>>(
        &mut self,
        name: S,
        domain: Domain,
    ) -> Result<Var, InstanceError> {
        let var = Var::new_with_error(self.var_manager.n_used())?;
        self.insert_var(var, name.into(), domain, Origin::User)?;
        Ok(var)
    }

    /// Declares a user variable with a given id. Ids do not need to be
    /// contiguous, later auxiliary variables are always numbered above the
    /// highest id declared so far.
    ///
    /// # Errors
    ///
    /// If the id or the name is already declared
    pub fn declare_var_with_id<S: Into<String>>(
        &mut self,
        var: Var,
        name: S,
        domain: Domain,
    ) -> Result<(), InstanceError> {
        if self.vars.contains_key(&var) {
            return Err(InstanceError::DuplicateId(var.idx32()));
        }
        self.insert_var(var, name.into(), domain, Origin::User)
    }

    /// Declares a variable with a given id and origin. This is meant for
    /// exchange formats that store already transformed instances; auxiliary
    /// variables restored this way count towards the numbering of later
    /// auxiliaries.
    ///
    /// # Errors
    ///
    /// If the id or the name is already declared
    pub fn restore_var<S: Into<String>>(
        &mut self,
        var: Var,
        name: S,
        domain: Domain,
        origin: Origin,
    ) -> Result<(), InstanceError> {
        if self.vars.contains_key(&var) {
            return Err(InstanceError::DuplicateId(var.idx32()));
        }
        self.insert_var(var, name.into(), domain, origin)?;
        if origin == Origin::Auxiliary {
            self.n_aux += 1;
        }
        Ok(())
    }

    /// Introduces a fresh auxiliary variable. Its name is `a<n>` for the
    /// `n`-th auxiliary, prefixed with underscores until it is unique.
    ///
    /// # Errors
    ///
    /// [`TypeError::IdxTooHigh`] if the highest declared id is
    /// [`Var::MAX_IDX`]
    pub fn new_aux_var(&mut self, domain: Domain) -> Result<Var, TypeError> {
        let var = Var::new_with_error(self.var_manager.n_used())?;
        self.var_manager.mark_used(var);
        self.n_aux += 1;
        let mut name = format!("a{}", self.n_aux);
        while self.names.contains_key(&name) {
            name.insert(0, '_');
        }
        self.vars.insert(
            var,
            VarInfo {
                name: name.clone(),
                domain,
                origin: Origin::Auxiliary,
            },
        );
        self.names.insert(name, var);
        self.var_order.push(var);
        Ok(var)
    }

    fn insert_var(
        &mut self,
        var: Var,
        name: String,
        domain: Domain,
        origin: Origin,
    ) -> Result<(), InstanceError> {
        if self.names.contains_key(&name) {
            return Err(InstanceError::DuplicateName(name));
        }
        self.var_manager.mark_used(var);
        self.names.insert(name.clone(), var);
        self.vars.insert(
            var,
            VarInfo {
                name,
                domain,
                origin,
            },
        );
        self.var_order.push(var);
        Ok(())
    }

    /// Looks up a variable by name
    #[must_use]
    pub fn var_by_name(&self, name: &str) -> Option<Var> {
        self.names.get(name).copied()
    }

    /// Gets the information on a variable
    #[must_use]
    pub fn var_info(&self, var: Var) -> Option<&VarInfo> {
        self.vars.get(&var)
    }

    /// Gets the domain of a variable
    #[must_use]
    pub fn domain(&self, var: Var) -> Option<Domain> {
        self.vars.get(&var).map(|info| info.domain)
    }

    /// Changes the domain of a declared user variable. Readers use this when
    /// bounds are given separately from the declaration.
    ///
    /// # Errors
    ///
    /// If the variable is not declared
    pub fn set_domain(&mut self, var: Var, domain: Domain) -> Result<(), InstanceError> {
        match self.vars.get_mut(&var) {
            Some(info) => {
                info.domain = domain;
                Ok(())
            }
            None => Err(InstanceError::UndeclaredVar(var)),
        }
    }

    /// Gets the name of a variable
    ///
    /// # Panics
    ///
    /// If the variable is not declared in the instance
    #[must_use]
    pub fn var_name(&self, var: Var) -> &str {
        &self.vars[&var].name
    }

    /// Iterates over the variables in declaration order
    pub fn vars(&self) -> impl Iterator<Item = (Var, &VarInfo)> + '_ {
        self.var_order.iter().map(|v| (*v, &self.vars[v]))
    }

    /// Gets the number of declared variables, including auxiliaries
    #[must_use]
    pub fn n_vars(&self) -> usize {
        self.var_order.len()
    }

    /// Gets the number of auxiliary variables
    #[must_use]
    pub fn n_aux_vars(&self) -> usize {
        self.n_aux as usize
    }

    /// Gets the highest variable id in use
    #[must_use]
    pub fn max_var(&self) -> Option<Var> {
        self.var_manager.max_var()
    }

    fn check_terms(&self, terms: &[Term]) -> Result<(), InstanceError> {
        if let Some(t) = terms.iter().find(|t| !self.vars.contains_key(&t.var)) {
            return Err(InstanceError::UndeclaredVar(t.var));
        }
        Ok(())
    }

    /// Adds a constraint
    ///
    /// # Errors
    ///
    /// If the constraint references an undeclared variable
    pub fn add_constr(&mut self, constr: LinConstraint) -> Result<(), InstanceError> {
        self.check_terms(constr.terms())?;
        self.constrs.push(constr);
        Ok(())
    }

    /// Gets the constraints in declaration order
    #[must_use]
    pub fn constrs(&self) -> &[LinConstraint] {
        &self.constrs
    }

    /// Iterates over the constraints
    pub fn iter_constrs(&self) -> slice::Iter<'_, LinConstraint> {
        self.constrs.iter()
    }

    /// Iterates mutably over the constraints. Only in-place rewrites that
    /// keep the referenced variables are allowed.
    pub(crate) fn iter_constrs_mut(&mut self) -> slice::IterMut<'_, LinConstraint> {
        self.constrs.iter_mut()
    }

    /// Gets the number of constraints
    #[must_use]
    pub fn n_constrs(&self) -> usize {
        self.constrs.len()
    }

    /// Takes all constraints out of the instance, e.g., for rewriting them.
    /// Constraints must be added back with [`Instance::add_constr`].
    pub fn take_constrs(&mut self) -> Vec<LinConstraint> {
        std::mem::take(&mut self.constrs)
    }

    /// Gets the objective
    #[must_use]
    pub fn objective(&self) -> &Objective {
        &self.obj
    }

    /// Gets mutable access to the objective. Only the direction and scaling
    /// can be changed through this, terms are set with
    /// [`Instance::set_objective`].
    pub fn objective_mut(&mut self) -> &mut Objective {
        &mut self.obj
    }

    /// Replaces the objective
    ///
    /// # Errors
    ///
    /// If the objective references an undeclared variable
    pub fn set_objective(&mut self, obj: Objective) -> Result<(), InstanceError> {
        self.check_terms(obj.terms())?;
        self.obj = obj;
        Ok(())
    }

    /// Gets the maximum arity over all constraints
    ///
    /// # Errors
    ///
    /// If summing coefficients overflows
    pub fn max_arity(&self) -> Result<usize, crate::types::TypeError> {
        self.constrs
            .iter()
            .try_fold(0, |max, c| Ok(std::cmp::max(max, c.arity()?)))
    }

    /// Evaluates whether an assignment satisfies all constraints. Values
    /// outside a variable's domain never satisfy the instance. Returns `None`
    /// if the assignment does not cover all constrained variables.
    pub fn is_satisfied_by<F>(&self, mut value: F) -> Option<bool>
    where
        F: FnMut(Var) -> Option<i64>,
    {
        let mut in_domain = true;
        let mut checked = |var: Var| {
            let val = value(var)?;
            if let Some(info) = self.vars.get(&var) {
                in_domain &= info.domain.contains(val);
            }
            Some(val)
        };
        for c in &self.constrs {
            if !c.evaluate(&mut checked)? {
                return Some(false);
            }
        }
        Some(in_domain)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "instance {}", self.name().unwrap_or("<anonymous>"))?;
        for (var, info) in self.vars() {
            writeln!(f, "  {var} ({}): {}", info.name, info.domain)?;
        }
        writeln!(f, "  {}", self.obj)?;
        for c in &self.constrs {
            writeln!(f, "  {c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BasicVarManager, Instance, InstanceError, ManageVars};
    use crate::{
        coeff,
        types::{Domain, LinConstraint, Origin, Term, TypeError, Var},
        var,
    };

    #[test]
    fn var_manager() {
        let mut vm = BasicVarManager::default();
        assert_eq!(vm.max_var(), None);
        assert_eq!(vm.new_var(), var![0]);
        assert!(vm.mark_used(var![9]));
        assert!(!vm.mark_used(var![4]));
        assert_eq!(vm.new_var(), var![10]);
        assert_eq!(vm.n_used(), 11);
    }

    #[test]
    fn aux_above_sparse_ids() {
        let mut inst = Instance::new();
        inst.declare_var_with_id(var![17], "x17", Domain::Bool)
            .unwrap();
        inst.declare_var_with_id(var![3], "x3", Domain::Bool)
            .unwrap();
        let aux = inst.new_aux_var(Domain::int(0, 2).unwrap()).unwrap();
        assert_eq!(aux, var![18]);
        assert_eq!(inst.var_name(aux), "a1");
        assert_eq!(inst.var_info(aux).unwrap().origin, Origin::Auxiliary);
    }

    #[test]
    fn aux_name_collision() {
        let mut inst = Instance::new();
        inst.declare_var("a1", Domain::Bool).unwrap();
        inst.declare_var("_a1", Domain::Bool).unwrap();
        let aux = inst.new_aux_var(Domain::Bool).unwrap();
        assert_eq!(inst.var_name(aux), "__a1");
    }

    #[test]
    fn aux_ids_exhausted() {
        let mut inst = Instance::new();
        inst.declare_var_with_id(Var::new(Var::MAX_IDX), "w", Domain::Bool)
            .unwrap();
        assert_eq!(
            inst.new_aux_var(Domain::Bool),
            Err(TypeError::IdxTooHigh(u32::MAX, Var::MAX_IDX))
        );
        assert_eq!(
            inst.declare_var("y", Domain::Bool),
            Err(InstanceError::Index(TypeError::IdxTooHigh(
                u32::MAX,
                Var::MAX_IDX
            )))
        );
        assert_eq!(inst.n_vars(), 1);
        assert_eq!(inst.n_aux_vars(), 0);
    }

    #[test]
    fn duplicate_declarations() {
        let mut inst = Instance::new();
        let x = inst.declare_var("x", Domain::Bool).unwrap();
        assert_eq!(
            inst.declare_var("x", Domain::Bool),
            Err(InstanceError::DuplicateName(String::from("x")))
        );
        assert_eq!(
            inst.declare_var_with_id(x, "y", Domain::Bool),
            Err(InstanceError::DuplicateId(0))
        );
    }

    #[test]
    fn undeclared_reference() {
        let mut inst = Instance::new();
        let x = inst.declare_var("x", Domain::Bool).unwrap();
        let constr = LinConstraint::new_ub([Term::int(1, x), Term::int(1, var![5])], coeff![1]);
        assert_eq!(
            inst.add_constr(constr),
            Err(InstanceError::UndeclaredVar(var![5]))
        );
        assert_eq!(inst.n_constrs(), 0);
    }

    #[test]
    fn satisfaction_respects_domains() {
        let mut inst = Instance::new();
        let x = inst.declare_var("x", Domain::int(0, 3).unwrap()).unwrap();
        let y = inst.declare_var("y", Domain::Bool).unwrap();
        inst.add_constr(LinConstraint::new_ub(
            [Term::int(1, x), Term::int(1, y)],
            coeff![4],
        ))
        .unwrap();
        let assign = |xv: i64, yv: i64| move |var: Var| Some(if var == x { xv } else { yv });
        assert_eq!(inst.is_satisfied_by(assign(3, 1)), Some(true));
        assert_eq!(inst.is_satisfied_by(assign(2, 2)), Some(false));
        assert_eq!(inst.is_satisfied_by(assign(4, 0)), Some(false));
        assert_eq!(inst.is_satisfied_by(|var| (var == x).then_some(1)), None);
    }

    #[test]
    fn declaration_order() {
        let mut inst = Instance::new();
        inst.declare_var("z", Domain::Bool).unwrap();
        inst.declare_var("a", Domain::Bool).unwrap();
        inst.declare_var("m", Domain::Bool).unwrap();
        let names: Vec<_> = inst.vars().map(|(_, info)| info.name.as_str()).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }
}
