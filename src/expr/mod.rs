//! Symbolic expressions over tensor-program scalars
//!
//! This module provides the value model the binder unifies over: identity-
//! unique variables ([`Var`]), immutable expression trees ([`Expr`]), and
//! checked reads of runtime tensor-handle fields. All scalars are `i64`
//! shape-index values.

mod oracle;

pub use oracle::{EqualityOracle, StructuralOracle};

use crate::buffer::{HandleField, TensorHandle};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for unique variable IDs
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a symbolic variable
///
/// Identity, not structural equality, decides whether two occurrences
/// refer to the same variable. IDs are unique within a process lifetime.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VarId(u64);

impl VarId {
    fn fresh() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// An identity-unique placeholder for an unknown scalar
///
/// Commonly a tensor dimension size. Two `Var`s with the same name are
/// still distinct variables; equality and hashing go through [`VarId`].
#[derive(Clone, Debug)]
pub struct Var {
    id: VarId,
    name: String,
}

impl Var {
    /// Create a fresh variable with the given diagnostic name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: VarId::fresh(),
            name: name.into(),
        }
    }

    /// The variable's identity
    #[inline]
    pub fn id(&self) -> VarId {
        self.id
    }

    /// The variable's diagnostic name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Var {}

impl std::hash::Hash for Var {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One node of a symbolic expression tree
#[derive(Clone, Debug)]
pub enum ExprNode {
    /// Integer constant
    Const(i64),
    /// Variable reference
    Var(Var),
    /// Addition
    Add(Expr, Expr),
    /// Subtraction
    Sub(Expr, Expr),
    /// Multiplication
    Mul(Expr, Expr),
    /// Equality comparison (1 when equal, 0 otherwise)
    Eq(Expr, Expr),
    /// Inequality comparison
    Ne(Expr, Expr),
    /// Less-or-equal comparison
    Le(Expr, Expr),
    /// Less-than comparison
    Lt(Expr, Expr),
    /// Checked read of a runtime tensor-handle field
    HandleRead {
        /// The handle variable being read
        handle: Var,
        /// Which field to read
        field: HandleField,
    },
}

/// An immutable symbolic expression
///
/// Expressions are shared behind `Arc`; [`Expr::ptr_eq`] is the fast
/// equality path, the [`EqualityOracle`] the slow one. The arithmetic
/// operators fold constants and drop additive/multiplicative identities
/// so derived strides stay readable; comparisons are never folded, they
/// are the currency of runtime assertions.
#[derive(Clone, Debug)]
pub struct Expr(Arc<ExprNode>);

impl Expr {
    fn wrap(node: ExprNode) -> Self {
        Self(Arc::new(node))
    }

    /// Integer constant expression
    pub fn int(value: i64) -> Self {
        Self::wrap(ExprNode::Const(value))
    }

    /// Variable reference expression
    pub fn var(var: &Var) -> Self {
        Self::wrap(ExprNode::Var(var.clone()))
    }

    /// Checked read of a runtime-handle field
    pub fn handle_read(handle: &Var, field: HandleField) -> Self {
        Self::wrap(ExprNode::HandleRead {
            handle: handle.clone(),
            field,
        })
    }

    /// The root node of this expression
    #[inline]
    pub fn node(&self) -> &ExprNode {
        &self.0
    }

    /// Reference equality (the fast equality path)
    #[inline]
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The referenced variable, when this expression is a bare variable
    pub fn as_var(&self) -> Option<&Var> {
        match self.node() {
            ExprNode::Var(v) => Some(v),
            _ => None,
        }
    }

    /// Fold this expression to a constant, when no variable or handle
    /// read occurs in it
    pub fn as_const_int(&self) -> Option<i64> {
        match self.node() {
            ExprNode::Const(v) => Some(*v),
            ExprNode::Var(_) | ExprNode::HandleRead { .. } => None,
            ExprNode::Add(a, b) => Some(a.as_const_int()?.wrapping_add(b.as_const_int()?)),
            ExprNode::Sub(a, b) => Some(a.as_const_int()?.wrapping_sub(b.as_const_int()?)),
            ExprNode::Mul(a, b) => Some(a.as_const_int()?.wrapping_mul(b.as_const_int()?)),
            ExprNode::Eq(a, b) => Some((a.as_const_int()? == b.as_const_int()?) as i64),
            ExprNode::Ne(a, b) => Some((a.as_const_int()? != b.as_const_int()?) as i64),
            ExprNode::Le(a, b) => Some((a.as_const_int()? <= b.as_const_int()?) as i64),
            ExprNode::Lt(a, b) => Some((a.as_const_int()? < b.as_const_int()?) as i64),
        }
    }

    /// Visit every variable occurring in this expression
    ///
    /// Handle reads visit their handle variable.
    pub fn for_each_var(&self, f: &mut impl FnMut(&Var)) {
        match self.node() {
            ExprNode::Const(_) => {}
            ExprNode::Var(v) => f(v),
            ExprNode::HandleRead { handle, .. } => f(handle),
            ExprNode::Add(a, b)
            | ExprNode::Sub(a, b)
            | ExprNode::Mul(a, b)
            | ExprNode::Eq(a, b)
            | ExprNode::Ne(a, b)
            | ExprNode::Le(a, b)
            | ExprNode::Lt(a, b) => {
                a.for_each_var(f);
                b.for_each_var(f);
            }
        }
    }

    /// Evaluate against concrete bindings
    ///
    /// Returns `None` when a variable is unbound, a handle is unknown, or
    /// a handle field read falls outside the handle's rank — the checked
    /// access never turns into an out-of-bounds read.
    pub fn eval(&self, env: &EvalEnv) -> Option<i64> {
        match self.node() {
            ExprNode::Const(v) => Some(*v),
            ExprNode::Var(v) => env.var(v),
            ExprNode::HandleRead { handle, field } => env.handle(handle)?.read(*field),
            ExprNode::Add(a, b) => Some(a.eval(env)?.wrapping_add(b.eval(env)?)),
            ExprNode::Sub(a, b) => Some(a.eval(env)?.wrapping_sub(b.eval(env)?)),
            ExprNode::Mul(a, b) => Some(a.eval(env)?.wrapping_mul(b.eval(env)?)),
            ExprNode::Eq(a, b) => Some((a.eval(env)? == b.eval(env)?) as i64),
            ExprNode::Ne(a, b) => Some((a.eval(env)? != b.eval(env)?) as i64),
            ExprNode::Le(a, b) => Some((a.eval(env)? <= b.eval(env)?) as i64),
            ExprNode::Lt(a, b) => Some((a.eval(env)? < b.eval(env)?) as i64),
        }
    }
}

// Comparison builders. These construct boolean-valued condition nodes;
// `Expr` itself deliberately has no `PartialEq` — value equality is the
// oracle's job, reference equality is `ptr_eq`.
#[allow(clippy::should_implement_trait)]
impl Expr {
    /// `self == other` as a boolean-valued expression
    pub fn eq(&self, other: &Expr) -> Self {
        Self::wrap(ExprNode::Eq(self.clone(), other.clone()))
    }

    /// `self != other` as a boolean-valued expression
    pub fn ne(&self, other: &Expr) -> Self {
        Self::wrap(ExprNode::Ne(self.clone(), other.clone()))
    }

    /// `self <= other` as a boolean-valued expression
    pub fn le(&self, other: &Expr) -> Self {
        Self::wrap(ExprNode::Le(self.clone(), other.clone()))
    }

    /// `self < other` as a boolean-valued expression
    pub fn lt(&self, other: &Expr) -> Self {
        Self::wrap(ExprNode::Lt(self.clone(), other.clone()))
    }
}

impl Add<&Expr> for &Expr {
    type Output = Expr;

    fn add(self, rhs: &Expr) -> Expr {
        match (self.as_const_int(), rhs.as_const_int()) {
            (Some(a), Some(b)) => Expr::int(a.wrapping_add(b)),
            (Some(0), _) => rhs.clone(),
            (_, Some(0)) => self.clone(),
            _ => Expr::wrap(ExprNode::Add(self.clone(), rhs.clone())),
        }
    }
}

impl Sub<&Expr> for &Expr {
    type Output = Expr;

    fn sub(self, rhs: &Expr) -> Expr {
        match (self.as_const_int(), rhs.as_const_int()) {
            (Some(a), Some(b)) => Expr::int(a.wrapping_sub(b)),
            (_, Some(0)) => self.clone(),
            _ => Expr::wrap(ExprNode::Sub(self.clone(), rhs.clone())),
        }
    }
}

impl Mul<&Expr> for &Expr {
    type Output = Expr;

    fn mul(self, rhs: &Expr) -> Expr {
        match (self.as_const_int(), rhs.as_const_int()) {
            (Some(a), Some(b)) => Expr::int(a.wrapping_mul(b)),
            (Some(1), _) => rhs.clone(),
            (_, Some(1)) => self.clone(),
            _ => Expr::wrap(ExprNode::Mul(self.clone(), rhs.clone())),
        }
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        &self + &rhs
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        &self - &rhs
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        &self * &rhs
    }
}

impl From<&Var> for Expr {
    fn from(var: &Var) -> Self {
        Expr::var(var)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::int(value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            ExprNode::Const(v) => write!(f, "{v}"),
            ExprNode::Var(v) => write!(f, "{v}"),
            ExprNode::HandleRead { handle, field } => write!(f, "{handle}.{field}"),
            ExprNode::Add(a, b) => write!(f, "({a} + {b})"),
            ExprNode::Sub(a, b) => write!(f, "({a} - {b})"),
            ExprNode::Mul(a, b) => write!(f, "({a}*{b})"),
            ExprNode::Eq(a, b) => write!(f, "({a} == {b})"),
            ExprNode::Ne(a, b) => write!(f, "({a} != {b})"),
            ExprNode::Le(a, b) => write!(f, "({a} <= {b})"),
            ExprNode::Lt(a, b) => write!(f, "({a} < {b})"),
        }
    }
}

/// Concrete bindings for evaluating expressions
///
/// Maps variables to scalar values and handle variables to concrete
/// [`TensorHandle`]s. Used by consumers of a harvested binding program
/// (and by tests) to execute definition and assertion steps.
#[derive(Default)]
pub struct EvalEnv {
    vars: HashMap<VarId, i64>,
    handles: HashMap<VarId, TensorHandle>,
}

impl EvalEnv {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a scalar variable
    pub fn bind_var(&mut self, var: &Var, value: i64) {
        self.vars.insert(var.id(), value);
    }

    /// Bind a handle variable to a concrete tensor handle
    pub fn bind_handle(&mut self, var: &Var, handle: TensorHandle) {
        self.handles.insert(var.id(), handle);
    }

    /// Look up a scalar variable
    pub fn var(&self, var: &Var) -> Option<i64> {
        self.vars.get(&var.id()).copied()
    }

    /// Look up a handle variable
    pub fn handle(&self, var: &Var) -> Option<&TensorHandle> {
        self.handles.get(&var.id())
    }
}
