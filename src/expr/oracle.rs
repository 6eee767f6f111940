//! Equality proving for symbolic expressions
//!
//! The binder consults an [`EqualityOracle`] before emitting an equality
//! assertion for an already-defined variable. The oracle is conservative:
//! `false` means "not proven", never "provably unequal".

use super::{Expr, ExprNode};

/// Capability to prove two symbolic expressions equal
///
/// Implementations may be arbitrarily strong (a full arithmetic analyzer)
/// or weak; the binder only requires that a `true` answer is sound.
pub trait EqualityOracle {
    /// Prove `a == b`, conservatively
    fn prove_equal(&self, a: &Expr, b: &Expr) -> bool;
}

/// Default oracle: reference equality, constant folding, then structural
/// recursion with variable identity at the leaves
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuralOracle;

impl EqualityOracle for StructuralOracle {
    fn prove_equal(&self, a: &Expr, b: &Expr) -> bool {
        if a.ptr_eq(b) {
            return true;
        }
        if let (Some(x), Some(y)) = (a.as_const_int(), b.as_const_int()) {
            return x == y;
        }
        structural_eq(a, b)
    }
}

fn structural_eq(a: &Expr, b: &Expr) -> bool {
    use ExprNode::*;
    match (a.node(), b.node()) {
        (Const(x), Const(y)) => x == y,
        (Var(x), Var(y)) => x == y,
        (
            HandleRead {
                handle: ha,
                field: fa,
            },
            HandleRead {
                handle: hb,
                field: fb,
            },
        ) => ha == hb && fa == fb,
        (Add(a1, a2), Add(b1, b2))
        | (Sub(a1, a2), Sub(b1, b2))
        | (Mul(a1, a2), Mul(b1, b2))
        | (Eq(a1, a2), Eq(b1, b2))
        | (Ne(a1, a2), Ne(b1, b2))
        | (Le(a1, a2), Le(b1, b2))
        | (Lt(a1, a2), Lt(b1, b2)) => structural_eq(a1, b1) && structural_eq(a2, b2),
        _ => false,
    }
}
