//! Argument binding: matching symbolic signatures against call-site values
//!
//! Consider a function `f(tA(shape=[n]), tB(shape=[3]), tC(shape=[n+2]))`.
//! Here `n` is decided by the caller, `tB` only accepts extent-3 tensors,
//! and `tC`'s extent must equal `n + 2`. Matching a call site against that
//! signature produces a binding sequence:
//!
//! - define `n = tA.shape[0]`
//! - assert `tB.shape[0] == 3`
//! - assert `tC.shape[0] == n + 2`
//!
//! In general this is constraint solving; the binder deliberately restricts
//! it so that only variables declared in the argument list are solvable. A
//! signature `f(tA(shape=[n+3]))` with no argument corresponding to `n` is
//! rejected even though `n` is derivable — a variable inside a compound
//! expression is never solved for, the compound expression only ever
//! produces an equality assertion.
//!
//! One [`ArgBinder`] matches one signature against one call site. It
//! accumulates monotonically across `bind*` calls and is discarded after
//! its output is harvested; a failed bind aborts the whole signature match
//! and the partial state must be thrown away with the binder.

use crate::buffer::{BufferDecl, HandleField, compact_strides};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::expr::{EqualityOracle, Expr, Var};
use std::collections::HashMap;

/// Definitions of known variables, shared across binders for one signature
///
/// Entries are write-once: a variable, once defined, is never overwritten —
/// later binds against it produce equality assertions instead.
pub type DefMap = HashMap<Var, Expr>;

/// A runtime assertion with its diagnostic message
#[derive(Clone, Debug)]
pub struct Assertion {
    /// Boolean-valued condition (nonzero means satisfied)
    pub cond: Expr,
    /// Message naming the argument and the violated constraint
    pub message: String,
}

/// One step of the initialization nest
///
/// The nest interleaves variable materializations with the assertions that
/// make them safe to compute: a rank guard must run before the shape reads
/// it protects, so it cannot live in the flat assertion list.
#[derive(Clone, Debug)]
pub enum InitStep {
    /// Materialize `var` as `value`, evaluated exactly once
    ///
    /// Used when `value` is expensive or impure to recompute, e.g. a load
    /// from a runtime handle.
    Let {
        /// The variable being materialized
        var: Var,
        /// Its value
        value: Expr,
    },
    /// An assertion that must hold before later steps may run
    Assert(Assertion),
}

/// The harvested output of one signature match
///
/// Consumers emit the initialization nest first, in order, then the flat
/// assertions: a flat assertion may reference values the nest materializes
/// and reads the nest's guards have already made safe.
#[derive(Debug, Default)]
pub struct BindingProgram {
    /// Newly introduced variables, in definition order
    pub defs: Vec<Var>,
    /// Element type recorded for each bound raw handle variable
    pub def_handle_dtype: HashMap<Var, DType>,
    /// Free-standing runtime assertions
    pub asserts: Vec<Assertion>,
    /// Ordered definition and guard steps
    pub init_nest: Vec<InitStep>,
}

/// Helper utility to generate match and bind of arguments
///
/// Borrows the signature's [`DefMap`] and an [`EqualityOracle`]; owns the
/// output collections until they are harvested through the accessors or
/// [`ArgBinder::into_program`].
pub struct ArgBinder<'a> {
    def_map: &'a mut DefMap,
    oracle: &'a dyn EqualityOracle,
    defs: Vec<Var>,
    init_nest: Vec<InitStep>,
    def_handle_dtype: HashMap<Var, DType>,
    asserts: Vec<Assertion>,
}

impl<'a> ArgBinder<'a> {
    /// Create a binder over a definition map of already-known variables
    ///
    /// The binder updates `def_map` as it introduces definitions.
    pub fn new(def_map: &'a mut DefMap, oracle: &'a dyn EqualityOracle) -> Self {
        Self {
            def_map,
            oracle,
            defs: Vec::new(),
            init_nest: Vec::new(),
            def_handle_dtype: HashMap::new(),
            asserts: Vec::new(),
        }
    }

    /// Try to bind `arg` to `value`, generating a constraint if necessary
    ///
    /// - an undefined variable `arg` is defined as `value` (with a let
    ///   step in the nest when `with_let` is set, so an impure `value` is
    ///   evaluated exactly once);
    /// - a defined variable `arg` yields an assertion `definition == value`
    ///   unless the oracle proves them equal;
    /// - any other `arg` always yields an assertion `arg == value`. Every
    ///   variable it mentions must already be defined.
    pub fn bind(&mut self, arg: &Expr, value: &Expr, arg_name: &str, with_let: bool) -> Result<()> {
        if let Some(var) = arg.as_var() {
            if let Some(def) = self.def_map.get(var).cloned() {
                if !self.oracle.prove_equal(&def, value) {
                    self.push_assert(def.eq(value), arg_name);
                }
            } else {
                self.def_map.insert(var.clone(), value.clone());
                self.defs.push(var.clone());
                if with_let {
                    self.init_nest.push(InitStep::Let {
                        var: var.clone(),
                        value: value.clone(),
                    });
                }
            }
        } else {
            self.ensure_defined(arg, arg_name)?;
            self.push_assert(arg.eq(value), arg_name);
        }
        Ok(())
    }

    /// Bind two expression arrays element-wise
    ///
    /// The length check runs before any element binds, so a mismatch never
    /// leaves per-element state behind. Element diagnostics are named
    /// `arg_name[i]`.
    pub fn bind_array(&mut self, args: &[Expr], values: &[Expr], arg_name: &str) -> Result<()> {
        if args.len() != values.len() {
            return Err(Error::ArityMismatch {
                arg: arg_name.to_string(),
                expected: args.len(),
                got: values.len(),
            });
        }
        for (i, (arg, value)) in args.iter().zip(values).enumerate() {
            self.bind(arg, value, &format!("{arg_name}[{i}]"), false)?;
        }
        Ok(())
    }

    /// Bind one symbolic buffer to another
    ///
    /// With `fuzzy_match`, `value` may have fewer dimensions than `arg` as
    /// long as each of `arg`'s excess *leading* dimensions binds to the
    /// constant 1; the remaining dimensions bind pairwise in trailing
    /// order. The reverse direction is always a rank error. Stride binding
    /// is shape-length driven: only the trailing dimensions that bound
    /// their shapes bind their strides, and a strideless `value`
    /// contributes compact row-major strides derived from its shape.
    pub fn bind_buffer(
        &mut self,
        arg: &BufferDecl,
        value: &BufferDecl,
        arg_name: &str,
        fuzzy_match: bool,
    ) -> Result<()> {
        if arg.dtype != value.dtype {
            return Err(Error::dtype_mismatch(arg_name, arg.dtype, value.dtype));
        }

        let arg_rank = arg.ndim();
        let value_rank = value.ndim();
        if value_rank > arg_rank || (value_rank < arg_rank && !fuzzy_match) {
            return Err(Error::rank_mismatch(arg_name, arg_rank, value_rank));
        }
        let lead = arg_rank - value_rank;

        let one = Expr::int(1);
        for i in 0..lead {
            self.bind(&arg.shape[i], &one, &format!("{arg_name}.shape[{i}]"), false)?;
        }
        for (i, dim) in value.shape.iter().enumerate() {
            let k = lead + i;
            self.bind(&arg.shape[k], dim, &format!("{arg_name}.shape[{k}]"), false)?;
        }

        if !arg.strides.is_empty() {
            if arg.strides.len() != arg_rank {
                return Err(Error::StrideCountMismatch {
                    arg: arg_name.to_string(),
                    rank: arg_rank,
                    strides: arg.strides.len(),
                });
            }
            let value_strides = if value.strides.is_empty() {
                compact_strides(&value.shape)
            } else {
                if value.strides.len() != value_rank {
                    return Err(Error::StrideCountMismatch {
                        arg: arg_name.to_string(),
                        rank: value_rank,
                        strides: value.strides.len(),
                    });
                }
                value.strides.clone()
            };
            for (i, stride) in value_strides.iter().enumerate() {
                let k = lead + i;
                self.bind(
                    &arg.strides[k],
                    stride,
                    &format!("{arg_name}.strides[{k}]"),
                    false,
                )?;
            }
        }

        self.bind(
            &arg.byte_offset,
            &value.byte_offset,
            &format!("{arg_name}.byte_offset"),
            false,
        )
    }

    /// Bind a symbolic buffer directly against a runtime tensor handle
    ///
    /// Every field read off the handle is guarded: the rank assertion is
    /// pushed onto the initialization nest *before* the per-dimension load
    /// steps it protects, because a shape read past the handle's `ndim` is
    /// undefined. Field loads bind with lets so each is performed once.
    /// The handle's element type is recorded so later passes can recover
    /// type information for the raw handle without re-deriving it.
    pub fn bind_dl_tensor(
        &mut self,
        buffer: &BufferDecl,
        device_type: &Expr,
        device_id: &Expr,
        handle: &Var,
        arg_name: &str,
    ) -> Result<()> {
        let rank = buffer.ndim();

        // Rank guard. Everything below that touches shape[i]/strides[i]
        // is only safe once this holds.
        let v_ndim = Expr::handle_read(handle, HandleField::Ndim);
        self.init_nest.push(InitStep::Assert(Assertion {
            cond: v_ndim.eq(&Expr::int(rank as i64)),
            message: format!("{arg_name}.ndim is expected to equal {rank}"),
        }));

        // The type code field is readable at any rank.
        let v_code = Expr::handle_read(handle, HandleField::DTypeCode);
        self.asserts.push(Assertion {
            cond: v_code.eq(&Expr::int(i64::from(buffer.dtype.code()))),
            message: format!("{arg_name}.dtype is expected to be {}", buffer.dtype),
        });

        for (i, dim) in buffer.shape.iter().enumerate() {
            self.bind(
                dim,
                &Expr::handle_read(handle, HandleField::Shape(i)),
                &format!("{arg_name}.shape[{i}]"),
                true,
            )?;
        }

        if !buffer.strides.is_empty() {
            if buffer.strides.len() != rank {
                return Err(Error::StrideCountMismatch {
                    arg: arg_name.to_string(),
                    rank,
                    strides: buffer.strides.len(),
                });
            }
            for (i, stride) in buffer.strides.iter().enumerate() {
                self.bind(
                    stride,
                    &Expr::handle_read(handle, HandleField::Stride(i)),
                    &format!("{arg_name}.strides[{i}]"),
                    true,
                )?;
            }
        }

        self.bind(
            &buffer.byte_offset,
            &Expr::handle_read(handle, HandleField::ByteOffset),
            &format!("{arg_name}.byte_offset"),
            true,
        )?;

        self.bind(
            device_type,
            &Expr::handle_read(handle, HandleField::DeviceType),
            &format!("{arg_name}.device_type"),
            true,
        )?;
        self.bind(
            device_id,
            &Expr::handle_read(handle, HandleField::DeviceId),
            &format!("{arg_name}.device_id"),
            true,
        )?;

        self.def_handle_dtype.insert(handle.clone(), buffer.dtype);
        Ok(())
    }

    /// The variables newly defined by this binder, in definition order
    pub fn defs(&self) -> &[Var] {
        &self.defs
    }

    /// The free-standing assertions generated in binding
    ///
    /// For example, `binder.bind(var, expr_1, ..)` records `expr_1` as the
    /// definition of `var`; a later `binder.bind(var, expr_2, ..)` then
    /// produces an assertion that `expr_1 == expr_2`. Assertions whose
    /// evaluation depends on guards live in [`ArgBinder::init_nest`]
    /// instead, and consumers must emit the nest first.
    pub fn asserts(&self) -> &[Assertion] {
        &self.asserts
    }

    /// The initialization nest generated during binding
    ///
    /// Contains let steps together with any assertions required for those
    /// lets to be computed safely, in execution order.
    pub fn init_nest(&self) -> &[InitStep] {
        &self.init_nest
    }

    /// Element type of each bound raw handle variable
    pub fn def_handle_dtype(&self) -> &HashMap<Var, DType> {
        &self.def_handle_dtype
    }

    /// Harvest the accumulated output for hand-off to code generation
    pub fn into_program(self) -> BindingProgram {
        BindingProgram {
            defs: self.defs,
            def_handle_dtype: self.def_handle_dtype,
            asserts: self.asserts,
            init_nest: self.init_nest,
        }
    }

    fn push_assert(&mut self, cond: Expr, arg_name: &str) {
        self.asserts.push(Assertion {
            message: format!("Argument {arg_name} has an unsatisfied constraint: {cond}"),
            cond,
        });
    }

    /// Reject constraints that reference variables no argument has defined
    fn ensure_defined(&self, constraint: &Expr, arg_name: &str) -> Result<()> {
        let mut undefined = None;
        constraint.for_each_var(&mut |var| {
            if undefined.is_none() && !self.def_map.contains_key(var) {
                undefined = Some(var.name().to_string());
            }
        });
        match undefined {
            Some(var) => Err(Error::undefined_var(var, arg_name)),
            None => Ok(()),
        }
    }
}
