//! Integration tests for the argument binder
//!
//! These tests drive the public binding API the way signature matching
//! does: accumulate binds for each argument, then harvest and (where it
//! matters) execute the resulting program against concrete handles.

mod common;

use bindr::binder::{ArgBinder, DefMap, InitStep};
use bindr::buffer::{BufferDecl, TensorHandle};
use bindr::dtype::DType;
use bindr::error::Error;
use bindr::expr::{EvalEnv, Expr, ExprNode, StructuralOracle, Var};
use common::run_program;

fn fresh_binder(def_map: &mut DefMap) -> ArgBinder<'_> {
    static ORACLE: StructuralOracle = StructuralOracle;
    ArgBinder::new(def_map, &ORACLE)
}

#[test]
fn test_idempotent_redefinition() {
    let mut def_map = DefMap::new();
    let mut binder = fresh_binder(&mut def_map);

    let n = Var::new("n");
    let n_expr = Expr::var(&n);
    binder.bind(&n_expr, &Expr::int(4), "a", false).unwrap();
    binder.bind(&n_expr, &Expr::int(4), "b", false).unwrap();
    assert_eq!(binder.defs().len(), 1);
    assert!(binder.asserts().is_empty());

    binder.bind(&n_expr, &Expr::int(5), "c", false).unwrap();
    assert_eq!(binder.asserts().len(), 1);

    // The conflicting assertion evaluates false at call time.
    let env = EvalEnv::new();
    assert_eq!(binder.asserts()[0].cond.eval(&env), Some(0));
    assert!(binder.asserts()[0].message.contains('c'));
}

#[test]
fn test_fuzzy_shape_matching_succeeds() {
    let mut def_map = DefMap::new();
    let mut binder = fresh_binder(&mut def_map);

    let n = Var::new("n");
    let arg = BufferDecl::new(DType::F32, [Expr::int(1), Expr::var(&n)]);
    let value = BufferDecl::new(DType::F32, [Expr::int(5)]);

    binder.bind_buffer(&arg, &value, "x", true).unwrap();
    assert_eq!(binder.defs().len(), 1);

    // The dropped leading dimension is checked to be 1.
    let env = EvalEnv::new();
    assert!(
        binder
            .asserts()
            .iter()
            .all(|a| a.cond.eval(&env) == Some(1))
    );

    // n was defined as 5.
    assert_eq!(def_map[&n].as_const_int(), Some(5));
}

#[test]
fn test_fuzzy_shape_matching_requires_leading_ones() {
    let mut def_map = DefMap::new();
    let mut binder = fresh_binder(&mut def_map);

    let n = Var::new("n");
    let arg = BufferDecl::new(DType::F32, [Expr::int(2), Expr::var(&n)]);
    let value = BufferDecl::new(DType::F32, [Expr::int(5)]);

    // Leading extent 2 cannot be 1: binding succeeds but the emitted
    // check fails at call time.
    binder.bind_buffer(&arg, &value, "x", true).unwrap();
    let env = EvalEnv::new();
    let failed: Vec<_> = binder
        .asserts()
        .iter()
        .filter(|a| a.cond.eval(&env) == Some(0))
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].message.contains("x.shape[0]"));
}

#[test]
fn test_exact_shape_matching_rejects_rank_mismatch() {
    let mut def_map = DefMap::new();
    let mut binder = fresh_binder(&mut def_map);

    let n = Var::new("n");
    let arg = BufferDecl::new(DType::F32, [Expr::int(1), Expr::var(&n)]);
    let value = BufferDecl::new(DType::F32, [Expr::int(5)]);

    let err = binder.bind_buffer(&arg, &value, "x", false).unwrap_err();
    assert!(matches!(
        err,
        Error::RankMismatch {
            expected: 2,
            got: 1,
            ..
        }
    ));
}

#[test]
fn test_fuzzy_never_permits_extra_runtime_dims() {
    let mut def_map = DefMap::new();
    let mut binder = fresh_binder(&mut def_map);

    let n = Var::new("n");
    let arg = BufferDecl::new(DType::F32, [Expr::var(&n)]);
    let value = BufferDecl::new(DType::F32, [Expr::int(1), Expr::int(5)]);

    assert!(binder.bind_buffer(&arg, &value, "x", true).is_err());
}

#[test]
fn test_dtype_mismatch_rejected() {
    let mut def_map = DefMap::new();
    let mut binder = fresh_binder(&mut def_map);

    let arg = BufferDecl::new(DType::F32, [Expr::int(4)]);
    let value = BufferDecl::new(DType::I32, [Expr::int(4)]);

    let err = binder.bind_buffer(&arg, &value, "x", false).unwrap_err();
    assert!(matches!(
        err,
        Error::DTypeMismatch {
            expected: DType::F32,
            got: DType::I32,
            ..
        }
    ));
}

#[test]
fn test_array_length_mismatch_fails_before_binding() {
    let mut def_map = DefMap::new();
    let mut binder = fresh_binder(&mut def_map);

    let vars: Vec<Var> = (0..3).map(|i| Var::new(format!("d{i}"))).collect();
    let args: Vec<Expr> = vars.iter().map(Expr::var).collect();
    let values = [Expr::int(7), Expr::int(8)];

    let err = binder.bind_array(&args, &values, "x.shape").unwrap_err();
    match err {
        Error::ArityMismatch { arg, expected, got } => {
            assert_eq!(arg, "x.shape");
            assert_eq!((expected, got), (3, 2));
        }
        other => panic!("unexpected error: {other}"),
    }
    // Nothing was bound.
    assert!(binder.defs().is_empty());
    assert!(def_map.is_empty());
}

#[test]
fn test_ordering_invariant_over_ranks() {
    for rank in 0..=8usize {
        let mut def_map = DefMap::new();
        let mut binder = fresh_binder(&mut def_map);

        let dims: Vec<Var> = (0..rank).map(|i| Var::new(format!("d{i}"))).collect();
        let buffer = BufferDecl::new(DType::F32, dims.iter().map(Expr::var));
        let handle = Var::new("arg0");
        binder
            .bind_dl_tensor(
                &buffer,
                &buffer.device_type,
                &buffer.device_id,
                &handle,
                "arg0",
            )
            .unwrap();

        // Every shape-read step comes after the rank guard.
        let mut guarded = false;
        for step in binder.init_nest() {
            match step {
                InitStep::Assert(assertion) if assertion.message.contains(".ndim") => {
                    guarded = true;
                }
                InitStep::Let { value, .. } => {
                    let mut reads_handle = false;
                    value.for_each_var(&mut |v| reads_handle |= *v == handle);
                    if reads_handle {
                        assert!(guarded, "rank {rank}: handle read before its ndim guard");
                    }
                }
                InitStep::Assert(_) => {}
            }
        }
        assert!(guarded, "rank {rank}: no ndim guard emitted");
    }
}

#[test]
fn test_dl_tensor_binding_end_to_end() {
    let mut def_map = DefMap::new();
    let mut binder = fresh_binder(&mut def_map);

    // Signature: f32 buffer of shape [n, n + 2] on a caller-decided device.
    let n = Var::new("n");
    let dev_type = Var::new("dev_type");
    let dev_id = Var::new("dev_id");
    let shape = [Expr::var(&n), Expr::var(&n) + Expr::int(2)];
    let buffer =
        BufferDecl::new(DType::F32, shape).with_device(Expr::var(&dev_type), Expr::var(&dev_id));

    let handle = Var::new("arg0");
    binder
        .bind_dl_tensor(
            &buffer,
            &buffer.device_type,
            &buffer.device_id,
            &handle,
            "arg0",
        )
        .unwrap();

    // n, dev_type, dev_id were all introduced; the handle's dtype is on
    // record.
    let def_names: Vec<&str> = binder.defs().iter().map(|v| v.name()).collect();
    assert_eq!(def_names, ["n", "dev_type", "dev_id"]);
    assert_eq!(binder.def_handle_dtype()[&handle], DType::F32);

    // A conforming call: shape [3, 5] satisfies n = 3, n + 2 = 5.
    let mut env = EvalEnv::new();
    env.bind_handle(&handle, TensorHandle::contiguous(&[3, 5], DType::F32, 1, 0));
    run_program(&binder, &mut env).unwrap();
    assert_eq!(env.var(&n), Some(3));
    assert_eq!(env.var(&dev_type), Some(1));

    // A violating call: shape [3, 9] breaks the n + 2 constraint.
    let mut env = EvalEnv::new();
    env.bind_handle(&handle, TensorHandle::contiguous(&[3, 9], DType::F32, 1, 0));
    let message = run_program(&binder, &mut env).unwrap_err();
    assert!(message.contains("arg0.shape[1]"), "got: {message}");
}

#[test]
fn test_dl_tensor_rank_guard_fires_before_reads() {
    let mut def_map = DefMap::new();
    let mut binder = fresh_binder(&mut def_map);

    let dims: Vec<Var> = (0..3).map(|i| Var::new(format!("d{i}"))).collect();
    let buffer = BufferDecl::new(DType::F32, dims.iter().map(Expr::var));
    let handle = Var::new("arg0");
    binder
        .bind_dl_tensor(
            &buffer,
            &buffer.device_type,
            &buffer.device_id,
            &handle,
            "arg0",
        )
        .unwrap();

    // The caller passes a rank-2 handle against a rank-3 signature. The
    // guard must report the violation; no shape read runs unguarded.
    let mut env = EvalEnv::new();
    env.bind_handle(&handle, TensorHandle::contiguous(&[3, 5], DType::F32, 1, 0));
    let message = run_program(&binder, &mut env).unwrap_err();
    assert!(message.contains("arg0.ndim"), "got: {message}");
}

#[test]
fn test_dl_tensor_dtype_code_checked() {
    let mut def_map = DefMap::new();
    let mut binder = fresh_binder(&mut def_map);

    let buffer = BufferDecl::new(DType::F32, [Expr::int(4)]);
    let handle = Var::new("arg0");
    binder
        .bind_dl_tensor(
            &buffer,
            &buffer.device_type,
            &buffer.device_id,
            &handle,
            "arg0",
        )
        .unwrap();

    let mut env = EvalEnv::new();
    env.bind_handle(&handle, TensorHandle::contiguous(&[4], DType::I64, 1, 0));
    let message = run_program(&binder, &mut env).unwrap_err();
    assert!(message.contains("arg0.dtype"), "got: {message}");
}

#[test]
fn test_strided_buffer_binds_handle_strides() {
    let mut def_map = DefMap::new();
    let mut binder = fresh_binder(&mut def_map);

    let n = Var::new("n");
    let s0 = Var::new("s0");
    let s1 = Var::new("s1");
    let buffer = BufferDecl::new(DType::F32, [Expr::var(&n), Expr::int(4)])
        .with_strides([Expr::var(&s0), Expr::var(&s1)]);

    let handle = Var::new("arg0");
    binder
        .bind_dl_tensor(
            &buffer,
            &buffer.device_type,
            &buffer.device_id,
            &handle,
            "arg0",
        )
        .unwrap();

    // The handle omits strides; the ABI reports compact ones.
    let mut env = EvalEnv::new();
    env.bind_handle(&handle, TensorHandle::contiguous(&[2, 4], DType::F32, 1, 0));
    run_program(&binder, &mut env).unwrap();
    assert_eq!(env.var(&s0), Some(4));
    assert_eq!(env.var(&s1), Some(1));
}

#[test]
fn test_buffer_stride_binding_uses_compact_default() {
    let mut def_map = DefMap::new();
    let mut binder = fresh_binder(&mut def_map);

    let s0 = Var::new("s0");
    let s1 = Var::new("s1");
    let arg = BufferDecl::new(DType::F32, [Expr::int(2), Expr::int(3)])
        .with_strides([Expr::var(&s0), Expr::var(&s1)]);
    // The value buffer declares no strides: compact [3, 1] is derived.
    let value = BufferDecl::new(DType::F32, [Expr::int(2), Expr::int(3)]);

    binder.bind_buffer(&arg, &value, "x", false).unwrap();
    assert_eq!(def_map[&s0].as_const_int(), Some(3));
    assert_eq!(def_map[&s1].as_const_int(), Some(1));
}

#[test]
fn test_fuzzy_stride_binding_is_trailing_only() {
    let mut def_map = DefMap::new();
    let mut binder = fresh_binder(&mut def_map);

    let lead = Var::new("lead");
    let s0 = Var::new("s0");
    let arg = BufferDecl::new(DType::F32, [Expr::int(1), Expr::int(5)])
        .with_strides([Expr::var(&lead), Expr::var(&s0)]);
    let value = BufferDecl::new(DType::F32, [Expr::int(5)]);

    binder.bind_buffer(&arg, &value, "x", true).unwrap();

    // Only the trailing stride bound; the dropped dimension's stride is
    // left unconstrained.
    assert_eq!(def_map[&s0].as_const_int(), Some(1));
    assert!(!def_map.contains_key(&lead));
}

#[test]
fn test_definitions_shared_across_arguments() {
    let mut def_map = DefMap::new();
    let mut binder = fresh_binder(&mut def_map);

    // f(tA(shape=[n]), tC(shape=[n + 2])): tA defines n, tC constrains it.
    let n = Var::new("n");
    let t_a = BufferDecl::new(DType::F32, [Expr::var(&n)]);
    let t_c = BufferDecl::new(DType::F32, [Expr::var(&n) + Expr::int(2)]);

    let a = Var::new("arg0");
    let c = Var::new("arg1");
    binder
        .bind_dl_tensor(&t_a, &t_a.device_type, &t_a.device_id, &a, "arg0")
        .unwrap();
    binder
        .bind_dl_tensor(&t_c, &t_c.device_type, &t_c.device_id, &c, "arg1")
        .unwrap();

    // n defined once; the n + 2 constraint became an assertion.
    assert_eq!(
        binder.defs().iter().filter(|v| **v == n).count(),
        1,
        "n must be defined exactly once"
    );
    assert!(
        binder
            .asserts()
            .iter()
            .any(|a| a.message.contains("arg1.shape[0]"))
    );

    let mut env = EvalEnv::new();
    env.bind_handle(&a, TensorHandle::contiguous(&[6], DType::F32, 1, 0));
    env.bind_handle(&c, TensorHandle::contiguous(&[8], DType::F32, 1, 0));
    run_program(&binder, &mut env).unwrap();

    let mut env = EvalEnv::new();
    env.bind_handle(&a, TensorHandle::contiguous(&[6], DType::F32, 1, 0));
    env.bind_handle(&c, TensorHandle::contiguous(&[7], DType::F32, 1, 0));
    assert!(run_program(&binder, &mut env).is_err());
}

#[test]
fn test_lets_appear_once_per_definition() {
    let mut def_map = DefMap::new();
    let mut binder = fresh_binder(&mut def_map);

    let n = Var::new("n");
    let buffer = BufferDecl::new(DType::F32, [Expr::var(&n), Expr::var(&n)]);
    let handle = Var::new("arg0");
    binder
        .bind_dl_tensor(
            &buffer,
            &buffer.device_type,
            &buffer.device_id,
            &handle,
            "arg0",
        )
        .unwrap();

    // n materializes from shape[0] only; shape[1] re-binds through an
    // assertion rather than a second let.
    let lets_of_n = binder
        .init_nest()
        .iter()
        .filter(|step| matches!(step, InitStep::Let { var, .. } if *var == n))
        .count();
    assert_eq!(lets_of_n, 1);
    assert!(
        binder
            .asserts()
            .iter()
            .any(|a| matches!(a.cond.node(), ExprNode::Eq(_, _)))
    );
}
