//! Common test utilities
#![allow(dead_code)]

use bindr::binder::{ArgBinder, InitStep};
use bindr::expr::EvalEnv;

/// Execute a harvested binding program against concrete bindings
///
/// Runs the initialization nest in order (lets bind variables, nest
/// assertions must hold before later steps run), then checks the flat
/// assertions. Returns the message of the first violated or unevaluable
/// step.
pub fn run_program(binder: &ArgBinder<'_>, env: &mut EvalEnv) -> Result<(), String> {
    for step in binder.init_nest() {
        match step {
            InitStep::Let { var, value } => {
                let value = value
                    .eval(env)
                    .ok_or_else(|| format!("unevaluable definition of {var}"))?;
                env.bind_var(var, value);
            }
            InitStep::Assert(assertion) => {
                if assertion.cond.eval(env) != Some(1) {
                    return Err(assertion.message.clone());
                }
            }
        }
    }
    for assertion in binder.asserts() {
        if assertion.cond.eval(env) != Some(1) {
            return Err(assertion.message.clone());
        }
    }
    Ok(())
}
