//! The IR optimizer: a data-flow-driven pipeline run per procedure (spec
//! section 4.2). Each pass reports whether it changed anything; the outer
//! driver iterates relevant subsets to a fixed point.

pub mod coalesce;
pub mod dataflow;
pub mod dce;
pub mod dominator;
pub mod forward;
pub mod loops;
pub mod locals;
pub mod peephole;
pub mod rename;
pub mod statics;
pub mod trace;

use crate::ir::module::Module;
use crate::ir::proc::Procedure;

/// Optimization level, composed from the CLI's `basic`/`inline`/
/// `auto-inline`/`auto-inline-all` flags (spec section 6). Higher levels
/// run strictly more of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptLevel {
    None,
    Basic,
    Full,
}

/// Run the full per-procedure pipeline to a fixed point (spec 4.2, steps
/// 1–13). Returns whether the procedure's IR changed at all.
pub fn optimize_procedure(proc: &mut Procedure, level: OptLevel) -> bool {
    if level == OptLevel::None {
        trace::build_traces(proc, false);
        return false;
    }

    let mut any = false;

    // Step 1: trace building (expand joins single-entry blocks when doing a
    // full optimization pass).
    any |= trace::build_traces(proc, level == OptLevel::Full);

    // Step 3: SSA-ish rename, once, before the iterative core.
    any |= rename::rename_temporaries(proc);

    let mut changed = true;
    while changed {
        changed = false;

        dataflow::run_temps(proc);

        changed |= forward::forward_and_fold(proc);
        changed |= dce::remove_unused_results(proc);
        changed |= dce::eliminate_dead_branches(proc);

        dominator::build_dominators(proc);

        if level == OptLevel::Full {
            loops::detect_loops(proc);
            changed |= coalesce::reduce_temporaries(proc);
            changed |= locals::promote_simple_locals(proc);
        }

        changed |= peephole::peephole(proc);

        any |= changed;
    }

    trace::build_traces(proc, level == OptLevel::Full);
    any
}

/// Run the whole-module passes (static relevance, spec 4.2 step 12) after
/// every procedure has reached its own fixed point, then re-run affected
/// procedures once more since removing a static store can enable further
/// dead-code elimination.
pub fn optimize_module(module: &mut Module, level: OptLevel) {
    for proc in &mut module.procedures {
        optimize_procedure(proc, level);
    }

    if level == OptLevel::Full && statics::remove_irrelevant_static_stores(module) {
        for proc in &mut module.procedures {
            dce::remove_unused_results(proc);
            peephole::peephole(proc);
        }
    }
}
