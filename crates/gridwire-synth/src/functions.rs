use tracing::debug;

use gridwire_rtl::{BinaryOp, Circuit, Expr, RegId, Shape, UnaryOp};

use crate::compiler::CompiledValue;
use crate::error::SynthError;
use crate::fixed::{Q, shape_of};
use crate::grid::{Grid, GridElem};

/// The output of a reduction engine: its result cell, as a value plus a
/// readiness bit that pulses high for exactly one tick per completed run.
pub(crate) struct Reduction {
    pub value: Q,
    pub ready: Expr,
}

/// Flatten a reduction's argument list (scalars, one-level grids and
/// nested grids) into one flat grid, depth-first, left-to-right,
/// row-major. This ordering fixes the sequence in which the engine
/// consumes elements.
pub(crate) fn flatten_args(args: &[(CompiledValue, Expr)]) -> Result<Grid, SynthError> {
    let mut values = Vec::new();
    for (value, _) in args {
        match value {
            CompiledValue::Scalar(q) => values.push(q.clone()),
            CompiledValue::Grid(grid) => values.extend(grid.flatten()),
        }
    }
    Grid::from_values(values)
}

/// Build a streaming-sum state machine over the flattened arguments.
///
/// Two states. IDLE holds the outputs at reset and waits for the combined
/// input-readiness signal: the self-ready latch (reset high, so every
/// engine runs once after power-up) OR any argument's readiness bit. On
/// readiness it clears the accumulator and starts RUNNING, which adds one
/// element per tick. RUNNING exits back to IDLE either by finishing (the
/// counter reached the last element: commit `acc + element`, pulse the
/// result-ready bit) or by restarting (readiness fired again mid-run: new
/// upstream data makes the in-flight partial sum stale, so it is abandoned
/// uncommitted and the self-ready latch re-arms the next IDLE tick).
///
/// When finish and restart coincide on the final element, the commit still
/// happens and the latch is still set: downstream sees the completed
/// pre-restart result for one tick while a fresh run retriggers. The
/// engine never terminates; it re-runs whenever inputs become ready.
pub(crate) fn build_sum(
    circuit: &mut Circuit,
    instance: &str,
    args: &[(CompiledValue, Expr)],
) -> Result<Reduction, SynthError> {
    let elements = flatten_args(args)?;
    let format = elements.format();
    let count = elements.len();
    debug!(instance, elements = count, %format, "building sum engine");

    let state = circuit.add_register(format!("{instance}_state"), Shape::unsigned(1), 0)?;
    let self_ready = circuit.add_register(format!("{instance}_self_rdy"), Shape::unsigned(1), 1)?;
    let counter = circuit.add_register(format!("{instance}_idx"), Shape::for_range(count), 0)?;
    let acc = circuit.add_register(format!("{instance}_acc"), shape_of(format), 0)?;
    let result = circuit.add_register(format!("{instance}_res"), shape_of(format), 0)?;
    let result_ready =
        circuit.add_register(format!("{instance}_res_rdy"), Shape::unsigned(1), 0)?;

    let input_ready = args.iter().fold(circuit.read(self_ready), |or, (_, bit)| {
        Expr::binary(BinaryOp::Or, or, bit.clone())
    });

    let in_idle = Expr::binary(
        BinaryOp::Eq,
        circuit.read(state),
        Expr::constant(0, Shape::unsigned(1)),
    );
    let counter_shape = circuit.register(counter).shape;
    let last = Expr::binary(
        BinaryOp::Ge,
        circuit.read(counter),
        Expr::constant(count as i128 - 1, counter_shape),
    );

    let counter_q = Q::from_expr(circuit.read(counter), counter_shape.width, 0);
    let element = match elements.select(&counter_q) {
        GridElem::Value(q) => q,
        GridElem::Nested(_) => unreachable!("flattened arguments are scalar"),
    };
    let acc_q = Q::from_expr(circuit.read(acc), format.nint, format.nfrac);
    let step = (&acc_q + &element).cast(format.nint, format.nfrac);
    let zero = Q::from_float(0.0, format);

    let high = Expr::constant(1, Shape::unsigned(1));
    let low = Expr::constant(0, Shape::unsigned(1));

    // IDLE -> RUNNING on readiness; RUNNING -> IDLE on restart or finish.
    let state_next = Expr::mux(
        in_idle.clone(),
        input_ready.clone(),
        Expr::unary(
            UnaryOp::Invert,
            Expr::binary(BinaryOp::Or, input_ready.clone(), last.clone()),
        ),
    );
    sync_next(circuit, state, state_next)?;

    // The latch that carries "new data arrived mid-run" back to IDLE.
    let self_ready_next = Expr::mux(
        in_idle.clone(),
        low.clone(),
        Expr::mux(input_ready.clone(), high.clone(), circuit.read(self_ready)),
    );
    sync_next(circuit, self_ready, self_ready_next)?;

    let counter_next = Expr::mux(
        in_idle.clone(),
        Expr::zero(counter_shape.width),
        Expr::slice(
            Expr::binary(
                BinaryOp::Add,
                circuit.read(counter),
                Expr::constant(1, counter_shape),
            ),
            0,
            counter_shape.width,
        ),
    );
    sync_next(circuit, counter, counter_next)?;

    let acc_next = Expr::mux(
        in_idle.clone(),
        Expr::mux(input_ready.clone(), zero.into_expr(), circuit.read(acc)),
        step.expr().clone(),
    );
    sync_next(circuit, acc, acc_next)?;

    // The accumulator register lags one element, so the commit folds the
    // final element in combinationally.
    let finishing = Expr::binary(
        BinaryOp::And,
        Expr::unary(UnaryOp::Invert, in_idle.clone()),
        last.clone(),
    );
    let result_next = Expr::mux(finishing, step.into_expr(), circuit.read(result));
    sync_next(circuit, result, result_next)?;

    let result_ready_next = Expr::mux(
        in_idle,
        low,
        Expr::mux(last, high, circuit.read(result_ready)),
    );
    sync_next(circuit, result_ready, result_ready_next)?;

    Ok(Reduction {
        value: Q::from_expr(circuit.read(result), format.nint, format.nfrac),
        ready: circuit.read(result_ready),
    })
}

fn sync_next(circuit: &mut Circuit, reg: RegId, next: Expr) -> Result<(), SynthError> {
    circuit.sync(reg, next).map_err(SynthError::from)
}
