//! Multi-tick scenarios for the streaming-sum engine: completion timing,
//! restart-on-new-input, and the simultaneous finish/restart tick.

use gridwire_common::NumericFormat;
use gridwire_rtl::{Circuit, RegId, Shape, Sim};

use crate::compiler::CompiledValue;
use crate::fixed::Q;
use crate::functions::{Reduction, build_sum};
use crate::grid::Grid;

const FMT: NumericFormat = NumericFormat::new(16, 0, false);

/// Two grid arguments of constants, each with a free (pokeable) readiness
/// register: the shape of `SUM(A1:A2, B1:B2)` with settled inputs.
fn sum_fixture(circuit: &mut Circuit) -> (Reduction, RegId, RegId) {
    let values = |xs: &[f64]| {
        Grid::from_values(xs.iter().map(|&x| Q::from_float(x, FMT))).unwrap()
    };
    let ready_a = circuit
        .add_register("arg0_rdy", Shape::unsigned(1), 0)
        .unwrap();
    let ready_b = circuit
        .add_register("arg1_rdy", Shape::unsigned(1), 0)
        .unwrap();
    let args = vec![
        (CompiledValue::Grid(values(&[2.0, 3.0])), circuit.read(ready_a)),
        (CompiledValue::Grid(values(&[5.0, 4.0])), circuit.read(ready_b)),
    ];
    let reduction = build_sum(circuit, "sum0", &args).unwrap();
    (reduction, ready_a, ready_b)
}

fn result_of(sim: &Sim, reduction: &Reduction) -> (f64, i128) {
    let value = match reduction.value.expr() {
        gridwire_rtl::Expr::Reg { id, .. } => reduction.value.to_float(sim.read(*id)),
        _ => panic!("reduction result should be a register"),
    };
    let ready = sim.eval(&reduction.ready);
    (value, ready)
}

#[test]
fn streaming_sum_commits_on_the_last_element() {
    let mut circuit = Circuit::new();
    let (reduction, _, _) = sum_fixture(&mut circuit);
    let mut sim = Sim::new(&circuit);

    // Tick 1 leaves IDLE (the self-ready latch resets high); ticks 2-4
    // consume the first three elements. No result yet.
    for tick in 1..=4 {
        sim.tick();
        let (_, ready) = result_of(&sim, &reduction);
        assert_eq!(ready, 0, "tick {tick} should not be ready");
    }

    // Tick 5 consumes the last element: commit plus a one-tick pulse.
    sim.tick();
    let (value, ready) = result_of(&sim, &reduction);
    assert_eq!(ready, 1);
    assert_eq!(value, 14.0);

    // The following IDLE tick deasserts readiness; the result holds.
    sim.tick();
    let (value, ready) = result_of(&sim, &reduction);
    assert_eq!(ready, 0);
    assert_eq!(value, 14.0);

    // No input readiness, so the engine stays put indefinitely.
    sim.run(8);
    let (value, ready) = result_of(&sim, &reduction);
    assert_eq!((value, ready), (14.0, 0));
}

#[test]
fn restart_abandons_the_run_without_committing() {
    let mut circuit = Circuit::new();
    let (reduction, ready_a, _) = sum_fixture(&mut circuit);
    let mut sim = Sim::new(&circuit);

    sim.tick(); // IDLE -> RUNNING
    sim.tick(); // element 0
    sim.poke(ready_a, 1); // new upstream data, two elements early
    sim.tick(); // RUNNING -> IDLE, nothing committed
    sim.poke(ready_a, 0);
    let (value, ready) = result_of(&sim, &reduction);
    assert_eq!((value, ready), (0.0, 0));

    // The self-ready latch re-arms a full fresh run: one IDLE tick, four
    // element ticks, then the commit.
    sim.tick();
    for _ in 0..3 {
        sim.tick();
        assert_eq!(result_of(&sim, &reduction).1, 0);
    }
    sim.tick();
    let (value, ready) = result_of(&sim, &reduction);
    assert_eq!((value, ready), (14.0, 1));
}

#[test]
fn simultaneous_finish_and_restart_commits_then_reruns() {
    let mut circuit = Circuit::new();
    let (reduction, ready_a, _) = sum_fixture(&mut circuit);
    let state = circuit.lookup("sum0_state").unwrap();
    let mut sim = Sim::new(&circuit);

    sim.run(4); // IDLE exit + three elements; counter now sits on the last
    sim.poke(ready_a, 1);
    sim.tick(); // finish and restart race on this tick
    sim.poke(ready_a, 0);

    // Commit wins: the completed pre-restart result is visible...
    let (value, ready) = result_of(&sim, &reduction);
    assert_eq!((value, ready), (14.0, 1));

    // ...and the latch still re-arms, so a fresh run starts immediately.
    sim.tick();
    assert_eq!(sim.read(state), 1, "engine should be RUNNING again");
    assert_eq!(result_of(&sim, &reduction).1, 0);
}

#[test]
fn scalar_and_grid_arguments_flatten_in_order() {
    use crate::functions::flatten_args;

    let circuit = Circuit::new();
    let never = gridwire_rtl::Expr::constant(0, Shape::unsigned(1));
    let args = vec![
        (CompiledValue::Scalar(Q::from_float(1.0, FMT)), never.clone()),
        (
            CompiledValue::Grid(
                Grid::from_values([Q::from_float(2.0, FMT), Q::from_float(3.0, FMT)]).unwrap(),
            ),
            never,
        ),
    ];
    let flat = flatten_args(&args).unwrap();
    let sim = Sim::new(&circuit);
    let resolved: Vec<f64> = flat
        .flatten()
        .iter()
        .map(|q| q.to_float(sim.eval(q.expr())))
        .collect();
    assert_eq!(resolved, [1.0, 2.0, 3.0]);
}
