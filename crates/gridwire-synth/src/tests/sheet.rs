//! Whole-workbook compiles driven through the simulator: literals,
//! arithmetic over references, SUM over a range, free cells, and the
//! build-time rejections (cycles, duplicate drivers, parse errors).

use gridwire_common::Location;
use gridwire_rtl::Sim;

use crate::compiler::{CompiledSheet, Compiler, SynthConfig, WorkbookModel};
use crate::error::SynthError;

fn compile(cells: &[(u32, u32, &str)]) -> Result<CompiledSheet, SynthError> {
    let mut model = WorkbookModel::new();
    let sheet = model.add_sheet("Sheet1");
    for &(col, row, text) in cells {
        model.set(sheet, col, row, text);
    }
    Compiler::new(SynthConfig::default()).compile(&model)
}

fn loc(col: u32, row: u32) -> Location {
    Location::new("Sheet1", col, row)
}

fn cell_float(sheet: &CompiledSheet, sim: &Sim, location: &Location) -> f64 {
    let cell = sheet.cell(location).expect("cell exists");
    cell.value_q(sheet.circuit()).to_float(sim.read(cell.value))
}

fn cell_ready(sheet: &CompiledSheet, sim: &Sim, location: &Location) -> i128 {
    let cell = sheet.cell(location).expect("cell exists");
    sim.read(cell.ready)
}

#[test]
fn literals_and_arithmetic_settle() {
    let sheet = compile(&[
        (1, 1, "2"),
        (1, 2, "3"),
        (2, 1, "=A1+A2"),
        (2, 2, "=A1*A2-1"),
        (3, 1, "=A1>A2"),
    ])
    .unwrap();

    let mut sim = Sim::new(sheet.circuit());
    sim.run(2); // literals commit on tick 1, consumers on tick 2

    assert_eq!(cell_float(&sheet, &sim, &loc(1, 1)), 2.0);
    assert_eq!(cell_float(&sheet, &sim, &loc(2, 1)), 5.0);
    assert_eq!(cell_float(&sheet, &sim, &loc(2, 2)), 5.0);
    assert_eq!(cell_float(&sheet, &sim, &loc(3, 1)), 0.0);
}

#[test]
fn sum_over_a_range_reaches_the_cell() {
    let sheet = compile(&[
        (1, 1, "2"),
        (1, 2, "3"),
        (1, 3, "5"),
        (1, 4, "4"),
        (3, 1, "=SUM(A1:A4)"),
    ])
    .unwrap();

    let mut sim = Sim::new(sheet.circuit());
    let target = loc(3, 1);

    // Engine: one IDLE exit plus four element ticks; the cell's registers
    // mirror the engine's result one tick later.
    sim.run(5);
    assert_eq!(cell_ready(&sheet, &sim, &target), 0);
    sim.tick();
    assert_eq!(cell_ready(&sheet, &sim, &target), 1);
    assert_eq!(cell_float(&sheet, &sim, &target), 14.0);

    // The readiness pulse is one tick wide; the value holds.
    sim.tick();
    assert_eq!(cell_ready(&sheet, &sim, &target), 0);
    assert_eq!(cell_float(&sheet, &sim, &target), 14.0);
}

#[test]
fn sum_of_array_literal_and_scalars() {
    let sheet = compile(&[(1, 1, "=SUM({1,2;3,4},5)")]).unwrap();
    let mut sim = Sim::new(sheet.circuit());
    // IDLE exit + five elements + one mirror tick.
    sim.run(7);
    assert_eq!(cell_float(&sheet, &sim, &loc(1, 1)), 15.0);
}

#[test]
fn free_cells_are_driven_externally() {
    let sheet = compile(&[(1, 1, "note to self"), (2, 1, "=A1+1")]).unwrap();
    let a1 = sheet.cell(&loc(1, 1)).unwrap();

    let mut sim = Sim::new(sheet.circuit());
    sim.poke(a1.value, (2.5 * f64::powi(2.0, 16)) as i128);
    sim.tick();
    assert_eq!(cell_float(&sheet, &sim, &loc(2, 1)), 3.5);

    // The free register holds whatever was poked.
    sim.run(3);
    assert_eq!(cell_float(&sheet, &sim, &loc(1, 1)), 2.5);
}

#[test]
fn cross_sheet_references_resolve() {
    let mut model = WorkbookModel::new();
    let data = model.add_sheet("Data");
    let calc = model.add_sheet("Calc");
    model.set(data, 1, 1, "41");
    model.set(calc, 1, 1, "=Data!A1+1");
    let sheet = Compiler::new(SynthConfig::default()).compile(&model).unwrap();

    let mut sim = Sim::new(sheet.circuit());
    sim.run(2);
    assert_eq!(cell_float(&sheet, &sim, &Location::new("Calc", 1, 1)), 42.0);
}

#[test]
fn self_reference_is_rejected() {
    let err = compile(&[(1, 1, "=A1")]).unwrap_err();
    assert!(matches!(err, SynthError::CircularReference(_)));
}

#[test]
fn mutual_reference_is_rejected() {
    let err = compile(&[(1, 1, "=B1"), (2, 1, "=A1")]).unwrap_err();
    let SynthError::CircularReference(path) = err else {
        panic!("expected CircularReference");
    };
    assert_eq!(path.first(), path.last());
    assert!(path.len() >= 3);
}

#[test]
fn sum_feeding_itself_through_a_range_is_rejected() {
    let err = compile(&[(1, 1, "1"), (1, 2, "=SUM(A1:A2)")]).unwrap_err();
    assert!(matches!(err, SynthError::CircularReference(_)));
}

#[test]
fn duplicate_formulas_for_one_cell_are_rejected() {
    let err = compile(&[(1, 1, "1"), (1, 1, "2")]).unwrap_err();
    assert!(matches!(err, SynthError::Build(_)));
}

#[test]
fn parse_failures_name_the_cell() {
    let err = compile(&[(2, 3, "=1+")]).unwrap_err();
    let SynthError::Parse { location, .. } = err else {
        panic!("expected Parse error");
    };
    assert_eq!(location, loc(2, 3));
}

#[test]
fn unknown_function_aborts_the_whole_compile() {
    let err = compile(&[(1, 1, "1"), (2, 1, "=MAX(A1,2)")]).unwrap_err();
    assert!(matches!(err, SynthError::UnknownFunction(_)));
}

#[test]
fn bare_range_formula_mirrors_the_referenced_cell() {
    let sheet = compile(&[(1, 1, "7"), (2, 1, "=A1")]).unwrap();
    let mut sim = Sim::new(sheet.circuit());
    sim.run(2);
    assert_eq!(cell_float(&sheet, &sim, &loc(2, 1)), 7.0);
}
