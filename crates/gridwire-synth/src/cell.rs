use rustc_hash::FxHashMap;
use tracing::trace;

use gridwire_common::{Location, NumericFormat};
use gridwire_rtl::{Circuit, Expr, RegId, Shape};

use crate::error::SynthError;
use crate::fixed::{Q, shape_of};

/// One spreadsheet cell in the circuit: a value register in the sheet's
/// numeric format plus a one-bit readiness register (reset low). The value
/// register of a cell with no formula is free; it holds whatever a test
/// bench or external driver put there.
#[derive(Debug, Clone, Copy)]
pub struct Cell {
    pub value: RegId,
    pub ready: RegId,
    pub format: NumericFormat,
}

impl Cell {
    /// The cell's value as a fixed-point read expression.
    pub fn value_q(&self, circuit: &Circuit) -> Q {
        Q::from_expr(circuit.read(self.value), self.format.nint, self.format.nfrac)
    }

    pub fn ready_expr(&self, circuit: &Circuit) -> Expr {
        circuit.read(self.ready)
    }
}

/// The cell store for one compilation: a map from [`Location`] to [`Cell`],
/// populated on first reference and never shrunk. Owned by the compiler,
/// so independent compilations in one process never share cells.
#[derive(Debug)]
pub struct CellArena {
    format: NumericFormat,
    cells: FxHashMap<Location, Cell>,
}

impl CellArena {
    pub fn new(format: NumericFormat) -> Self {
        CellArena {
            format,
            cells: FxHashMap::default(),
        }
    }

    /// Look up a location, allocating its registers on first reference.
    /// Register names derive from the location (`Sheet_B2`, `Sheet_B2_rdy`)
    /// so netlists and waveforms stay readable.
    pub fn get_or_create(
        &mut self,
        circuit: &mut Circuit,
        location: &Location,
    ) -> Result<Cell, SynthError> {
        if let Some(cell) = self.cells.get(location) {
            return Ok(*cell);
        }

        let stem = location.register_name();
        trace!(cell = %location, register = %stem, "allocating cell registers");
        let value = circuit.add_register(stem.clone(), shape_of(self.format), 0)?;
        let ready = circuit.add_register(format!("{stem}_rdy"), Shape::unsigned(1), 0)?;
        let cell = Cell {
            value,
            ready,
            format: self.format,
        };
        self.cells.insert(location.clone(), cell);
        Ok(cell)
    }

    pub fn get(&self, location: &Location) -> Option<Cell> {
        self.cells.get(location).copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn into_cells(self) -> FxHashMap<Location, Cell> {
        self.cells
    }
}
