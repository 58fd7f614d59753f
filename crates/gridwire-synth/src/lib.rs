//! Gridwire's core: compile parsed spreadsheet formulas into a synchronous
//! dataflow circuit.
//!
//! Every referenced cell becomes a value register paired with a one-bit
//! readiness register. Formulas lower to combinational fixed-point logic
//! over those registers; reductions that cannot finish in one tick (SUM)
//! lower to IDLE/RUNNING state machines that restart when new input
//! arrives. The compiled artifact is a plain [`gridwire_rtl::Circuit`],
//! queryable per cell location.

pub mod cell;
pub mod compiler;
pub mod error;
pub mod fixed;
pub mod functions;
pub mod graph;
pub mod grid;

#[cfg(test)]
mod tests;

pub use cell::{Cell, CellArena};
pub use compiler::{CompiledSheet, Compiler, SheetId, SynthConfig, WorkbookModel};
pub use error::SynthError;
pub use fixed::Q;
pub use grid::{Grid, GridElem};

// Re-export for convenience
pub use gridwire_common::{Location, NumericFormat};
