//! Gridwire compiles spreadsheet-style formulas into synchronous dataflow
//! circuits: every cell becomes a fixed-point register with a readiness
//! bit, formulas become combinational logic, and reductions like `SUM`
//! become multi-cycle state machines that restart when new input arrives.
//!
//! This crate is a façade over the workspace members:
//!
//! - [`gridwire_parse`]: tokenizer and parser for formula text
//! - [`gridwire_synth`]: the formula-to-circuit compiler
//! - [`gridwire_rtl`]: the register/expression backend and its tick
//!   simulator
//!
//! ```
//! use gridwire::{Compiler, Location, SynthConfig, WorkbookModel};
//! use gridwire::rtl::Sim;
//!
//! let mut model = WorkbookModel::new();
//! let sheet = model.add_sheet("Sheet1");
//! model.set(sheet, 1, 1, "2");
//! model.set(sheet, 1, 2, "3");
//! model.set(sheet, 2, 1, "=A1+A2");
//!
//! let compiled = Compiler::new(SynthConfig::default()).compile(&model).unwrap();
//! let mut sim = Sim::new(compiled.circuit());
//! sim.run(2); // literals settle on tick one, their consumers on tick two
//!
//! let b1 = compiled.cell(&Location::new("Sheet1", 2, 1)).unwrap();
//! let value = b1.value_q(compiled.circuit()).to_float(sim.read(b1.value));
//! assert_eq!(value, 5.0);
//! ```

pub use gridwire_common::{
    BinOp, Bounds, FuncName, Location, NumericFormat, RangeRef, column_to_number,
    number_to_column,
};
pub use gridwire_parse::{Formula, Parser, ParserError, Tokenizer, parse};
pub use gridwire_synth::{
    Cell, CellArena, CompiledSheet, Compiler, Grid, GridElem, Q, SheetId, SynthConfig,
    SynthError, WorkbookModel,
};

pub use gridwire_parse as parse_crate;
pub use gridwire_rtl as rtl;
pub use gridwire_synth as synth;
