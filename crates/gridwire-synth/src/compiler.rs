use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, info};

use gridwire_common::{BinOp, FuncName, Location, NumericFormat};
use gridwire_parse::{Formula, parse};
use gridwire_rtl::{BinaryOp, Circuit, Expr, Shape};

use crate::cell::{Cell, CellArena};
use crate::error::SynthError;
use crate::fixed::Q;
use crate::functions;
use crate::graph::{DependencyGraph, collect_refs};
use crate::grid::{Grid, GridElem};

/// The single global knob: the numeric format every literal and cell
/// carries unless an operator's width rules grow it.
#[derive(Debug, Clone, Copy)]
pub struct SynthConfig {
    pub format: NumericFormat,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            format: NumericFormat::new(16, 16, true),
        }
    }
}

/// Opaque handle to a sheet added to a [`WorkbookModel`].
#[derive(Debug, Clone, Copy)]
pub struct SheetId(usize);

/// The in-memory workbook handed to [`Compiler::compile`]: ordered sheets
/// of `(col, row, text)` cells. Loading spreadsheet files into this model
/// is an external concern.
#[derive(Debug, Default)]
pub struct WorkbookModel {
    sheets: Vec<SheetModel>,
}

#[derive(Debug)]
struct SheetModel {
    name: String,
    cells: Vec<(u32, u32, String)>,
}

impl WorkbookModel {
    pub fn new() -> Self {
        WorkbookModel::default()
    }

    pub fn add_sheet(&mut self, name: impl Into<String>) -> SheetId {
        self.sheets.push(SheetModel {
            name: name.into(),
            cells: Vec::new(),
        });
        SheetId(self.sheets.len() - 1)
    }

    pub fn set(&mut self, sheet: SheetId, col: u32, row: u32, text: impl Into<String>) {
        self.sheets[sheet.0].cells.push((col, row, text.into()));
    }

    /// All cells in sheet order, each with its resolved location.
    pub fn cells(&self) -> impl Iterator<Item = (Location, &str)> {
        self.sheets.iter().flat_map(|sheet| {
            sheet
                .cells
                .iter()
                .map(|(col, row, text)| (Location::new(&sheet.name, *col, *row), text.as_str()))
        })
    }
}

/// The result of compilation: the circuit plus the per-location register
/// handles a simulation or code-generation front end reads back.
#[derive(Debug)]
pub struct CompiledSheet {
    circuit: Circuit,
    cells: FxHashMap<Location, Cell>,
}

impl CompiledSheet {
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn cell(&self, location: &Location) -> Option<Cell> {
        self.cells.get(location).copied()
    }

    pub fn cells(&self) -> impl Iterator<Item = (&Location, &Cell)> {
        self.cells.iter()
    }
}

/// A compiled formula node: a scalar fixed-point value or a grid (multi-
/// cell range, array literal), always paired with a one-bit readiness
/// expression by the compiler.
#[derive(Debug, Clone)]
pub(crate) enum CompiledValue {
    Scalar(Q),
    Grid(Grid),
}

/// Walks parsed formulas and wires the circuit: one pass collecting
/// dependencies (rejecting cycles), one pass lowering each formula to a
/// `(value, readiness)` pair and registering the cell's synchronous
/// update.
pub struct Compiler {
    config: SynthConfig,
    circuit: Circuit,
    arena: CellArena,
    engines: u32,
}

impl Compiler {
    pub fn new(config: SynthConfig) -> Self {
        Compiler {
            arena: CellArena::new(config.format),
            config,
            circuit: Circuit::new(),
            engines: 0,
        }
    }

    pub fn compile(mut self, model: &WorkbookModel) -> Result<CompiledSheet, SynthError> {
        // Parse every non-empty cell; blank cells and non-numeric text
        // stay free registers.
        let mut formulas: Vec<(Location, Formula)> = Vec::new();
        for (location, text) in model.cells() {
            match parse(text) {
                Ok(Some(ast)) => formulas.push((location, ast)),
                Ok(None) => {}
                Err(err) => {
                    return Err(SynthError::Parse {
                        location,
                        message: err.to_string(),
                    });
                }
            }
        }

        // Dependency phase: allocate every referenced cell and reject
        // cycles before any register is driven.
        let mut graph = DependencyGraph::new();
        for (location, ast) in &formulas {
            self.arena.get_or_create(&mut self.circuit, location)?;
            let mut refs = Vec::new();
            collect_refs(location, ast, &mut refs);
            for reference in &refs {
                self.arena.get_or_create(&mut self.circuit, reference)?;
            }
            graph.insert(location.clone(), refs);
        }
        graph.check_cycles()?;

        // Lowering phase: each formula drives its cell's value and
        // readiness registers.
        for (location, ast) in &formulas {
            debug!(cell = %location, "compiling formula");
            let (value, ready) = self.compile_formula(location, ast)?;
            let scalar = match value {
                CompiledValue::Scalar(q) => q,
                CompiledValue::Grid(_) => {
                    return Err(SynthError::RangeAsScalar(location.clone()));
                }
            };
            let cell = self.arena.get_or_create(&mut self.circuit, location)?;
            let next = scalar.cast(cell.format.nint, cell.format.nfrac);
            self.circuit.sync(cell.value, next.into_expr())?;
            self.circuit.sync(cell.ready, ready)?;
        }

        info!(
            formulas = formulas.len(),
            cells = self.arena.len(),
            registers = self.circuit.len(),
            "workbook compiled"
        );
        Ok(CompiledSheet {
            circuit: self.circuit,
            cells: self.arena.into_cells(),
        })
    }

    /// Lower one AST node to `(value, readiness)`.
    ///
    /// Readiness conventions: constants never block or retrigger anything,
    /// so they contribute a constant-low bit; ranges OR their members'
    /// readiness ("some contributor just updated"), deliberately not AND.
    fn compile_formula(
        &mut self,
        location: &Location,
        ast: &Formula,
    ) -> Result<(CompiledValue, Expr), SynthError> {
        match ast {
            Formula::Literal(value) => Ok((
                CompiledValue::Scalar(Q::from_float(*value, self.config.format)),
                never_ready(),
            )),

            Formula::Array(rows) => {
                let mut grid_rows = Vec::with_capacity(rows.len());
                for row in rows {
                    let mut values = Vec::with_capacity(row.len());
                    for elem in row {
                        match elem {
                            Formula::Literal(x) => {
                                values.push(Q::from_float(*x, self.config.format));
                            }
                            _ => return Err(SynthError::NonConstantArray(location.clone())),
                        }
                    }
                    grid_rows.push(GridElem::Nested(Box::new(Grid::from_values(values)?)));
                }
                Ok((CompiledValue::Grid(Grid::new(grid_rows)?), never_ready()))
            }

            Formula::Range(range) => {
                let sheet = range.sheet.as_deref().unwrap_or(&location.sheet);
                let bounds = range.bounds;

                if bounds.is_single() {
                    let loc = Location::new(sheet, bounds.min_col, bounds.min_row);
                    let cell = self.arena.get_or_create(&mut self.circuit, &loc)?;
                    return Ok((
                        CompiledValue::Scalar(cell.value_q(&self.circuit)),
                        cell.ready_expr(&self.circuit),
                    ));
                }

                let mut ready: Option<Expr> = None;
                let mut grid_rows = Vec::new();
                for row in bounds.rows() {
                    let mut values = Vec::new();
                    for col in bounds.cols() {
                        let loc = Location::new(sheet, col, row);
                        let cell = self.arena.get_or_create(&mut self.circuit, &loc)?;
                        values.push(cell.value_q(&self.circuit));
                        let bit = cell.ready_expr(&self.circuit);
                        ready = Some(match ready {
                            Some(acc) => Expr::binary(BinaryOp::Or, acc, bit),
                            None => bit,
                        });
                    }
                    grid_rows.push(GridElem::Nested(Box::new(Grid::from_values(values)?)));
                }
                // A multi-cell bounds always visits at least two cells.
                let ready = ready.unwrap_or_else(never_ready);
                Ok((CompiledValue::Grid(Grid::new(grid_rows)?), ready))
            }

            Formula::Binary { op, left, right } => {
                let (left_value, left_ready) = self.compile_formula(location, left)?;
                let (right_value, right_ready) = self.compile_formula(location, right)?;
                let a = expect_scalar(left_value, location)?;
                let b = expect_scalar(right_value, location)?;

                let value = match op {
                    BinOp::Add => &a + &b,
                    BinOp::Sub => &a - &b,
                    BinOp::Mul => &a * &b,
                    BinOp::Gt => a.gt(&b),
                    BinOp::Ge => a.ge(&b),
                    BinOp::Lt => a.lt(&b),
                    BinOp::Le => a.le(&b),
                    BinOp::Eq => a.eq(&b),
                    BinOp::Ne => a.ne(&b),
                    BinOp::Div | BinOp::Pow | BinOp::Concat => {
                        return Err(SynthError::UnsupportedOperator(*op));
                    }
                };
                let ready = Expr::binary(BinaryOp::Or, left_ready, right_ready);
                Ok((CompiledValue::Scalar(value), ready))
            }

            Formula::Call { func, args } => {
                let mut compiled: SmallVec<[(CompiledValue, Expr); 4]> =
                    SmallVec::with_capacity(args.len());
                for arg in args {
                    compiled.push(self.compile_formula(location, arg)?);
                }
                match func {
                    FuncName::Sum => {
                        let instance =
                            format!("{}_sum{}", location.register_name(), self.engines);
                        self.engines += 1;
                        let reduction =
                            functions::build_sum(&mut self.circuit, &instance, &compiled)?;
                        Ok((CompiledValue::Scalar(reduction.value), reduction.ready))
                    }
                    other => Err(SynthError::UnknownFunction(*other)),
                }
            }
        }
    }
}

fn expect_scalar(value: CompiledValue, location: &Location) -> Result<Q, SynthError> {
    match value {
        CompiledValue::Scalar(q) => Ok(q),
        CompiledValue::Grid(_) => Err(SynthError::RangeAsScalar(location.clone())),
    }
}

/// The readiness contribution of a pure constant: a low bit that never
/// gates or retriggers a downstream consumer.
fn never_ready() -> Expr {
    Expr::constant(0, Shape::unsigned(1))
}
