use smallvec::SmallVec;

use gridwire_common::NumericFormat;
use gridwire_rtl::Expr;

use crate::error::SynthError;
use crate::fixed::Q;

/// One element of a [`Grid`]: a scalar value or a nested grid (ranges and
/// array literals nest exactly one level, rows of scalars).
#[derive(Debug, Clone)]
pub enum GridElem {
    Value(Q),
    Nested(Box<Grid>),
}

impl GridElem {
    pub fn format(&self) -> NumericFormat {
        match self {
            GridElem::Value(q) => q.format(),
            GridElem::Nested(g) => g.format(),
        }
    }
}

/// An ordered, possibly nested container of fixed-point values with one
/// uniform leaf format: the circuit-side image of a range or an array
/// literal.
#[derive(Debug, Clone)]
pub struct Grid {
    format: NumericFormat,
    elems: SmallVec<[GridElem; 8]>,
}

impl Grid {
    /// Build a grid, enforcing the construction invariants: at least one
    /// element, one leaf format everywhere, and uniform rows (no ragged
    /// nesting, no scalar/sub-grid mixing at one level).
    pub fn new(elems: impl IntoIterator<Item = GridElem>) -> Result<Grid, SynthError> {
        let elems: SmallVec<[GridElem; 8]> = elems.into_iter().collect();
        let first = elems.first().ok_or(SynthError::EmptyGrid)?;
        let format = first.format();
        let nested_len = match first {
            GridElem::Value(_) => None,
            GridElem::Nested(g) => Some(g.len()),
        };

        for elem in &elems {
            if elem.format() != format {
                return Err(SynthError::FormatMismatch {
                    expected: format,
                    found: elem.format(),
                });
            }
            let len = match elem {
                GridElem::Value(_) => None,
                GridElem::Nested(g) => Some(g.len()),
            };
            if len != nested_len {
                return Err(SynthError::RaggedGrid);
            }
        }

        Ok(Grid { format, elems })
    }

    pub fn from_values(values: impl IntoIterator<Item = Q>) -> Result<Grid, SynthError> {
        Grid::new(values.into_iter().map(GridElem::Value))
    }

    pub fn format(&self) -> NumericFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GridElem> {
        self.elems.iter()
    }

    /// Static lookup: the element at a host-side index, native format
    /// preserved.
    pub fn get(&self, index: usize) -> Option<&GridElem> {
        self.elems.get(index)
    }

    /// Dynamic lookup: the element selected by a circuit value, built as a
    /// multiplexing network over all elements. Selecting into a nested
    /// grid yields a grid of element-wise selections.
    pub fn select(&self, index: &Q) -> GridElem {
        match &self.elems[0] {
            GridElem::Value(_) => {
                let options: Vec<Expr> = self
                    .elems
                    .iter()
                    .map(|e| match e {
                        GridElem::Value(q) => q.expr().clone(),
                        GridElem::Nested(_) => unreachable!("uniform rows checked at construction"),
                    })
                    .collect();
                let expr = Expr::select(index.expr().clone(), options);
                GridElem::Value(Q::from_expr(expr, self.format.nint, self.format.nfrac))
            }
            GridElem::Nested(first) => {
                let columns = (0..first.len())
                    .map(|col| {
                        let column: SmallVec<[GridElem; 8]> = self
                            .elems
                            .iter()
                            .map(|e| match e {
                                GridElem::Nested(g) => g.elems[col].clone(),
                                GridElem::Value(_) => {
                                    unreachable!("uniform rows checked at construction")
                                }
                            })
                            .collect();
                        Grid {
                            format: self.format,
                            elems: column,
                        }
                        .select(index)
                    })
                    .collect::<SmallVec<[GridElem; 8]>>();
                GridElem::Nested(Box::new(Grid {
                    format: self.format,
                    elems: columns,
                }))
            }
        }
    }

    /// Flatten to scalars: depth-first, left-to-right, row-major. The
    /// ordering is an external contract; reduction engines consume their
    /// elements in exactly this sequence.
    pub fn flatten(&self) -> Vec<Q> {
        let mut out = Vec::with_capacity(self.elems.len());
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut Vec<Q>) {
        for elem in &self.elems {
            match elem {
                GridElem::Value(q) => out.push(q.clone()),
                GridElem::Nested(g) => g.flatten_into(out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwire_rtl::{Circuit, Shape, Sim};
    use std::f64::consts::{E, PI};

    fn fmt(nint: u32, nfrac: u32) -> NumericFormat {
        NumericFormat::new(nint, nfrac, false)
    }

    fn q(value: f64) -> Q {
        Q::from_float(value, fmt(8, 16))
    }

    fn index(i: i128) -> Q {
        Q::from_expr(Expr::constant(i, Shape::unsigned(4)), 4, 0)
    }

    fn resolve_fp(q: &Q) -> f64 {
        let circuit = Circuit::new();
        q.to_float(Sim::new(&circuit).eval(q.expr()))
    }

    #[test]
    fn test_lookup() {
        let grid = Grid::from_values([q(PI), q(E), q(1.0)]).unwrap();
        let GridElem::Value(stat) = grid.get(0).unwrap() else {
            panic!("expected scalar element");
        };
        let GridElem::Value(dyn_) = grid.select(&index(0)) else {
            panic!("expected scalar element");
        };
        assert_eq!(dyn_.format(), fmt(8, 16));
        assert!((resolve_fp(stat) - PI).abs() < 1e-4);
        assert_eq!(resolve_fp(stat), resolve_fp(&dyn_));
    }

    #[test]
    fn test_nested_lookup() {
        let row = |a: f64, b: f64| {
            GridElem::Nested(Box::new(Grid::from_values([q(a), q(b)]).unwrap()))
        };
        let grid = Grid::new([row(PI, E), row(1.0, 2.0)]).unwrap();

        let GridElem::Nested(sub) = grid.select(&index(1)) else {
            panic!("expected nested element");
        };
        let GridElem::Value(elem) = sub.select(&index(1)) else {
            panic!("expected scalar element");
        };
        assert_eq!(resolve_fp(&elem), 2.0);
    }

    #[test]
    fn format_mismatch_is_rejected() {
        let err = Grid::from_values([q(PI), Q::from_float(E, fmt(16, 16))]).unwrap_err();
        assert!(matches!(err, SynthError::FormatMismatch { .. }));
    }

    #[test]
    fn empty_and_ragged_grids_are_rejected() {
        assert!(matches!(
            Grid::from_values([]).unwrap_err(),
            SynthError::EmptyGrid
        ));

        let nested = GridElem::Nested(Box::new(Grid::from_values([q(1.0)]).unwrap()));
        let err = Grid::new([nested, GridElem::Value(q(2.0))]).unwrap_err();
        assert!(matches!(err, SynthError::RaggedGrid));
    }

    #[test]
    fn flattening_is_row_major_depth_first() {
        let row = |a: f64, b: f64| {
            GridElem::Nested(Box::new(Grid::from_values([q(a), q(b)]).unwrap()))
        };
        let grid = Grid::new([row(2.0, 3.0), row(5.0, 4.0)]).unwrap();
        let flat: Vec<f64> = grid.flatten().iter().map(resolve_fp).collect();
        assert_eq!(flat, [2.0, 3.0, 5.0, 4.0]);
    }

    #[test]
    fn dynamic_select_past_scalars_resolves_each_index() {
        let grid = Grid::from_values([q(10.0), q(20.0), q(30.0)]).unwrap();
        for (i, expected) in [(0, 10.0), (1, 20.0), (2, 30.0)] {
            let GridElem::Value(v) = grid.select(&index(i)) else {
                panic!("expected scalar element");
            };
            assert_eq!(resolve_fp(&v), expected);
        }
    }
}
