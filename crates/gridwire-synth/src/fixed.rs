use std::fmt::{self, Display};
use std::ops::{Add, BitAnd, BitOr, BitXor, Mul, Neg, Not, Sub};

use gridwire_common::NumericFormat;
use gridwire_rtl::{BinaryOp, Expr, Shape, UnaryOp};

/// A fixed-point hardware value: a bit-vector expression of exactly
/// `nint + nfrac` bits encoding `raw / 2^nfrac`.
///
/// Values are immutable; every operator returns a new value in the format
/// the operation naturally produces. Arithmetic first widens both operands
/// to their element-wise maximum format, so precision is never lost inside
/// an expression; only an explicit [`cast`](Q::cast) can truncate.
///
/// `Q` deliberately implements neither `PartialEq` nor `PartialOrd`: a
/// hardware comparison is itself a 1-bit circuit value ([`Q::eq`],
/// [`Q::gt`], …), and letting one collapse into a host `bool` would
/// silently turn circuit structure into compile-time control flow.
#[derive(Debug, Clone)]
pub struct Q {
    format: NumericFormat,
    expr: Expr,
}

impl Q {
    /// Wrap an expression, reading signedness off its shape. The width
    /// must match the format exactly; a mismatch is a bug in the caller,
    /// not a user error.
    pub fn from_expr(expr: Expr, nint: u32, nfrac: u32) -> Q {
        let shape = expr.shape();
        assert_eq!(
            shape.width,
            nint + nfrac,
            "fixed-point expression is {} bits but the format needs {}",
            shape.width,
            nint + nfrac
        );
        Q {
            format: NumericFormat::new(nint, nfrac, shape.signed),
            expr,
        }
    }

    /// Encode a real number as a constant: scale by `2^nfrac`, truncate
    /// toward negative infinity, wrap to the format width.
    pub fn from_float(value: f64, format: NumericFormat) -> Q {
        let scaled = (value * f64::powi(2.0, format.nfrac as i32)).floor() as i128;
        let shape = shape_of(format);
        Q {
            format,
            expr: Expr::constant(scaled, shape),
        }
    }

    /// Decode a raw register value read back from simulation.
    pub fn to_float(&self, raw: i128) -> f64 {
        raw as f64 / f64::powi(2.0, self.format.nfrac as i32)
    }

    pub fn format(&self) -> NumericFormat {
        self.format
    }

    pub fn nint(&self) -> u32 {
        self.format.nint
    }

    pub fn nfrac(&self) -> u32 {
        self.format.nfrac
    }

    pub fn signed(&self) -> bool {
        self.format.signed
    }

    pub fn width(&self) -> u32 {
        self.format.width()
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn into_expr(self) -> Expr {
        self.expr
    }

    /// Reformat to `(nint, nfrac)`, preserving signedness.
    ///
    /// Casting to the current format returns the value unchanged.
    /// Fractional bits are padded with zeros or silently dropped (floor,
    /// no rounding); integer bits are sign- or zero-extended, or silently
    /// dropped, which can overflow. Callers needing overflow safety widen
    /// first.
    pub fn cast(&self, nint: u32, nfrac: u32) -> Q {
        if nint == self.nint() && nfrac == self.nfrac() {
            return self.clone();
        }

        let lo = self.nfrac().saturating_sub(nfrac);
        let hi = self.nfrac() + nint;
        let body = Expr::slice(self.expr.clone(), lo, hi);

        let grow = nint.saturating_sub(self.nint());
        let head = if self.signed() {
            let w = self.width();
            Expr::repl(Expr::slice(self.expr.clone(), w - 1, w), grow)
        } else {
            Expr::constant(0, Shape::unsigned(grow))
        };
        let tail = Expr::constant(0, Shape::unsigned(nfrac.saturating_sub(self.nfrac())));

        let mut out = Expr::cat(vec![tail, body, head]);
        if self.signed() {
            out = Expr::as_signed(out);
        }
        Q::from_expr(out, nint, nfrac)
    }

    /// Widen both operands to their common format, apply the raw
    /// operation, and read the result format back off the raw width.
    fn binary_op(&self, other: &Q, op: BinaryOp) -> Q {
        let nint = self.nint().max(other.nint());
        let nfrac = self.nfrac().max(other.nfrac());
        let a = self.cast(nint, nfrac);
        let b = other.cast(nint, nfrac);
        let res = Expr::binary(op, a.into_expr(), b.into_expr());
        if op.is_comparison() {
            Q::from_expr(res, 1, 0)
        } else {
            let width = res.shape().width;
            Q::from_expr(res, width - nfrac, nfrac)
        }
    }

    fn unary_op(&self, op: UnaryOp) -> Q {
        let res = Expr::unary(op, self.expr.clone());
        let width = res.shape().width;
        Q::from_expr(res, width - self.nfrac(), self.nfrac())
    }

    pub fn gt(&self, other: &Q) -> Q {
        self.binary_op(other, BinaryOp::Gt)
    }

    pub fn ge(&self, other: &Q) -> Q {
        self.binary_op(other, BinaryOp::Ge)
    }

    pub fn lt(&self, other: &Q) -> Q {
        self.binary_op(other, BinaryOp::Lt)
    }

    pub fn le(&self, other: &Q) -> Q {
        self.binary_op(other, BinaryOp::Le)
    }

    pub fn eq(&self, other: &Q) -> Q {
        self.binary_op(other, BinaryOp::Eq)
    }

    pub fn ne(&self, other: &Q) -> Q {
        self.binary_op(other, BinaryOp::Ne)
    }

    pub fn abs(&self) -> Q {
        if !self.signed() {
            return self.clone();
        }
        let zero = Expr::constant(0, Shape::signed(self.width()));
        let non_negative = Expr::binary(BinaryOp::Ge, self.expr.clone(), zero);
        let res = Expr::mux(
            non_negative,
            self.expr.clone(),
            Expr::unary(UnaryOp::Neg, self.expr.clone()),
        );
        let width = res.shape().width;
        Q::from_expr(res, width - self.nfrac(), self.nfrac())
    }
}

pub(crate) fn shape_of(format: NumericFormat) -> Shape {
    if format.signed {
        Shape::signed(format.width())
    } else {
        Shape::unsigned(format.width())
    }
}

impl Add for &Q {
    type Output = Q;
    fn add(self, rhs: &Q) -> Q {
        self.binary_op(rhs, BinaryOp::Add)
    }
}

impl Sub for &Q {
    type Output = Q;
    fn sub(self, rhs: &Q) -> Q {
        self.binary_op(rhs, BinaryOp::Sub)
    }
}

impl BitAnd for &Q {
    type Output = Q;
    fn bitand(self, rhs: &Q) -> Q {
        self.binary_op(rhs, BinaryOp::And)
    }
}

impl BitOr for &Q {
    type Output = Q;
    fn bitor(self, rhs: &Q) -> Q {
        self.binary_op(rhs, BinaryOp::Or)
    }
}

impl BitXor for &Q {
    type Output = Q;
    fn bitxor(self, rhs: &Q) -> Q {
        self.binary_op(rhs, BinaryOp::Xor)
    }
}

impl Neg for &Q {
    type Output = Q;
    fn neg(self) -> Q {
        self.unary_op(UnaryOp::Neg)
    }
}

impl Not for &Q {
    type Output = Q;
    fn not(self) -> Q {
        self.unary_op(UnaryOp::Invert)
    }
}

impl Mul for &Q {
    type Output = Q;

    /// Full-precision multiply: integer and fractional widths add.
    /// `from_expr` checks that the raw product width equals the operand
    /// width sum; a mismatch is an internal fixed-point bug.
    fn mul(self, rhs: &Q) -> Q {
        let res = Expr::binary(BinaryOp::Mul, self.expr.clone(), rhs.expr.clone());
        Q::from_expr(res, self.nint() + rhs.nint(), self.nfrac() + rhs.nfrac())
    }
}

impl Display for Q {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expr {
            Expr::Const { bits, .. } => write!(f, "({} const {})", self.format, bits),
            _ => write!(f, "({})", self.format),
        }
    }
}
