use crate::circuit::{Circuit, RegId};
use crate::expr::{BinaryOp, Expr, Shape, UnaryOp, mask};

/// Lock-step interpreter for a [`Circuit`].
///
/// One [`tick`](Sim::tick) evaluates every register's driver against the
/// *previous* tick's state and commits all results atomically, so there are
/// no same-tick read-after-write hazards by construction. Undriven
/// registers hold their value; test benches may [`poke`](Sim::poke) them
/// between ticks.
pub struct Sim<'a> {
    circuit: &'a Circuit,
    state: Vec<u128>,
}

impl<'a> Sim<'a> {
    pub fn new(circuit: &'a Circuit) -> Self {
        let state = circuit.registers().map(|(_, r)| r.reset).collect();
        Sim { circuit, state }
    }

    /// Sign-interpreted current value of a register.
    pub fn read(&self, id: RegId) -> i128 {
        let shape = self.circuit.register(id).shape;
        interpret(self.state[id.as_index()], shape)
    }

    /// Raw (unsigned) current bits of a register.
    pub fn read_raw(&self, id: RegId) -> u128 {
        self.state[id.as_index()]
    }

    /// Overwrite a register's current value, masked to its width.
    pub fn poke(&mut self, id: RegId, value: i128) {
        let shape = self.circuit.register(id).shape;
        self.state[id.as_index()] = mask(value as u128, shape.width);
    }

    /// Advance one clock tick.
    pub fn tick(&mut self) {
        let next: Vec<u128> = self
            .circuit
            .registers()
            .map(|(id, reg)| match self.circuit.driver(id) {
                Some(expr) => mask(self.eval(expr) as u128, reg.shape.width),
                None => self.state[id.as_index()],
            })
            .collect();
        self.state = next;
    }

    pub fn run(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Evaluate a combinational expression against the current state,
    /// returning the sign-interpreted value.
    pub fn eval(&self, expr: &Expr) -> i128 {
        match expr {
            Expr::Const { bits, shape } => interpret(*bits, *shape),
            Expr::Reg { id, shape } => interpret(self.state[id.as_index()], *shape),
            Expr::Slice { inner, lo, hi } => {
                let raw = self.eval_raw(inner);
                (mask(raw >> lo, hi - lo)) as i128
            }
            Expr::Cat(parts) => {
                let mut acc = 0u128;
                let mut offset = 0u32;
                for part in parts {
                    let w = part.shape().width;
                    if w == 0 {
                        continue;
                    }
                    acc |= self.eval_raw(part) << offset;
                    offset += w;
                }
                acc as i128
            }
            Expr::Repl { inner, count } => {
                let w = inner.shape().width;
                let bits = self.eval_raw(inner);
                let mut acc = 0u128;
                for i in 0..*count {
                    acc |= bits << (i * w);
                }
                acc as i128
            }
            Expr::AsSigned(inner) => {
                let raw = self.eval_raw(inner);
                interpret(raw, Shape::signed(inner.shape().width))
            }
            Expr::Unary { op, inner } => {
                let v = self.eval(inner);
                let out = match op {
                    UnaryOp::Neg => -v,
                    UnaryOp::Invert => {
                        let s = inner.shape();
                        return interpret(mask(!(v as u128), s.width), s);
                    }
                };
                interpret(mask(out as u128, expr.shape().width), expr.shape())
            }
            Expr::Binary { op, lhs, rhs } => {
                let a = self.eval(lhs);
                let b = self.eval(rhs);
                let out = match op {
                    BinaryOp::Add => a.wrapping_add(b),
                    BinaryOp::Sub => a.wrapping_sub(b),
                    BinaryOp::And => a & b,
                    BinaryOp::Or => a | b,
                    BinaryOp::Xor => a ^ b,
                    BinaryOp::Mul => a.wrapping_mul(b),
                    BinaryOp::Gt => (a > b) as i128,
                    BinaryOp::Ge => (a >= b) as i128,
                    BinaryOp::Lt => (a < b) as i128,
                    BinaryOp::Le => (a <= b) as i128,
                    BinaryOp::Eq => (a == b) as i128,
                    BinaryOp::Ne => (a != b) as i128,
                };
                interpret(mask(out as u128, expr.shape().width), expr.shape())
            }
            Expr::Mux { cond, then_, else_ } => {
                if self.eval(cond) != 0 {
                    self.eval(then_)
                } else {
                    self.eval(else_)
                }
            }
            Expr::Select { index, options } => {
                // Past-the-end indices are don't-care in hardware; clamp so
                // the interpreter stays total.
                let idx = (self.eval(index).max(0) as usize).min(options.len() - 1);
                self.eval(&options[idx])
            }
        }
    }

    fn eval_raw(&self, expr: &Expr) -> u128 {
        mask(self.eval(expr) as u128, expr.shape().width)
    }
}

fn interpret(raw: u128, shape: Shape) -> i128 {
    if shape.width == 0 {
        return 0;
    }
    if shape.signed && shape.width < 128 && raw >> (shape.width - 1) != 0 {
        raw as i128 - (1i128 << shape.width)
    } else {
        raw as i128
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Circuit;

    fn eval_const(expr: &Expr) -> i128 {
        let circuit = Circuit::new();
        let sim = Sim::new(&circuit);
        sim.eval(expr)
    }

    #[test]
    fn signed_constants_interpret() {
        assert_eq!(eval_const(&Expr::constant(-3, Shape::signed(8))), -3);
        assert_eq!(eval_const(&Expr::constant(-3, Shape::unsigned(8))), 253);
    }

    #[test]
    fn cat_and_slice() {
        let cat = Expr::cat(vec![
            Expr::constant(0b01, Shape::unsigned(2)),
            Expr::constant(0b1, Shape::unsigned(1)),
        ]);
        assert_eq!(eval_const(&cat), 0b101);
        assert_eq!(eval_const(&Expr::slice(cat, 2, 3)), 1);
    }

    #[test]
    fn repl_replicates_sign_bit() {
        let sign = Expr::slice(Expr::constant(-1, Shape::signed(4)), 3, 4);
        assert_eq!(eval_const(&Expr::repl(sign, 3)), 0b111);
    }

    #[test]
    fn counter_register_advances() {
        let mut c = Circuit::new();
        let r = c.add_register("count", Shape::unsigned(4), 0).unwrap();
        let next = Expr::slice(
            Expr::binary(BinaryOp::Add, c.read(r), Expr::constant(1, Shape::unsigned(4))),
            0,
            4,
        );
        c.sync(r, next).unwrap();

        let mut sim = Sim::new(&c);
        sim.run(3);
        assert_eq!(sim.read(r), 3);
        // 4-bit counter wraps
        sim.run(14);
        assert_eq!(sim.read(r), 1);
    }

    #[test]
    fn free_registers_hold_pokes() {
        let mut c = Circuit::new();
        let r = c.add_register("free", Shape::signed(8), 5).unwrap();
        let mut sim = Sim::new(&c);
        assert_eq!(sim.read(r), 5);
        sim.poke(r, -7);
        sim.run(4);
        assert_eq!(sim.read(r), -7);
    }

    #[test]
    fn updates_commit_atomically() {
        // Two registers swapping values every tick must read each other's
        // previous-tick state, never the in-flight one.
        let mut c = Circuit::new();
        let a = c.add_register("a", Shape::unsigned(8), 1).unwrap();
        let b = c.add_register("b", Shape::unsigned(8), 2).unwrap();
        c.sync(a, c.read(b)).unwrap();
        c.sync(b, c.read(a)).unwrap();

        let mut sim = Sim::new(&c);
        sim.tick();
        assert_eq!((sim.read(a), sim.read(b)), (2, 1));
        sim.tick();
        assert_eq!((sim.read(a), sim.read(b)), (1, 2));
    }
}
