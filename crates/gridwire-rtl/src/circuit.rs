use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::expr::{Expr, Shape, mask};

/// Index of a register inside one [`Circuit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegId(pub(crate) u32);

impl RegId {
    pub fn as_index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Register {
    pub name: String,
    pub shape: Shape,
    /// Raw reset bits, masked to the register width.
    pub reset: u128,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// Spec-level single-writer discipline: one synchronous producer per
    /// register, rejected when the circuit is built rather than arbitrated
    /// at runtime.
    #[error("register `{0}` already has a synchronous driver")]
    DuplicateDriver(String),

    #[error("register `{name}` is {expected} bits wide but its driver produces {found}")]
    DriverWidthMismatch {
        name: String,
        expected: u32,
        found: u32,
    },

    #[error("register name `{0}` is already taken")]
    DuplicateName(String),
}

/// An under-construction synchronous circuit: a flat arena of named
/// registers and at most one next-state expression per register. Registers
/// without a driver are free: they hold their value across ticks until a
/// test bench or external driver pokes them.
#[derive(Debug, Default)]
pub struct Circuit {
    regs: Vec<Register>,
    drivers: Vec<Option<Expr>>,
    by_name: FxHashMap<String, RegId>,
}

impl Circuit {
    pub fn new() -> Self {
        Circuit::default()
    }

    pub fn add_register(
        &mut self,
        name: impl Into<String>,
        shape: Shape,
        reset: i128,
    ) -> Result<RegId, BuildError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(BuildError::DuplicateName(name));
        }
        let id = RegId(self.regs.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.regs.push(Register {
            name,
            shape,
            reset: mask(reset as u128, shape.width),
        });
        self.drivers.push(None);
        Ok(id)
    }

    pub fn register(&self, id: RegId) -> &Register {
        &self.regs[id.as_index()]
    }

    pub fn lookup(&self, name: &str) -> Option<RegId> {
        self.by_name.get(name).copied()
    }

    /// Read expression for a register.
    pub fn read(&self, id: RegId) -> Expr {
        Expr::Reg {
            id,
            shape: self.regs[id.as_index()].shape,
        }
    }

    /// Attach the synchronous next-state expression for `id`. The driver
    /// must produce exactly the register's width; casting is the caller's
    /// concern (the fixed-point layer always casts first).
    pub fn sync(&mut self, id: RegId, next: Expr) -> Result<(), BuildError> {
        let reg = &self.regs[id.as_index()];
        let found = next.shape().width;
        if found != reg.shape.width {
            return Err(BuildError::DriverWidthMismatch {
                name: reg.name.clone(),
                expected: reg.shape.width,
                found,
            });
        }
        let slot = &mut self.drivers[id.as_index()];
        if slot.is_some() {
            return Err(BuildError::DuplicateDriver(reg.name.clone()));
        }
        *slot = Some(next);
        Ok(())
    }

    pub fn driver(&self, id: RegId) -> Option<&Expr> {
        self.drivers[id.as_index()].as_ref()
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    pub fn registers(&self) -> impl Iterator<Item = (RegId, &Register)> {
        self.regs
            .iter()
            .enumerate()
            .map(|(i, r)| (RegId(i as u32), r))
    }
}
