//! MIPS registers and the temporary register pool

use std::fmt;

use log::trace;

use crate::utils::{Error, Result};

/// A MIPS register, printed with its `$` name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg(&'static str);

impl Reg {
    pub const ZERO: Reg = Reg("$zero");
    pub const V0: Reg = Reg("$v0");
    pub const A0: Reg = Reg("$a0");
    pub const SP: Reg = Reg("$sp");
    pub const FP: Reg = Reg("$fp");
    pub const RA: Reg = Reg("$ra");
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Registers handed out for intermediate values, in save order
pub const TEMPORARIES: [Reg; 18] = [
    Reg("$t0"),
    Reg("$t1"),
    Reg("$t2"),
    Reg("$t3"),
    Reg("$t4"),
    Reg("$t5"),
    Reg("$t6"),
    Reg("$t7"),
    Reg("$t8"),
    Reg("$t9"),
    Reg("$s0"),
    Reg("$s1"),
    Reg("$s2"),
    Reg("$s3"),
    Reg("$s4"),
    Reg("$s5"),
    Reg("$s6"),
    Reg("$s7"),
];

/// LIFO free-list over [`TEMPORARIES`]
#[derive(Debug)]
pub struct RegisterPool {
    free: Vec<Reg>,
}

impl RegisterPool {
    pub fn new() -> Self {
        // Reversed so `$t0` is handed out first
        Self {
            free: TEMPORARIES.iter().rev().copied().collect(),
        }
    }

    pub fn acquire(&mut self) -> Result<Reg> {
        let reg = self.free.pop().ok_or(Error::RegisterExhaustion)?;
        trace!("acquire {}", reg);
        Ok(reg)
    }

    pub fn release(&mut self, reg: Reg) {
        debug_assert!(TEMPORARIES.contains(&reg), "{} is not a pool register", reg);
        debug_assert!(!self.free.contains(&reg), "{} released twice", reg);
        trace!("release {}", reg);
        self.free.push(reg);
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn is_full(&self) -> bool {
        self.free.len() == TEMPORARIES.len()
    }
}

impl Default for RegisterPool {
    fn default() -> Self {
        Self::new()
    }
}
