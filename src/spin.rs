//! Busy waiting.
//!
//! Every wait in this crate is a spin on a hardware status bit: control transfer stages waiting
//! for the completion handler, and the I2C handler waiting for room in the TX FIFO while it
//! streams a descriptor. They all go through [`spin_until`] so the bound is explicit and can be
//! configured. [`SpinBound::Unbounded`] is the default and never gives up.

use crate::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpinBound {
    #[default]
    Unbounded,
    /// Give up after this many evaluations of the condition
    Iterations(u32),
}

/// Evaluates `done` until it returns true or the bound is exhausted.
///
/// `done` is always evaluated at least once, so a condition that already holds succeeds even
/// with a bound of zero iterations.
pub fn spin_until<F>(bound: SpinBound, mut done: F) -> Result<(), BridgeError>
where
    F: FnMut() -> bool,
{
    match bound {
        SpinBound::Unbounded => loop {
            if done() {
                return Ok(());
            }
            core::hint::spin_loop();
        },
        SpinBound::Iterations(limit) => {
            let mut remaining = limit;
            loop {
                if done() {
                    return Ok(());
                }
                if remaining == 0 {
                    return Err(BridgeError::SpinExhausted);
                }
                remaining -= 1;
                core::hint::spin_loop();
            }
        }
    }
}
