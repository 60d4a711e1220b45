//! Byte-granular bus contract and little-endian word helpers.

use crate::BusFault;

/// Byte-addressable memory contract the CPU core executes against.
///
/// Reads have no side effects. `validate_write` must report exactly the
/// fault `write` would raise, without writing, so that multi-byte stores can
/// be checked up front and either land completely or not at all.
pub trait Bus {
    /// Reads the byte at `addr`.
    ///
    /// # Errors
    ///
    /// Returns a [`BusFault`] when `addr` is not readable.
    fn read(&self, addr: u16) -> Result<u8, BusFault>;

    /// Writes `value` at `addr`.
    ///
    /// # Errors
    ///
    /// Returns a [`BusFault`] when `addr` is not writable; nothing is written.
    fn write(&mut self, addr: u16, value: u8) -> Result<(), BusFault>;

    /// Checks that a write to `addr` would succeed.
    ///
    /// # Errors
    ///
    /// Returns the [`BusFault`] a write to `addr` would raise.
    fn validate_write(&self, addr: u16) -> Result<(), BusFault>;
}

impl<B: Bus + ?Sized> Bus for &mut B {
    fn read(&self, addr: u16) -> Result<u8, BusFault> {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) -> Result<(), BusFault> {
        (**self).write(addr, value)
    }

    fn validate_write(&self, addr: u16) -> Result<(), BusFault> {
        (**self).validate_write(addr)
    }
}

/// Reads a little-endian word from `addr` and `addr + 1` (wrapping).
///
/// # Errors
///
/// Returns the first [`BusFault`] raised by either byte read.
pub fn read_u16_le<B: Bus + ?Sized>(bus: &B, addr: u16) -> Result<u16, BusFault> {
    let lo = bus.read(addr)?;
    let hi = bus.read(addr.wrapping_add(1))?;
    Ok(u16::from_le_bytes([lo, hi]))
}

/// Writes a little-endian word to `addr` and `addr + 1` (wrapping).
///
/// Both addresses are validated before either byte is written.
///
/// # Errors
///
/// Returns the first [`BusFault`] either address would raise; memory is left
/// untouched in that case.
pub fn write_u16_le<B: Bus + ?Sized>(bus: &mut B, addr: u16, value: u16) -> Result<(), BusFault> {
    let hi_addr = addr.wrapping_add(1);
    bus.validate_write(addr)?;
    bus.validate_write(hi_addr)?;
    let [lo, hi] = value.to_le_bytes();
    bus.write(addr, lo)?;
    bus.write(hi_addr, hi)
}
