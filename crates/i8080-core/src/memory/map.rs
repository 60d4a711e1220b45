//! Two-region memory map and address decoding.

use crate::MemoryMapError;

/// Size in bytes of the flat 16-bit address space (64 KiB).
pub const ADDRESS_SPACE_BYTES: usize = u16::MAX as usize + 1;
/// Program region size used when no image is supplied (8 KiB).
pub const DEFAULT_PROGRAM_REGION_BYTES: usize = 8 * 1024;
/// Default working region size (8 KiB).
pub const DEFAULT_WORKING_REGION_BYTES: usize = 8 * 1024;

/// Region classification for mapped addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MemoryRegion {
    /// Program image, starting at address 0.
    Program,
    /// Read/write working memory, directly above the program region.
    Working,
}

/// Inclusive address bounds of one mapped region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionDescriptor {
    /// Region classification.
    pub region: MemoryRegion,
    /// Inclusive start address.
    pub start: u16,
    /// Inclusive end address.
    pub end: u16,
}

/// Validated layout of the program and working regions.
///
/// The program region occupies `0..program_bytes`, the working region the
/// `working_bytes` that follow. Everything above is unmapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemoryMap {
    program_bytes: usize,
    working_bytes: usize,
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self {
            program_bytes: DEFAULT_PROGRAM_REGION_BYTES,
            working_bytes: DEFAULT_WORKING_REGION_BYTES,
        }
    }
}

impl MemoryMap {
    /// Builds a layout from the two region sizes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryMapError::EmptyWorkingRegion`] for a zero-sized working
    /// region and [`MemoryMapError::RegionOverflow`] when both regions do not
    /// fit in the 64 KiB address space.
    pub const fn new(program_bytes: usize, working_bytes: usize) -> Result<Self, MemoryMapError> {
        if working_bytes == 0 {
            return Err(MemoryMapError::EmptyWorkingRegion);
        }
        if program_bytes > ADDRESS_SPACE_BYTES
            || working_bytes > ADDRESS_SPACE_BYTES - program_bytes
        {
            return Err(MemoryMapError::RegionOverflow {
                program: program_bytes,
                working: working_bytes,
            });
        }
        Ok(Self {
            program_bytes,
            working_bytes,
        })
    }

    /// Program region size in bytes.
    #[must_use]
    pub const fn program_bytes(&self) -> usize {
        self.program_bytes
    }

    /// Working region size in bytes.
    #[must_use]
    pub const fn working_bytes(&self) -> usize {
        self.working_bytes
    }

    /// Decodes `addr` into its region and the byte offset inside it.
    ///
    /// Returns `None` for addresses above both regions.
    #[must_use]
    pub const fn decode(&self, addr: u16) -> Option<(MemoryRegion, usize)> {
        let addr = addr as usize;
        if addr < self.program_bytes {
            Some((MemoryRegion::Program, addr))
        } else if addr - self.program_bytes < self.working_bytes {
            Some((MemoryRegion::Working, addr - self.program_bytes))
        } else {
            None
        }
    }

    /// Returns the inclusive bounds of `region`, or `None` when it is empty.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn descriptor(&self, region: MemoryRegion) -> Option<RegionDescriptor> {
        let (start, len) = match region {
            MemoryRegion::Program => (0, self.program_bytes),
            MemoryRegion::Working => (self.program_bytes, self.working_bytes),
        };
        if len == 0 {
            return None;
        }
        // `new` guarantees start + len <= 0x10000.
        Some(RegionDescriptor {
            region,
            start: start as u16,
            end: (start + len - 1) as u16,
        })
    }

    /// Highest mapped address, if any byte is mapped.
    #[must_use]
    pub const fn last_mapped(&self) -> Option<u16> {
        match self.descriptor(MemoryRegion::Working) {
            Some(descriptor) => Some(descriptor.end),
            None => None,
        }
    }
}
