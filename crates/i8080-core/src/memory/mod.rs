//! Memory bus: a read-only program region followed by a read/write working region.

/// Bus trait and little-endian word helpers.
pub mod access;
/// Region layout and address decoder.
pub mod map;

pub use access::{read_u16_le, write_u16_le, Bus};
pub use map::{
    MemoryMap, MemoryRegion, RegionDescriptor, ADDRESS_SPACE_BYTES, DEFAULT_PROGRAM_REGION_BYTES,
    DEFAULT_WORKING_REGION_BYTES,
};

use crate::{AccessKind, BusFault, MemoryMapError};

/// Construction-time bus configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BusConfig {
    /// Program region size; an image larger than this extends the region.
    pub program_region_bytes: usize,
    /// Working region size.
    pub working_region_bytes: usize,
    /// Allows writes into the program region.
    pub program_write_enable: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            program_region_bytes: DEFAULT_PROGRAM_REGION_BYTES,
            working_region_bytes: DEFAULT_WORKING_REGION_BYTES,
            program_write_enable: false,
        }
    }
}

/// Flat 16-bit bus backed by a program region and a working region.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemoryBus {
    map: MemoryMap,
    program: Box<[u8]>,
    working: Box<[u8]>,
    program_write_enable: bool,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self {
            map: MemoryMap::default(),
            program: vec![0; DEFAULT_PROGRAM_REGION_BYTES].into_boxed_slice(),
            working: vec![0; DEFAULT_WORKING_REGION_BYTES].into_boxed_slice(),
            program_write_enable: false,
        }
    }
}

impl MemoryBus {
    /// Builds a bus whose program region holds `image`, with default region sizes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryMapError`] when the image leaves no room for the
    /// working region.
    pub fn new(image: &[u8]) -> Result<Self, MemoryMapError> {
        Self::with_config(Some(image), &BusConfig::default())
    }

    /// Builds a bus from an optional image and explicit configuration.
    ///
    /// The program region spans `config.program_region_bytes`, or the whole
    /// image when it is larger. The image is placed at address 0 and the rest
    /// of the region is zero-filled, so the working region starts at a fixed
    /// boundary for any image that fits. The working region is always zeroed.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryMapError`] when the regions do not fit the address space.
    pub fn with_config(image: Option<&[u8]>, config: &BusConfig) -> Result<Self, MemoryMapError> {
        let image = image.unwrap_or_default();
        let map = MemoryMap::new(
            image.len().max(config.program_region_bytes),
            config.working_region_bytes,
        )?;

        let mut program = vec![0; map.program_bytes()];
        program[..image.len()].copy_from_slice(image);

        Ok(Self {
            map,
            program: program.into_boxed_slice(),
            working: vec![0; config.working_region_bytes].into_boxed_slice(),
            program_write_enable: config.program_write_enable,
        })
    }

    /// Region layout of this bus.
    #[must_use]
    pub const fn map(&self) -> &MemoryMap {
        &self.map
    }

    /// Whether the program region accepts writes.
    #[must_use]
    pub const fn program_write_enabled(&self) -> bool {
        self.program_write_enable
    }

    /// Toggles write access to the program region.
    pub const fn set_program_write_enable(&mut self, enabled: bool) {
        self.program_write_enable = enabled;
    }

    /// Program region contents.
    #[must_use]
    pub fn program(&self) -> &[u8] {
        &self.program
    }

    /// Working region contents.
    #[must_use]
    pub fn working(&self) -> &[u8] {
        &self.working
    }

    /// Mutable working region, for drivers that preload or inspect RAM.
    pub fn working_mut(&mut self) -> &mut [u8] {
        &mut self.working
    }

    /// Zeroes the working region; the program image is kept.
    pub fn clear_working(&mut self) {
        self.working.fill(0);
    }

    /// Host-side store of `bytes` starting at `origin`, ignoring program
    /// write protection. Nothing is stored unless every byte is mapped.
    ///
    /// # Errors
    ///
    /// Returns [`BusFault::OutOfRangeAccess`] for the first unmapped address.
    pub fn load(&mut self, origin: u16, bytes: &[u8]) -> Result<(), BusFault> {
        let mut targets = Vec::with_capacity(bytes.len());
        let mut addr = origin;
        for _ in bytes {
            let target = self
                .map
                .decode(addr)
                .ok_or(BusFault::OutOfRangeAccess {
                    addr,
                    kind: AccessKind::Write,
                })?;
            targets.push(target);
            addr = addr.wrapping_add(1);
        }

        for ((region, offset), byte) in targets.into_iter().zip(bytes) {
            match region {
                MemoryRegion::Program => self.program[offset] = *byte,
                MemoryRegion::Working => self.working[offset] = *byte,
            }
        }
        Ok(())
    }
}

impl Bus for MemoryBus {
    fn read(&self, addr: u16) -> Result<u8, BusFault> {
        match self.map.decode(addr) {
            Some((MemoryRegion::Program, offset)) => Ok(self.program[offset]),
            Some((MemoryRegion::Working, offset)) => Ok(self.working[offset]),
            None => Err(BusFault::OutOfRangeAccess {
                addr,
                kind: AccessKind::Read,
            }),
        }
    }

    fn write(&mut self, addr: u16, value: u8) -> Result<(), BusFault> {
        self.validate_write(addr)?;
        match self.map.decode(addr) {
            Some((MemoryRegion::Program, offset)) => self.program[offset] = value,
            Some((MemoryRegion::Working, offset)) => self.working[offset] = value,
            None => {}
        }
        Ok(())
    }

    fn validate_write(&self, addr: u16) -> Result<(), BusFault> {
        match self.map.decode(addr) {
            Some((MemoryRegion::Program, _)) if !self.program_write_enable => {
                Err(BusFault::WriteToReadOnlyRegion { addr })
            }
            Some(_) => Ok(()),
            None => Err(BusFault::OutOfRangeAccess {
                addr,
                kind: AccessKind::Write,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Bus, BusConfig, MemoryBus, MemoryRegion};
    use crate::{AccessKind, BusFault, MemoryMapError};
    use rstest::rstest;

    #[test]
    fn default_bus_is_zeroed_and_program_is_8k() {
        let bus = MemoryBus::default();
        assert_eq!(bus.program().len(), 0x2000);
        assert_eq!(bus.working().len(), 0x2000);
        assert!(bus.program().iter().chain(bus.working()).all(|b| *b == 0));
        assert!(!bus.program_write_enabled());
    }

    #[test]
    fn image_bytes_map_from_address_zero() {
        let bus = MemoryBus::new(&[0xC3, 0x00, 0x02]).expect("valid image");
        assert_eq!(bus.read(0x0000), Ok(0xC3));
        assert_eq!(bus.read(0x0002), Ok(0x02));
        assert_eq!(bus.read(0x0003), Ok(0x00));
        assert_eq!(bus.map().decode(0x0003), Some((MemoryRegion::Program, 3)));
    }

    #[rstest]
    #[case::empty(&[])]
    #[case::short(&[0x31, 0x00, 0x24, 0xC5, 0x76])]
    #[case::exact(&[0x76; 0x2000])]
    fn working_region_starts_at_8k_for_images_that_fit(#[case] image: &[u8]) {
        let mut bus = MemoryBus::new(image).expect("valid image");

        assert_eq!(bus.program().len(), 0x2000);
        assert_eq!(bus.map().decode(0x1FFF), Some((MemoryRegion::Program, 0x1FFF)));
        assert_eq!(bus.map().decode(0x2000), Some((MemoryRegion::Working, 0)));
        bus.write(0x23FF, 0x12).expect("stack area is working memory");
        assert_eq!(bus.read(0x23FF), Ok(0x12));
    }

    #[rstest]
    #[case::above_working(0x4000)]
    #[case::top_of_space(0xFFFF)]
    fn reads_above_both_regions_fault(#[case] addr: u16) {
        let bus = MemoryBus::default();
        assert_eq!(
            bus.read(addr),
            Err(BusFault::OutOfRangeAccess {
                addr,
                kind: AccessKind::Read,
            })
        );
    }

    #[rstest]
    #[case::program_start(0x0000, Err(BusFault::WriteToReadOnlyRegion { addr: 0x0000 }))]
    #[case::program_end(0x1FFF, Err(BusFault::WriteToReadOnlyRegion { addr: 0x1FFF }))]
    #[case::working_start(0x2000, Ok(()))]
    #[case::working_end(0x3FFF, Ok(()))]
    #[case::unmapped(0x4000, Err(BusFault::OutOfRangeAccess { addr: 0x4000, kind: AccessKind::Write }))]
    fn write_policy_by_region(#[case] addr: u16, #[case] expected: Result<(), BusFault>) {
        let mut bus = MemoryBus::default();
        assert_eq!(bus.validate_write(addr), expected);
        assert_eq!(bus.write(addr, 0xAA), expected);

        let landed = bus.read(addr).ok() == Some(0xAA);
        assert_eq!(landed, expected.is_ok());
    }

    #[test]
    fn write_enable_opens_program_region() {
        let config = BusConfig {
            program_write_enable: true,
            ..BusConfig::default()
        };
        let mut bus = MemoryBus::with_config(None, &config).expect("valid map");

        bus.write(0x0010, 0x76).expect("program region is writable");
        assert_eq!(bus.read(0x0010), Ok(0x76));

        bus.set_program_write_enable(false);
        assert_eq!(
            bus.write(0x0010, 0x00),
            Err(BusFault::WriteToReadOnlyRegion { addr: 0x0010 })
        );
        assert_eq!(bus.read(0x0010), Ok(0x76));
    }

    #[test]
    fn working_region_follows_configured_program_size() {
        let config = BusConfig {
            program_region_bytes: 0x400,
            working_region_bytes: 0x100,
            ..BusConfig::default()
        };
        let mut bus = MemoryBus::with_config(Some(&[0xAA; 0x10]), &config).expect("valid map");

        bus.write(0x0400, 0x11).expect("first working byte");
        bus.write(0x04FF, 0x22).expect("last working byte");

        assert_eq!(bus.read(0x000F), Ok(0xAA));
        assert_eq!(bus.read(0x0010), Ok(0x00));
        assert_eq!(bus.working()[0], 0x11);
        assert_eq!(bus.working()[0xFF], 0x22);
        assert!(bus.read(0x0500).is_err());
    }

    #[test]
    fn larger_image_extends_program_region() {
        let image = vec![0x76; 0x3000];
        let mut bus = MemoryBus::new(&image).expect("valid image");

        assert_eq!(bus.program().len(), 0x3000);
        assert_eq!(
            bus.write(0x2FFF, 0x00),
            Err(BusFault::WriteToReadOnlyRegion { addr: 0x2FFF })
        );
        bus.write(0x3000, 0x11).expect("first working byte");
        assert_eq!(bus.working()[0], 0x11);
    }

    #[test]
    fn oversized_image_is_rejected() {
        let image = vec![0; 0x10000];
        assert_eq!(
            MemoryBus::new(&image),
            Err(MemoryMapError::RegionOverflow {
                program: 0x10000,
                working: 0x2000,
            })
        );
    }

    #[test]
    fn host_load_bypasses_write_protection() {
        let mut bus = MemoryBus::default();
        bus.load(0x1FFE, &[0x01, 0x02, 0x03]).expect("spans both regions");

        assert_eq!(bus.read(0x1FFE), Ok(0x01));
        assert_eq!(bus.read(0x1FFF), Ok(0x02));
        assert_eq!(bus.read(0x2000), Ok(0x03));
    }

    #[test]
    fn host_load_past_mapped_memory_stores_nothing() {
        let mut bus = MemoryBus::default();
        assert_eq!(
            bus.load(0x3FFF, &[0xAA, 0xBB]),
            Err(BusFault::OutOfRangeAccess {
                addr: 0x4000,
                kind: AccessKind::Write,
            })
        );
        assert_eq!(bus.read(0x3FFF), Ok(0x00));
    }

    #[test]
    fn clear_working_keeps_program_image() {
        let mut bus = MemoryBus::new(&[0xAB]).expect("valid image");
        bus.working_mut()[5] = 0xCD;

        bus.clear_working();

        assert_eq!(bus.read(0x0000), Ok(0xAB));
        assert!(bus.working().iter().all(|b| *b == 0));
    }
}
