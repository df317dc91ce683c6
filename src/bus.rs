//! One FMI bus: register access and the primitive NAND sequences
//!
//! Chip enables are split across the two buses' CE registers: positions
//! 0..7 always live in bus 0's mask and positions 8..15 in bus 1's,
//! whichever bus issues the transaction. Every primitive here therefore
//! carries both register windows.

use core::fmt;

use embedded_hal::blocking::delay::DelayUs;

use crate::devices::{CHIP_COUNT, CHIP_ID_LENGTH};
use crate::ral::{fmi, modify_reg, read_reg, write_reg};
use crate::read::EngineMode;
use crate::{FmiPeripheral, NandOs};

/// Register poll budget in microseconds
const POLL_TIMEOUT_US: u64 = 10_000;

/// A register poll that did not reach its expected value in time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PollTimeout;

/// Pointer to one bus's register block
#[derive(Copy, Clone)]
pub(crate) struct FmiRegisters(usize);

impl FmiRegisters {
    pub fn new<FMI: FmiPeripheral>(fmi: &FMI) -> Self {
        Self(fmi.register_block() as usize)
    }

    #[inline(always)]
    pub fn block(&self) -> &'static fmi::RegisterBlock {
        unsafe { &*(self.0 as *const _) }
    }
}

/// State of one FMI bus
pub(crate) struct FmiBus<FMI> {
    /// The peripheral behind this bus
    pub fmi: FMI,
    /// Bus number, 0 or 1
    pub num: usize,
    /// Register windows of both buses, indexed by bus number
    regs: [FmiRegisters; 2],
    /// CDMA channel moving page data
    pub dma_data: u32,
    /// CDMA channel moving metadata
    pub dma_meta: u32,

    /// Bit per chip-enable position found populated
    pub bitmap: u32,
    /// Number of bits set in `bitmap`
    pub num_chips: u32,

    /// Last value programmed into `FMC_IF_CTRL`, restored after resets
    pub timing_cache: u32,
    /// Page-format word for `FMI_CONFIG`
    pub page_format: u32,

    /// Data bytes per page
    pub bytes_per_page: u32,
    /// 512-byte sectors per page
    pub sectors_per_page: u32,
    /// ECC-covered metadata bytes per page
    pub num_ecc_bytes: u32,
    /// Metadata bytes per logical page
    pub meta_per_logical_page: u32,
    /// Spare bytes per page
    pub bytes_per_spare: u32,
    /// Erase blocks per chip enable
    pub blocks_per_ce: u32,
    /// Pages per erase block
    pub pages_per_block: u32,
    /// Banks per chip enable
    pub banks_per_ce: u32,
    /// Banks per chip enable seen by the VFL
    pub banks_per_ce_vfl: u32,
    /// Configured ECC strength
    pub ecc_bits: u8,
    /// Derived ECC packing tag
    pub ecc_tag: u32,
    /// Whether the bus speaks the PPN command set
    pub is_ppn: bool,

    /// What the engine is currently committed to
    pub mode: EngineMode,
    /// Shared-bus arbitration flags, configured externally
    pub shared_bus_mode: u16,
    /// Chip enable of the last transaction issued
    pub last_enabled_chip: u16,
    /// Bus that received the most recent logical CE assignment
    pub last_logical_bus: u32,
}

impl<FMI> fmt::Debug for FmiBus<FMI> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FmiBus")
            .field("num", &self.num)
            .field("bitmap", &self.bitmap)
            .field("num_chips", &self.num_chips)
            .field("mode", &self.mode)
            .field("last_enabled_chip", &self.last_enabled_chip)
            .field("last_logical_bus", &self.last_logical_bus)
            .finish()
    }
}

impl<FMI: FmiPeripheral> FmiBus<FMI> {
    pub fn new(fmi: FMI, num: usize, regs: [FmiRegisters; 2], channels: (u32, u32)) -> Self {
        FmiBus {
            fmi,
            num,
            regs,
            dma_data: channels.0,
            dma_meta: channels.1,
            bitmap: 0,
            num_chips: 0,
            timing_cache: 0xFFFF,
            page_format: 0,
            bytes_per_page: 0,
            sectors_per_page: 0,
            num_ecc_bytes: 0,
            meta_per_logical_page: 0,
            bytes_per_spare: 0,
            blocks_per_ce: 0,
            pages_per_block: 0,
            banks_per_ce: 0,
            banks_per_ce_vfl: 0,
            ecc_bits: 0,
            ecc_tag: 0,
            is_ppn: false,
            mode: EngineMode::Idle,
            shared_bus_mode: 0,
            last_enabled_chip: 0,
            last_logical_bus: 0,
        }
    }

    /// This bus's register block
    #[inline(always)]
    pub fn regs(&self) -> &'static fmi::RegisterBlock {
        self.regs[self.num].block()
    }

    /// Brings the bus out of reset into its probe state
    pub fn init(&mut self) {
        self.fmi.enable();

        self.bitmap = 0;
        self.num_chips = 0;

        self.timing_cache = 0xFFFF;
        write_reg!(self.regs(), FMC_IF_CTRL, self.timing_cache);

        self.device_reset();
        self.release_ecc();
    }

    /// Resets the bus clock domain and restores the cached timing
    pub fn device_reset(&mut self) {
        self.fmi.reset();

        write_reg!(self.regs(), FMC_ON, 1);
        write_reg!(self.regs(), FMC_IF_CTRL, self.timing_cache);
    }

    /// Releases the ECC core after a reset
    pub fn release_ecc(&mut self) {
        write_reg!(self.regs(), ECC_RESET, 0);
    }

    /// Asserts the chip-enable line of `chip`
    ///
    /// Positions 8..15 live in the partner bus's mask. When bus 0 runs
    /// with the shared-bus flags set, the other half's mask is dropped
    /// first so only one die ever sees the transaction.
    pub fn enable_chip(&mut self, chip: u16) {
        let half = ((chip & 0x8) >> 3) as usize;

        if self.num == 0 && (self.shared_bus_mode & 0xFF00) != 0 {
            let other = if half == self.num { 1 } else { self.num };
            write_reg!(self.regs[other].block(), FMC_CE_CTRL, 0);
        }

        let block = self.regs[half].block();
        modify_reg!(block, FMC_CE_CTRL, |v: u32| v | (1 << (chip & 0x7)));
    }

    /// Releases the chip-enable line of `chip`
    pub fn disable_chip(&mut self, chip: u16) {
        let half = ((chip & 0x8) >> 3) as usize;
        let block = self.regs[half].block();
        modify_reg!(block, FMC_CE_CTRL, |v: u32| v & !(1 << (chip & 0x7)));
    }

    /// Releases every chip enable of this bus
    pub fn disable_bus(&mut self) {
        write_reg!(self.regs(), FMC_CE_CTRL, 0);
    }

    /// Polls `read()` until `(value & mask) == expected`, yielding
    /// between iterations
    pub fn wait_for_done<O: NandOs>(
        &self,
        os: &O,
        read: impl Fn(&'static fmi::RegisterBlock) -> u32,
        mask: u32,
        expected: u32,
    ) -> Result<(), PollTimeout> {
        let start = os.microseconds();
        while (read(self.regs()) & mask) != expected {
            os.yield_now();

            if os.microseconds().wrapping_sub(start) > POLL_TIMEOUT_US {
                fmi_warn!("fmi: timeout waiting on bus {}", self.num);
                return Err(PollTimeout);
            }
        }

        Ok(())
    }

    /// Polls `read()` without yielding, for acknowledgements issued
    /// under a critical section
    pub fn spin_for_done<O: NandOs>(
        &self,
        os: &O,
        read: impl Fn(&'static fmi::RegisterBlock) -> u32,
        mask: u32,
        expected: u32,
    ) -> Result<(), PollTimeout> {
        let start = os.microseconds();
        while (read(self.regs()) & mask) != expected {
            if os.microseconds().wrapping_sub(start) > POLL_TIMEOUT_US {
                fmi_warn!("fmi: timeout waiting on bus {}", self.num);
                return Err(PollTimeout);
            }
        }

        Ok(())
    }

    /// Programs the 24-bit page address for the next transaction
    fn set_page_address(&mut self, page: u32) {
        let regs = self.regs();
        write_reg!(regs, FMC_ADDR1, (page >> 16) & 0xFF);
        write_reg!(regs, FMC_ADDR0, ((page & 0xFF) << 16) | ((page >> 8) << 24));
        write_reg!(regs, FMC_ANUM, 4);
    }

    /// Issues the page-read setup command for `page` and waits for the
    /// command and address cycles to finish
    pub fn set_address<O: NandOs>(&mut self, os: &O, page: u32) {
        self.set_page_address(page);

        let regs = self.regs();
        write_reg!(regs, FMC_CMD, 0x3000);
        write_reg!(regs, FMC_RW_CTRL, 0xB);

        let _ = self.spin_for_done(os, |r| read_reg!(r, FMC_STATUS), 0xB, 0xB);
        write_reg!(regs, FMC_STATUS, 0xB);
    }

    /// Reprograms the interrupt and completion sources to their idle
    /// configuration
    pub fn reset_interrupts(&mut self) {
        let regs = self.regs();
        write_reg!(regs, FMC_TO_CTRL, 0);
        write_reg!(regs, FMI_INT_EN, 0);
        write_reg!(regs, FMC_STATUS, 0x31FFFF);
        write_reg!(regs, FMI_INT_PEND, 0xF);
    }

    /// Programs the page format and ECC strength for the next transfer
    pub fn set_ecc_strength(&mut self, bits: u32) {
        let regs = self.regs();
        write_reg!(regs, FMI_CONFIG, self.page_format);
        write_reg!(regs, ECC_CFG, (bits & 0x1F) << 8);
    }

    /// Presets the per-page ECC summary register
    pub fn preset_ecc_summary(&mut self) {
        write_reg!(self.regs(), ECC_PND, 0x68);
    }

    /// Presets the ECC result FIFO and the page summary
    pub fn preset_ecc(&mut self) {
        write_reg!(self.regs(), ECC_RESULT, 1);
        self.preset_ecc_summary();
    }

    /// Resets one die
    pub fn nand_reset<O: NandOs>(&mut self, os: &O, chip: u16) -> Result<(), PollTimeout> {
        self.enable_chip(chip);

        let regs = self.regs();
        write_reg!(regs, FMC_CMD, 0xFF);
        write_reg!(regs, FMC_RW_CTRL, 1);

        let ret = self.wait_for_done(os, |r| read_reg!(r, FMC_STATUS), 1, 1);
        self.disable_chip(chip);

        ret
    }

    /// Resets every chip-enable position on this bus
    pub fn nand_reset_all<O: NandOs>(&mut self, os: &O) -> Result<(), PollTimeout> {
        for chip in 0..CHIP_COUNT as u16 {
            self.nand_reset(os, chip)?;
        }

        Ok(())
    }

    /// Streams `dest.len()` bytes out of the NAND data window
    ///
    /// The timing register is zeroed for the duration so the strobe
    /// pulses are wide enough for any die.
    fn read_bytes<D: DelayUs<u8>>(&mut self, delay: &mut D, dest: &mut [u8]) {
        let regs = self.regs();
        let timing = read_reg!(regs, FMC_IF_CTRL);
        write_reg!(regs, FMC_IF_CTRL, 0);
        write_reg!(regs, FMC_DNUM, 0);

        for byte in dest.iter_mut() {
            write_reg!(regs, FMC_RW_CTRL, 0x50);
            delay.delay_us(1);

            *byte = read_reg!(regs, FMC_NAND_STATUS) as u8;

            write_reg!(regs, FMC_RW_CTRL, 0);
        }

        write_reg!(regs, FMC_IF_CTRL, timing);
    }

    /// Reads the identifier of one die
    pub fn read_chipid<O: NandOs, D: DelayUs<u8>>(
        &mut self,
        os: &O,
        delay: &mut D,
        chip: u16,
        id: &mut [u8],
    ) -> Result<(), PollTimeout> {
        self.enable_chip(chip);

        let regs = self.regs();
        write_reg!(regs, FMC_CMD, 0x90);
        write_reg!(regs, FMC_ADDR0, 0);
        write_reg!(regs, FMC_ANUM, 0);
        write_reg!(regs, FMC_RW_CTRL, 9);

        let ret = self.wait_for_done(os, |r| read_reg!(r, FMC_STATUS), 9, 9);
        if ret.is_ok() {
            self.read_bytes(delay, &mut id[..CHIP_ID_LENGTH]);
        }

        self.disable_chip(chip);
        ret
    }

    /// Resets the bus and reads the identifier of every chip-enable
    /// position into `ids`, 6 bytes per position
    pub fn reset_and_read_chipids<O: NandOs, D: DelayUs<u8>>(
        &mut self,
        os: &O,
        delay: &mut D,
        ids: &mut [u8],
    ) -> Result<(), PollTimeout> {
        self.shared_bus_mode = 0;

        self.nand_reset_all(os)?;

        for chip in 0..CHIP_COUNT {
            let id = &mut ids[chip * CHIP_ID_LENGTH..(chip + 1) * CHIP_ID_LENGTH];
            self.read_chipid(os, delay, chip as u16, id)?;
        }

        Ok(())
    }

    /// Classifies the probe result against `reference`: positions whose
    /// identifier matches populate the bitmap, blank positions are
    /// silently absent, anything else is logged and ignored
    pub fn check_chipid(&mut self, ids: &[u8], reference: &[u8]) {
        self.num_chips = 0;
        self.bitmap = 0;

        for chip in 0..CHIP_COUNT {
            let id = &ids[chip * CHIP_ID_LENGTH..(chip + 1) * CHIP_ID_LENGTH];

            if id == &reference[..CHIP_ID_LENGTH] {
                fmi_trace!(
                    "fmi: Found chip ID {:02x} {:02x} {:02x} {:02x} {:02x} {:02x} on fmi{}:ce{}",
                    id[0],
                    id[1],
                    id[2],
                    id[3],
                    id[4],
                    id[5],
                    self.num,
                    chip
                );

                self.bitmap |= 1 << chip;
                self.num_chips += 1;
            } else if id.iter().any(|&b| b != 0xFF) && id.iter().any(|&b| b != 0) {
                fmi_warn!(
                    "fmi: Ignoring mismatched chip with ID {:02x} {:02x} {:02x} {:02x} {:02x} {:02x} on fmi{}:ce{}",
                    id[0],
                    id[1],
                    id[2],
                    id[3],
                    id[4],
                    id[5],
                    self.num,
                    chip
                );
            }
        }
    }
}
