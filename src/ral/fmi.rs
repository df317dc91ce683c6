//! Register block for one H2FMI bus instance.
//!
//! Each of the two FMI buses exposes the same 2 KiB window, split into
//! three sub-blocks: the FMI transfer engine at +0x000, the FMC NAND
//! sequencer at +0x400 and the ECC engine at +0x800. Offsets are part of
//! the hardware contract and are listed next to every register.

use super::register::RWRegister;

/// H2FMI register block
#[allow(missing_debug_implementations)]
#[repr(C)]
pub struct RegisterBlock {
    /// 0x000: page format (sector count, ECC byte layout)
    pub FMI_CONFIG: RWRegister<u32>,
    /// 0x004: transfer engine control
    pub FMI_CTRL: RWRegister<u32>,
    /// 0x008: transfer engine status; bit 2 set while the engine is busy
    pub FMI_STATUS: RWRegister<u32>,
    /// 0x00C: interrupt pending, write-one-to-clear; bit 1 page done,
    /// bit 8 last sector streamed
    pub FMI_INT_PEND: RWRegister<u32>,
    /// 0x010: interrupt / completion source select
    pub FMI_INT_EN: RWRegister<u32>,
    /// 0x014: page data FIFO window (DMA peripheral address)
    pub FMI_DATA_BUF: RWRegister<u32>,
    /// 0x018: spare metadata FIFO window (DMA peripheral address)
    pub FMI_META_BUF: RWRegister<u32>,
    _reserved0: [u32; 249],
    /// 0x400: FMC sequencer enable; writing 1 re-arms it after reset
    pub FMC_ON: RWRegister<u32>,
    /// 0x404: sequencer revision
    pub FMC_VER: RWRegister<u32>,
    /// 0x408: NAND interface timing; packed setup/hold/pulse nibbles
    pub FMC_IF_CTRL: RWRegister<u32>,
    /// 0x40C: chip-enable mask, one bit per CE on this half-bus
    pub FMC_CE_CTRL: RWRegister<u32>,
    /// 0x410: command byte(s) for the next transaction
    pub FMC_CMD: RWRegister<u32>,
    /// 0x414: transaction trigger; bit 0 command, bit 1 address,
    /// bit 3 wait-ready, 0x50 streams one data byte
    pub FMC_RW_CTRL: RWRegister<u32>,
    /// 0x418: transaction status, write-one-to-clear
    pub FMC_STATUS: RWRegister<u32>,
    /// 0x41C: address cycles 2.. (row high byte)
    pub FMC_ADDR1: RWRegister<u32>,
    _reserved1: [u32; 1],
    /// 0x424: data cycle count
    pub FMC_DNUM: RWRegister<u32>,
    /// 0x428: address cycles 0..1, packed into the upper half-word
    pub FMC_ADDR0: RWRegister<u32>,
    /// 0x42C: address cycle count
    pub FMC_ANUM: RWRegister<u32>,
    _reserved2: [u32; 4],
    /// 0x440: ready-busy timeout control
    pub FMC_TO_CTRL: RWRegister<u32>,
    _reserved3: [u32; 1],
    /// 0x448: NAND status / streamed data byte window
    pub FMC_NAND_STATUS: RWRegister<u32>,
    /// 0x44C: status compare value and mask for batched status reads
    pub FMC_STATUS_MATCH: RWRegister<u32>,
    _reserved4: [u32; 238],
    /// 0x808: ECC correction strength, bits [12:8]
    pub ECC_CFG: RWRegister<u32>,
    /// 0x80C: per-sector ECC result FIFO; bit 0 uncorrectable,
    /// bits [20:16] corrected-bit count
    pub ECC_RESULT: RWRegister<u32>,
    /// 0x810: per-page ECC summary; bit 3 uncorrectable sectors seen,
    /// bit 6 page blank, write-back to acknowledge
    pub ECC_PND: RWRegister<u32>,
    /// 0x814: ECC core hold; writing 0 releases the core
    pub ECC_RESET: RWRegister<u32>,
}
