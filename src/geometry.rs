//! NAND array geometry derived from the identification tables

use crate::bus::FmiBus;
use crate::devices::{BoardInfo, ChipInfo, META_FORMAT, META_PER_LOGICAL_PAGE, NUM_ECC_BYTES};

/// Geometry of the identified NAND array, derived once at initialization
/// and served through the device information surface
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NandGeometry {
    /// Number of FMI buses with chips present
    pub num_fmi: u32,
    /// Total chip enables across both buses
    pub num_ce: u32,
    /// Erase blocks per chip enable
    pub blocks_per_ce: u32,
    /// Pages per erase block
    pub pages_per_block: u32,
    /// Pages per block rounded to the addressing granule: the next power
    /// of two, doubled when the raw count is not itself a power of two
    pub pages_per_block_2: u32,
    /// Data bytes per page
    pub bytes_per_page: u32,
    /// 512-byte sectors per page
    pub sectors_per_page: u32,
    /// Spare bytes per page
    pub bytes_per_spare: u32,
    /// Banks per chip enable
    pub banks_per_ce: u32,
    /// Banks per chip enable as seen by the VFL, adjustable at runtime
    pub banks_per_ce_vfl: u32,
    /// Blocks per bank
    pub blocks_per_bank: u32,
    /// Power-of-two stride between banks in virtual block numbers
    pub bank_address_space: u32,
    /// Virtual block number one past the last addressable block
    pub total_block_space: u32,
    /// Stride between chip enables in virtual block numbers
    pub block_address_space: u32,
    /// Power-of-two covering the in-block page number
    pub page_number_bit_width: u32,
    /// Secondary copy of the page-number granule
    pub page_number_bit_width_2: u32,
    /// Pages addressable per chip enable through the VFL banking scheme
    pub pages_per_ce: u32,
    /// Vendor type from the board table
    pub vendor_type: u32,
    /// Vendor family code from the chip table
    pub chip_class: u32,
    /// Whether the array speaks the PPN command set
    pub is_ppn: bool,
    /// Blocks per bank, raw
    pub blocks_per_bank_dw: u32,
    /// Pages per block, raw
    pub pages_per_block_dw: u32,
    /// Pages per block granule, raw
    pub pages_per_block_2_dw: u32,
    /// Banks per chip enable, raw
    pub banks_per_ce_dw: u32,
    /// ECC-covered metadata bytes per page
    pub num_ecc_bytes: u32,
    /// Metadata bytes per logical page
    pub meta_per_logical_page: u32,
    /// Metadata format selector
    pub meta_format: u32,
    /// Configured ECC correction strength in bits per sector
    pub ecc_bits: u32,
    /// Derived ECC packing tag
    pub ecc_tag: u32,
}

impl NandGeometry {
    /// Derives the process-wide geometry from the primary bus's
    /// installed layout and the matched tables
    pub(crate) fn derive<FMI>(
        num_fmi: u32,
        num_ce: u32,
        primary: &FmiBus<FMI>,
        chip: &ChipInfo,
        board: &BoardInfo,
    ) -> Self {
        let mut geo = NandGeometry::default();

        geo.num_fmi = num_fmi;
        geo.num_ce = num_ce;
        geo.blocks_per_ce = primary.blocks_per_ce;
        geo.pages_per_block = primary.pages_per_block;
        geo.bytes_per_page = primary.bytes_per_page;
        geo.sectors_per_page = primary.sectors_per_page;
        geo.bytes_per_spare = primary.bytes_per_spare;
        geo.banks_per_ce_vfl = primary.banks_per_ce_vfl;
        geo.banks_per_ce = primary.banks_per_ce;
        geo.blocks_per_bank = geo.blocks_per_ce / geo.banks_per_ce;

        if geo.blocks_per_ce.is_power_of_two() {
            geo.bank_address_space = geo.blocks_per_bank;
            geo.total_block_space = geo.blocks_per_ce;
            geo.block_address_space = geo.blocks_per_ce;
        } else {
            let stride = pot_granule(geo.blocks_per_bank);
            geo.bank_address_space = stride;
            geo.total_block_space =
                (geo.banks_per_ce - 1) * stride + geo.blocks_per_bank;
            geo.block_address_space = stride;
        }

        geo.pages_per_block_2 = pot_granule(geo.pages_per_block);

        // PPN arrays would take their layout from the device parameter
        // page instead; this controller generation never reports one.
        geo.is_ppn = primary.is_ppn;
        geo.blocks_per_bank_dw = geo.blocks_per_bank;
        geo.pages_per_block_dw = geo.pages_per_block;
        geo.pages_per_block_2_dw = geo.pages_per_block;
        geo.banks_per_ce_dw = geo.banks_per_ce;

        geo.page_number_bit_width = next_pow2_at_least(geo.pages_per_block - 1);
        geo.page_number_bit_width_2 = geo.page_number_bit_width;
        geo.pages_per_ce = geo.banks_per_ce_vfl * geo.pages_per_block;
        geo.chip_class = chip.chip_class;
        geo.vendor_type = board.vendor_type as u32;

        geo.num_ecc_bytes = NUM_ECC_BYTES;
        geo.meta_per_logical_page = META_PER_LOGICAL_PAGE;
        geo.meta_format = META_FORMAT;
        geo.ecc_bits = primary.ecc_bits as u32;
        geo.ecc_tag = primary.ecc_tag;

        geo
    }
}

/// The smallest power of two not below `v`, computed the way the
/// sequencer expects: values with the top bit set saturate at 1
pub(crate) fn next_pow2_at_least(v: u32) -> u32 {
    let mut p = 1u32;
    if v & 0x8000_0000 == 0 {
        while p < v {
            p <<= 1;
        }
    }
    p
}

/// Power-of-two addressing granule for `v`: the next power of two,
/// doubled when `v` is not already one
pub(crate) fn pot_granule(v: u32) -> u32 {
    let p = next_pow2_at_least(v);
    if p != v {
        p << 1
    } else {
        p
    }
}

/// Configured ECC strength for a page layout, from the spare bytes left
/// after metadata
///
/// Returns 0 when no supported strength fits, which the caller reports
/// as an unsupported configuration.
pub(crate) fn calculate_ecc_bits(
    bytes_per_spare: u32,
    ecc_bytes: u32,
    bytes_per_page: u32,
) -> u8 {
    let val = (bytes_per_spare - ecc_bytes) / (bytes_per_page >> 9);
    static THRESHOLDS: [(u32, u8); 2] = [(0x1A, 0x10), (0xD, 0x8)];

    for &(threshold, bits) in THRESHOLDS.iter() {
        if val >= threshold {
            return bits;
        }
    }

    fmi_warn!(
        "fmi: calculating ecc bits failed (0x{:08x}, 0x{:08x}, 0x{:08x}) -> 0x{:08x}",
        bytes_per_spare,
        ecc_bytes,
        bytes_per_page,
        val
    );
    0
}

/// Derived ECC packing tag for a correction strength
pub(crate) fn ecc_tag(ecc_bits: u8) -> u32 {
    if ecc_bits > 8 {
        (ecc_bits as u32 * 8) / 10
    } else {
        8
    }
}

/// Page-format configuration word programmed into `FMI_CONFIG`
///
/// Returns `None` for sector counts the transfer engine cannot express.
pub(crate) fn page_format(
    sectors_per_page: u32,
    ecc_bytes: u32,
    ecc_bits: u32,
) -> Option<u32> {
    let wide_ecc = if ecc_bits == 0x10 { 0x4000 } else { 0 };
    let meta = ecc_bytes & 0x3F;

    let sectors = match sectors_per_page {
        1 => 3,
        4 => 0,
        8 => 1,
        16 => 2,
        _ => return None,
    };

    Some((meta << 2) | (meta << 8) | 0x60000 | wide_ecc | sectors)
}
