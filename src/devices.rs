//! Static identification tables for supported NAND arrays
//!
//! Probed chip identifiers are matched against [`CHIP_TABLE`] for die
//! geometry, then the board id built from the probe result selects vendor
//! and interface timing rows. All matching is by exact equality; the
//! tables are part of the compatibility contract and mirror the shipped
//! controller firmware.

/// Length in bytes of the identifier returned by the Read ID command
pub const CHIP_ID_LENGTH: usize = 6;

/// Number of chip-enable positions addressable across both buses
pub const CHIP_COUNT: usize = 16;

/// A NAND chip identifier: the first four id bytes as a little-endian
/// word, plus the extension bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ChipId {
    /// First four identifier bytes
    pub id: u32,
    /// Remaining identifier bytes, zero-padded
    pub extension: u32,
}

/// Board identity derived from a probe: bus population plus the chip id
/// and group size of each symmetric chip group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BoardId {
    /// Number of buses with at least one chip
    pub num_buses: u32,
    /// Number of populated symmetric groups
    pub num_symmetric: u32,
    /// Chip id of the first symmetric group
    pub chip_id: ChipId,
    /// Chips per symmetric group, first group
    pub stride: u8,
    /// Chip id of the second symmetric group
    pub chip_id2: ChipId,
    /// Chips per symmetric group, second group
    pub stride2: u8,
}

/// Die geometry keyed by chip id
#[derive(Clone, Copy, Debug)]
pub struct ChipInfo {
    /// Chip id this row applies to (matched on the first four bytes)
    pub chip_id: ChipId,
    /// Erase blocks per chip enable
    pub blocks_per_ce: u16,
    /// Pages per erase block
    pub pages_per_block: u16,
    /// Data bytes per page
    pub bytes_per_page: u16,
    /// Spare bytes per page
    pub bytes_per_spare: u16,
    /// ECC requirement class of the die
    pub ecc_bytes: u16,
    /// Vendor family code
    pub chip_class: u32,
    /// Banks (planes) per chip enable
    pub banks_per_ce: u16,
    /// Index into the symmetric group this die populates
    pub symmetric_index: u16,
}

/// Vendor selection keyed by board id
#[derive(Clone, Copy, Debug)]
pub struct BoardInfo {
    /// Board id this row applies to
    pub board_id: BoardId,
    /// Vendor type reported through the device surface
    pub vendor_type: u16,
    /// Secondary vendor type
    pub vendor_type_alt: u16,
}

/// NAND interface timing keyed by board id, all values in nanoseconds
#[derive(Clone, Copy, Debug)]
pub struct TimingInfo {
    /// Board id this row applies to
    pub board_id: BoardId,
    /// Read cycle time
    pub read_cycle_ns: u8,
    /// RE# pulse width
    pub read_pulse_ns: u8,
    /// RE# high hold time
    pub read_hold_ns: u8,
    /// Write cycle time
    pub write_cycle_ns: u8,
    /// WE# pulse width
    pub write_pulse_ns: u8,
    /// WE# high hold time
    pub write_hold_ns: u8,
    /// Write-to-read turnaround time
    pub turnaround_ns: u8,
    /// Ready-to-data setup time
    pub ready_setup_ns: u8,
}

const fn id(word: u32) -> ChipId {
    ChipId {
        id: word,
        extension: 0,
    }
}

const fn chip(
    chip_id: u32,
    blocks_per_ce: u16,
    pages_per_block: u16,
    bytes_per_page: u16,
    bytes_per_spare: u16,
    ecc_bytes: u16,
    chip_class: u32,
    banks_per_ce: u16,
) -> ChipInfo {
    ChipInfo {
        chip_id: id(chip_id),
        blocks_per_ce,
        pages_per_block,
        bytes_per_page,
        bytes_per_spare,
        ecc_bytes,
        chip_class,
        banks_per_ce,
        symmetric_index: 0,
    }
}

const fn board_id(
    num_buses: u32,
    num_symmetric: u32,
    chip_id: u32,
    stride: u8,
    chip_id2: u32,
    stride2: u8,
) -> BoardId {
    BoardId {
        num_buses,
        num_symmetric,
        chip_id: id(chip_id),
        stride,
        chip_id2: id(chip_id2),
        stride2,
    }
}

const fn board(
    num_buses: u32,
    num_symmetric: u32,
    chip_id: u32,
    stride: u8,
    chip_id2: u32,
    stride2: u8,
    vendor_type: u16,
    vendor_type_alt: u16,
) -> BoardInfo {
    BoardInfo {
        board_id: board_id(num_buses, num_symmetric, chip_id, stride, chip_id2, stride2),
        vendor_type,
        vendor_type_alt,
    }
}

const fn timing(
    num_buses: u32,
    num_symmetric: u32,
    chip_id: u32,
    stride: u8,
    chip_id2: u32,
    stride2: u8,
    t: [u8; 8],
) -> TimingInfo {
    TimingInfo {
        board_id: board_id(num_buses, num_symmetric, chip_id, stride, chip_id2, stride2),
        read_cycle_ns: t[0],
        read_pulse_ns: t[1],
        read_hold_ns: t[2],
        write_cycle_ns: t[3],
        write_pulse_ns: t[4],
        write_hold_ns: t[5],
        turnaround_ns: t[6],
        ready_setup_ns: t[7],
    }
}

/// Die geometry for every supported chip id
pub(crate) static CHIP_TABLE: [ChipInfo; 22] = [
    chip(0x7294D7EC, 0x1038, 0x80, 0x2000, 0x1B4, 0xC, 8, 1),
    chip(0x72D5DEEC, 0x2070, 0x80, 0x2000, 0x1B4, 0xC, 8, 2),
    chip(0x29D5D7EC, 0x2000, 0x80, 0x1000, 0xDA, 8, 2, 2),
    chip(0x2994D5EC, 0x1000, 0x80, 0x1000, 0xDA, 8, 2, 1),
    chip(0xB614D5EC, 0x1000, 0x80, 0x1000, 0x80, 4, 2, 1),
    chip(0xB655D7EC, 0x2000, 0x80, 0x1000, 0x80, 4, 2, 2),
    chip(0xB614D5AD, 0x1000, 0x80, 0x1000, 0x80, 4, 3, 1),
    chip(0x3294E798, 0x1004, 0x80, 0x2000, 0x1C0, 0x10, 1, 1),
    chip(0xBA94D598, 0x1000, 0x80, 0x1000, 0xDA, 8, 1, 1),
    chip(0xBA95D798, 0x2000, 0x80, 0x1000, 0xDA, 8, 1, 2),
    chip(0x3294D798, 0x1034, 0x80, 0x2000, 0x178, 8, 1, 1),
    chip(0x3295DE98, 0x2068, 0x80, 0x2000, 0x178, 8, 1, 2),
    chip(0x3295EE98, 0x2008, 0x80, 0x2000, 0x1C0, 0x18, 1, 2),
    chip(0x3E94D789, 0x2000, 0x80, 0x1000, 0xDA, 0x10, 5, 1),
    chip(0x3ED5D789, 0x2000, 0x80, 0x1000, 0xDA, 8, 6, 2),
    chip(0x3ED5D72C, 0x2000, 0x80, 0x1000, 0xDA, 8, 5, 2),
    chip(0x3E94D72C, 0x2000, 0x80, 0x1000, 0xDA, 0xC, 7, 1),
    chip(0x4604682C, 0x1000, 0x100, 0x1000, 0xE0, 0xC, 7, 1),
    chip(0x3294D745, 0x1000, 0x80, 0x2000, 0x178, 8, 9, 1),
    chip(0x3295DE45, 0x2000, 0x80, 0x2000, 0x178, 8, 9, 2),
    chip(0x32944845, 0x1000, 0x80, 0x2000, 0x1C0, 8, 9, 1),
    chip(0x32956845, 0x2000, 0x80, 0x2000, 0x1C0, 8, 9, 2),
];

/// Vendor selection for every supported board layout
pub(crate) static BOARD_TABLE: [BoardInfo; 33] = [
    board(2, 1, 0x7294D7EC, 2, 0, 0, 1, 1),
    board(2, 1, 0x7294D7EC, 4, 0, 0, 1, 1),
    board(2, 2, 0x7294D7EC, 2, 0x7294D7EC, 2, 1, 1),
    board(2, 1, 0x29D5D7EC, 4, 0, 0, 1, 1),
    board(1, 1, 0xB655D7EC, 4, 0, 0, 1, 1),
    board(2, 1, 0x2994D5EC, 4, 0, 0, 1, 1),
    board(2, 1, 0x72D5DEEC, 4, 0, 0, 1, 1),
    board(1, 1, 0xB614D5EC, 4, 0, 0, 1, 1),
    board(1, 1, 0xBA94D598, 4, 0, 0, 1, 1),
    board(2, 1, 0x3294D798, 2, 0, 0, 1, 1),
    board(2, 1, 0x3294D798, 4, 0, 0, 1, 1),
    board(2, 1, 0x3295DE98, 4, 0, 0, 1, 1),
    board(2, 2, 0x3295DE98, 6, 0x3295DE98, 6, 1, 1),
    board(2, 1, 0x3294E798, 4, 0, 0, 1, 1),
    board(2, 1, 0x3294E798, 2, 0, 0, 1, 1),
    board(2, 1, 0x3295EE98, 4, 0, 0, 1, 1),
    board(1, 1, 0xB614D5AD, 4, 0, 0, 1, 1),
    board(2, 1, 0xB614D5AD, 4, 0, 0, 1, 1),
    board(2, 2, 0xB614D5AD, 4, 0xB614D5AD, 4, 1, 1),
    board(2, 1, 0x3E94D789, 2, 0, 0, 1, 1),
    board(1, 1, 0x3ED5D789, 2, 0, 0, 1, 1),
    board(2, 1, 0x3E94D72C, 2, 0, 0, 1, 1),
    board(2, 1, 0x3E94D72C, 4, 0, 0, 1, 1),
    board(1, 1, 0x3ED5D72C, 2, 0, 0, 1, 1),
    board(2, 1, 0x3294D745, 4, 0, 0, 1, 1),
    board(2, 1, 0x3295DE45, 4, 0, 0, 1, 1),
    board(2, 2, 0xBA95D798, 4, 0xBA95D798, 4, 1, 1),
    board(2, 1, 0x4604682C, 2, 0, 0, 1, 1),
    board(2, 1, 0x4604682C, 4, 0, 0, 1, 1),
    board(2, 2, 0x4604682C, 4, 0x4604682C, 4, 1, 1),
    board(2, 1, 0x3294D745, 4, 0, 0, 1, 1),
    board(2, 1, 0x32944845, 4, 0, 0, 17, 21),
    board(2, 1, 0x32956845, 4, 0, 0, 17, 21),
];

/// NAND interface timing for every supported board layout
pub(crate) static TIMING_TABLE: [TimingInfo; 32] = [
    timing(2, 1, 0x7294D7EC, 2, 0, 0, [0x1E, 0xF, 0xA, 0x1E, 0xF, 0xA, 0x19, 0xF]),
    timing(2, 1, 0x7294D7EC, 4, 0, 0, [0x1E, 0xF, 0xA, 0x1E, 0xF, 0xA, 0x19, 0xF]),
    timing(2, 2, 0x7294D7EC, 2, 0x7294D7EC, 2, [0x1E, 0xF, 0xA, 0x1E, 0xF, 0xA, 0x19, 0xF]),
    timing(2, 1, 0x72D5DEEC, 4, 0, 0, [0x1E, 0xF, 0xA, 0x1E, 0xF, 0xA, 0x14, 0xF]),
    timing(2, 1, 0x29D5D7EC, 4, 0, 0, [0x1E, 0xF, 0xA, 0x1E, 0xF, 0xA, 0x14, 0xF]),
    timing(2, 1, 0x2994D5EC, 4, 0, 0, [0x1E, 0xF, 0xA, 0x1E, 0xF, 0xA, 0x14, 0xF]),
    timing(1, 1, 0xB614D5EC, 4, 0, 0, [0x19, 0xC, 0x5, 0x1E, 0x14, 0xA, 0x14, 0xF]),
    timing(1, 1, 0xB655D7EC, 4, 0, 0, [0x2D, 0x19, 0xF, 0x32, 0x19, 0xF, 0x1E, 0xF]),
    timing(1, 1, 0xB614D5AD, 4, 0, 0, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0xF]),
    timing(2, 1, 0xB614D5AD, 4, 0, 0, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0xF]),
    timing(2, 2, 0xB614D5AD, 4, 0xB614D5AD, 4, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0xF]),
    timing(2, 1, 0x3294D798, 2, 0, 0, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0x19]),
    timing(2, 1, 0x3294D798, 4, 0, 0, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0x19]),
    timing(1, 1, 0xBA94D598, 4, 0, 0, [0x1E, 0xF, 0xA, 0x1E, 0xF, 0xF, 0x19, 0x1E]),
    timing(2, 2, 0xBA95D798, 4, 0xBA95D798, 4, [0x1E, 0xF, 0xA, 0x1E, 0xF, 0xF, 0x19, 0x1E]),
    timing(2, 1, 0x3295DE98, 4, 0, 0, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0x19]),
    timing(2, 2, 0x3295DE98, 6, 0x3295DE98, 6, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0x19]),
    timing(2, 1, 0x3294E798, 4, 0, 0, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0x19]),
    timing(2, 1, 0x3295EE98, 4, 0, 0, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0x19]),
    timing(1, 1, 0x3ED5D789, 2, 0, 0, [0x19, 0xA, 0xF, 0x19, 0xA, 0xF, 0x14, 0xF]),
    timing(2, 1, 0x3E94D789, 2, 0, 0, [0x14, 0xA, 0x7, 0x14, 0xA, 0x7, 0x10, 0xF]),
    timing(1, 1, 0x3ED5D72C, 2, 0, 0, [0x19, 0xA, 0xF, 0x19, 0xA, 0xF, 0x14, 0xF]),
    timing(2, 1, 0x3E94D72C, 4, 0, 0, [0x14, 0xA, 0x7, 0x14, 0xA, 0x7, 0x10, 0xF]),
    timing(2, 1, 0x3E94D72C, 2, 0, 0, [0x14, 0xA, 0x7, 0x14, 0xA, 0x7, 0x10, 0xF]),
    timing(2, 1, 0x4604682C, 2, 0, 0, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0xF]),
    timing(2, 1, 0x4604682C, 4, 0, 0, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0xF]),
    timing(2, 2, 0x4604682C, 4, 0x4604682C, 4, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0xF]),
    timing(2, 1, 0x3294E798, 2, 0, 0, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0x19]),
    timing(2, 1, 0x3294D745, 4, 0, 0, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0x1E]),
    timing(2, 1, 0x3295DE45, 4, 0, 0, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0x1E]),
    timing(2, 1, 0x32944845, 4, 0, 0, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0x19]),
    timing(2, 1, 0x32956845, 4, 0, 0, [0x19, 0xC, 0xA, 0x19, 0xC, 0xA, 0x14, 0x19]),
];

/// Controller-side signal delays, indices 3..7 are the output, pad,
/// sample and strobe delays in nanoseconds fed into timing derivation
pub(crate) static CONTROLLER_DELAYS: [u8; 8] = [1, 1, 1, 10, 6, 3, 3, 0];

/// Chip-enable masks defining the symmetric groups, zero-terminated
pub(crate) static SYMMETRIC_MASKS: [u32; 3] = [0xF0F, 0, 0];

/// Metadata bytes exposed per logical page
pub(crate) const META_PER_LOGICAL_PAGE: u32 = 0xC;

/// ECC-covered metadata bytes transferred per physical page
pub(crate) const NUM_ECC_BYTES: u32 = 0xA;

/// Metadata format selector reported through the device surface
pub(crate) const META_FORMAT: u32 = 0;

/// Looks up die geometry by the first four bytes of a chip id
pub(crate) fn find_chip_info(id_word: u32) -> Option<&'static ChipInfo> {
    let mut found = None;
    for ci in CHIP_TABLE.iter() {
        if ci.chip_id.id == id_word {
            found = Some(ci);
        }
    }
    found
}

/// Looks up vendor information by exact board id
pub(crate) fn find_board_info(board_id: &BoardId) -> Option<&'static BoardInfo> {
    let mut found = None;
    for bi in BOARD_TABLE.iter() {
        if bi.board_id == *board_id {
            found = Some(bi);
        }
    }
    found
}

/// Looks up interface timing by exact board id
pub(crate) fn find_timing_info(board_id: &BoardId) -> Option<&'static TimingInfo> {
    let mut found = None;
    for ti in TIMING_TABLE.iter() {
        if ti.board_id == *board_id {
            found = Some(ti);
        }
    }
    found
}
