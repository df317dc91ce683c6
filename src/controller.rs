//! The H2FMI controller: identification, the public page read and the
//! device surface consumed by the VFL

use core::fmt;

use embedded_hal::blocking::delay::DelayUs;

use crate::aes::AesDescriptor;
use crate::bus::{FmiBus, FmiRegisters};
use crate::devices::{
    self, BoardId, CHIP_COUNT, CHIP_ID_LENGTH, META_PER_LOGICAL_PAGE, NUM_ECC_BYTES,
    SYMMETRIC_MASKS,
};
use crate::dma::{DmaController, DmaEvents, BUS_CHANNELS};
use crate::geometry::{calculate_ecc_bits, ecc_tag, page_format, NandGeometry};
use crate::ral::write_reg;
use crate::read::{status, ReadRequest};
use crate::timing::TimingSetup;
use crate::{FmiPeripheral, NandOs};

/// Number of FMI bus instances on the controller
pub const BUS_COUNT: usize = 2;

/// Size of the shared metadata scratch buffer
const META_SCRATCH_SIZE: usize = 0x400;

/// Identification failure at initialization
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitError {
    /// A register poll during the probe did not complete
    Timeout,
    /// Populated positions reported differing chip identifiers
    ChipIdMismatch,
    /// The populated positions do not decompose into symmetric groups
    AsymmetricLayout,
    /// No chip table row matches the probed identifier
    UnsupportedChip,
    /// No board table row matches the derived board id
    UnsupportedBoard,
    /// No timing table row matches the derived board id
    UnsupportedTiming,
    /// The page's sector count cannot be expressed to the engine
    InvalidPageSize(u32),
}

/// Failure of a public page read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadError {
    /// The page is blank or unrecoverable, so there is nothing to return
    NotFound,
    /// The batch resolved to all-blank; the caller may retry elsewhere
    Again,
    /// The controller reported a hardware failure
    Io,
}

/// Keys of the device information surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfoKey {
    /// Always one
    ReturnOne,
    /// Banks per chip enable
    BanksPerCe,
    /// Pages per erase block
    PagesPerBlock,
    /// Pages per block rounded to the addressing granule
    PagesPerBlock2,
    /// Erase blocks per chip enable
    BlocksPerCe,
    /// Bytes per page expressed from the sector count
    BytesPerPage,
    /// Spare bytes per page
    BytesPerSpare,
    /// Vendor type from the board table
    VendorType,
    /// Configured ECC strength
    EccBits,
    /// ECC strength as configured on the primary bus
    EccBits2,
    /// Banks across the array as seen by the VFL
    TotalBanksVfl,
    /// Blocks per bank, raw
    BlocksPerBankDw,
    /// Banks per chip enable, raw
    BanksPerCeDw,
    /// Pages per block, raw
    PagesPerBlockDw,
    /// Pages per block granule, raw
    PagesPerBlock2Dw,
    /// Power-of-two covering the in-block page number
    PageNumberBitWidth,
    /// Secondary copy of the page-number granule
    PageNumberBitWidth2,
    /// Chip enables per populated bus
    NumCePerBus,
    /// Whether the array speaks the PPN command set
    Ppn,
    /// Banks per chip enable as seen by the VFL
    BanksPerCeVfl,
    /// ECC-covered metadata bytes per page
    NumEccBytes,
    /// Metadata bytes per logical page
    MetaPerLogicalPage,
    /// Pages addressable per chip enable through the VFL banking scheme
    PagesPerCe,
    /// Total chip enables
    NumCe,
}

/// Logical CE assignment: which bus and bus-local chip serve a CE index
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CeMapEntry {
    bus: u8,
    chip: u16,
}

/// FTL data-window parameters driving AES region selection
#[derive(Clone, Copy, Debug, Default)]
struct FtlRegion {
    start_page: u32,
    scatter: u32,
    databuf: u32,
    count: u32,
}

/// The H2FMI NAND controller
///
/// Owns both FMI buses, the CDMA engine binding and the process-wide
/// read state: the logical CE map, the metadata whitening table, the
/// shared metadata scratch buffer and the AES region parameters.
pub struct H2fmi<FMI, D, O> {
    buses: [FmiBus<FMI>; BUS_COUNT],
    dma: D,
    os: O,
    events: &'static DmaEvents,
    geometry: NandGeometry,
    map: [Option<CeMapEntry>; CHIP_COUNT],
    hash_table: [u32; 256],
    meta_scratch: [u8; META_SCRATCH_SIZE],
    ftl: FtlRegion,
    aes_enabled: bool,
    whitening_enabled: bool,
}

impl<FMI, D, O> H2fmi<FMI, D, O>
where
    FMI: FmiPeripheral,
    D: DmaController,
    O: NandOs,
{
    /// New controller over both bus peripherals
    ///
    /// `events` is the platform's static CDMA completion event set; its
    /// interrupt handler must report completions into the same instance.
    pub fn new(fmi: [FMI; BUS_COUNT], dma: D, os: O, events: &'static DmaEvents) -> Self {
        let [fmi0, fmi1] = fmi;
        let regs = [FmiRegisters::new(&fmi0), FmiRegisters::new(&fmi1)];

        H2fmi {
            buses: [
                FmiBus::new(fmi0, 0, regs, BUS_CHANNELS[0]),
                FmiBus::new(fmi1, 1, regs, BUS_CHANNELS[1]),
            ],
            dma,
            os,
            events,
            geometry: NandGeometry::default(),
            map: [None; CHIP_COUNT],
            hash_table: [0; 256],
            meta_scratch: [0; META_SCRATCH_SIZE],
            ftl: FtlRegion::default(),
            aes_enabled: true,
            whitening_enabled: false,
        }
    }

    /// Probes both buses, matches the identification tables and derives
    /// geometry and timing
    ///
    /// `delay` paces the byte strobes of the identifier reads. On success
    /// the controller is ready to serve page reads.
    pub fn init<DELAY: DelayUs<u8>>(&mut self, delay: &mut DELAY) -> Result<(), InitError> {
        let mut ids = [[0u8; CHIP_ID_LENGTH * CHIP_COUNT]; BUS_COUNT];

        for bus in self.buses.iter_mut() {
            bus.init();
        }

        for (bus, bus_ids) in self.buses.iter_mut().zip(ids.iter_mut()) {
            bus.reset_and_read_chipids(&self.os, delay, bus_ids)
                .map_err(|_| InitError::Timeout)?;
        }

        // Every position is classified against the first id seen on the
        // primary bus.
        let mut reference = [0u8; CHIP_ID_LENGTH];
        reference.copy_from_slice(&ids[0][..CHIP_ID_LENGTH]);
        self.buses[0].check_chipid(&ids[0], &reference);
        self.buses[1].check_chipid(&ids[1], &reference);

        // Merge the probe results: the secondary bus wins the positions
        // it populates.
        let mut merged = ids[0];
        let mut owners = [None; CHIP_COUNT];
        for chip in 0..CHIP_COUNT {
            let span = chip * CHIP_ID_LENGTH..(chip + 1) * CHIP_ID_LENGTH;
            if self.buses[1].bitmap & (1 << chip) != 0 {
                merged[span.clone()].copy_from_slice(&ids[1][span]);
                owners[chip] = Some(1usize);
            } else if self.buses[0].bitmap & (1 << chip) != 0 {
                owners[chip] = Some(0usize);
            }
        }

        let bus_count =
            (self.buses[0].num_chips > 0) as u32 + (self.buses[1].num_chips > 0) as u32;
        let chip_count = self.buses[0].num_chips + self.buses[1].num_chips;

        let (chip_info, board_info, timing_info) = identify(&merged, &owners, bus_count)?;

        for bus in self.buses.iter_mut() {
            bus.is_ppn = false;
            bus.blocks_per_ce = chip_info.blocks_per_ce as u32;
            bus.banks_per_ce_vfl = 1;
            bus.sectors_per_page = (chip_info.bytes_per_page >> 9) as u32;
            bus.pages_per_block = chip_info.pages_per_block as u32;
            bus.bytes_per_spare = chip_info.bytes_per_spare as u32;
            bus.num_ecc_bytes = NUM_ECC_BYTES;
            bus.meta_per_logical_page = META_PER_LOGICAL_PAGE;
            bus.bytes_per_page = chip_info.bytes_per_page as u32;
            bus.banks_per_ce = chip_info.banks_per_ce as u32;

            let ecc_bits = calculate_ecc_bits(
                bus.bytes_per_spare,
                bus.num_ecc_bytes,
                bus.bytes_per_page,
            );
            bus.ecc_bits = ecc_bits;
            bus.ecc_tag = ecc_tag(ecc_bits);

            bus.page_format =
                page_format(bus.sectors_per_page, bus.num_ecc_bytes, ecc_bits as u32)
                    .ok_or(InitError::InvalidPageSize(bus.sectors_per_page))?;
        }

        let setup = TimingSetup::from_board(self.buses[0].fmi.nand_clock_hz(), timing_info);
        let timing_value = setup.register_value();

        self.geometry = NandGeometry::derive(
            bus_count,
            chip_count,
            &self.buses[0],
            chip_info,
            board_info,
        );

        for bus in self.buses.iter_mut() {
            bus.timing_cache = timing_value;
            write_reg!(bus.regs(), FMC_IF_CTRL, timing_value);
        }

        self.build_ce_map();
        self.meta_scratch = [0; META_SCRATCH_SIZE];
        seed_hash_table(&mut self.hash_table);

        fmi_trace!(
            "fmi: Initialized NAND memory! {} bytes per page, {} pages per block, {} blocks per CE",
            self.geometry.bytes_per_page,
            self.geometry.pages_per_block,
            self.geometry.blocks_per_ce
        );

        Ok(())
    }

    /// Builds the logical CE map by round-robining the buses, skipping
    /// positions absent from each bus's bitmap
    fn build_ce_map(&mut self) {
        self.map = [None; CHIP_COUNT];

        let total: u32 = self.buses.iter().map(|bus| bus.num_chips).sum();
        let mut count = [0u32; BUS_COUNT];
        let mut logical = 0usize;

        while logical < total as usize {
            for bus_index in 0..BUS_COUNT {
                if self.buses[bus_index].bitmap & (1 << count[bus_index]) != 0 {
                    self.map[logical] = Some(CeMapEntry {
                        bus: bus_index as u8,
                        chip: count[bus_index] as u16,
                    });
                    self.buses[bus_index].last_logical_bus = bus_index as u32;
                    logical += 1;
                }

                count[bus_index] += 1;
            }
        }
    }

    /// The geometry derived at initialization, zeroed before [`init`]
    /// has succeeded
    ///
    /// [`init`]: H2fmi::init
    pub fn geometry(&self) -> &NandGeometry {
        &self.geometry
    }

    /// Probe result of one bus as `(bitmap, chip count)`
    pub fn bus_population(&self, bus: usize) -> (u32, u32) {
        (self.buses[bus].bitmap, self.buses[bus].num_chips)
    }

    /// The `(bus, bus-local chip)` assignment of a logical CE
    pub fn ce_mapping(&self, ce: u32) -> Option<(u8, u16)> {
        self.map
            .get(ce as usize)
            .and_then(|entry| entry.map(|e| (e.bus, e.chip)))
    }

    /// Installs the FTL data-window parameters driving AES region
    /// selection
    pub fn setup_ftl(&mut self, start_page: u32, scatter: u32, databuf: u32, count: u32) {
        self.ftl = FtlRegion {
            start_page,
            scatter,
            databuf,
            count,
        };
    }

    /// Clears the FTL data-window parameters
    pub fn clear_ftl(&mut self) {
        self.ftl = FtlRegion::default();
    }

    /// Switches inline AES on or off for subsequent reads
    pub fn enable_encryption(&mut self, enabled: bool) {
        self.aes_enabled = enabled;
    }

    /// Switches metadata whitening on or off for subsequent reads
    pub fn enable_data_whitening(&mut self, enabled: bool) {
        self.whitening_enabled = enabled;
    }

    /// Reads one page of a logical CE
    ///
    /// `data` receives `bytes_per_page` bytes. When `meta` is given it
    /// must hold at least `meta_per_logical_page` bytes and receives the
    /// page metadata, de-whitened when whitening is enabled and padded
    /// with `0xFF` past the ECC-covered bytes on success. `ecc_per_page`
    /// receives the page's worst corrected-bit count and
    /// `ecc_per_sector` one quality byte per sector, `0xFF` for
    /// uncorrectable and `0xFE` for blank. `raw` suppresses the inline
    /// AES path for this read.
    pub fn read_single_page(
        &mut self,
        ce: u32,
        page: u32,
        data: &mut [u8],
        mut meta: Option<&mut [u8]>,
        ecc_per_page: Option<&mut [u8]>,
        ecc_per_sector: Option<&mut [u8]>,
        raw: bool,
    ) -> Result<(), ReadError> {
        let entry = match self.map.get(ce as usize).copied().flatten() {
            Some(entry) => entry,
            None => {
                fmi_warn!("fmi: read of unmapped CE {}", ce);
                return Err(ReadError::Io);
            }
        };

        let aes_enabled = self.aes_enabled;
        let whitening_enabled = self.whitening_enabled;
        let ftl = self.ftl;

        let Self {
            buses,
            dma,
            os,
            events,
            meta_scratch,
            hash_table,
            ..
        } = self;
        let bus = &mut buses[entry.bus as usize];

        if let Some(m) = meta.as_deref_mut() {
            m[0] = 0;
        }

        let chips = [entry.chip];
        let pages = [page];

        // Region selection keys off the destination buffer: reads
        // landing inside the FTL's data window use the FTL key chain.
        let descriptor;
        let aes = if !raw && aes_enabled {
            let offset = data.as_ptr() as usize as u32;
            let ftl_window = ftl.databuf <= offset
                && offset < ftl.databuf.wrapping_add(bus.bytes_per_page * ftl.count);

            descriptor = if ftl_window {
                AesDescriptor::ftl(bus.bytes_per_page, offset, ftl.databuf, ftl.start_page, true)
            } else {
                AesDescriptor::vfl(bus.bytes_per_page, &pages, true)
            };
            Some(&descriptor)
        } else {
            None
        };

        let data_len = bus.bytes_per_page as usize;
        let meta_len = bus.num_ecc_bytes as usize;
        let logical_meta = bus.meta_per_logical_page as usize;

        let read_ret = bus.read_multi(
            os,
            dma,
            *events,
            aes,
            ReadRequest {
                chips: &chips,
                pages: &pages,
                data: &mut data[..data_len],
                meta: &mut meta_scratch[..meta_len],
                ecc_per_page,
                ecc_per_sector,
            },
        );

        if let Some(m) = meta.as_deref_mut() {
            m[..logical_meta].copy_from_slice(&meta_scratch[..logical_meta]);

            if whitening_enabled {
                for word in 0..3 {
                    let span = word * 4..word * 4 + 4;
                    let mixed = u32::from_le_bytes([
                        m[span.start],
                        m[span.start + 1],
                        m[span.start + 2],
                        m[span.start + 3],
                    ]) ^ hash_table[(word + page as usize) % 256];
                    m[span].copy_from_slice(&mixed.to_le_bytes());
                }
            }
        }

        match read_ret {
            0 => {
                if let Some(m) = meta.as_deref_mut() {
                    for byte in m[meta_len..logical_meta].iter_mut() {
                        *byte = 0xFF;
                    }
                }

                Ok(())
            }
            status::EMPTY => Err(ReadError::NotFound),
            status::UECC => {
                fmi_warn!("fmi: UECC ce {} page 0x{:08x}", ce, page);
                Err(ReadError::NotFound)
            }
            status::ALL_EMPTY => Err(ReadError::Again),
            other => {
                fmi_warn!("fmi: read_single_page hardware error 0x{:08x}", other);
                Err(ReadError::Io)
            }
        }
    }

    /// Reads one page addressed as `(ce, block, page-in-block)`, the
    /// shape the VFL consumes
    pub fn read_device_page(
        &mut self,
        ce: u32,
        block: u32,
        page: u32,
        data: &mut [u8],
        spare: Option<&mut [u8]>,
    ) -> Result<(), ReadError> {
        let absolute = block * self.geometry.pages_per_block + page;
        self.read_single_page(ce, absolute, data, spare, None, None, false)
    }

    /// Serves one key of the device information surface
    pub fn get_info(&self, key: InfoKey) -> u32 {
        let geo = &self.geometry;

        match key {
            InfoKey::ReturnOne => 1,
            InfoKey::BanksPerCe => geo.banks_per_ce,
            InfoKey::PagesPerBlock2 => geo.pages_per_block_2,
            InfoKey::PagesPerBlock => geo.pages_per_block,
            InfoKey::BlocksPerCe => geo.blocks_per_ce,
            InfoKey::BytesPerPage => geo.sectors_per_page << 9,
            InfoKey::BytesPerSpare => geo.bytes_per_spare,
            InfoKey::VendorType => geo.vendor_type,
            InfoKey::EccBits => geo.ecc_bits,
            InfoKey::EccBits2 => self.buses[0].ecc_bits as u32,
            InfoKey::TotalBanksVfl => geo.banks_per_ce_vfl * geo.num_ce,
            InfoKey::BlocksPerBankDw => geo.blocks_per_bank_dw,
            InfoKey::BanksPerCeDw => geo.banks_per_ce_dw,
            InfoKey::PagesPerBlockDw => geo.pages_per_block_dw,
            InfoKey::PagesPerBlock2Dw => geo.pages_per_block_2_dw,
            InfoKey::PageNumberBitWidth => geo.page_number_bit_width,
            InfoKey::PageNumberBitWidth2 => geo.page_number_bit_width_2,
            InfoKey::NumCePerBus => {
                if geo.num_fmi == 0 {
                    0
                } else {
                    geo.num_ce / geo.num_fmi
                }
            }
            InfoKey::Ppn => geo.is_ppn as u32,
            InfoKey::BanksPerCeVfl => geo.banks_per_ce_vfl,
            InfoKey::NumEccBytes => geo.num_ecc_bytes,
            InfoKey::MetaPerLogicalPage => geo.meta_per_logical_page,
            InfoKey::PagesPerCe => geo.pages_per_ce,
            InfoKey::NumCe => geo.num_ce,
        }
    }

    /// Updates one key of the device information surface
    ///
    /// Only `VendorType` (accepted and ignored) and `BanksPerCeVfl` are
    /// writable.
    ///
    /// # Panics
    ///
    /// Panics on any other key; writing them has no defined meaning.
    pub fn set_info(&mut self, key: InfoKey, value: u32) {
        match key {
            InfoKey::VendorType => {}
            InfoKey::BanksPerCeVfl => self.geometry.banks_per_ce_vfl = value,
            _ => panic!("fmi: Invalid device info to set"),
        }
    }
}

impl<FMI, D, O> fmt::Debug for H2fmi<FMI, D, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("H2fmi")
            .field("geometry", &self.geometry)
            .finish()
    }
}

/// Matches a merged probe result against the identification tables
fn identify(
    ids: &[u8],
    owners: &[Option<usize>; CHIP_COUNT],
    bus_count: u32,
) -> Result<
    (
        &'static devices::ChipInfo,
        &'static devices::BoardInfo,
        &'static devices::TimingInfo,
    ),
    InitError,
> {
    let mut board_id = BoardId {
        num_buses: bus_count,
        ..BoardId::default()
    };

    let mut reference = [0u8; CHIP_ID_LENGTH];
    let mut found = 0u32;
    let mut bitmap = 0u32;

    for chip in 0..CHIP_COUNT {
        if owners[chip].is_none() {
            continue;
        }

        let id = &ids[chip * CHIP_ID_LENGTH..(chip + 1) * CHIP_ID_LENGTH];
        if found > 0 {
            if id != &reference[..] {
                fmi_warn!("fmi: ChipIDs do not match.");
                fmi_warn!(
                    "fmi: {:02x} {:02x} {:02x} {:02x} {:02x} {:02x}",
                    reference[0],
                    reference[1],
                    reference[2],
                    reference[3],
                    reference[4],
                    reference[5]
                );
                fmi_warn!(
                    "fmi: {:02x} {:02x} {:02x} {:02x} {:02x} {:02x}",
                    id[0],
                    id[1],
                    id[2],
                    id[3],
                    id[4],
                    id[5]
                );
                return Err(InitError::ChipIdMismatch);
            }
        } else {
            reference.copy_from_slice(id);
        }

        found += 1;
        bitmap |= 1 << chip;
    }

    let group_size = (bitmap & SYMMETRIC_MASKS[0]).count_ones();
    for &mask in SYMMETRIC_MASKS.iter() {
        if mask == 0 {
            break;
        }

        let bits = bitmap & mask;
        if bits != 0 {
            if bits.count_ones() != group_size {
                fmi_warn!("fmi: Chip IDs not symmetric.");
                return Err(InitError::AsymmetricLayout);
            }

            board_id.num_symmetric += 1;
        }
    }

    let id_word = u32::from_le_bytes([reference[0], reference[1], reference[2], reference[3]]);
    let chip_info = devices::find_chip_info(id_word).ok_or_else(|| {
        fmi_warn!("fmi: Unsupported chip.");
        InitError::UnsupportedChip
    })?;

    // Each populated group carries the shared id word and its share of
    // the chips; identifier extensions are not part of the board id.
    for group in 0..board_id.num_symmetric {
        let stride = (found / board_id.num_symmetric) as u8;
        match group {
            0 => {
                board_id.chip_id.id = id_word;
                board_id.stride = stride;
            }
            _ => {
                board_id.chip_id2.id = id_word;
                board_id.stride2 = stride;
            }
        }
    }

    fmi_trace!(
        "fmi: NAND board ID: ({}, {}, 0x{:x}, 0x{:x}, {}, 0x{:x}, 0x{:x}, {})",
        board_id.num_buses,
        board_id.num_symmetric,
        board_id.chip_id.id,
        board_id.chip_id.extension,
        board_id.stride,
        board_id.chip_id2.id,
        board_id.chip_id2.extension,
        board_id.stride2
    );

    let board_info = devices::find_board_info(&board_id).ok_or_else(|| {
        fmi_warn!("fmi: No support for board.");
        InitError::UnsupportedBoard
    })?;

    let timing_info = devices::find_timing_info(&board_id).ok_or_else(|| {
        fmi_warn!("fmi: Failed to find timing info for board.");
        InitError::UnsupportedTiming
    })?;

    Ok((chip_info, board_info, timing_info))
}

/// Seeds the metadata whitening table: each entry advances the linear
/// congruential stream 763 steps from the fixed seed
fn seed_hash_table(table: &mut [u32; 256]) {
    let mut val: u32 = 0x50F4546A;

    for entry in table.iter_mut() {
        for _ in 0..763 {
            val = val.wrapping_mul(0x19660D).wrapping_add(0x3C6EF35F);
        }

        *entry = val;
    }
}
