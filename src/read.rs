//! The cooperative multi-page read engine
//!
//! A read walks a six-state machine that issues page addresses, arms the
//! page-grid DMA on the first page, and classifies the ECC summary of
//! every page as its status is latched. Each state tick runs with
//! interrupts masked; the engine yields between ticks and parks on the
//! DMA completion events once every page has been issued.

use crate::aes::AesDescriptor;
use crate::bus::FmiBus;
use crate::dma::{DmaController, DmaDirection, DmaEvents, DmaTransfer};
use crate::ral::{modify_reg, read_reg, write_reg};
use crate::{FmiPeripheral, NandOs};

/// Raw NAND status words reported by the engine
pub(crate) mod status {
    /// Every page in the batch was blank
    pub const ALL_EMPTY: u32 = 2;
    /// At least one page in the batch was blank
    pub const EMPTY: u32 = 0x8000_0001;
    /// At least one page had uncorrectable sectors
    pub const UECC: u32 = 0x8000_0024;
    /// Every page wants a refresh rewrite
    pub const REFRESH: u32 = 0x8000_0025;
    /// A DMA completion did not arrive
    pub const DMA_TIMEOUT: u32 = 1;
    /// The page-done interrupt did not arrive
    pub const PAGE_TIMEOUT: u32 = 0x8000_001C;
    /// The status-read completion did not arrive
    pub const TRANSFER_TIMEOUT: u32 = 0x8000_001D;
    /// The die did not leave its busy state
    pub const BUSY_TIMEOUT: u32 = 0x8000_001F;
}

/// Budget for each DMA completion wait
const DMA_WAIT_TIMEOUT_US: u64 = 2_000_000;

/// What the engine is currently committed to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EngineMode {
    /// No operation in flight
    Idle,
    /// A read batch is in flight
    Read,
    /// A program batch is in flight; the program path is not
    /// implemented on this controller generation
    #[allow(dead_code)]
    Write,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadState {
    Idle,
    IssueAddress,
    WaitChipStatus,
    WaitPageDone,
    WaitReady,
    Done,
}

/// One batch of pages to read
pub(crate) struct ReadRequest<'a> {
    /// Chip enable of each page
    pub chips: &'a [u16],
    /// Absolute page number of each page
    pub pages: &'a [u32],
    /// Page data destination, `bytes_per_page` per page, contiguous
    pub data: &'a mut [u8],
    /// Metadata destination, `num_ecc_bytes` per page, contiguous
    pub meta: &'a mut [u8],
    /// Worst corrected-bit count of each page
    pub ecc_per_page: Option<&'a mut [u8]>,
    /// Corrected-bit count of each sector, `0xFF` for uncorrectable,
    /// `0xFE` for blank pages
    pub ecc_per_sector: Option<&'a mut [u8]>,
}

struct ReadContext<'a, 'c, O, D> {
    os: &'c O,
    dma: &'c mut D,
    events: &'static DmaEvents,
    aes: Option<&'c AesDescriptor<'c>>,
    req: ReadRequest<'a>,

    state: ReadState,
    index: usize,
    current_chip: u16,
    address_pending: bool,
    dma_armed: u32,
    started_at: u64,
    transfer_deadline: u64,
    ready_deadline: u64,
    issued: u32,
    empty_pages: u32,
    refresh_pages: u32,
    uecc_pages: u32,
    first_failed_chip: Option<u16>,
    last_int_status: u32,
    sector_cursor: usize,
    overall_status: u32,
}

impl<FMI: FmiPeripheral> FmiBus<FMI> {
    /// Reads a batch of pages and returns the raw batch status, zero on
    /// a fully clean read
    pub(crate) fn read_multi<O: NandOs, D: DmaController>(
        &mut self,
        os: &O,
        dma: &mut D,
        events: &'static DmaEvents,
        aes: Option<&AesDescriptor<'_>>,
        req: ReadRequest<'_>,
    ) -> u32 {
        debug_assert!(!req.pages.is_empty());
        debug_assert_eq!(req.pages.len(), req.chips.len());

        let pages = req.pages.len() as u32;
        let mut ctx = ReadContext {
            os,
            dma,
            events,
            aes,
            req,
            state: ReadState::Idle,
            index: 0,
            current_chip: 0,
            address_pending: false,
            dma_armed: 0,
            started_at: 0,
            transfer_deadline: 0,
            ready_deadline: 0,
            issued: 0,
            empty_pages: 0,
            refresh_pages: 0,
            uecc_pages: 0,
            first_failed_chip: None,
            last_int_status: 0,
            sector_cursor: 0,
            overall_status: 0,
        };

        critical_section::with(|_| {
            self.device_reset();
            self.mode = EngineMode::Read;
        });

        self.preset_ecc();

        while ctx.state != ReadState::Done {
            critical_section::with(|_| self.tick(&mut ctx));
            os.yield_now();
        }

        if ctx.dma_armed != 0 {
            if events
                .event(self.dma_data)
                .wait(os, DMA_WAIT_TIMEOUT_US)
                .is_err()
                || events
                    .event(self.dma_meta)
                    .wait(os, DMA_WAIT_TIMEOUT_US)
                    .is_err()
            {
                fmi_warn!("fmi: dma wait failed");
                self.cancel_dma(ctx.dma, events);
                self.mode = EngineMode::Idle;
                return status::DMA_TIMEOUT;
            }

            ctx.overall_status = 0;
        }

        self.cancel_dma(ctx.dma, events);
        self.mode = EngineMode::Idle;

        if ctx.overall_status != 0 {
            return ctx.overall_status;
        }

        if ctx.empty_pages != 0 {
            ctx.overall_status = if ctx.empty_pages > pages {
                status::ALL_EMPTY
            } else {
                status::EMPTY
            };
        } else if ctx.refresh_pages != 0 {
            ctx.overall_status = if ctx.refresh_pages > pages {
                status::REFRESH
            } else {
                status::UECC
            };
        } else if ctx.uecc_pages != 0 {
            ctx.overall_status = status::UECC;
        }

        self.reset_interrupts();

        fmi_trace!(
            "fmi: read_multi issued {} addresses, int status 0x{:08x}, result 0x{:08x}",
            ctx.issued,
            ctx.last_int_status,
            ctx.overall_status
        );

        ctx.overall_status
    }

    /// Cancels both CDMA channels of this bus and re-arms their events
    pub(crate) fn cancel_dma<D: DmaController>(&mut self, dma: &mut D, events: &'static DmaEvents) {
        dma.cancel(self.dma_data);
        events.event(self.dma_data).reset();
        dma.cancel(self.dma_meta);
        events.event(self.dma_meta).reset();
    }

    fn tick<O: NandOs, D: DmaController>(&mut self, ctx: &mut ReadContext<'_, '_, O, D>) {
        match ctx.state {
            ReadState::Idle => self.enter_read(ctx),
            ReadState::IssueAddress => self.issue_address(ctx),
            ReadState::WaitChipStatus => self.wait_chip_status(ctx),
            ReadState::WaitPageDone => self.wait_page_done(ctx),
            ReadState::WaitReady => self.wait_ready(ctx),
            ReadState::Done => {}
        }
    }

    fn enter_read<O: NandOs, D: DmaController>(&mut self, ctx: &mut ReadContext<'_, '_, O, D>) {
        ctx.issued = 0;
        ctx.first_failed_chip = None;
        ctx.overall_status = 0;

        ctx.transfer_deadline = (ctx.os.timebase_hz() as u64 / 1_000_000) * 2_000_000;
        ctx.ready_deadline = ctx.transfer_deadline / 4;

        if self.mode == EngineMode::Read {
            self.set_ecc_strength(0xF);
        } else {
            self.set_ecc_strength(self.ecc_bits as u32 + 1);
            self.preset_ecc_summary();
        }

        ctx.index = 0;
        ctx.dma_armed = 1;
        ctx.address_pending = true;
        ctx.current_chip = ctx.req.chips[0];

        ctx.state = ReadState::IssueAddress;
        self.issue_address(ctx);
    }

    fn issue_address<O: NandOs, D: DmaController>(&mut self, ctx: &mut ReadContext<'_, '_, O, D>) {
        let count = ctx.req.pages.len();
        let mut reissue;

        let index = ctx.index;
        if !ctx.address_pending {
            reissue = index < count;
        } else {
            ctx.address_pending = false;
            reissue = false;
            self.issue_page(ctx, index);
        }

        if index + 1 < count {
            if ctx.req.chips[index + 1] == ctx.current_chip {
                // Same die next, batch the address with this transfer.
                ctx.address_pending = true;
            } else {
                ctx.address_pending = false;
                self.issue_page(ctx, index);
                reissue = true;
            }

            ctx.current_chip = ctx.req.chips[index + 1];
        }

        if reissue {
            let chip = ctx.req.chips[index];
            self.enable_chip(chip);
            self.last_enabled_chip = chip;
        }

        write_reg!(self.regs(), FMI_INT_EN, 0x2000);
        ctx.state = ReadState::WaitReady;
        ctx.started_at = ctx.os.microseconds();

        self.wait_ready(ctx);
    }

    /// Enables the chip of batch position `bank` and programs its page
    /// address
    fn issue_page<O: NandOs, D: DmaController>(
        &mut self,
        ctx: &mut ReadContext<'_, '_, O, D>,
        bank: usize,
    ) {
        let chip = ctx.req.chips[bank];
        self.enable_chip(chip);
        self.set_address(ctx.os, ctx.req.pages[bank]);

        self.last_enabled_chip = chip;
        ctx.issued += 1;
    }

    fn wait_ready<O: NandOs, D: DmaController>(&mut self, ctx: &mut ReadContext<'_, '_, O, D>) {
        if read_reg!(self.regs(), FMI_STATUS) & 4 != 0 {
            if ctx.os.microseconds().wrapping_sub(ctx.started_at) > ctx.ready_deadline {
                ctx.dma_armed = 0;
                ctx.overall_status = status::BUSY_TIMEOUT;
            } else {
                return;
            }
        } else if ctx.index >= ctx.req.pages.len() {
            let summary = read_reg!(self.regs(), ECC_PND);
            write_reg!(self.regs(), ECC_PND, summary);
            self.classify_page(ctx, summary);
        } else {
            self.prepare_status_poll(ctx);
            ctx.started_at = ctx.os.microseconds();
            ctx.state = ReadState::WaitChipStatus;
            return self.wait_chip_status(ctx);
        }

        self.complete(ctx);
    }

    fn wait_chip_status<O: NandOs, D: DmaController>(
        &mut self,
        ctx: &mut ReadContext<'_, '_, O, D>,
    ) {
        if read_reg!(self.regs(), FMI_INT_PEND) & 0x100 == 0 {
            if ctx.os.microseconds().wrapping_sub(ctx.started_at) > ctx.transfer_deadline {
                write_reg!(self.regs(), FMC_RW_CTRL, 0);
                self.disable_bus();
                ctx.dma_armed = status::TRANSFER_TIMEOUT;
                ctx.overall_status = status::TRANSFER_TIMEOUT;
                self.complete(ctx);
            }

            return;
        }

        let summary = read_reg!(self.regs(), ECC_PND);
        write_reg!(self.regs(), ECC_PND, summary);
        self.reset_interrupts();

        write_reg!(self.regs(), FMC_CMD, 0);
        write_reg!(self.regs(), FMC_RW_CTRL, 1);
        let _ = self.spin_for_done(ctx.os, |r| read_reg!(r, FMC_STATUS), 1, 1);
        write_reg!(self.regs(), FMC_STATUS, 1);

        ctx.state = ReadState::WaitPageDone;
        write_reg!(self.regs(), FMI_INT_EN, 2);
        write_reg!(self.regs(), FMI_CTRL, 3);

        if ctx.index == 0 {
            self.start_page_grid_dma(ctx);
            ctx.started_at = ctx.os.microseconds();
        } else {
            ctx.started_at = ctx.os.microseconds();
            self.classify_page(ctx, summary);
        }
    }

    fn wait_page_done<O: NandOs, D: DmaController>(&mut self, ctx: &mut ReadContext<'_, '_, O, D>) {
        ctx.last_int_status = read_reg!(self.regs(), FMI_INT_PEND);

        if ctx.last_int_status & 2 == 0 {
            if ctx.os.microseconds().wrapping_sub(ctx.started_at) > ctx.transfer_deadline {
                ctx.dma_armed = 0;
                ctx.overall_status = status::PAGE_TIMEOUT;
                self.complete(ctx);
            }
        } else {
            write_reg!(self.regs(), FMI_INT_EN, 0);
            ctx.index += 1;
            ctx.state = ReadState::IssueAddress;
            self.issue_address(ctx);
        }
    }

    fn complete<O: NandOs, D: DmaController>(&mut self, ctx: &mut ReadContext<'_, '_, O, D>) {
        ctx.state = ReadState::Done;
        self.reset_interrupts();
        self.disable_bus();
    }

    /// Points the sequencer at the die's status register and starts the
    /// streaming status read the transfer engine watches
    fn prepare_status_poll<O: NandOs, D: DmaController>(
        &mut self,
        ctx: &mut ReadContext<'_, '_, O, D>,
    ) {
        self.status_read_preamble(ctx.os, 0x40, 0x40);

        write_reg!(self.regs(), FMC_TO_CTRL, 0x20);
        write_reg!(self.regs(), FMI_INT_EN, 0x100);
    }

    fn status_read_preamble<O: NandOs>(&mut self, os: &O, compare: u8, mask: u8) {
        let regs = self.regs();
        modify_reg!(regs, FMC_IF_CTRL, |v: u32| v & !0x100000);
        write_reg!(regs, FMC_STATUS_MATCH, compare as u32 | ((mask as u32) << 8));

        // The banked program-status opcodes (0x71, 0xF1, 0xF2) belong to
        // the program path, which this controller generation never runs.
        write_reg!(regs, FMC_CMD, 0x70);
        write_reg!(regs, FMC_RW_CTRL, 1);
        let _ = self.spin_for_done(os, |r| read_reg!(r, FMC_STATUS), 1, 1);
        write_reg!(regs, FMC_STATUS, 1);

        self.reset_interrupts();

        write_reg!(regs, FMC_DNUM, 0);
        write_reg!(regs, FMC_RW_CTRL, 0x50);
    }

    /// Arms both CDMA channels with the whole batch: page data through
    /// the AES path in 4-byte words with 8-word bursts, metadata
    /// byte-wise with no burst
    fn start_page_grid_dma<O: NandOs, D: DmaController>(
        &mut self,
        ctx: &mut ReadContext<'_, '_, O, D>,
    ) {
        let direction = if self.mode == EngineMode::Read {
            DmaDirection::PeripheralToMemory
        } else {
            DmaDirection::MemoryToPeripheral
        };
        let count = ctx.req.pages.len();

        dma_execute(
            ctx.dma,
            ctx.events,
            DmaTransfer {
                direction,
                channel: self.dma_data,
                memory: ctx.req.data.as_mut_ptr(),
                peripheral: &self.regs().FMI_DATA_BUF as *const _ as usize,
                size: self.bytes_per_page as usize * count,
                word_size: 4,
                burst_size: 8,
                aes: ctx.aes,
            },
        );

        dma_execute(
            ctx.dma,
            ctx.events,
            DmaTransfer {
                direction,
                channel: self.dma_meta,
                memory: ctx.req.meta.as_mut_ptr(),
                peripheral: &self.regs().FMI_META_BUF as *const _ as usize,
                size: count * self.num_ecc_bytes as usize,
                word_size: 1,
                burst_size: 1,
                aes: None,
            },
        );
    }

    /// Classifies the latched ECC summary of the page issued at
    /// `ctx.index - 1` and records its quality outputs
    fn classify_page<O: NandOs, D: DmaController>(
        &mut self,
        ctx: &mut ReadContext<'_, '_, O, D>,
        summary: u32,
    ) {
        let sectors = self.sectors_per_page as usize;
        let cursor = ctx.sector_cursor;
        let mut page_max = 0u8;

        let code = if summary & 0x40 != 0 {
            if let Some(out) = ctx.req.ecc_per_sector.as_deref_mut() {
                for slot in out[cursor..cursor + sectors].iter_mut() {
                    *slot = 0xFE;
                }
            }

            status::ALL_EMPTY
        } else {
            let code = if summary & 8 != 0 { status::UECC } else { 1 };

            for sector in 0..sectors {
                let result = read_reg!(self.regs(), ECC_RESULT);
                let corrected = ((result >> 16) & 0x1F) as u8;
                if corrected > page_max {
                    page_max = corrected;
                }

                if let Some(out) = ctx.req.ecc_per_sector.as_deref_mut() {
                    out[cursor + sector] = if result & 1 != 0 { 0xFF } else { corrected };
                }
            }

            code
        };

        match code {
            status::UECC => ctx.uecc_pages += 1,
            status::REFRESH => ctx.refresh_pages += 1,
            status::ALL_EMPTY => ctx.empty_pages += 1,
            _ => {}
        }

        if matches!(code, status::UECC | status::REFRESH | status::ALL_EMPTY)
            && ctx.first_failed_chip.is_none()
        {
            ctx.first_failed_chip = Some(ctx.req.chips[ctx.index - 1]);
        }

        if let Some(out) = ctx.req.ecc_per_page.as_deref_mut() {
            out[ctx.index - 1] = page_max;
        }

        if ctx.req.ecc_per_sector.is_some() {
            ctx.sector_cursor += sectors;
        }
    }
}

/// Arms one CDMA transfer unless the channel still holds an unconsumed
/// completion
fn dma_execute<D: DmaController>(
    dma: &mut D,
    events: &'static DmaEvents,
    transfer: DmaTransfer<'_>,
) {
    let channel = transfer.channel;
    let event = events.event(channel);

    if event.is_signalled() {
        fmi_warn!(
            "fmi: Tried to start DMA transaction on busy channel {}",
            channel
        );
        return;
    }

    if let Err(err) = dma.begin(transfer, event) {
        fmi_warn!(
            "fmi: Failed to setup DMA transfer, failed with code 0x{:08x}",
            err.0
        );
    }
}
