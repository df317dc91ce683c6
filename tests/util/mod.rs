//! Shared test harness: a register-level FMI model, a cooperative OS
//! double that steps the model, and a scripted CDMA engine.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use embedded_hal::blocking::delay::DelayUs;

use h2fmi::dma::{DmaController, DmaError, DmaEvent, DmaEvents, DmaTransfer};
use h2fmi::ral::fmi::RegisterBlock;
use h2fmi::{FmiPeripheral, NandOs, CHIP_COUNT, CHIP_ID_LENGTH};

/// Register window size in 32-bit words
const REGISTER_WORDS: usize = 0x818 / 4;

/// Leaks a zeroed register window shaped like one FMI bus
pub fn leak_register_block() -> &'static RegisterBlock {
    let words: Box<[u32; REGISTER_WORDS]> = Box::new([0; REGISTER_WORDS]);
    let ptr = Box::leak(words).as_mut_ptr() as *const RegisterBlock;
    unsafe { &*ptr }
}

/// Leaks a fresh completion event set so tests stay independent
pub fn leak_events() -> &'static DmaEvents {
    Box::leak(Box::new(DmaEvents::new()))
}

/// One FMI bus peripheral double
pub struct MockFmi {
    base: usize,
    clock_hz: u32,
}

impl MockFmi {
    pub fn new(regs: &'static RegisterBlock, clock_hz: u32) -> Self {
        MockFmi {
            base: regs as *const RegisterBlock as usize,
            clock_hz,
        }
    }
}

unsafe impl FmiPeripheral for MockFmi {
    fn register_block(&self) -> *const () {
        self.base as *const ()
    }

    fn enable(&mut self) {}

    fn reset(&mut self) {}

    fn nand_clock_hz(&self) -> u32 {
        self.clock_hz
    }
}

/// Behavior knobs of the modelled FMI hardware
pub struct ModelConfig {
    /// Value the model keeps in `FMI_INT_PEND`; `0x102` completes both
    /// the status-read and page-done phases instantly
    pub int_pend: u32,
    /// Value the model keeps in `FMI_STATUS`; bit 2 parks the engine in
    /// its busy state
    pub fmi_status: u32,
    /// Per-page ECC summary served from `ECC_PND`
    pub ecc_summary: u32,
    /// Per-sector word served from `ECC_RESULT`
    pub ecc_result: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            int_pend: 0x102,
            fmi_status: 0,
            ecc_summary: 0,
            ecc_result: 0,
        }
    }
}

/// Register-level model of both FMI buses and the attached dies
///
/// The model advances whenever the driver yields, reads the clock or
/// burns a delay, mirroring how real hardware makes progress while the
/// cooperative driver waits.
pub struct FmiModel {
    regs: [&'static RegisterBlock; 2],
    /// Die identifier at each chip-enable position; positions 0..7 are
    /// wired to bus 0, positions 8..15 to bus 1
    chips: [Option<[u8; CHIP_ID_LENGTH]>; CHIP_COUNT],
    pub config: ModelConfig,
    id_cursor: [usize; 2],
    last_rw: [u32; 2],
}

impl FmiModel {
    pub fn new(regs: [&'static RegisterBlock; 2]) -> Self {
        FmiModel {
            regs,
            chips: [None; CHIP_COUNT],
            config: ModelConfig::default(),
            id_cursor: [0; 2],
            last_rw: [0; 2],
        }
    }

    /// Populates one chip-enable position
    pub fn attach_chip(&mut self, position: usize, id: [u8; CHIP_ID_LENGTH]) {
        self.chips[position] = Some(id);
    }

    /// The chip-enable position currently asserted across both masks
    fn enabled_position(&self) -> Option<usize> {
        for half in 0..2 {
            let bits = self.regs[half].FMC_CE_CTRL.read() & 0xFF;
            if bits != 0 {
                return Some(half * 8 + bits.trailing_zeros() as usize);
            }
        }

        None
    }

    /// Advances the model one step
    pub fn tick(&mut self) {
        for bus in 0..2 {
            let regs = self.regs[bus];

            // Sequencer transactions complete within one step.
            regs.FMC_STATUS.write(0x31FFFF);
            regs.FMI_STATUS.write(self.config.fmi_status);
            regs.FMI_INT_PEND.write(self.config.int_pend);
            regs.ECC_PND.write(self.config.ecc_summary);
            regs.ECC_RESULT.write(self.config.ecc_result);

            let rw = regs.FMC_RW_CTRL.read();
            if rw == 9 && self.last_rw[bus] != 9 {
                self.id_cursor[bus] = 0;
            }

            // Each data strobe shifts out one identifier byte of the
            // enabled die; dies wired to the other bus float high.
            if rw == 0x50 {
                let byte = match self.enabled_position() {
                    Some(position) if position / 8 == bus => self.chips[position]
                        .map(|id| id[self.id_cursor[bus].min(CHIP_ID_LENGTH - 1)])
                        .unwrap_or(0xFF),
                    _ => 0xFF,
                };

                regs.FMC_NAND_STATUS.write(byte as u32);
                self.id_cursor[bus] += 1;
            }

            self.last_rw[bus] = rw;
        }
    }
}

struct OsInner {
    now: Cell<u64>,
    tick_us: Cell<u64>,
    model: RefCell<Option<FmiModel>>,
}

impl OsInner {
    fn advance(&self) {
        self.now.set(self.now.get() + self.tick_us.get());
        if let Some(model) = self.model.borrow_mut().as_mut() {
            model.tick();
        }
    }
}

/// Cooperative OS double: time advances and the hardware model steps on
/// every yield, clock read and delay
#[derive(Clone)]
pub struct SimOs {
    inner: Rc<OsInner>,
}

impl SimOs {
    pub fn new() -> Self {
        SimOs {
            inner: Rc::new(OsInner {
                now: Cell::new(0),
                tick_us: Cell::new(10),
                model: RefCell::new(None),
            }),
        }
    }

    /// Simulated time consumed by one yield or delay
    pub fn set_tick_us(&self, tick_us: u64) {
        self.inner.tick_us.set(tick_us);
    }

    pub fn install_model(&self, model: FmiModel) {
        *self.inner.model.borrow_mut() = Some(model);
    }

    pub fn with_model<R>(&self, f: impl FnOnce(&mut FmiModel) -> R) -> R {
        f(self
            .inner
            .model
            .borrow_mut()
            .as_mut()
            .expect("no model installed"))
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay {
            inner: self.inner.clone(),
        }
    }
}

impl NandOs for SimOs {
    fn microseconds(&self) -> u64 {
        self.inner.advance();
        self.inner.now.get()
    }

    fn timebase_hz(&self) -> u32 {
        1_000_000
    }

    fn yield_now(&self) {
        self.inner.advance();
    }
}

/// Delay double sharing the OS clock and model
pub struct SimDelay {
    inner: Rc<OsInner>,
}

impl DelayUs<u8> for SimDelay {
    fn delay_us(&mut self, _us: u8) {
        self.inner.advance();
    }
}

/// One recorded CDMA call
#[derive(Clone, Debug, PartialEq)]
pub enum DmaOp {
    Begin {
        channel: u32,
        size: usize,
        word_size: usize,
        burst_size: usize,
        aes_key: Option<[u32; 4]>,
        aes_iv: Option<[u32; 4]>,
    },
    Cancel {
        channel: u32,
    },
}

/// Scripted CDMA engine: completes transfers synchronously by copying a
/// configured pattern, unless a channel is stalled
pub struct MockDma {
    pub log: Rc<RefCell<Vec<DmaOp>>>,
    /// Channels that never report completion
    pub stalled: Vec<u32>,
    /// Pattern delivered on peripheral-to-memory transfers, repeated
    pub fill: Vec<u8>,
}

impl MockDma {
    pub fn new() -> Self {
        MockDma {
            log: Rc::new(RefCell::new(Vec::new())),
            stalled: Vec::new(),
            fill: (0..=255u8).collect(),
        }
    }
}

impl DmaController for MockDma {
    fn begin(&mut self, transfer: DmaTransfer<'_>, done: &'static DmaEvent) -> Result<(), DmaError> {
        let (aes_key, aes_iv) = match transfer.aes {
            Some(descriptor) => {
                let mut iv = [0u32; 4];
                descriptor.iv_for_segment(0, &mut iv);
                (Some(*descriptor.key), Some(iv))
            }
            None => (None, None),
        };

        self.log.borrow_mut().push(DmaOp::Begin {
            channel: transfer.channel,
            size: transfer.size,
            word_size: transfer.word_size,
            burst_size: transfer.burst_size,
            aes_key,
            aes_iv,
        });

        if self.stalled.contains(&transfer.channel) {
            return Ok(());
        }

        unsafe {
            for i in 0..transfer.size {
                *transfer.memory.add(i) = self.fill[i % self.fill.len()];
            }
        }

        let _ = done.complete();
        Ok(())
    }

    fn cancel(&mut self, channel: u32) {
        self.log.borrow_mut().push(DmaOp::Cancel { channel });
    }
}

/// Identifier of the 0x7294D7EC chip row
pub const ID_7294D7EC: [u8; CHIP_ID_LENGTH] = [0xEC, 0xD7, 0x94, 0x72, 0x51, 0x42];

/// The reference whitening stream generator
pub fn whitening_word(index: usize) -> u32 {
    let mut val: u32 = 0x50F4546A;
    for _ in 0..(index + 1) * 763 {
        val = val.wrapping_mul(0x19660D).wrapping_add(0x3C6EF35F);
    }
    val
}

/// Builds a controller over two modelled buses with dies at `positions`,
/// using the given CDMA double
pub fn build_controller(
    positions: &[usize],
    id: [u8; CHIP_ID_LENGTH],
    dma: MockDma,
) -> (
    h2fmi::H2fmi<MockFmi, MockDma, SimOs>,
    SimOs,
    Rc<RefCell<Vec<DmaOp>>>,
    [&'static RegisterBlock; 2],
) {
    let regs = [leak_register_block(), leak_register_block()];
    let os = SimOs::new();

    let mut model = FmiModel::new(regs);
    for &position in positions {
        model.attach_chip(position, id);
    }
    os.install_model(model);

    let log = dma.log.clone();

    let controller = h2fmi::H2fmi::new(
        [
            MockFmi::new(regs[0], 96_000_000),
            MockFmi::new(regs[1], 96_000_000),
        ],
        dma,
        os.clone(),
        leak_events(),
    );

    (controller, os, log, regs)
}

/// Builds a controller with the default CDMA double
pub fn controller_with_chips(
    positions: &[usize],
    id: [u8; CHIP_ID_LENGTH],
) -> (
    h2fmi::H2fmi<MockFmi, MockDma, SimOs>,
    SimOs,
    Rc<RefCell<Vec<DmaOp>>>,
    [&'static RegisterBlock; 2],
) {
    build_controller(positions, id, MockDma::new())
}
