//! DMA completion rendezvous and the CDMA engine contract
//!
//! Each CDMA channel has one completion event. The driver arms a channel
//! through [`DmaController::begin`] and parks on the channel's
//! [`DmaEvent`] until the platform's DMA interrupt handler reports
//! completion through [`DmaEvents::complete`]. Event state lives under a
//! critical section because the interrupt side races the waiting task;
//! the interrupt side only flips state and never allocates.

use core::cell::Cell;
use core::fmt;

use critical_section::Mutex;

use crate::aes::AesDescriptor;
use crate::NandOs;

/// Number of CDMA channels with completion events
pub const CHANNEL_COUNT: usize = 28;

/// CDMA channels serving each FMI bus as `(data, metadata)`
pub const BUS_CHANNELS: [(u32, u32); 2] = [(5, 6), (7, 8)];

/// Transfer direction relative to host memory
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DmaDirection {
    /// Memory to peripheral FIFO
    MemoryToPeripheral,
    /// Peripheral FIFO to memory
    PeripheralToMemory,
}

/// One CDMA transfer description
///
/// `peripheral` is the bus address of the FIFO window the channel
/// services; `word_size` and `burst_size` select the channel's access
/// pattern. An attached [`AesDescriptor`] routes the stream through the
/// inline AES engine.
#[derive(Clone, Copy, Debug)]
pub struct DmaTransfer<'a> {
    /// Transfer direction
    pub direction: DmaDirection,
    /// CDMA channel number
    pub channel: u32,
    /// Host memory address
    pub memory: *mut u8,
    /// Peripheral FIFO address
    pub peripheral: usize,
    /// Transfer length in bytes
    pub size: usize,
    /// Access width in bytes
    pub word_size: usize,
    /// Burst length in words
    pub burst_size: usize,
    /// Inline AES configuration, if the stream is ciphered
    pub aes: Option<&'a AesDescriptor<'a>>,
}

/// Error reported by the CDMA engine when a channel cannot be armed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DmaError(pub u32);

/// The platform's CDMA engine
///
/// Implementations arm the channel and return immediately; completion is
/// delivered from the DMA interrupt handler via [`DmaEvents::complete`].
/// Implementations own cache maintenance for the memory side of the
/// transfer.
pub trait DmaController {
    /// Arms `transfer` on its channel. `done` is the event the
    /// platform's interrupt handler must signal for this channel.
    fn begin(&mut self, transfer: DmaTransfer<'_>, done: &'static DmaEvent) -> Result<(), DmaError>;

    /// Cancels any transfer in flight on `channel`
    fn cancel(&mut self, channel: u32);
}

#[derive(Clone, Copy)]
struct EventState {
    signalled: bool,
    waiters: u8,
}

/// Completion event of one CDMA channel
///
/// An event is clear while the channel is idle or armed and becomes
/// signalled when the interrupt handler reports completion. It stays
/// signalled until the channel is cancelled for reuse.
pub struct DmaEvent {
    state: Mutex<Cell<EventState>>,
}

/// Timeout waiting for a DMA completion
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitTimeout;

impl DmaEvent {
    /// A new, clear event
    pub const fn new() -> Self {
        DmaEvent {
            state: Mutex::new(Cell::new(EventState {
                signalled: false,
                waiters: 0,
            })),
        }
    }

    /// Marks the event signalled, waking every waiter
    ///
    /// Interrupt-safe and allocation-free. Returns `true` on the first
    /// report after the event was (re-)armed, so a completion wakes the
    /// waiter queue exactly once.
    pub fn complete(&self) -> bool {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            let first = !state.signalled;
            state.signalled = true;
            cell.set(state);
            first
        })
    }

    /// Whether the event has been signalled since it was last armed
    pub fn is_signalled(&self) -> bool {
        critical_section::with(|cs| self.state.borrow(cs).get().signalled)
    }

    /// Number of tasks currently parked on the event
    pub fn waiters(&self) -> u8 {
        critical_section::with(|cs| self.state.borrow(cs).get().waiters)
    }

    /// Suspends the caller until the event is signalled
    ///
    /// A `timeout_us` of zero waits indefinitely. Returns immediately
    /// when the event is already signalled.
    pub fn wait<O: NandOs>(&self, os: &O, timeout_us: u64) -> Result<(), WaitTimeout> {
        if self.is_signalled() {
            return Ok(());
        }

        self.add_waiter(1);
        let start = os.microseconds();
        let ret = loop {
            os.yield_now();

            if self.is_signalled() {
                break Ok(());
            }

            if timeout_us != 0 && os.microseconds().wrapping_sub(start) > timeout_us {
                break Err(WaitTimeout);
            }
        };
        self.add_waiter(-1);

        ret
    }

    /// Re-arms the event for the next transfer
    pub(crate) fn reset(&self) {
        critical_section::with(|cs| {
            self.state.borrow(cs).set(EventState {
                signalled: false,
                waiters: 0,
            })
        });
    }

    fn add_waiter(&self, delta: i8) {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            state.waiters = state.waiters.wrapping_add(delta as u8);
            cell.set(state);
        });
    }
}

impl fmt::Debug for DmaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DmaEvent")
            .field("signalled", &self.is_signalled())
            .finish()
    }
}

/// The process-wide set of CDMA completion events
///
/// Platforms keep one static instance and route every CDMA interrupt to
/// [`complete`](DmaEvents::complete).
#[derive(Debug)]
pub struct DmaEvents {
    events: [DmaEvent; CHANNEL_COUNT],
}

impl DmaEvents {
    /// A new event set with every channel clear
    pub const fn new() -> Self {
        const CLEAR: DmaEvent = DmaEvent::new();
        DmaEvents {
            events: [CLEAR; CHANNEL_COUNT],
        }
    }

    /// The event of `channel`
    pub fn event(&self, channel: u32) -> &DmaEvent {
        &self.events[channel as usize]
    }

    /// Reports a completion interrupt on `channel`
    pub fn complete(&self, channel: u32) -> bool {
        self.events[channel as usize].complete()
    }
}

impl Default for DmaEvents {
    fn default() -> Self {
        DmaEvents::new()
    }
}
