//! Hardware Abstraction Layer for the H2FMI NAND Flash Memory Interface
//! found on the S5L8920 family of SoCs
//!
//! The controller consists of two identical FMI buses, each addressing up
//! to 8 NAND dies through a chip-enable mask, with an inline AES/ECC path
//! and a pair of DMA channels per bus. This crate drives device
//! identification, geometry and timing derivation, and the multi-page
//! read engine, and exposes the NAND-device surface consumed by a
//! Virtual Flash Layer.
//!
//! # Hardware interface
//!
//! The crate binds to a platform through three traits:
//!
//! * [`FmiPeripheral`] — register block and clock gate of one FMI bus
//! * [`NandOs`] — monotonic microsecond time and cooperative yielding
//! * [`dma::DmaController`] — the CDMA engine that moves page data and
//!   applies the inline AES descriptor
//!
//! DMA completion interrupts are reported back through
//! [`dma::DmaEvents::complete`] from the platform's IRQ handler.
//!
//! # Usage
//!
//! Construct an [`H2fmi`] controller from the two bus peripherals and
//! identify the array:
//!
//! ```rust,ignore
//!     let mut nand = H2fmi::new([fmi0, fmi1], cdma, os, events);
//!     nand.init(&mut delay)?;
//!
//!     let bytes_per_page = nand.geometry().bytes_per_page;
//!     nand.read_single_page(0, 0, &mut page, Some(&mut meta), None, None, false)?;
//! ```
//!
//! ## License
//!
//! Licensed under either of
//!
//!  * Apache License, Version 2.0
//!    ([LICENSE-APACHE](LICENSE-APACHE) or http://www.apache.org/licenses/LICENSE-2.0)
//!  * MIT license
//!    ([LICENSE-MIT](LICENSE-MIT) or http://opensource.org/licenses/MIT)
//!
//! at your option.
#![no_std]
// rustc lints.
#![warn(
    bare_trait_objects,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_qualifications,
    unused_results
)]

#[macro_use]
mod macros;

pub mod ral;

mod devices;
pub use devices::{BoardId, ChipId, CHIP_COUNT, CHIP_ID_LENGTH};

mod timing;
pub use timing::TimingSetup;

mod geometry;
pub use geometry::NandGeometry;

pub mod dma;

mod aes;
pub use aes::AesDescriptor;

mod bus;

mod read;

mod controller;
pub use controller::{H2fmi, InfoKey, InitError, ReadError};

/// A trait for one FMI bus peripheral. Implement this to bind the driver
/// to a hardware platform. The register window behind [`register_block`]
/// must have the H2FMI layout described in [`ral::fmi`].
///
/// Both buses of the controller are instances of the same peripheral
/// type; each instance carries its own register window and clock gate.
///
/// [`register_block`]: FmiPeripheral::register_block
pub unsafe trait FmiPeripheral: Send {
    /// Pointer to this instance's register block
    fn register_block(&self) -> *const ();

    /// Switches the bus clock gate on
    fn enable(&mut self);

    /// Pulses the bus clock gate reset
    fn reset(&mut self);

    /// The frequency of the NAND interface clock, used to derive the
    /// timing register
    fn nand_clock_hz(&self) -> u32;
}

/// Cooperative scheduling and time services the driver suspends through.
///
/// The driver never sleeps; every wait is a poll loop that reads
/// [`microseconds`] and calls [`yield_now`] between iterations so other
/// tasks can run.
///
/// [`microseconds`]: NandOs::microseconds
/// [`yield_now`]: NandOs::yield_now
pub trait NandOs {
    /// Monotonic microsecond counter
    fn microseconds(&self) -> u64;

    /// Frequency of the timebase behind [`microseconds`], used to scale
    /// the long transfer deadlines
    ///
    /// [`microseconds`]: NandOs::microseconds
    fn timebase_hz(&self) -> u32;

    /// Gives up the processor to other runnable tasks
    fn yield_now(&self);
}
