//! Derivation of the NAND interface timing register
//!
//! The FMC sequencer runs from the NAND interface clock; the board's
//! nanosecond timing requirements are converted into clock-cycle counts
//! and packed into the five nibbles of `FMC_IF_CTRL`. The packing and
//! rounding behavior are part of the hardware contract.

use crate::devices::{TimingInfo, CONTROLLER_DELAYS};

/// Inputs to the timing derivation: the interface clock plus the board's
/// nanosecond requirements and the controller's internal signal delays
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimingSetup {
    /// NAND interface clock in Hz
    pub clock_hz: u32,
    /// Controller output-path delay
    pub output_delay_ns: u32,
    /// Controller pad round-trip delay
    pub pad_delay_ns: u32,
    /// Controller data sample delay
    pub sample_delay_ns: u32,
    /// Controller strobe delay
    pub strobe_delay_ns: u32,
    /// Write cycle time of the die
    pub write_cycle_ns: u32,
    /// WE# pulse width
    pub write_pulse_ns: u32,
    /// WE# high hold time
    pub write_hold_ns: u32,
    /// Write-to-read turnaround time
    pub turnaround_ns: u32,
    /// Ready-to-data setup time
    pub ready_setup_ns: u32,
    /// Read cycle time of the die
    pub read_cycle_ns: u32,
    /// RE# pulse width
    pub read_pulse_ns: u32,
    /// RE# high hold time
    pub read_hold_ns: u32,
}

impl TimingSetup {
    /// Builds the derivation inputs from a matched timing row and the
    /// controller delay profile
    pub(crate) fn from_board(clock_hz: u32, info: &TimingInfo) -> Self {
        TimingSetup {
            clock_hz,
            output_delay_ns: CONTROLLER_DELAYS[3] as u32,
            pad_delay_ns: CONTROLLER_DELAYS[4] as u32,
            sample_delay_ns: CONTROLLER_DELAYS[5] as u32,
            strobe_delay_ns: CONTROLLER_DELAYS[6] as u32,
            write_cycle_ns: info.write_cycle_ns as u32,
            write_pulse_ns: info.write_pulse_ns as u32,
            write_hold_ns: info.write_hold_ns as u32,
            turnaround_ns: info.turnaround_ns as u32,
            ready_setup_ns: info.ready_setup_ns as u32,
            read_cycle_ns: info.read_cycle_ns as u32,
            read_pulse_ns: info.read_pulse_ns as u32,
            read_hold_ns: info.read_hold_ns as u32,
        }
    }

    /// Derives the five timing cycle counts
    ///
    /// Each count is the number of whole interface-clock periods needed
    /// to cover the corresponding nanosecond requirement, less the cycle
    /// the sequencer always inserts.
    pub fn derive(&self) -> [u8; 5] {
        // Interface clock period, truncated to whole nanoseconds.
        let period = ((1_000_000_000u64 / (self.clock_hz as u64 / 1000)) / 1000) as u32;

        let read_pulse = cycles_for(period, self.read_pulse_ns + self.pad_delay_ns);
        let read_slack = self.read_cycle_ns.saturating_sub(read_pulse * period);

        let write_pulse = cycles_for(period, self.write_pulse_ns + self.pad_delay_ns);

        // Time already covered by the write pulse plus the implicit cycle.
        let covered = (write_pulse + 1) * period;

        let data_window = self.turnaround_ns + self.sample_delay_ns + self.pad_delay_ns;
        let cycle_floor = core::cmp::max(self.write_cycle_ns, data_window);

        let hold_slack = cycle_floor.saturating_sub(covered);
        let window_slack = data_window.saturating_sub(covered);

        let write_hold = cycles_for(
            period,
            core::cmp::max(self.write_hold_ns + self.output_delay_ns, hold_slack),
        );
        // Round the remaining data window up to whole periods.
        let sample = (period + window_slack - 1) / period;
        let read_hold = cycles_for(
            period,
            core::cmp::max(self.output_delay_ns + self.read_hold_ns, read_slack),
        );

        [
            write_pulse as u8,
            write_hold as u8,
            sample as u8,
            read_pulse as u8,
            read_hold as u8,
        ]
    }

    /// Derives the cycle counts and packs them into the `FMC_IF_CTRL`
    /// register value
    pub fn register_value(&self) -> u32 {
        pack(self.derive())
    }
}

/// Packs the five derived cycle counts into the `FMC_IF_CTRL` layout
pub(crate) fn pack(t: [u8; 5]) -> u32 {
    (t[4] as u32 & 0xF)
        | ((t[3] as u32 & 0xF) << 4)
        | ((t[1] as u32 & 0xF) << 8)
        | ((t[0] as u32 & 0xF) << 12)
        | ((t[2] as u32 & 0xF) << 16)
}

/// Whole periods covering `ns`, less the implicit sequencer cycle
fn cycles_for(period: u32, ns: u32) -> u32 {
    let cycles = (ns / period) + if ns % period != 0 { 1 } else { 0 };
    cycles.saturating_sub(1)
}
