use h2fmi::TimingSetup;
use proptest::prelude::*;

/// Interface clock period as the derivation truncates it
fn period_ns(clock_hz: u32) -> u32 {
    ((1_000_000_000u64 / (clock_hz as u64 / 1000)) / 1000) as u32
}

#[test]
fn golden_board_row_at_96mhz() {
    // The 30/15/10ns read and write row shared by the 0x7294D7EC
    // boards, against the controller's 10/6/3/3ns delay profile.
    let setup = TimingSetup {
        clock_hz: 96_000_000,
        output_delay_ns: 10,
        pad_delay_ns: 6,
        sample_delay_ns: 3,
        strobe_delay_ns: 3,
        write_cycle_ns: 0x1E,
        write_pulse_ns: 0xF,
        write_hold_ns: 0xA,
        turnaround_ns: 0x19,
        ready_setup_ns: 0xF,
        read_cycle_ns: 0x1E,
        read_pulse_ns: 0xF,
        read_hold_ns: 0xA,
    };

    assert_eq!(setup.derive(), [2, 1, 1, 2, 1]);
    assert_eq!(setup.register_value(), 0x12121);
}

proptest! {
    #[test]
    fn derived_counts_cover_their_requirements(
        clock in 20_000_000u32..200_000_000,
        read_cycle in 10u32..60,
        read_pulse in 5u32..40,
        read_hold in 5u32..40,
        write_cycle in 10u32..60,
        write_pulse in 5u32..40,
        write_hold in 5u32..40,
        turnaround in 5u32..60,
    ) {
        let setup = TimingSetup {
            clock_hz: clock,
            output_delay_ns: 10,
            pad_delay_ns: 6,
            sample_delay_ns: 3,
            strobe_delay_ns: 3,
            write_cycle_ns: write_cycle,
            write_pulse_ns: write_pulse,
            write_hold_ns: write_hold,
            turnaround_ns: turnaround,
            ready_setup_ns: 15,
            read_cycle_ns: read_cycle,
            read_pulse_ns: read_pulse,
            read_hold_ns: read_hold,
        };

        let t = setup.derive();
        let period = period_ns(clock);

        // Every count covers its nanosecond requirement once the
        // sequencer's implicit cycle is added back.
        prop_assert!((t[0] as u32 + 1) * period >= write_pulse + 6);
        prop_assert!((t[3] as u32 + 1) * period >= read_pulse + 6);
        prop_assert!((t[1] as u32 + 1) * period >= write_hold + 10);
        prop_assert!((t[4] as u32 + 1) * period >= read_hold + 10);

        // Pulse plus hold spans the whole read cycle.
        prop_assert!((t[3] as u32 + t[4] as u32 + 1) * period >= read_cycle);

        // The sample count absorbs what the write pulse left of the
        // data window.
        let covered = (t[0] as u32 + 1) * period;
        let data_window = turnaround + 3 + 6;
        prop_assert!(t[2] as u32 * period >= data_window.saturating_sub(covered));
    }
}
