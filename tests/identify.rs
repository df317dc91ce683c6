mod util;

use h2fmi::InitError;
use util::*;

#[test]
fn two_bus_pair_identifies() {
    let (mut nand, os, _log, _regs) = controller_with_chips(&[0, 8], ID_7294D7EC);
    nand.init(&mut os.delay()).unwrap();

    assert_eq!(nand.bus_population(0), (0b1, 1));
    assert_eq!(nand.bus_population(1), (0x100, 1));

    let geo = nand.geometry();
    assert_eq!(geo.num_fmi, 2);
    assert_eq!(geo.num_ce, 2);
    assert_eq!(geo.bytes_per_page, 0x2000);
    assert_eq!(geo.sectors_per_page, 16);
    assert_eq!(geo.pages_per_block, 0x80);
    assert_eq!(geo.pages_per_block_2, 0x80);
    assert_eq!(geo.blocks_per_ce, 0x1038);
    assert_eq!(geo.bytes_per_spare, 0x1B4);
    assert_eq!(geo.banks_per_ce, 1);
    assert_eq!(geo.blocks_per_bank, 0x1038);
    assert_eq!(geo.ecc_bits, 0x10);
    assert_eq!(geo.ecc_tag, 12);
    assert_eq!(geo.num_ecc_bytes, 0xA);
    assert_eq!(geo.meta_per_logical_page, 0xC);
    assert_eq!(geo.page_number_bit_width, 0x80);
    assert_eq!(geo.pages_per_ce, 0x80);
    assert_eq!(geo.vendor_type, 1);
    assert!(!geo.is_ppn);

    // 0x1038 blocks per CE is not a power of two: the bank stride is
    // the next power of two, doubled.
    assert_eq!(geo.bank_address_space, 0x4000);
    assert_eq!(geo.total_block_space, 0x1038);
    assert_eq!(geo.block_address_space, 0x4000);
}

#[test]
fn timing_register_programmed_on_both_buses() {
    let (mut nand, os, _log, regs) = controller_with_chips(&[0, 8], ID_7294D7EC);
    nand.init(&mut os.delay()).unwrap();

    // 96 MHz interface clock against the 30/15/10ns board row.
    assert_eq!(regs[0].FMC_IF_CTRL.read(), 0x12121);
    assert_eq!(regs[1].FMC_IF_CTRL.read(), 0x12121);
}

#[test]
fn ce_map_round_robins_buses() {
    let (mut nand, os, _log, _regs) = controller_with_chips(&[0, 1, 8, 9], ID_7294D7EC);
    nand.init(&mut os.delay()).unwrap();

    assert_eq!(nand.bus_population(0), (0b11, 2));
    assert_eq!(nand.bus_population(1), (0b11 << 8, 2));

    // Logical CEs walk the buses in ascending position order; each
    // `(bus, chip)` pair appears exactly once.
    assert_eq!(nand.ce_mapping(0), Some((0, 0)));
    assert_eq!(nand.ce_mapping(1), Some((0, 1)));
    assert_eq!(nand.ce_mapping(2), Some((1, 8)));
    assert_eq!(nand.ce_mapping(3), Some((1, 9)));
    assert_eq!(nand.ce_mapping(4), None);
}

#[test]
fn identification_is_deterministic() {
    let (mut first, os1, _log1, _regs1) = controller_with_chips(&[0, 1, 8, 9], ID_7294D7EC);
    first.init(&mut os1.delay()).unwrap();

    let (mut second, os2, _log2, _regs2) = controller_with_chips(&[0, 1, 8, 9], ID_7294D7EC);
    second.init(&mut os2.delay()).unwrap();

    assert_eq!(first.geometry(), second.geometry());
}

#[test]
fn single_bus_pair_is_unsupported_board() {
    let (mut nand, os, _log, _regs) = controller_with_chips(&[0, 1], ID_7294D7EC);
    let err = nand.init(&mut os.delay()).unwrap_err();
    assert_eq!(err, InitError::UnsupportedBoard);

    // The probe itself found both dies on the primary bus.
    assert_eq!(nand.bus_population(0), (0b11, 2));
    assert_eq!(nand.bus_population(1), (0, 0));
}

#[test]
fn unknown_chip_id_is_unsupported() {
    let unknown = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
    let (mut nand, os, _log, _regs) = controller_with_chips(&[0, 8], unknown);
    assert_eq!(nand.init(&mut os.delay()).unwrap_err(), InitError::UnsupportedChip);
}

#[test]
fn empty_array_is_unsupported() {
    let (mut nand, os, _log, _regs) = controller_with_chips(&[], ID_7294D7EC);
    assert_eq!(nand.init(&mut os.delay()).unwrap_err(), InitError::UnsupportedChip);

    // A floating bus answers 0xFF everywhere, which also becomes the
    // reference id, so every position classifies as populated until the
    // chip table lookup rejects the id.
    assert_eq!(nand.bus_population(0), (0xFFFF, 16));
}
