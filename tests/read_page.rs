mod util;

use h2fmi::ReadError;
use util::*;

#[test]
fn clean_read_copies_data_and_pads_metadata() {
    let (mut nand, os, log, regs) = controller_with_chips(&[0, 8], ID_7294D7EC);
    nand.init(&mut os.delay()).unwrap();

    let mut data = vec![0u8; 0x2000];
    let mut meta = [0u8; 12];
    nand.read_single_page(0, 0, &mut data, Some(&mut meta), None, None, true)
        .unwrap();

    for (i, &byte) in data.iter().enumerate() {
        assert_eq!(byte, i as u8);
    }

    // Ten ECC-covered metadata bytes, then 0xFF out to the logical
    // metadata size.
    assert_eq!(&meta[..10], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    assert_eq!(&meta[10..], &[0xFF, 0xFF]);

    // The transfer engine was programmed for a 16-sector page with
    // 16-bit ECC and ten metadata bytes.
    assert_eq!(regs[0].FMI_CONFIG.read(), 0x64A2A);

    let ops = log.borrow().clone();
    let begins: Vec<_> = ops
        .iter()
        .filter_map(|op| match op {
            DmaOp::Begin {
                channel,
                size,
                word_size,
                burst_size,
                ..
            } => Some((*channel, *size, *word_size, *burst_size)),
            _ => None,
        })
        .collect();

    // Page data in 4-byte words with 8-word bursts, metadata byte-wise.
    assert_eq!(begins, vec![(5, 0x2000, 4, 8), (6, 10, 1, 1)]);
    assert!(ops.contains(&DmaOp::Cancel { channel: 5 }));
    assert!(ops.contains(&DmaOp::Cancel { channel: 6 }));
}

#[test]
fn metadata_is_dewhitened() {
    let (mut nand, os, _log, _regs) = controller_with_chips(&[0, 8], ID_7294D7EC);
    nand.init(&mut os.delay()).unwrap();
    nand.enable_data_whitening(true);

    let page = 7u32;
    let mut data = vec![0u8; 0x2000];
    let mut meta = [0u8; 12];
    nand.read_single_page(0, page, &mut data, Some(&mut meta), None, None, true)
        .unwrap();

    // The first three metadata words are mixed with the seeded stream
    // at (word + page) mod 256; the pad bytes overwrite the tail after.
    // Only the first ten scratch bytes carry transferred metadata; the
    // tail of the third word mixes over zeroes.
    let scratch = |i: usize| if i < 10 { i as u8 } else { 0 };
    let mut expected = [0u8; 12];
    for word in 0..3usize {
        let raw = u32::from_le_bytes([
            scratch(word * 4),
            scratch(word * 4 + 1),
            scratch(word * 4 + 2),
            scratch(word * 4 + 3),
        ]);
        let mixed = raw ^ whitening_word(word + page as usize);
        expected[word * 4..word * 4 + 4].copy_from_slice(&mixed.to_le_bytes());
    }
    expected[10] = 0xFF;
    expected[11] = 0xFF;

    assert_eq!(meta, expected);
}

#[test]
fn blank_page_reads_not_found() {
    let (mut nand, os, _log, _regs) = controller_with_chips(&[0, 8], ID_7294D7EC);
    nand.init(&mut os.delay()).unwrap();

    os.with_model(|model| model.config.ecc_summary = 0x40);

    let mut data = vec![0u8; 0x2000];
    let mut per_page = [0xA5u8; 1];
    let mut per_sector = [0u8; 16];
    let err = nand
        .read_single_page(
            0,
            0,
            &mut data,
            None,
            Some(&mut per_page),
            Some(&mut per_sector),
            true,
        )
        .unwrap_err();

    assert_eq!(err, ReadError::NotFound);
    assert_eq!(per_sector, [0xFE; 16]);
    assert_eq!(per_page, [0]);
}

#[test]
fn uncorrectable_page_reads_not_found() {
    let (mut nand, os, _log, _regs) = controller_with_chips(&[0, 8], ID_7294D7EC);
    nand.init(&mut os.delay()).unwrap();

    os.with_model(|model| {
        model.config.ecc_summary = 8;
        model.config.ecc_result = 1;
    });

    let mut data = vec![0u8; 0x2000];
    let mut per_sector = [0u8; 16];
    let err = nand
        .read_single_page(0, 0, &mut data, None, None, Some(&mut per_sector), true)
        .unwrap_err();

    assert_eq!(err, ReadError::NotFound);
    assert_eq!(per_sector, [0xFF; 16]);
}

#[test]
fn corrected_bits_are_reported() {
    let (mut nand, os, _log, _regs) = controller_with_chips(&[0, 8], ID_7294D7EC);
    nand.init(&mut os.delay()).unwrap();

    os.with_model(|model| model.config.ecc_result = 3 << 16);

    let mut data = vec![0u8; 0x2000];
    let mut per_page = [0u8; 1];
    let mut per_sector = [0u8; 16];
    nand.read_single_page(
        0,
        0,
        &mut data,
        None,
        Some(&mut per_page),
        Some(&mut per_sector),
        true,
    )
    .unwrap();

    assert_eq!(per_page, [3]);
    assert_eq!(per_sector, [3; 16]);
}

#[test]
fn device_read_addresses_by_block() {
    let (mut nand, os, _log, _regs) = controller_with_chips(&[0, 8], ID_7294D7EC);
    nand.init(&mut os.delay()).unwrap();

    let mut data = vec![0u8; 0x2000];
    let mut spare = [0u8; 12];
    nand.read_device_page(1, 2, 5, &mut data, Some(&mut spare))
        .unwrap();

    assert_eq!(&spare[10..], &[0xFF, 0xFF]);
}

#[test]
fn unmapped_ce_is_an_io_error() {
    let (mut nand, os, _log, _regs) = controller_with_chips(&[0, 8], ID_7294D7EC);
    nand.init(&mut os.delay()).unwrap();

    let mut data = vec![0u8; 0x2000];
    let err = nand
        .read_single_page(7, 0, &mut data, None, None, None, true)
        .unwrap_err();
    assert_eq!(err, ReadError::Io);
}
