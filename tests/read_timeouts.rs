mod util;

use h2fmi::ReadError;
use util::*;

#[test]
fn stuck_busy_die_times_out_without_arming_dma() {
    let (mut nand, os, log, _regs) = controller_with_chips(&[0, 8], ID_7294D7EC);
    nand.init(&mut os.delay()).unwrap();

    os.with_model(|model| model.config.fmi_status = 4);
    os.set_tick_us(500);

    let mut data = vec![0u8; 0x2000];
    let err = nand
        .read_single_page(0, 0, &mut data, None, None, None, true)
        .unwrap_err();
    assert_eq!(err, ReadError::Io);

    // The engine never reached the transfer phase.
    let ops = log.borrow().clone();
    assert!(!ops.iter().any(|op| matches!(op, DmaOp::Begin { .. })));
    assert!(ops.contains(&DmaOp::Cancel { channel: 5 }));
    assert!(ops.contains(&DmaOp::Cancel { channel: 6 }));
}

#[test]
fn missing_status_completion_times_out() {
    let (mut nand, os, log, _regs) = controller_with_chips(&[0, 8], ID_7294D7EC);
    nand.init(&mut os.delay()).unwrap();

    // Page-done stays asserted but the status-read completion never
    // fires, so the transfer phase is never entered.
    os.with_model(|model| model.config.int_pend = 2);
    os.set_tick_us(500);

    let mut data = vec![0u8; 0x2000];
    let err = nand
        .read_single_page(0, 0, &mut data, None, None, None, true)
        .unwrap_err();
    assert_eq!(err, ReadError::Io);

    let ops = log.borrow().clone();
    assert!(!ops.iter().any(|op| matches!(op, DmaOp::Begin { .. })));
}

#[test]
fn missing_page_done_times_out_after_arming() {
    let (mut nand, os, log, _regs) = controller_with_chips(&[0, 8], ID_7294D7EC);
    nand.init(&mut os.delay()).unwrap();

    os.with_model(|model| model.config.int_pend = 0x100);
    os.set_tick_us(500);

    let mut data = vec![0u8; 0x2000];
    let err = nand
        .read_single_page(0, 0, &mut data, None, None, None, true)
        .unwrap_err();
    assert_eq!(err, ReadError::Io);

    // The grid transfer was armed before the page-done wait wedged.
    let ops = log.borrow().clone();
    assert!(ops.iter().any(|op| matches!(op, DmaOp::Begin { channel: 5, .. })));
    assert!(ops.contains(&DmaOp::Cancel { channel: 5 }));
}
