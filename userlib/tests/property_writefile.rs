//! Property: `writefile.coff` copies any `test.txt` to the console unchanged,
//! regardless of how its size lines up with the copy buffer.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use proptest::prelude::*;
use storage::RamFs;
use userlib::programs::BUFSIZE;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn console_receives_file_contents(
        extra in 0..BUFSIZE,
        blocks in 0..4usize,
        seed in any::<u8>(),
    ) {
        let body: Vec<u8> = (0..blocks * BUFSIZE + extra)
            .map(|i| b'a' + ((i as u8).wrapping_add(seed) % 26))
            .collect();
        let kernel = userlib::boot(RamFs::new().with_file("test.txt", &body).unwrap());
        kernel.spawn_init("writefile.coff", &["writefile.coff"]).unwrap();

        let (tx, rx) = mpsc::channel();
        let waiter = Arc::clone(&kernel);
        thread::spawn(move || {
            waiter.wait_for_halt();
            let _ = tx.send(());
        });
        prop_assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        prop_assert_eq!(kernel.console().output(), body);
    }
}
