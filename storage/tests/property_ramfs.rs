//! Property: RamFs positioned I/O behaves like a growable byte vector, and
//! inodes survive exactly as long as a name or a handle refers to them.

use proptest::prelude::*;
use storage::{OpenFlags, RamFs, StorageBackend};

#[derive(Debug, Clone)]
enum Op {
    Write { offset: u64, data: Vec<u8> },
    Read { offset: u64, len: usize },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..2048u64, prop::collection::vec(any::<u8>(), 0..256))
            .prop_map(|(offset, data)| Op::Write { offset, data }),
        (0..3000u64, 0..512usize).prop_map(|(offset, len)| Op::Read { offset, len }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn positioned_io_matches_vec(ops in prop::collection::vec(arb_op(), 1..60)) {
        let fs = RamFs::new();
        let handle = fs.create("f").unwrap();
        let mut model: Vec<u8> = Vec::new();

        for op in ops {
            match op {
                Op::Write { offset, data } => {
                    prop_assert_eq!(fs.write_at(handle, offset, &data).unwrap(), data.len());
                    let end = offset as usize + data.len();
                    if model.len() < end {
                        model.resize(end, 0);
                    }
                    model[offset as usize..offset as usize + data.len()].copy_from_slice(&data);
                }
                Op::Read { offset, len } => {
                    let mut buf = vec![0u8; len];
                    let n = fs.read_at(handle, offset, &mut buf).unwrap();
                    let start = (offset as usize).min(model.len());
                    let end = (start + len).min(model.len());
                    prop_assert_eq!(&buf[..n], &model[start..end]);
                }
            }
            prop_assert_eq!(fs.len(handle).unwrap(), model.len() as u64);
        }
        fs.release(handle);
        prop_assert_eq!(fs.contents("f"), Some(model));
    }

    #[test]
    fn inode_lives_until_name_and_handles_are_gone(
        handles in 1..6usize,
        unlink_after in 0..6usize,
    ) {
        let fs = RamFs::new().with_file("f", b"data").unwrap();
        let opened: Vec<_> = (0..handles).map(|_| fs.open("f", OpenFlags::OPEN).unwrap()).collect();
        let unlink_after = unlink_after.min(handles);

        for handle in &opened[..unlink_after] {
            fs.release(*handle);
        }
        fs.unlink("f").unwrap();
        prop_assert!(!fs.exists("f"));

        let remaining = &opened[unlink_after..];
        prop_assert_eq!(fs.inode_count(), usize::from(!remaining.is_empty()));
        for handle in remaining {
            let mut buf = [0u8; 4];
            prop_assert_eq!(fs.read_at(*handle, 0, &mut buf).unwrap(), 4);
            fs.release(*handle);
        }
        prop_assert_eq!(fs.inode_count(), 0);
        prop_assert_eq!(fs.open_handles(), 0);
    }
}
