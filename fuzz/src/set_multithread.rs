#![no_main]

use std::thread;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use augset::AugmentedSet;

const RANGE: i64 = 64;

#[derive(Arbitrary, Debug, Clone)]
enum ThreadOp {
    Insert { key: u8, val: u32 },
    Remove { key: u8 },
    Find { key: u8 },
    Len,
    CountBelow { key: u8 },
}

#[derive(Arbitrary, Debug)]
struct MultithreadInput {
    num_threads: u8,
    thread_ops: Vec<Vec<ThreadOp>>,
}

fuzz_target!(|input: MultithreadInput| {
    // Bound the number of threads and operations to keep fuzzing reasonable.
    let num_threads = ((input.num_threads % 4) + 1) as usize;
    let lanes: Vec<Vec<ThreadOp>> = input
        .thread_ops
        .into_iter()
        .take(num_threads)
        .map(|ops| ops.into_iter().take(256).collect())
        .collect();

    let set = AugmentedSet::<i64, u32>::with_range(0, RANGE);
    thread::scope(|s| {
        for lane in &lanes {
            let set = &set;
            s.spawn(move || {
                for op in lane {
                    match op {
                        ThreadOp::Insert { key, val } => {
                            set.insert(i64::from(*key) % RANGE, *val);
                        }
                        ThreadOp::Remove { key } => {
                            set.remove(i64::from(*key) % RANGE);
                        }
                        ThreadOp::Find { key } => {
                            set.find(i64::from(*key) % RANGE);
                        }
                        ThreadOp::Len => {
                            assert!(set.len() <= RANGE as usize);
                        }
                        ThreadOp::CountBelow { key } => {
                            let k = i64::from(*key) % RANGE;
                            assert!(set.count_range(..k) <= k as usize);
                        }
                    }
                }
            });
        }
    });

    // Quiesced: aggregates must be exact again.
    let stats = set.stats();
    assert!(stats.consistent);
    let present = (0..RANGE).filter(|&k| set.contains(k)).count();
    assert_eq!(set.len(), present);
    assert_eq!(stats.num_occupied, present);
});
