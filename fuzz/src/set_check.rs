#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use augset::AugmentedSet;

const LO: i64 = -1024;
const HI: i64 = 1024;

#[derive(Arbitrary, Debug)]
enum SetMethod {
    Find { key: i16 },
    Insert { key: i16, val: u32 },
    Remove { key: i16 },
    Len,
    CountBelow { key: i16 },
    CountFrom { key: i16 },
}

fuzz_target!(|methods: Vec<SetMethod>| {
    let set = AugmentedSet::<i64, u32>::with_range(LO, HI);
    let mut model = BTreeMap::<i64, u32>::new();

    for m in &methods {
        match m {
            SetMethod::Find { key } => {
                let k = i64::from(*key);
                assert_eq!(set.find(k), model.get(&k).copied());
            }
            SetMethod::Insert { key, val } => {
                let k = i64::from(*key);
                let changed = set.insert(k, *val);
                let expected = (LO..HI).contains(&k) && !model.contains_key(&k);
                assert_eq!(changed, expected);
                if changed {
                    model.insert(k, *val);
                }
            }
            SetMethod::Remove { key } => {
                let k = i64::from(*key);
                assert_eq!(set.remove(k), model.remove(&k).is_some());
            }
            SetMethod::Len => {
                assert_eq!(set.len(), model.len());
            }
            SetMethod::CountBelow { key } => {
                let k = i64::from(*key);
                assert_eq!(set.count_range(..k), model.range(..k).count());
            }
            SetMethod::CountFrom { key } => {
                let k = i64::from(*key);
                assert_eq!(set.count_range(k..), model.range(k..).count());
            }
        }
    }

    assert!(set.stats().consistent);
});
