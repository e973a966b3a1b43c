#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use qasa_psa::secure_memory::SecureBytes;

#[derive(Arbitrary, Debug)]
enum Op {
    Extend(Vec<u8>),
    Drain(u16),
    Clear,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut buffer = SecureBytes::with_capacity(16);
    let mut model: Vec<u8> = Vec::new();
    for op in ops {
        match op {
            Op::Extend(data) => {
                buffer.extend_from_slice(&data);
                model.extend_from_slice(&data);
            }
            Op::Drain(n) => {
                let n = (n as usize).min(model.len());
                buffer.drain_front(n);
                model.drain(..n);
            }
            Op::Clear => {
                buffer.clear();
                model.clear();
            }
        }
        assert_eq!(buffer.as_bytes(), &model[..]);
        assert_eq!(buffer.len(), model.len());
    }
});
