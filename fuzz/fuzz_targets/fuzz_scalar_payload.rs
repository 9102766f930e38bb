#![no_main]

use libfuzzer_sys::fuzz_target;
use telemvault_protocol::{decode_scalar_payload, encode_scalar_payload, SCALAR_PAYLOAD_LEN};

fuzz_target!(|data: &[u8]| {
    match decode_scalar_payload(data) {
        Some(value) => {
            assert_eq!(data.len(), SCALAR_PAYLOAD_LEN);
            assert_eq!(encode_scalar_payload(value).as_slice(), data);
        }
        None => assert_ne!(data.len(), SCALAR_PAYLOAD_LEN),
    }
});
