// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for decoding untrusted bytes with every codec

#![no_main]

use libfuzzer_sys::fuzz_target;
use omnikv_store::conformance::Foo;
use omnikv_store::{Codec, Encoding, StoreError};

fuzz_target!(|data: &[u8]| {
    for encoding in [Encoding::Json, Encoding::Cbor, Encoding::Postcard] {
        // Garbage must come back as a deserialization error, never a panic
        match encoding.decode::<Vec<Foo>>(data) {
            Ok(value) => {
                // Anything that decodes must re-encode
                let bytes = encoding.marshal(&value).expect("decoded value re-encodes");
                let again: Vec<Foo> = encoding.decode(&bytes).expect("re-encoded value decodes");
                assert_eq!(again, value);
            }
            Err(err) => assert!(matches!(err, StoreError::Deserialization { .. })),
        }

        let _ = encoding.decode::<(bool, f64, String)>(data);
    }
});
