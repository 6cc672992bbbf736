#![no_main]

use libfuzzer_sys::fuzz_target;

use dagnet_transactions::{check_well_formed, Transaction};
use dagnet_types::HashId;

// Strict decoding must never panic, and whatever it accepts must encode
// back to the same bytes.
fuzz_target!(|data: &[u8]| {
    let Ok(tx) = Transaction::decode(data) else {
        return;
    };
    assert_eq!(tx.encode(), data, "decode accepted a non-canonical encoding");

    for hash_id in [HashId::Blake3, HashId::Sha3_256] {
        let _ = check_well_formed(&tx, hash_id);
    }
});
