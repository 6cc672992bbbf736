#![no_main]

use libfuzzer_sys::fuzz_target;

use dagnet_messages::Frame;

// Frames arrive from untrusted peers, whole or as a byte stream.
fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = Frame::decode(data) {
        let _ = frame.encode();
    }

    let mut rest = data;
    while let Ok(Some((_, used))) = Frame::decode_prefix(rest) {
        if used == 0 || used > rest.len() {
            panic!("decode_prefix consumed {used} of {} bytes", rest.len());
        }
        rest = &rest[used..];
    }
});
