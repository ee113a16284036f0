#![no_main]

use formula_agile_decrypt::{parse_encryption_info, DecryptOptions, DecryptionSession};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Keep password hashing cheap: a parsed descriptor may carry a large spinCount.
    let options = DecryptOptions {
        max_spin_count: 1_000,
        ..DecryptOptions::default()
    };

    let Ok(info) = parse_encryption_info(data, &options) else {
        return;
    };
    let _ = info.version.scheme();

    let mut session = DecryptionSession::with_options(info.header, info.verifier, options);
    let _ = session.verify_password("password");
    let _ = session.open_decrypted_stream(std::io::empty());
});
