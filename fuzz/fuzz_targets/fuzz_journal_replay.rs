#![no_main]

use libfuzzer_sys::fuzz_target;
use telemvault_core::journal::Journal;

// Arbitrary bytes on disk must never panic the replay path; corrupt
// or truncated journals surface as errors.
fuzz_target!(|data: &[u8]| {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("journal.log");
    std::fs::write(&path, data).expect("write fuzz input");

    if let Ok((mut journal, entries)) = Journal::open_or_create(&path) {
        for entry in &entries {
            let _ = journal.append(entry);
        }
    }
});
