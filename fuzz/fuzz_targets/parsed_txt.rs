#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    use dnshunter::resources::parsed_txt::{Dmarc, Spf};
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = Spf::from_str(s);
        let _ = Dmarc::from_str(s);
    }
});
