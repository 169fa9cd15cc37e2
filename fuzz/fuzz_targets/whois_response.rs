#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    use dnshunter::services::whois::parser::{parse_as_overview, parse_geo_location, parse_network_info};
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = parse_network_info(s);
        let _ = parse_as_overview(s);
        let _ = parse_geo_location(s);
    }
});
