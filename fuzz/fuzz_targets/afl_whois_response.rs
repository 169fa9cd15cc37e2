#[macro_use]
extern crate afl;

fn main() {
    use dnshunter::services::whois::parser::{parse_as_overview, parse_geo_location, parse_network_info};
    fuzz!(|data: &[u8]| {
        if let Ok(s) = std::str::from_utf8(data) {
            let _ = parse_network_info(s);
            let _ = parse_as_overview(s);
            let _ = parse_geo_location(s);
        }
    });
}
