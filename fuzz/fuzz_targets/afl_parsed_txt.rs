#[macro_use]
extern crate afl;

fn main() {
    use dnshunter::resources::parsed_txt::{Dmarc, Spf};
    fuzz!(|data: &[u8]| {
        if let Ok(s) = std::str::from_utf8(data) {
            let _ = Spf::from_str(s);
            let _ = Dmarc::from_str(s);
        }
    });
}
