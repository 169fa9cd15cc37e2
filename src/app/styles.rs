// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use yansi::{Color, Style};

pub static ATTENTION: Style = Color::Yellow.bold();
pub static ERROR: Style = Color::Red.bold();
pub static EMPH: Style = Color::White.bold();
pub static OK: Style = Color::Green.bold();
pub static DIMMED: Style = Style::new().dim();

pub const CAPTION_PREFIX: &str = "▶︎";
pub const ERROR_PREFIX: &str = "⚡︎";
pub const INFO_PREFIX: &str = "▸";
pub const ITEMAZATION_PREFIX: &str = "∙";

pub fn no_color_mode() {
    yansi::disable();
}
