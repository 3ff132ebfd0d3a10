//! Note names in scientific pitch notation.
//!
//! `c4` is key 60, `a4` is key 69. Sharps are written `#`, flats `b`
//! (`c#4` and `db4` are both key 61). Octaves run from -1 (`c-1` = 0) to 9
//! (`g9` = 127). Parsing is case-insensitive.

use crate::error::{Error, Result};
use crate::pitch::MAX_KEY;

const SHARP_NAMES: [&str; 12] = [
    "c", "c#", "d", "d#", "e", "f", "f#", "g", "g#", "a", "a#", "b",
];

fn pitch_class(letter: char) -> Option<i32> {
    match letter {
        'c' => Some(0),
        'd' => Some(2),
        'e' => Some(4),
        'f' => Some(5),
        'g' => Some(7),
        'a' => Some(9),
        'b' => Some(11),
        _ => None,
    }
}

pub fn name_to_key(name: &str) -> Result<u8> {
    let unknown = || Error::UnknownNoteName(name.to_string());
    let lower = name.trim().to_ascii_lowercase();
    let mut chars = lower.chars();

    let letter = chars.next().ok_or_else(unknown)?;
    let mut class = pitch_class(letter).ok_or_else(unknown)?;

    let rest = chars.as_str();
    let octave_str = if let Some(stripped) = rest.strip_prefix('#') {
        class += 1;
        stripped
    } else if let Some(stripped) = rest.strip_prefix('b') {
        class -= 1;
        stripped
    } else {
        rest
    };

    let octave: i32 = octave_str.parse().map_err(|_| unknown())?;
    if !(-1..=9).contains(&octave) {
        return Err(unknown());
    }

    let key = class + 12 * (octave + 1);
    if key < 0 || key > MAX_KEY as i32 {
        return Err(unknown());
    }
    Ok(key as u8)
}

/// Sharp spelling of a key number, e.g. `61` → `"c#4"`.
pub fn key_to_name(key: u8) -> String {
    let key = key.min(MAX_KEY) as i32;
    let octave = key / 12 - 1;
    format!("{}{}", SHARP_NAMES[(key % 12) as usize], octave)
}
