//! Hexdump formatting for dumped memory

use std::fmt::Write;

/// Bytes per line
pub const WIDTH: usize = 16;

/// Dumps larger than this are not printed by default
pub const PRINT_LIMIT: usize = 0x400;

/// Format `data` as `AAAAAA  HH HH ..  ascii`, one line per 16 bytes
///
/// `start` is the address of the first byte. The hex column is padded so
/// the ASCII column lines up on a short final line.
pub fn hexdump(data: &[u8], start: u32) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(WIDTH) * 80);
    for (i, chunk) in data.chunks(WIDTH).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let addr = start.wrapping_add((i * WIDTH) as u32);
        let mut hex = String::with_capacity(WIDTH * 3);
        for (j, b) in chunk.iter().enumerate() {
            if j > 0 {
                hex.push(' ');
            }
            let _ = write!(hex, "{:02X}", b);
        }
        let ascii: String = chunk
            .iter()
            .map(|&b| if (0x20..0x7F).contains(&b) { b as char } else { '.' })
            .collect();
        let _ = write!(out, "{:06X}  {:<w$}  {}", addr, hex, ascii, w = WIDTH * 3);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let line = hexdump(b"SERDB\x00\xff", 0x4400);
        assert_eq!(
            line,
            format!("004400  {:<48}  SERDB..", "53 45 52 44 42 00 FF")
        );
    }

    #[test]
    fn test_multi_line_addresses() {
        let data: Vec<u8> = (0..20).collect();
        let dump = hexdump(&data, 0x100000);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("100000  00 01 02"));
        assert!(lines[1].starts_with("100010  10 11 12 13 "));
        // ASCII column starts at the same place on both lines
        assert_eq!(lines[0].len(), 6 + 2 + 48 + 2 + 16);
        assert_eq!(lines[1].len(), 6 + 2 + 48 + 2 + 4);
    }

    #[test]
    fn test_empty() {
        assert_eq!(hexdump(&[], 0), "");
    }
}
