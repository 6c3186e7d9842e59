use crate::prelude::*;

/// Telegram refuses messages longer than this many characters.
pub const MESSAGE_LIMIT: usize = 4096;

pub fn format_date(date: DateTime) -> String {
  date.format("%d.%m.%Y %H:%M").to_string()
}

/// Amounts are whole dinars.
pub fn format_amount(amount: i64) -> String {
  format!("{amount} DZD")
}

pub fn now() -> DateTime {
  Utc::now().naive_utc()
}

/// Splits `text` on line boundaries into chunks of at most `limit` chars
/// (`0` means [`MESSAGE_LIMIT`]). A single overlong line is cut hard.
/// Never returns an empty vector.
pub fn chunk_message(text: &str, limit: usize) -> Vec<String> {
  let limit = if limit == 0 { MESSAGE_LIMIT } else { limit };
  let mut chunks = Vec::new();
  let mut current = String::new();
  let mut len = 0;

  for line in text.split_inclusive('\n') {
    let line_len = line.chars().count();
    if len + line_len > limit && !current.is_empty() {
      chunks.push(std::mem::take(&mut current));
      len = 0;
    }
    if line_len > limit {
      let chars: Vec<char> = line.chars().collect();
      for piece in chars.chunks(limit) {
        chunks.push(piece.iter().collect());
      }
      continue;
    }
    current.push_str(line);
    len += line_len;
  }

  if !current.is_empty() || chunks.is_empty() {
    chunks.push(current);
  }
  chunks
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_short_text_is_one_chunk() {
    assert_eq!(chunk_message("hello\nworld", 0), vec!["hello\nworld"]);
    assert_eq!(chunk_message("", 0), vec![""]);
  }

  #[test]
  fn test_splits_on_lines() {
    let chunks = chunk_message("aaaa\nbbbb\ncccc\n", 10);
    assert_eq!(chunks, vec!["aaaa\nbbbb\n", "cccc\n"]);
  }

  #[test]
  fn test_cuts_overlong_line() {
    let chunks = chunk_message("abcdefgh", 3);
    assert_eq!(chunks, vec!["abc", "def", "gh"]);
  }

  #[test]
  fn test_format_amount() {
    assert_eq!(format_amount(2000), "2000 DZD");
  }
}
