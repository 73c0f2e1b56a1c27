use std::fmt;
use std::str::FromStr;

use bramble::InputEdit;
use text_size::TextRange;

/// A `START:END:TEXT` replacement given on the command line.
///
/// `TEXT` may use `\n`, `\t` and `\\` escapes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Edit {
    range: TextRange,
    text: String,
}

impl Edit {
    /// Applies the replacement to `text` and describes it for a re-parse.
    pub(crate) fn apply(&self, text: &mut Vec<u8>) -> anyhow::Result<InputEdit> {
        let range = std::ops::Range::<usize>::from(self.range);
        if range.end > text.len() {
            anyhow::bail!("range ends past the end of the text ({} bytes)", text.len());
        }
        let edit = InputEdit::from_byte_replacement(text, self.range, self.text.as_bytes());
        text.splice(range, self.text.bytes());
        Ok(edit)
    }
}

impl FromStr for Edit {
    type Err = String;

    fn from_str(arg: &str) -> Result<Self, Self::Err> {
        let mut parts = arg.splitn(3, ':');
        let (Some(start), Some(end), Some(text)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err("expected START:END:TEXT".to_owned());
        };
        let offset =
            |part: &str| part.parse::<u32>().map_err(|error| format!("`{part}`: {error}"));
        let (start, end) = (offset(start)?, offset(end)?);
        if start > end {
            return Err(format!("start {start} is after end {end}"));
        }
        Ok(Self { range: TextRange::new(start.into(), end.into()), text: unescape(text)? })
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (start, end) = (u32::from(self.range.start()), u32::from(self.range.end()));
        write!(f, "{start}:{end}:{:?}", self.text)
    }
}

fn unescape(text: &str) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => return Err(format!("unknown escape `\\{other}`")),
            None => return Err("trailing `\\`".to_owned()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(arg: &str) -> Edit {
        arg.parse().unwrap()
    }

    #[test]
    fn parses_arguments() {
        let replace = edit("0:1:11");
        assert_eq!(replace.range, TextRange::new(0.into(), 1.into()));
        assert_eq!(replace.text, "11");

        assert_eq!(edit("2:2:a:b").text, "a:b");
        assert_eq!(edit(r"4:4:\n\tx\\").text, "\n\tx\\");
        assert_eq!(edit("3:5:").text, "");

        assert_eq!("1:2".parse::<Edit>().unwrap_err(), "expected START:END:TEXT");
        assert_eq!("2:1:x".parse::<Edit>().unwrap_err(), "start 2 is after end 1");
        assert!("a:1:x".parse::<Edit>().unwrap_err().starts_with("`a`: "));
        assert_eq!(r"0:0:\q".parse::<Edit>().unwrap_err(), r"unknown escape `\q`");
    }

    #[test]
    fn applies_in_place() {
        let mut text = b"1+2+3".to_vec();
        let input_edit = edit("0:1:11").apply(&mut text).unwrap();
        assert_eq!(text, b"11+2+3");
        assert_eq!(u32::from(input_edit.old_end_byte), 1);
        assert_eq!(u32::from(input_edit.new_end_byte), 2);

        edit(r"6:6:\n4").apply(&mut text).unwrap();
        assert_eq!(text, b"11+2+3\n4");
        assert_eq!(edit("0:1:x").to_string(), r#"0:1:"x""#);
        assert!(edit("0:20:x").apply(&mut text).is_err());
    }

    #[test]
    fn applies_to_any_bytes() {
        let mut text = b"1+\xff".to_vec();
        let input_edit = edit("2:3:2").apply(&mut text).unwrap();
        assert_eq!(text, b"1+2");
        assert_eq!(u32::from(input_edit.new_end_byte), 3);
    }
}
