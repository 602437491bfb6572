//! NDJSON framing: splits a byte stream into lines.

/// Accumulates body chunks and yields complete lines.
///
/// Lines end at `\n`; a trailing `\r` is stripped. Bytes after the last
/// newline are kept until the next chunk completes them.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pops the next complete line, if any.
    pub fn next_line(&mut self) -> Option<String> {
        let newline = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Bytes received after the last newline.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(decoder: &mut LineDecoder) -> Vec<String> {
        std::iter::from_fn(|| decoder.next_line()).collect()
    }

    #[test]
    fn splits_lines_across_chunks() {
        let mut decoder = LineDecoder::new();
        decoder.push(b"{\"a\":1}\n{\"b\"");
        assert_eq!(drain(&mut decoder), vec!["{\"a\":1}"]);
        assert_eq!(decoder.pending(), 4);

        decoder.push(b":2}\r\n\n");
        assert_eq!(drain(&mut decoder), vec!["{\"b\":2}", ""]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn keeps_multibyte_characters_split_between_chunks() {
        let text = "{\"name\":\"Łukasz\"}\n".as_bytes();
        let (head, tail) = text.split_at(11);
        let mut decoder = LineDecoder::new();
        decoder.push(head);
        assert_eq!(decoder.next_line(), None);
        decoder.push(tail);
        assert_eq!(decoder.next_line().as_deref(), Some("{\"name\":\"Łukasz\"}"));
    }
}
