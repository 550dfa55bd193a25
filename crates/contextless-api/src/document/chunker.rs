/// A slice of the input handed to one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the original ordered sequence
    pub index: usize,
    /// Full text sent to the remote call, overlap prefix included
    pub content: String,
    /// Tail of the previous chunk repeated at the start of this one
    pub overlap: Option<String>,
}

impl Chunk {
    /// Content without the overlap prefix.
    pub fn body(&self) -> &str {
        match &self.overlap {
            Some(overlap) => self.content[overlap.len()..].trim_start(),
            None => &self.content,
        }
    }

    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Splits text at sentence boundaries, carrying a word overlap between chunks.
#[derive(Debug, Clone)]
pub struct TextChunker {
    max_chunk_size: usize,
    overlap_size: usize,
}

impl TextChunker {
    /// `max_chunk_size` and `overlap_size` are measured in characters.
    /// The overlap is the last `overlap_size / 5` words, cut down to at most
    /// `overlap_size` characters.
    pub fn new(max_chunk_size: usize, overlap_size: usize) -> Self {
        Self {
            max_chunk_size,
            overlap_size,
        }
    }

    fn overlap_words(&self) -> usize {
        self.overlap_size / 5
    }

    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.chars().count() <= self.max_chunk_size {
            return vec![Chunk {
                index: 0,
                content: text.to_string(),
                overlap: None,
            }];
        }

        let overlap_words = self.overlap_words();
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut buffer = String::new();
        let mut buffer_len = 0;
        let mut overlap: Option<String> = None;

        for sentence in split_sentences(text) {
            let sentence_len = sentence.chars().count();

            if buffer_len + sentence_len > self.max_chunk_size && !buffer.trim().is_empty() {
                let sealed = buffer.trim().to_string();
                let tail = overlap_tail(&sealed, overlap_words, self.overlap_size).to_string();

                chunks.push(Chunk {
                    index: chunks.len(),
                    content: sealed,
                    overlap: overlap.take(),
                });

                buffer.clear();
                buffer_len = 0;
                if !tail.is_empty() {
                    buffer.push_str(&tail);
                    buffer.push(' ');
                    buffer_len = tail.chars().count() + 1;
                    overlap = Some(tail);
                }
            }

            buffer.push_str(sentence);
            buffer_len += sentence_len;
        }

        if !buffer.trim().is_empty() {
            chunks.push(Chunk {
                index: chunks.len(),
                content: buffer.trim().to_string(),
                overlap,
            });
        }

        chunks
    }
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Split into sentences ending in `.`, `!` or `?` followed by whitespace or
/// end of input. Whitespace after the punctuation stays with its sentence and
/// unterminated trailing text becomes the last sentence, so the pieces
/// concatenate back to the input.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !is_terminal(c) {
            continue;
        }

        while chars.next_if(|&(_, next)| is_terminal(next)).is_some() {}

        match chars.peek() {
            None => {}
            Some(&(_, next)) if next.is_whitespace() => {
                while chars.next_if(|&(_, ws)| ws.is_whitespace()).is_some() {}
            }
            // "3.14", "e.g": not a boundary
            Some(_) => continue,
        }

        let end = chars.peek().map(|&(i, _)| i).unwrap_or(text.len());
        sentences.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}

/// Literal suffix of `text` used as the next chunk's overlap: the last `words`
/// words, shortened to whole words fitting in `max_chars` characters.
fn overlap_tail(text: &str, words: usize, max_chars: usize) -> &str {
    let tail = tail_words(text, words);
    if tail.chars().count() <= max_chars {
        return tail;
    }
    if max_chars == 0 {
        return "";
    }

    let cut = match tail.char_indices().nth_back(max_chars - 1) {
        Some((i, _)) => i,
        None => return tail,
    };
    let suffix = &tail[cut..];
    if tail[..cut].ends_with(char::is_whitespace) {
        return suffix.trim_start();
    }

    // Cut landed inside a word: drop the partial word
    match suffix.find(char::is_whitespace) {
        Some(pos) => suffix[pos..].trim_start(),
        None => "",
    }
}

/// Literal suffix of `text` holding its last `count` whitespace-delimited words.
fn tail_words(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }

    let mut seen = 0;
    let mut in_word = false;
    for (i, c) in text.char_indices().rev() {
        if c.is_whitespace() {
            if in_word {
                seen += 1;
                if seen == count {
                    return &text[i + c.len_utf8()..];
                }
            }
            in_word = false;
        } else {
            in_word = true;
        }
    }

    text
}
