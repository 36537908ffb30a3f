// src/services/markup.rs
//! Lossless tokenizer for MJML documents.
//!
//! Untouched tokens serialize back to their exact source text, so a document
//! only changes where a tag was edited. Comments, declarations and the bodies
//! of raw-text elements (`mj-style`, `style`, `script`) are kept opaque.

const RAW_TEXT_ELEMENTS: &[&str] = &["mj-style", "style", "script"];

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    Comment(String),
    Tag(Tag),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
    pub closing: bool,
    pub self_closing: bool,
    pub attributes: Vec<Attribute>,
    /// 1-based line of the opening `<`.
    pub line: usize,
    raw: String,
    dirty: bool,
}

impl Tag {
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn is_mjml(&self) -> bool {
        self.name.len() > 3 && self.name[..3].eq_ignore_ascii_case("mj-")
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Removes every attribute called `name` and returns the first removed value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        let index = self
            .attributes
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case(name))?;
        let removed = self.attributes.remove(index);
        self.attributes
            .retain(|a| !a.name.eq_ignore_ascii_case(name));
        self.dirty = true;
        Some(removed)
    }

    pub fn insert_attribute(&mut self, index: usize, name: &str, value: &str) {
        let index = index.min(self.attributes.len());
        self.attributes.insert(
            index,
            Attribute {
                name: name.to_string(),
                value: Some(value.to_string()),
            },
        );
        self.dirty = true;
    }

    pub fn push_attribute(&mut self, name: &str, value: &str) {
        self.insert_attribute(self.attributes.len(), name, value);
    }

    fn render(&self) -> String {
        if !self.dirty {
            return self.raw.clone();
        }
        let mut out = String::with_capacity(self.raw.len() + 32);
        out.push('<');
        if self.closing {
            out.push('/');
        }
        out.push_str(&self.name);
        for attribute in &self.attributes {
            out.push(' ');
            out.push_str(&attribute.name);
            if let Some(value) = &attribute.value {
                out.push('=');
                if !value.contains('"') {
                    out.push('"');
                    out.push_str(value);
                    out.push('"');
                } else if !value.contains('\'') {
                    out.push('\'');
                    out.push_str(value);
                    out.push('\'');
                } else {
                    out.push('"');
                    out.push_str(&value.replace('"', "&quot;"));
                    out.push('"');
                }
            }
        }
        if self.self_closing {
            out.push_str(" />");
        } else {
            out.push('>');
        }
        out
    }
}

/// Parsed document: a flat token stream that preserves the original text.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub tokens: Vec<Token>,
}

impl Document {
    pub fn parse(source: &str) -> Self {
        Tokenizer::new(source).run()
    }

    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Tag(tag) => Some(tag),
            _ => None,
        })
    }

    pub fn tags_mut(&mut self) -> impl Iterator<Item = &mut Tag> {
        self.tokens.iter_mut().filter_map(|t| match t {
            Token::Tag(tag) => Some(tag),
            _ => None,
        })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Text(text) | Token::Comment(text) => out.push_str(text),
                Token::Tag(tag) => out.push_str(&tag.render()),
            }
        }
        out
    }
}

enum TagError {
    /// The `<` does not start a tag name.
    NotATag,
    /// The input ends inside the tag or inside a quoted value.
    Unterminated,
}

struct Tokenizer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    text_start: usize,
    tokens: Vec<Token>,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            text_start: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Document {
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] != b'<' {
                if self.bytes[self.pos] == b'\n' {
                    self.line += 1;
                }
                self.pos += 1;
                continue;
            }

            let start = self.pos;
            let line = self.line;
            if self.src[start..].starts_with("<!--") {
                let end = self.src[start + 4..]
                    .find("-->")
                    .map_or(self.bytes.len(), |i| start + 4 + i + 3);
                self.emit_text(start);
                self.advance_to(end);
                self.tokens
                    .push(Token::Comment(self.src[start..end].to_string()));
                self.text_start = end;
                continue;
            }

            match self.bytes.get(start + 1) {
                Some(b'!') | Some(b'?') => {
                    // Declarations stay part of the surrounding text.
                    let end = self.src[start..]
                        .find('>')
                        .map_or(self.bytes.len(), |i| start + i + 1);
                    self.advance_to(end);
                }
                _ => match self.parse_tag(start, line) {
                    Ok((tag, end)) => {
                        self.emit_text(start);
                        self.advance_to(end);
                        self.text_start = end;
                        let raw_body = !tag.closing
                            && !tag.self_closing
                            && RAW_TEXT_ELEMENTS.iter().any(|n| tag.is(n));
                        let name = tag.name.clone();
                        self.tokens.push(Token::Tag(tag));
                        if raw_body {
                            self.skip_raw_body(&name);
                        }
                    }
                    Err(TagError::NotATag) => {
                        // A lone '<' is ordinary text.
                        self.pos += 1;
                    }
                    Err(TagError::Unterminated) => {
                        // Everything after an open quote or an unclosed tag stays text.
                        let end = self.bytes.len();
                        self.advance_to(end);
                    }
                },
            }
        }
        self.emit_text(self.bytes.len());
        Document {
            tokens: self.tokens,
        }
    }

    fn emit_text(&mut self, end: usize) {
        if end > self.text_start {
            self.tokens
                .push(Token::Text(self.src[self.text_start..end].to_string()));
        }
        self.text_start = end;
    }

    fn advance_to(&mut self, end: usize) {
        self.line += self.bytes[self.pos..end]
            .iter()
            .filter(|b| **b == b'\n')
            .count();
        self.pos = end;
    }

    /// Leaves everything up to the matching close tag as text.
    fn skip_raw_body(&mut self, name: &str) {
        let needle = format!("</{}", name.to_ascii_lowercase());
        let rest = self.src[self.pos..].to_ascii_lowercase();
        let end = rest
            .find(&needle)
            .map_or(self.bytes.len(), |i| self.pos + i);
        self.advance_to(end);
    }

    fn parse_tag(&self, start: usize, line: usize) -> Result<(Tag, usize), TagError> {
        let bytes = self.bytes;
        let mut i = start + 1;
        let closing = bytes.get(i) == Some(&b'/');
        if closing {
            i += 1;
        }

        let name_start = i;
        while i < bytes.len() && is_name_byte(bytes[i]) {
            i += 1;
        }
        if i == name_start || !bytes[name_start].is_ascii_alphabetic() {
            return Err(TagError::NotATag);
        }
        let name = self.src[name_start..i].to_string();

        let mut attributes = Vec::new();
        let mut self_closing = false;
        loop {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            match bytes.get(i) {
                None => return Err(TagError::Unterminated),
                Some(b'>') => {
                    i += 1;
                    break;
                }
                Some(b'/') if bytes.get(i + 1) == Some(&b'>') => {
                    self_closing = true;
                    i += 2;
                    break;
                }
                Some(b'/') => {
                    i += 1;
                    continue;
                }
                Some(_) => {}
            }

            let attr_start = i;
            while i < bytes.len()
                && !bytes[i].is_ascii_whitespace()
                && !matches!(bytes[i], b'=' | b'>' | b'/')
            {
                i += 1;
            }
            if i == attr_start {
                // A stray '=' with no name in front of it.
                i += 1;
                continue;
            }
            let attr_name = self.src[attr_start..i].to_string();

            let mut j = i;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            let mut value = None;
            if bytes.get(j) == Some(&b'=') {
                j += 1;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                match bytes.get(j) {
                    Some(&quote) if quote == b'"' || quote == b'\'' => {
                        let value_start = j + 1;
                        let close = self.src[value_start..]
                            .find(quote as char)
                            .ok_or(TagError::Unterminated)?;
                        value = Some(self.src[value_start..value_start + close].to_string());
                        j = value_start + close + 1;
                    }
                    Some(_) => {
                        let value_start = j;
                        while j < bytes.len()
                            && !bytes[j].is_ascii_whitespace()
                            && bytes[j] != b'>'
                        {
                            j += 1;
                        }
                        value = Some(self.src[value_start..j].to_string());
                    }
                    None => return Err(TagError::Unterminated),
                }
                i = j;
            }
            attributes.push(Attribute {
                name: attr_name,
                value,
            });
        }

        Ok((
            Tag {
                name,
                closing,
                self_closing,
                attributes,
                line,
                raw: self.src[start..i].to_string(),
                dirty: false,
            },
            i,
        ))
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}
