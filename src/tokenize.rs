//! Default tokenizer and term processor, plus the traits that let callers
//! supply their own.

/// Splits text into an ordered sequence of terms. Called with a field name
/// at ingestion time and without one at search time.
pub trait Tokenizer {
    fn tokenize(&self, text: &str, field_name: Option<&str>) -> Vec<String>;
}

/// What running the term processor over one token produced.
pub enum TermOutput {
    Drop,
    One(String),
    Many(Vec<String>),
}

impl TermOutput {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            TermOutput::Drop => Vec::new(),
            TermOutput::One(t) => vec![t],
            TermOutput::Many(ts) => ts,
        }
    }
}

/// Normalizes a raw token, optionally expanding it into several terms or
/// dropping it entirely.
pub trait TermProcessor {
    fn process(&self, term: &str, field_name: Option<&str>) -> TermOutput;
}

/// Letter runs (any Unicode script) and ASCII-digit runs are tokens;
/// everything else is a separator.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTokenizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Letter,
    Digit,
    Separator,
}

fn classify(c: char) -> CharClass {
    if c.is_ascii_digit() {
        CharClass::Digit
    } else if c.is_alphabetic() {
        CharClass::Letter
    } else {
        CharClass::Separator
    }
}

impl Tokenizer for DefaultTokenizer {
    fn tokenize(&self, text: &str, _field_name: Option<&str>) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut current_class = CharClass::Separator;

        for c in text.chars() {
            let class = classify(c);
            if class == CharClass::Separator {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                current_class = CharClass::Separator;
                continue;
            }
            if class != current_class && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            current.push(c);
            current_class = class;
        }
        if !current.is_empty() {
            tokens.push(current);
        }
        tokens
    }
}

/// Lower-cases the term; never drops, never expands.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTermProcessor;

impl TermProcessor for DefaultTermProcessor {
    fn process(&self, term: &str, _field_name: Option<&str>) -> TermOutput {
        TermOutput::One(term.to_lowercase())
    }
}
