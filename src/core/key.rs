//! Application keys and their storage-safe encoding.
//!
//! A [`Key`] names one child of a group. Under [`KeyMode::StringOnly`] only
//! string keys are accepted and they are stored verbatim. Under
//! [`KeyMode::General`] any key is stored as its canonical text, which must
//! parse back to an equal key:
//!
//! ```text
//! Str("a b")            -> "a b"     (quoted, debug escapes)
//! Int(-3)               -> -3
//! Float(0.5)            -> 0.5
//! Bool(true)            -> true
//! Tuple([Int(1), ...])  -> (1, "x")
//! ```

use std::cmp::Ordering;
use std::fmt;

use crate::util::{Error, Result};

/// Maximum length (in characters) of an encoded key.
pub const MAX_KEY_LENGTH: usize = 500;

/// Names that can never be used as keys.
pub const RESERVED_NAMES: &[&str] = &["", ".", ".."];

/// A key identifying a child within a group.
#[derive(Clone, Debug)]
pub enum Key {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Tuple(Vec<Key>),
}

impl Key {
    /// The string, if this is a string key.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Plain text form: strings verbatim, everything else as canonical text.
    ///
    /// This is what the mapping adapter uses for component names; two
    /// distinct keys can share a plain form (`Str("1")` and `Int(1)`).
    pub fn plain(&self) -> String {
        match self {
            Key::Str(s) => s.clone(),
            other => other.canonical(),
        }
    }

    /// Canonical text form, the inverse of [`Key::parse`].
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }

    fn write_canonical(&self, out: &mut String) {
        match self {
            Key::Str(s) => out.push_str(&format!("{:?}", s)),
            Key::Int(i) => out.push_str(&i.to_string()),
            Key::Float(f) => out.push_str(&format!("{:?}", f)),
            Key::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Key::Tuple(items) => {
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_canonical(out);
                }
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
        }
    }

    /// Parse canonical text back into a key.
    pub fn parse(text: &str) -> Result<Key> {
        let mut parser = Parser { chars: text.char_indices().peekable(), text };
        let key = parser.key()?;
        parser.skip_ws();
        match parser.chars.peek() {
            None => Ok(key),
            Some(&(pos, _)) => Err(Error::invalid(format!(
                "trailing characters in key {:?} at {}",
                text, pos
            ))),
        }
    }

    fn contains_nan(&self) -> bool {
        match self {
            Key::Float(f) => f.is_nan(),
            Key::Tuple(items) => items.iter().any(Key::contains_nan),
            _ => false,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Key::Bool(_) => 0,
            Key::Int(_) => 1,
            Key::Float(_) => 2,
            Key::Str(_) => 3,
            Key::Tuple(_) => 4,
        }
    }
}

// Equality follows the total order, so `0.0` and `-0.0` are distinct keys
// and NaN equals itself.
impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Str(a), Key::Str(b)) => a.cmp(b),
            (Key::Int(a), Key::Int(b)) => a.cmp(b),
            (Key::Float(a), Key::Float(b)) => a.total_cmp(b),
            (Key::Bool(a), Key::Bool(b)) => a.cmp(b),
            (Key::Tuple(a), Key::Tuple(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::Str(s.clone())
    }
}

impl From<&Key> for Key {
    fn from(k: &Key) -> Self {
        k.clone()
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Int(i as i64)
    }
}

impl From<u32> for Key {
    fn from(i: u32) -> Self {
        Key::Int(i as i64)
    }
}

impl From<f64> for Key {
    fn from(f: f64) -> Self {
        Key::Float(f)
    }
}

impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Key::Bool(b)
    }
}

impl<A: Into<Key>, B: Into<Key>> From<(A, B)> for Key {
    fn from((a, b): (A, B)) -> Self {
        Key::Tuple(vec![a.into(), b.into()])
    }
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    text: &'a str,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn fail(&self, what: &str) -> Error {
        Error::invalid(format!("malformed key {:?}: {}", self.text, what))
    }

    fn key(&mut self) -> Result<Key> {
        self.skip_ws();
        match self.chars.peek().map(|&(_, c)| c) {
            Some('"') => self.string(),
            Some('(') => self.tuple(),
            Some(_) => self.atom(),
            None => Err(self.fail("unexpected end")),
        }
    }

    fn string(&mut self) -> Result<Key> {
        self.chars.next();
        let mut s = String::new();
        loop {
            let (_, c) = self.chars.next().ok_or_else(|| self.fail("unterminated string"))?;
            match c {
                '"' => return Ok(Key::Str(s)),
                '\\' => {
                    let (_, esc) = self.chars.next().ok_or_else(|| self.fail("dangling escape"))?;
                    match esc {
                        'n' => s.push('\n'),
                        'r' => s.push('\r'),
                        't' => s.push('\t'),
                        '0' => s.push('\0'),
                        '\\' | '"' | '\'' => s.push(esc),
                        'u' => s.push(self.unicode_escape()?),
                        _ => return Err(self.fail("unknown escape")),
                    }
                }
                _ => s.push(c),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char> {
        if !matches!(self.chars.next(), Some((_, '{'))) {
            return Err(self.fail("expected '{' in unicode escape"));
        }
        let mut hex = String::new();
        loop {
            match self.chars.next() {
                Some((_, '}')) => break,
                Some((_, c)) if c.is_ascii_hexdigit() => hex.push(c),
                _ => return Err(self.fail("bad unicode escape")),
            }
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.fail("invalid code point"))
    }

    fn tuple(&mut self) -> Result<Key> {
        self.chars.next();
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if matches!(self.chars.peek(), Some((_, ')'))) {
                self.chars.next();
                break;
            }
            items.push(self.key()?);
            self.skip_ws();
            match self.chars.next() {
                Some((_, ',')) => continue,
                Some((_, ')')) => {
                    if items.len() == 1 {
                        // "(x)" is not a tuple
                        return Err(self.fail("one-element tuple needs a trailing comma"));
                    }
                    break;
                }
                _ => return Err(self.fail("expected ',' or ')'")),
            }
        }
        Ok(Key::Tuple(items))
    }

    fn atom(&mut self) -> Result<Key> {
        let mut token = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c == ',' || c == ')' || c.is_whitespace() {
                break;
            }
            token.push(c);
            self.chars.next();
        }
        match token.as_str() {
            "true" => return Ok(Key::Bool(true)),
            "false" => return Ok(Key::Bool(false)),
            _ => {}
        }
        if let Ok(i) = token.parse::<i64>() {
            return Ok(Key::Int(i));
        }
        token
            .parse::<f64>()
            .map(Key::Float)
            .map_err(|_| self.fail("unrecognized token"))
    }
}

/// How keys are mapped to storage names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyMode {
    /// Only string keys, stored verbatim.
    #[default]
    StringOnly,
    /// Any key with a reversible canonical text form.
    General,
}

/// Encodes keys into storage names and back.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyCodec {
    mode: KeyMode,
}

impl KeyCodec {
    pub fn new(mode: KeyMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> KeyMode {
        self.mode
    }

    /// Encode a key into a storage name.
    pub fn encode(&self, key: &Key) -> Result<String> {
        if let Key::Str(s) = key {
            if RESERVED_NAMES.contains(&s.as_str()) {
                return Err(Error::KeyReserved(format!("{:?}", s)));
            }
        }

        let name = match self.mode {
            KeyMode::StringOnly => match key {
                Key::Str(s) => s.clone(),
                other => return Err(Error::KeyNotString(other.canonical())),
            },
            KeyMode::General => {
                let text = key.canonical();
                // NaN payloads and signs do not survive the text form
                if key.contains_nan() {
                    return Err(Error::KeyNotReversible(text));
                }
                let len = text.chars().count();
                if len > MAX_KEY_LENGTH {
                    return Err(Error::KeyTooLong { len, max: MAX_KEY_LENGTH });
                }
                match Key::parse(&text) {
                    Ok(back) if &back == key => {}
                    _ => return Err(Error::KeyNotReversible(text)),
                }
                text
            }
        };

        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(Error::KeyReserved(name));
        }
        Ok(name)
    }

    /// Decode a storage name back into a key.
    pub fn decode(&self, name: &str) -> Result<Key> {
        match self.mode {
            KeyMode::StringOnly => Ok(Key::Str(name.to_string())),
            KeyMode::General => Key::parse(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_forms() {
        assert_eq!(Key::from("a b").canonical(), "\"a b\"");
        assert_eq!(Key::from(-3).canonical(), "-3");
        assert_eq!(Key::from(0.5).canonical(), "0.5");
        assert_eq!(Key::from(1.0).canonical(), "1.0");
        assert_eq!(Key::from(true).canonical(), "true");
        assert_eq!(Key::from((1, "x")).canonical(), "(1, \"x\")");
        assert_eq!(Key::Tuple(vec![Key::Int(7)]).canonical(), "(7,)");
        assert_eq!(Key::Tuple(vec![]).canonical(), "()");
    }

    #[test]
    fn test_parse_inverts_canonical() {
        let keys = vec![
            Key::from("plain"),
            Key::from("quote \" and \\ and \n tab\t"),
            Key::from("unicode \u{e9}\u{301}"),
            Key::from(i64::MIN),
            Key::from(1e-7),
            Key::from(f64::INFINITY),
            Key::from(false),
            Key::Tuple(vec![Key::Int(1), Key::Tuple(vec![Key::from("a")]), Key::Float(2.5)]),
            Key::Tuple(vec![]),
        ];
        for key in keys {
            let text = key.canonical();
            assert_eq!(Key::parse(&text).unwrap(), key, "text: {}", text);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Key::parse("\"open").is_err());
        assert!(Key::parse("(1 2)").is_err());
        assert!(Key::parse("(1)").is_err());
        assert!(Key::parse("abc").is_err());
        assert!(Key::parse("1 2").is_err());
    }

    #[test]
    fn test_string_only_mode() {
        let codec = KeyCodec::new(KeyMode::StringOnly);
        assert_eq!(codec.encode(&Key::from("G")).unwrap(), "G");
        assert_eq!(codec.decode("G").unwrap(), Key::from("G"));
        assert!(matches!(codec.encode(&Key::from(3)), Err(Error::KeyNotString(_))));
    }

    #[test]
    fn test_general_mode_inverse() {
        let codec = KeyCodec::new(KeyMode::General);
        for key in [Key::from("s"), Key::from(12), Key::from((2, 3)), Key::from(-0.25)] {
            let name = codec.encode(&key).unwrap();
            assert_eq!(codec.decode(&name).unwrap(), key);
        }
    }

    #[test]
    fn test_general_mode_rejects_nan_and_long() {
        let codec = KeyCodec::new(KeyMode::General);
        assert!(matches!(
            codec.encode(&Key::from(f64::NAN)),
            Err(Error::KeyNotReversible(_))
        ));

        let long = Key::from("x".repeat(MAX_KEY_LENGTH));
        assert!(matches!(codec.encode(&long), Err(Error::KeyTooLong { .. })));

        let fits = Key::from("x".repeat(MAX_KEY_LENGTH - 2));
        assert!(codec.encode(&fits).is_ok());
    }

    #[test]
    fn test_reserved_names() {
        for mode in [KeyMode::StringOnly, KeyMode::General] {
            let codec = KeyCodec::new(mode);
            assert!(matches!(codec.encode(&Key::from(".")), Err(Error::KeyReserved(_))));
            assert!(matches!(codec.encode(&Key::from("")), Err(Error::KeyReserved(_))));
        }
    }

    #[test]
    fn test_plain_form_collides() {
        assert_eq!(Key::from("1").plain(), Key::from(1).plain());
        assert_ne!(Key::from("1"), Key::from(1));
    }

    #[test]
    fn test_float_eq_agrees_with_ord() {
        let pos = Key::from(0.0);
        let neg = Key::from(-0.0);
        assert_ne!(pos, neg);
        assert_ne!(pos.cmp(&neg), Ordering::Equal);

        let nan = Key::from(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert_eq!(nan.cmp(&nan), Ordering::Equal);

        let mut map = std::collections::BTreeMap::new();
        map.insert(pos.clone(), "pos");
        map.insert(neg.clone(), "neg");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&neg), Some(&"neg"));

        let codec = KeyCodec::new(KeyMode::General);
        assert_eq!(codec.encode(&pos).unwrap(), "0.0");
        assert_eq!(codec.encode(&neg).unwrap(), "-0.0");
        assert_eq!(codec.decode("-0.0").unwrap(), neg);
        assert!(matches!(
            codec.encode(&Key::Tuple(vec![Key::Int(1), Key::from(f64::NAN)])),
            Err(Error::KeyNotReversible(_))
        ));
    }
}
