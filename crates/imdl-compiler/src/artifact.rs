//! Compiled artifact: compressed skeleton plus extracted tag table.

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use flate2::Compression;
use flate2::read::{DeflateDecoder, DeflateEncoder};

/// Deflate-compressed UTF-8 text.
///
/// Compression happens once, when the artifact is built. Every call to
/// [`decompress`](Self::decompress) yields a fresh, independent `String`.
#[derive(Clone, PartialEq, Eq)]
pub struct CompressedBytes(Vec<u8>);

impl CompressedBytes {
    /// Compress `text`.
    pub fn compress(text: &str) -> io::Result<Self> {
        let mut encoder = DeflateEncoder::new(text.as_bytes(), Compression::fast());
        let mut bytes = Vec::with_capacity(text.len() / 2);
        encoder.read_to_end(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Decompress back to the original text.
    pub fn decompress(&self) -> io::Result<String> {
        let mut decoder = DeflateDecoder::new(self.0.as_slice());
        let mut text = String::new();
        decoder.read_to_string(&mut text)?;
        Ok(text)
    }

    /// Compressed size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CompressedBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompressedBytes({} bytes)", self.0.len())
    }
}

/// Kind of extracted tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKind {
    Script,
    Style,
    Link,
    Meta,
}

impl TagKind {
    /// All kinds, in table order.
    pub const ALL: [Self; 4] = [Self::Script, Self::Style, Self::Link, Self::Meta];

    /// Lowercase tag name, as used in placeholders.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Style => "style",
            Self::Link => "link",
            Self::Meta => "meta",
        }
    }

    /// Position in [`TagKind::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Script => 0,
            Self::Style => 1,
            Self::Link => 2,
            Self::Meta => 3,
        }
    }

    /// Placeholder left in the skeleton for entry `n` (1-based).
    #[must_use]
    pub fn placeholder(self, n: usize) -> String {
        format!("<@{}:{n}>", self.as_str())
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagKind {
    type Err = UnknownTagKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownTagKind(s.to_owned()))
    }
}

/// Error parsing a [`TagKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tag kind: {0}")]
pub struct UnknownTagKind(pub String);

/// Extracted tags per kind, in source order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagTable {
    entries: [Vec<CompressedBytes>; 4],
}

impl TagTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compress and append a complete element. Returns its 1-based index.
    pub fn push(&mut self, kind: TagKind, element: &str) -> io::Result<usize> {
        let slot = &mut self.entries[kind.index()];
        slot.push(CompressedBytes::compress(element)?);
        Ok(slot.len())
    }

    /// Entry `n` (1-based) of `kind`.
    #[must_use]
    pub fn get(&self, kind: TagKind, n: usize) -> Option<&CompressedBytes> {
        n.checked_sub(1)
            .and_then(|i| self.entries[kind.index()].get(i))
    }

    /// All entries of `kind`.
    #[must_use]
    pub fn entries(&self, kind: TagKind) -> &[CompressedBytes] {
        &self.entries[kind.index()]
    }

    /// Number of entries of `kind`.
    #[must_use]
    pub fn count(&self, kind: TagKind) -> usize {
        self.entries[kind.index()].len()
    }

    /// Total number of entries across all kinds.
    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.iter().map(Vec::len).sum()
    }
}

/// Output of the compiler and the unit stored in the cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledArtifact {
    /// Compressed HTML skeleton with placeholders still in place.
    pub html: CompressedBytes,
    /// Extracted tags referenced by `<@kind:N>` placeholders.
    pub tags: TagTable,
}

impl CompiledArtifact {
    /// Fresh decompressed copy of the skeleton.
    pub fn skeleton(&self) -> io::Result<String> {
        self.html.decompress()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_round_trip() {
        let text = "<h1>Hello {{name}}</h1>\n<@script:1>\n".repeat(20);

        let compressed = CompressedBytes::compress(&text).unwrap();

        assert!(compressed.len() < text.len());
        assert_eq!(compressed.decompress().unwrap(), text);
    }

    #[test]
    fn test_compress_empty_and_unicode() {
        for text in ["", "π ≈ 3.14 — ünïcødé"] {
            let compressed = CompressedBytes::compress(text).unwrap();
            assert_eq!(compressed.decompress().unwrap(), text);
        }
    }

    #[test]
    fn test_decompress_gives_independent_copies() {
        let compressed = CompressedBytes::compress("abc").unwrap();

        let mut first = compressed.decompress().unwrap();
        first.push('!');

        assert_eq!(compressed.decompress().unwrap(), "abc");
    }

    #[test]
    fn test_corrupt_bytes_fail() {
        let corrupt = CompressedBytes(vec![0xff, 0xfe, 0xfd]);

        assert!(corrupt.decompress().is_err());
    }

    #[test]
    fn test_tag_kind_parse() {
        assert_eq!("script".parse::<TagKind>().unwrap(), TagKind::Script);
        assert_eq!("META".parse::<TagKind>().unwrap(), TagKind::Meta);
        assert!("div".parse::<TagKind>().is_err());
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(TagKind::Style.placeholder(2), "<@style:2>");
    }

    #[test]
    fn test_tag_table_indices_are_one_based() {
        let mut table = TagTable::new();

        assert_eq!(table.push(TagKind::Script, "<script>a</script>").unwrap(), 1);
        assert_eq!(table.push(TagKind::Script, "<script>b</script>").unwrap(), 2);
        assert_eq!(table.push(TagKind::Meta, "<meta charset=utf-8>").unwrap(), 1);

        assert!(table.get(TagKind::Script, 0).is_none());
        assert_eq!(
            table.get(TagKind::Script, 2).unwrap().decompress().unwrap(),
            "<script>b</script>"
        );
        assert!(table.get(TagKind::Script, 3).is_none());
        assert_eq!(table.count(TagKind::Script), 2);
        assert_eq!(table.count(TagKind::Style), 0);
        assert_eq!(table.total(), 3);
    }
}
