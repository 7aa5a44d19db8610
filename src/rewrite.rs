use crate::{
    error::{ConvertError, ConvertResult},
    fsio,
    identity::{compact, Direction, IdentityTable},
};
use aho_corasick::{AhoCorasick, MatchKind};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::{
    borrow::Cow,
    fs,
    io::{self, Read, Write},
    path::Path,
};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Binary,
    TextPlain,
    // SNBT: UUIDs may sit inside either quote style.
    TextQuoted,
}

impl Encoding {
    pub fn label(self) -> &'static str {
        match self {
            Encoding::Binary => "binary",
            Encoding::TextPlain => "JSON",
            Encoding::TextQuoted => "SNBT",
        }
    }
}

#[derive(Debug)]
pub struct Rewrite<'a> {
    pub bytes: Cow<'a, [u8]>,
    pub changed: bool,
}

struct Substitutions {
    matcher: AhoCorasick,
    replacements: Vec<String>,
}

impl Substitutions {
    fn build(pairs: Vec<(String, String)>) -> ConvertResult<Self> {
        let (patterns, replacements): (Vec<String>, Vec<String>) = pairs.into_iter().unzip();
        let matcher = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&patterns)
            .map_err(|err| ConvertError::invalid("UUID substitution table", err.to_string()))?;
        Ok(Self {
            matcher,
            replacements,
        })
    }

    fn apply<'a>(&self, buffer: &'a [u8]) -> Rewrite<'a> {
        if !self.matcher.is_match(buffer) {
            return Rewrite {
                bytes: Cow::Borrowed(buffer),
                changed: false,
            };
        }
        // One leftmost-longest pass: substituted text is never matched again.
        let out = self.matcher.replace_all_bytes(buffer, &self.replacements);
        let changed = out.as_slice() != buffer;
        Rewrite {
            bytes: Cow::Owned(out),
            changed,
        }
    }
}

pub struct Rewriter {
    plain: Substitutions,
    quoted: Substitutions,
}

impl Rewriter {
    pub fn new(table: &IdentityTable, direction: Direction) -> ConvertResult<Self> {
        let mut plain = Vec::new();
        let mut quoted = Vec::new();

        for player in table.players() {
            let source = player.source(direction);
            let target = player.target(direction);
            if source == target {
                continue;
            }

            let mut forms = vec![(source.to_string(), target.to_string())];
            let (source_compact, target_compact) = (compact(source), compact(target));
            if source_compact != source {
                forms.push((source_compact, target_compact));
            }

            for (from, to) in &forms {
                for quote in ['"', '\''] {
                    quoted.push((
                        format!("{quote}{from}{quote}"),
                        format!("{quote}{to}{quote}"),
                    ));
                }
            }
            quoted.extend(forms.iter().cloned());
            plain.extend(forms);
        }

        Ok(Self {
            plain: Substitutions::build(plain)?,
            quoted: Substitutions::build(quoted)?,
        })
    }

    pub fn rewrite<'a>(&self, buffer: &'a [u8], encoding: Encoding) -> io::Result<Rewrite<'a>> {
        match encoding {
            Encoding::Binary => Ok(self.plain.apply(buffer)),
            Encoding::TextPlain => {
                ensure_utf8(buffer)?;
                Ok(self.plain.apply(buffer))
            }
            Encoding::TextQuoted => {
                ensure_utf8(buffer)?;
                Ok(self.quoted.apply(buffer))
            }
        }
    }

    // Gzip-wrapped NBT is rewritten through the compression layer; only the
    // payload is compared.
    pub fn rewrite_file(&self, path: &Path, encoding: Encoding) -> io::Result<bool> {
        let raw = fs::read(path)?;
        if encoding == Encoding::Binary && raw.starts_with(&GZIP_MAGIC) {
            let mut payload = Vec::new();
            GzDecoder::new(raw.as_slice()).read_to_end(&mut payload)?;
            let rewrite = self.rewrite(&payload, encoding)?;
            if !rewrite.changed {
                return Ok(false);
            }
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&rewrite.bytes)?;
            let compressed = encoder.finish()?;
            fsio::write_atomic(path, &compressed)?;
            return Ok(true);
        }

        let rewrite = self.rewrite(&raw, encoding)?;
        if rewrite.changed {
            fsio::write_atomic(path, &rewrite.bytes)?;
        }
        Ok(rewrite.changed)
    }
}

#[cfg(test)]
pub fn rewrite<'a>(
    buffer: &'a [u8],
    table: &IdentityTable,
    direction: Direction,
    encoding: Encoding,
) -> ConvertResult<Rewrite<'a>> {
    let rewriter = Rewriter::new(table, direction)?;
    rewriter
        .rewrite(buffer, encoding)
        .map_err(|err| ConvertError::invalid("buffer", err.to_string()))
}

fn ensure_utf8(buffer: &[u8]) -> io::Result<()> {
    std::str::from_utf8(buffer)
        .map(|_| ())
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}
