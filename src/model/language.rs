use std::{fmt, str::FromStr};

use once_cell::sync::Lazy;
use regex::Regex;


/// A normalized language code like `en`, `de-CH` or `es-419`, as used in the
/// `language_code` column of all translation tables.
///
/// Input is accepted case-insensitively and with `_` as separator, but is
/// always stored and compared in its canonical form (lowercase language,
/// uppercase region).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct LanguageCode(String);

static LANGUAGE_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z]{2,3})(?:[-_]([a-zA-Z]{2}|[0-9]{3}))?$").unwrap()
});

impl LanguageCode {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for LanguageCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = LANGUAGE_CODE.captures(s.trim())
            .ok_or_else(|| format!("'{s}' is not a valid language code"))?;

        let mut out = captures[1].to_ascii_lowercase();
        if let Some(region) = captures.get(2) {
            out.push('-');
            out.push_str(&region.as_str().to_ascii_uppercase());
        }

        Ok(Self(out))
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
