use std::{fmt, str::FromStr};

use bytes::BytesMut;
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};


/// Primary key of every row we expose. In the database, it's a `bigint`
/// (`i64`), but we have a separate Rust type for it so that keys cannot be
/// confused with other integers. Implements `ToSql` and `FromSql` by casting
/// to/from `i64`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub(crate) struct Key(pub(crate) u64);

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl FromStr for Key {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // `u64::from_str` also accepts a leading `+`, which we don't want.
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err("key is not a decimal number");
        }
        s.parse().map(Key).map_err(|_| "key out of range")
    }
}

impl ToSql for Key {
    fn to_sql(
        &self,
        ty: &postgres_types::Type,
        out: &mut BytesMut,
    ) -> Result<postgres_types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        (self.0 as i64).to_sql(ty, out)
    }

    fn accepts(ty: &postgres_types::Type) -> bool {
        <i64 as ToSql>::accepts(ty)
    }

    postgres_types::to_sql_checked!();
}

impl<'a> FromSql<'a> for Key {
    fn from_sql(
        ty: &postgres_types::Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        i64::from_sql(ty, raw).map(|i| Key(i as u64))
    }

    fn accepts(ty: &postgres_types::Type) -> bool {
        <i64 as FromSql>::accepts(ty)
    }
}


#[cfg(test)]
mod tests {
    use super::Key;

    #[test]
    fn parse() {
        assert_eq!("0".parse::<Key>(), Ok(Key(0)));
        assert_eq!("17".parse::<Key>(), Ok(Key(17)));
        assert_eq!("18446744073709551615".parse::<Key>(), Ok(Key(u64::MAX)));

        assert!("".parse::<Key>().is_err());
        assert!("+3".parse::<Key>().is_err());
        assert!("-3".parse::<Key>().is_err());
        assert!("3a".parse::<Key>().is_err());
        assert!("18446744073709551616".parse::<Key>().is_err());
    }
}
