//! Ticket directory names: `<epoch>_<slug>_<random>`.

use std::fmt;

use rand::Rng;

use super::marker::normalize;
use crate::error::{Result, TixError};

/// Upper bound (exclusive) of the random suffix.
const SUFFIX_RANGE: u32 = 999;

/// A parsed ticket directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketName {
    pub opened: i64,
    pub slug: String,
    pub suffix: u32,
}

impl TicketName {
    /// Build a fresh name for `title` created at `now` (epoch seconds).
    pub fn generate(title: &str, now: i64, rng: &mut impl Rng) -> Self {
        Self {
            opened: now,
            slug: normalize(title),
            suffix: rng.gen_range(0..SUFFIX_RANGE),
        }
    }

    /// # Errors
    ///
    /// Returns [`TixError::FormatCorruption`] when `name` does not follow
    /// `<epoch>_<slug>_<random>`.
    pub fn parse(name: &str) -> Result<Self> {
        let corrupt = |reason: &str| TixError::corrupt(name, reason.to_string());

        let (epoch, rest) = name
            .split_once('_')
            .ok_or_else(|| corrupt("expected <epoch>_<slug>_<random>"))?;
        let (slug, suffix) = rest
            .rsplit_once('_')
            .ok_or_else(|| corrupt("expected <epoch>_<slug>_<random>"))?;

        let opened = epoch
            .parse::<i64>()
            .map_err(|_| corrupt("epoch is not a number"))?;
        let suffix = suffix
            .parse::<u32>()
            .map_err(|_| corrupt("random suffix is not a number"))?;

        Ok(Self {
            opened,
            slug: slug.to_string(),
            suffix,
        })
    }

    /// Human title recovered from the slug.
    #[must_use]
    pub fn title(&self) -> String {
        self.slug.replace('-', " ")
    }
}

impl fmt::Display for TicketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.opened, self.slug, self.suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn parses_classic_names() {
        let name = TicketName::parse("1206206148_add-attachment-to-ticket_138").expect("parse");
        assert_eq!(name.opened, 1_206_206_148);
        assert_eq!(name.slug, "add-attachment-to-ticket");
        assert_eq!(name.suffix, 138);
        assert_eq!(name.title(), "add attachment to ticket");
    }

    #[test]
    fn generated_names_parse_back() {
        let mut rng = StdRng::seed_from_u64(7);
        let name = TicketName::generate("Fix login bug", 1_700_000_000, &mut rng);
        assert!(name.suffix < SUFFIX_RANGE);
        let text = name.to_string();
        assert!(text.starts_with("1700000000_fix-login-bug_"));
        assert_eq!(TicketName::parse(&text).expect("parse"), name);
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in ["", "notanumber_slug_1", "123_slug", "123_slug_x", "123"] {
            assert!(
                matches!(TicketName::parse(bad), Err(TixError::FormatCorruption { .. })),
                "{bad} should be corrupt"
            );
        }
    }
}
