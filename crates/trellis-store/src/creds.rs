//! User creds bundles: a token and the seed that proves it, in one file.

use crate::error::{Result, StoreError};

const TOKEN_BEGIN: &str = "-----BEGIN TRELLIS USER TOKEN-----";
const TOKEN_END: &str = "------END TRELLIS USER TOKEN------";
const SEED_BEGIN: &str = "-----BEGIN USER SEED-----";
const SEED_END: &str = "------END USER SEED------";

/// A parsed creds bundle.
#[derive(Clone, PartialEq, Eq)]
pub struct Creds {
    pub token: String,
    pub seed: String,
}

impl Creds {
    pub fn new(token: impl Into<String>, seed: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            seed: seed.into(),
        }
    }

    /// Render the bundle.
    pub fn format(&self) -> String {
        format!(
            "{TOKEN_BEGIN}\n{}\n{TOKEN_END}\n\n\
             ************************* IMPORTANT *************************\n\
             The seed below is a private key. Anyone holding it can\n\
             connect as this user. Do not share it.\n\
             *************************************************************\n\n\
             {SEED_BEGIN}\n{}\n{SEED_END}\n",
            self.token, self.seed
        )
    }

    /// Parse a bundle produced by [`Creds::format`].
    pub fn parse(text: &str) -> Result<Self> {
        let token = section(text, TOKEN_BEGIN, TOKEN_END)?;
        let seed = section(text, SEED_BEGIN, SEED_END)?;
        Ok(Self::new(token, seed))
    }
}

impl std::fmt::Debug for Creds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Creds")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

fn section<'a>(text: &'a str, begin: &str, end: &str) -> Result<&'a str> {
    let missing = || StoreError::InvalidData(format!("creds bundle has no {begin} block"));
    let start = text.find(begin).ok_or_else(missing)? + begin.len();
    let len = text[start..].find(end).ok_or_else(missing)?;
    let body = text[start..start + len].trim();
    if body.is_empty() {
        return Err(missing());
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        let creds = Creds::new("h.b.s", "SUABC");
        let parsed = Creds::parse(&creds.format()).unwrap();
        assert_eq!(parsed, creds);
    }

    #[test]
    fn test_missing_seed_block() {
        let text = format!("{TOKEN_BEGIN}\nh.b.s\n{TOKEN_END}\n");
        assert!(Creds::parse(&text).is_err());
    }

    #[test]
    fn test_debug_hides_seed() {
        let creds = Creds::new("h.b.s", "SUSECRET");
        assert!(!format!("{:?}", creds).contains("SUSECRET"));
    }
}
