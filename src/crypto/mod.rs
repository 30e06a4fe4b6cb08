mod engine;

pub use engine::{pkce_challenge, random_token, secrets_match, CryptoEngine};

#[cfg(test)]
pub(crate) use engine::test_engine;
