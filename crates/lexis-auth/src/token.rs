use rand::distr::Alphanumeric;
use rand::Rng;

pub const TOKEN_LENGTH: usize = 64;

/// Source of session tokens.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// 64 alphanumeric characters drawn from the thread-local RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }
}
