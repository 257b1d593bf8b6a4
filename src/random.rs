// Generalized over the rand Library so there's no hard dependencies.

/// Types (keys) that can be generated from a cryptographically secure source.
pub trait Randomizable: Sized {
    fn random_secure() -> Self;
}

#[must_use]
pub fn rand_16_bytes() -> [u8; 16] {
    rand::random()
}
