/// Source of idempotency keys, one per logical call.
pub trait IdempotencyKeyGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Generates random v4 UUIDs.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidKeyGenerator;

impl IdempotencyKeyGenerator for UuidKeyGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

impl<F> IdempotencyKeyGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn generate(&self) -> String {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::{IdempotencyKeyGenerator, UuidKeyGenerator};

    #[test]
    fn uuid_keys_are_unique() {
        let keys = UuidKeyGenerator;
        let first = keys.generate();
        let second = keys.generate();
        assert_ne!(first, second);
        assert_eq!(first.len(), 36);
    }

    #[test]
    fn closures_generate_keys() {
        let keys = || "fixed-key".to_owned();
        assert_eq!(keys.generate(), "fixed-key");
    }
}
