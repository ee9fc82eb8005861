use recipe_types::ObjectId;

/// BLAKE3 keyed by a domain tag, so an action list and a step record with
/// identical bytes never collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    pub const ACTIONS: Self = Self::new("recipe-actions-v1");
    pub const STEP: Self = Self::new("recipe-step-v1");

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let digest = blake3::Hasher::new()
            .update(self.domain.as_bytes())
            .update(b":")
            .update(data)
            .finalize();
        ObjectId::from_hash(*digest.as_bytes())
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}
