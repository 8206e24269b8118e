use keyhole_core::Slug;
use std::sync::atomic::{AtomicU64, Ordering};
use typed_builder::TypedBuilder;

/// Trait for producing short identifiers.
///
/// Implementations are pure generators that never touch storage; global
/// uniqueness is ultimately enforced by the back-end, with the service
/// retrying on a taken slug.
pub trait SlugGenerator: Send + Sync + 'static {
    /// Produces the next opaque slug.
    fn generate(&self) -> Slug;
}

/// Parameters of the nanosecond-time slug encoding.
#[derive(Debug, Clone, TypedBuilder)]
pub struct SlugSettings {
    /// Salt the multiply-xor obfuscation is derived from. Two processes
    /// with the same salt map the same instant to the same slug.
    #[builder(default = String::from("keyhole"))]
    pub salt: String,
    /// Minimum length of the produced slug; shorter encodings are padded.
    #[builder(default = 5)]
    pub min_length: usize,
}

/// Slug generator over the current nanosecond timestamp.
///
/// The timestamp (mixed with a process-local sequence so same-tick calls
/// diverge) is obfuscated with a salt-derived multiply-xor in u64 space and
/// encoded as base58. The mapping is reversible in principle; nothing
/// reverses it. Collisions across processes are tolerable — uniqueness is
/// the back-end's to enforce.
pub struct NanoSlugGenerator {
    multiplier: u64,
    mask: u64,
    min_length: usize,
    sequence: AtomicU64,
}

impl NanoSlugGenerator {
    pub fn new(settings: SlugSettings) -> Self {
        let folded = fold_salt(settings.salt.as_bytes());
        Self {
            // An even multiplier would collapse the low bits; force odd.
            multiplier: folded | 1,
            mask: folded.rotate_left(17),
            min_length: settings.min_length,
            sequence: AtomicU64::new(0),
        }
    }
}

/// FNV-1a fold of the salt into the obfuscation parameters.
fn fold_salt(salt: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in salt {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

impl SlugGenerator for NanoSlugGenerator {
    fn generate(&self) -> Slug {
        let nanos = jiff::Timestamp::now().as_nanosecond() as u64;
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let obfuscated = nanos.wrapping_add(seq).wrapping_mul(self.multiplier) ^ self.mask;

        let mut code = bs58::encode(obfuscated.to_be_bytes()).into_string();
        while code.len() < self.min_length {
            // '1' is the base58 zero digit.
            code.insert(0, '1');
        }
        Slug::new(code)
    }
}
