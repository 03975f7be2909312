//! URL-hash load balancing strategy.
//!
//! Requests for the same URL land on the same backend while the pool size
//! is unchanged. There is no hash ring: resizing the pool remaps most URLs.

use crate::load_balancer::pool::ServerPool;

/// FNV-1a 64-bit offset basis, used as the default seed.
pub const DEFAULT_SEED: u64 = 0xcbf2_9ce4_8422_2325;

const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// URL-hash selector.
#[derive(Debug, Clone)]
pub struct UrlHash {
    seed: u64,
}

impl Default for UrlHash {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl UrlHash {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn pick(&self, url: &str, pool: &ServerPool) -> usize {
        (self.hash(url.as_bytes()) % pool.len() as u64) as usize
    }

    /// Seeded FNV-1a. Each call starts from the seed, so the result depends
    /// only on the input.
    pub fn hash(&self, data: &[u8]) -> u64 {
        data.iter().fold(self.seed, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::tests::pool_of;

    #[test]
    fn test_known_fnv_vector() {
        // FNV-1a 64 of "a"
        assert_eq!(UrlHash::default().hash(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_same_url_same_backend() {
        let pool = pool_of(5);
        let uh = UrlHash::default();
        for url in ["/", "/process?id=1", "/images/cat.png", "/api/v1/users/42"] {
            let first = uh.pick(url, &pool);
            assert!((0..20).all(|_| uh.pick(url, &pool) == first));
        }
    }

    #[test]
    fn test_deterministic_per_pool_size() {
        let uh = UrlHash::default();
        for n in 1..8 {
            let pool = pool_of(n);
            let a = uh.pick("/resource/17", &pool);
            let b = UrlHash::default().pick("/resource/17", &pool);
            assert_eq!(a, b);
            assert!(a < n);
        }
    }

    #[test]
    fn test_seed_changes_mapping() {
        let a = UrlHash::new(1).hash(b"/resource");
        let b = UrlHash::new(2).hash(b"/resource");
        assert_ne!(a, b);
    }

    #[test]
    fn test_spreads_across_backends() {
        let pool = pool_of(4);
        let uh = UrlHash::default();
        let mut seen = [false; 4];
        for i in 0..200 {
            seen[uh.pick(&format!("/item/{}", i), &pool)] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
