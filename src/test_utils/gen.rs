//! Randomized sample documents for the conformance-style suites.

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::sample::{SampleConfig, SampleLimits, SampleTls};

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

fn word(rng: &mut StdRng) -> String {
    let len = rng.gen_range(4..12);
    (0..len)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}

/// A document with every field set (except the server-owned revision).
pub fn sample_full(rng: &mut StdRng) -> SampleConfig {
    SampleConfig {
        revision: None,
        enabled: Some(rng.gen_bool(0.5)),
        name: Some(word(rng)),
        endpoint: Some(format!("https://{}.example.com", word(rng))),
        auth_token: Some(format!("token-{}", word(rng))),
        limits: Some(SampleLimits {
            max_connections: Some(rng.gen_range(1..10_000)),
            max_streams: Some(rng.gen_range(1..10_000)),
            read_timeout_ms: Some(rng.gen_range(1..60_000)),
            write_timeout_ms: Some(rng.gen_range(1..60_000)),
            burst: Some(rng.gen_range(1..1_000)),
            rate: Some(rng.gen_range(1..1_000)),
        }),
        tls: Some(SampleTls {
            cert_path: Some(format!("/etc/certs/{}.pem", word(rng))),
            key_data: Some(format!("key-{}", word(rng))),
            insecure: Some(rng.gen_bool(0.2)),
            ca_bundle: Some(Bytes::from(word(rng).into_bytes())),
        }),
        tags: (0..rng.gen_range(1..4)).map(|_| word(rng)).collect(),
        attributes: (0..rng.gen_range(1..4))
            .map(|_| (word(rng), word(rng)))
            .collect(),
    }
}

/// A document where each field is set with probability `p`.
pub fn sample_partial(rng: &mut StdRng, p: f64) -> SampleConfig {
    let full = sample_full(rng);
    let mut keep = || rng.gen_bool(p);
    SampleConfig {
        revision: None,
        enabled: keep().then(|| full.enabled.unwrap()),
        name: keep().then(|| full.name.clone().unwrap()),
        endpoint: keep().then(|| full.endpoint.clone().unwrap()),
        auth_token: keep().then(|| full.auth_token.clone().unwrap()),
        limits: keep().then(|| full.limits.clone().unwrap()),
        tls: keep().then(|| full.tls.clone().unwrap()),
        tags: if keep() { full.tags.clone() } else { Vec::new() },
        attributes: if keep() {
            full.attributes.clone()
        } else {
            Default::default()
        },
    }
}
