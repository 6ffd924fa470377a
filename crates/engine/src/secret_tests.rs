// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn generated_secrets_are_prefixed_and_unique() {
    let a = generate(POOL_TOKEN_PREFIX);
    let b = generate(POOL_TOKEN_PREFIX);
    assert!(a.starts_with("rpt_"));
    assert_eq!(a.len(), 4 + 64);
    assert_ne!(a, b);
}

#[test]
fn digest_is_stable_sha256_hex() {
    assert_eq!(
        digest("abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_ne!(digest("abc"), digest("abd"));
}
