// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn id(s: &str) -> StreamId {
    StreamId::new(s).unwrap()
}

#[test]
fn minted_token_validates_for_its_stream() {
    let mint = Mint::new().unwrap();
    let token = mint.mint(&id("build-1"));

    assert!(mint.validate(&id("build-1"), &token).is_ok());
}

#[test]
fn token_is_lowercase_hex_of_sha512_tag() {
    let mint = Mint::from_secret(&[7u8; SECRET_LEN]).unwrap();
    let token = mint.mint(&id("build-1"));

    assert_eq!(token.len(), 128);
    assert!(token.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
}

#[test]
fn same_secret_gives_same_token() {
    let a = Mint::from_secret(&[1u8; SECRET_LEN]).unwrap();
    let b = Mint::from_secret(&[1u8; SECRET_LEN]).unwrap();

    assert_eq!(a.mint(&id("x")), b.mint(&id("x")));
}

#[test]
fn fresh_mints_do_not_share_tokens() {
    let a = Mint::new().unwrap();
    let b = Mint::new().unwrap();
    let token = a.mint(&id("x"));

    assert!(matches!(
        b.validate(&id("x"), &token),
        Err(MintError::Unauthorized)
    ));
}

#[parameterized(
    empty = { "" },
    garbage = { "not-a-token" },
    truncated = { "truncated" },
    uppercase = { "uppercase" },
    other_stream = { "other_stream" },
)]
fn bad_tokens_are_uniformly_unauthorized(case: &str) {
    let mint = Mint::from_secret(&[3u8; SECRET_LEN]).unwrap();
    let good = mint.mint(&id("build-1"));
    let token = match case {
        "truncated" => good[..good.len() - 2].to_string(),
        "uppercase" => good.to_uppercase(),
        "other_stream" => mint.mint(&id("build-2")),
        other => other.to_string(),
    };

    assert!(matches!(
        mint.validate(&id("build-1"), &token),
        Err(MintError::Unauthorized)
    ));
}

#[test]
fn debug_redacts_secret() {
    let mint = Mint::from_secret(&[9u8; SECRET_LEN]).unwrap();
    let rendered = format!("{mint:?}");

    assert!(rendered.contains("REDACTED"));
    assert!(!rendered.contains("keyed"));
}
