// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    flat = { "build-7", "build-7.log" },
    nested = { "build-7/step-3", "build-7/step-3.log" },
    dotted = { "release.v2", "release.v2.log" },
    dotted_dir = { "v1.2/console", "v1.2/console.log" },
)]
fn path_for_appends_extension_under_root(id: &str, expected: &str) {
    let layout = StreamLayout::new("/var/rakaia/streams");
    let path = layout.path_for(&StreamId::new(id).unwrap()).unwrap();

    assert_eq!(path, Path::new("/var/rakaia/streams").join(expected));
}

#[test]
fn distinct_ids_map_to_distinct_files() {
    let layout = StreamLayout::new("/root");
    let a = layout.path_for(&StreamId::new("a").unwrap()).unwrap();
    let a_log = layout.path_for(&StreamId::new("a.log").unwrap()).unwrap();
    let a_b = layout.path_for(&StreamId::new("a/b").unwrap()).unwrap();

    assert_ne!(a, a_log);
    assert_ne!(a, a_b);
    assert!(a_b.starts_with("/root/a"));
}

#[test]
fn root_is_exposed() {
    let layout = StreamLayout::new("/srv/archive");
    assert_eq!(layout.root(), Path::new("/srv/archive"));
}
