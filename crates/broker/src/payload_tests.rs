// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    number = { json!(42), json!({"value": 42}) },
    string = { json!("homing"), json!({"value": "homing"}) },
    boolean = { json!(true), json!({"value": true}) },
    null = { json!(null), json!({"value": null}) },
)]
fn scalars_are_wrapped(input: Value, expected: Value) {
    assert_eq!(normalize_payload(input), expected);
}

#[test]
fn objects_and_arrays_pass_through() {
    let obj = json!({"old": "picking", "new": "placing"});
    assert_eq!(normalize_payload(obj.clone()), obj);

    let arr = json!([1, 2, 3]);
    assert_eq!(normalize_payload(arr.clone()), arr);
}
