//! Conformance suite runner.
//!
//! Convention:
//!   positive/               -- *.conf + *.expected.json (graph dump, no error expected)
//!   negative/pass0..pass6/  -- *.conf + *.expected-error.json (error expected)
//!   roundtrip/              -- *.conf that must survive emit + re-parse unchanged

use crate::tap::Tap;
use caseconf_core::{convert_with_provider, emit, serialize, FileSystemProvider, ParseOptions};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct RunResult {
    pub failed: usize,
    pub report: Tap,
}

pub fn run_suite(suite_dir: &Path) -> RunResult {
    let mut tap = Tap::new();

    run_positive_tests(suite_dir, &mut tap);

    for pass in 0..=6 {
        run_negative_tests(suite_dir, pass, &mut tap);
    }

    run_roundtrip_tests(suite_dir, &mut tap);

    let failed = tap.failure_count();
    debug!(points = tap.point_count(), failed, "conformance suite finished");

    RunResult {
        failed,
        report: tap,
    }
}

fn run_positive_tests(suite_dir: &Path, tap: &mut Tap) {
    let dir = suite_dir.join("positive");
    for conf_path in glob_conf_files(&dir) {
        let stem = stem(&conf_path);
        let expected_path = dir.join(format!("{}.expected.json", stem));
        if !expected_path.exists() {
            tap.not_ok(
                format!("positive/{}", stem),
                format!("missing expected file: {}", expected_path.display()),
            );
            continue;
        }
        run_positive_test(&conf_path, &expected_path, &stem, tap);
    }
}

fn run_negative_tests(suite_dir: &Path, pass: u8, tap: &mut Tap) {
    let dir = suite_dir.join(format!("negative/pass{}", pass));
    for conf_path in glob_conf_files(&dir) {
        let stem = stem(&conf_path);
        let expected_path = dir.join(format!("{}.expected-error.json", stem));
        if !expected_path.exists() {
            tap.not_ok(
                format!("negative/pass{}/{}", pass, stem),
                format!("missing expected-error file: {}", expected_path.display()),
            );
            continue;
        }
        run_negative_test(&conf_path, &expected_path, &stem, pass, tap);
    }
}

fn run_roundtrip_tests(suite_dir: &Path, tap: &mut Tap) {
    let dir = suite_dir.join("roundtrip");
    for conf_path in glob_conf_files(&dir) {
        let test_name = format!("roundtrip/{}", stem(&conf_path));
        match roundtrip(&conf_path) {
            Ok(()) => tap.ok(&test_name),
            Err(msg) => tap.not_ok(&test_name, msg),
        }
    }
}

fn run_positive_test(conf_path: &Path, expected_path: &Path, name: &str, tap: &mut Tap) {
    let test_name = format!("positive/{}", name);

    let expected_json = match read_json(expected_path) {
        Ok(v) => v,
        Err(e) => {
            tap.not_ok(&test_name, format!("failed to read expected file: {}", e));
            return;
        }
    };

    match convert_with_provider(conf_path, &FileSystemProvider, &ParseOptions::default()) {
        Ok(graph) => {
            let got = serialize(&graph);
            if json_equal(&got, &expected_json) {
                tap.ok(&test_name);
            } else {
                let diff = json_diff(&expected_json, &got);
                tap.not_ok(&test_name, format!("output mismatch:\n{}", diff));
            }
        }
        Err(e) => {
            tap.not_ok(
                &test_name,
                format!("unexpected conversion error (pass {}): {}", e.pass, e.message),
            );
        }
    }
}

fn run_negative_test(
    conf_path: &Path,
    expected_error_path: &Path,
    name: &str,
    pass: u8,
    tap: &mut Tap,
) {
    let test_name = format!("negative/pass{}/{}", pass, name);

    let expected_error = match read_json(expected_error_path) {
        Ok(v) => v,
        Err(e) => {
            tap.not_ok(
                &test_name,
                format!("failed to read expected-error file: {}", e),
            );
            return;
        }
    };

    match convert_with_provider(conf_path, &FileSystemProvider, &ParseOptions::default()) {
        Err(got_error) => {
            let got_json = got_error.to_json_value();
            if json_equal(&got_json, &expected_error) {
                tap.ok(&test_name);
            } else {
                let diff = json_diff(&expected_error, &got_json);
                tap.not_ok(&test_name, format!("error mismatch:\n{}", diff));
            }
        }
        Ok(_) => {
            tap.not_ok(
                &test_name,
                format!("expected a pass {} error but conversion succeeded", pass),
            );
        }
    }
}

fn roundtrip(conf_path: &Path) -> Result<(), String> {
    let options = ParseOptions::default();
    let first = convert_with_provider(conf_path, &FileSystemProvider, &options)
        .map_err(|e| format!("conversion failed: {}", e))?;
    let text = emit(&first).map_err(|e| format!("emit failed: {}", e))?;
    debug!(file = %conf_path.display(), bytes = text.len(), "re-parsing emitted text");
    let second = caseconf_core::convert_str(&text, "emitted", &options)
        .map_err(|e| format!("re-parse failed: {}\n{}", e, text))?;
    if first.structurally_eq(&second) {
        Ok(())
    } else {
        Err(format!(
            "graph changed after emit + re-parse:\n{}",
            json_diff(&serialize(&first), &serialize(&second))
        ))
    }
}

// -- Helpers --

fn glob_conf_files(dir: &Path) -> Vec<PathBuf> {
    let mut results = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("conf") {
                results.push(path);
            }
        }
    }
    results.sort();
    results
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

fn read_json(path: &Path) -> Result<Value, String> {
    let src = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&src).map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))
}

/// Deep equality of two JSON values, normalizing number types.
fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(am), Value::Object(bm)) => {
            am.len() == bm.len()
                && am
                    .iter()
                    .all(|(k, v)| bm.get(k).is_some_and(|bv| json_equal(v, bv)))
        }
        (Value::Array(av), Value::Array(bv)) => {
            av.len() == bv.len() && av.iter().zip(bv).all(|(a, b)| json_equal(a, b))
        }
        (Value::Number(an), Value::Number(bn)) => an.as_f64() == bn.as_f64(),
        _ => a == b,
    }
}

fn json_diff(expected: &Value, got: &Value) -> String {
    let exp_str = serde_json::to_string_pretty(expected).unwrap_or_default();
    let got_str = serde_json::to_string_pretty(got).unwrap_or_default();
    format!("--- expected\n{}\n+++ got\n{}", exp_str, got_str)
}
