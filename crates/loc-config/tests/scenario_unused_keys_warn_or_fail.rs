use loc_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

#[test]
fn warn_reports_typos_without_error() {
    let yaml = r#"
arbitration:
  freshnes_threshold_ms: 1000
policy:
  balanced_interval_multiplier: 3
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)
        .expect("warn mode must not error");

    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/arbitration/freshnes_threshold_ms".to_string()]
    );
}

#[test]
fn fail_errors_on_unused_keys() {
    let yaml = r#"
runtime:
  timeout_ms: 10
  retries: 3
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "{msg}");
    assert!(msg.contains("/runtime/retries"), "{msg}");
}

#[test]
fn full_documented_config_is_clean() {
    let yaml = r#"
arbitration:
  freshness_threshold_ms: 30000
policy:
  precise_interval_floor_ms: 30000
  balanced_interval_multiplier: 2
  high_accuracy_ceiling_m: ~
  balanced_ceiling_m: ~
runtime:
  default_tier: balanced
  timeout_ms: 5000
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}

#[test]
fn unused_pointers_are_sorted() {
    let yaml = "zeta: 1\nalpha: 2\nmid:\n  b: 1\n  a: 2\n";
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/alpha", "/mid/a", "/mid/b", "/zeta"]
    );
}
