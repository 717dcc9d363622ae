use taken::cache::{CacheStore, FileStore, ResultCache};
use taken::check::{
    CheckError, CheckOptions, Client, Outcome, ProbeResult, Status, check_name, summarize,
};
use taken::metadata::normalize_by_id;
use taken::registry::{Registry, RegistryId};
use taken::rules::{RuleViolation, canon_crate_name, check_rules};
use taken::sanitize::sanitize;

#[test]
fn public_api_sanitize() {
    assert_eq!(sanitize("<script>x</script>@scope/my-pkg_1.0"), "@scope/my-pkg_1.0");
    assert_eq!(sanitize("   "), "");
}

#[test]
fn public_api_empty_name_returns_error() {
    let client = Client::new();
    assert!(matches!(
        check_name(&client, "", &CheckOptions::default()),
        Err(CheckError::EmptyName { .. })
    ));
    assert!(matches!(
        check_name(&client, "   ", &CheckOptions::default()),
        Err(CheckError::EmptyName { .. })
    ));
}

#[test]
fn public_api_error_messages() {
    let err = check_name(&Client::new(), "   ", &CheckOptions::default()).unwrap_err();
    assert!(err.to_string().contains("package name is required"), "{err}");
}

#[test]
fn client_default_equals_new() {
    let client: Client = Client::default();
    assert_eq!(client.registries(), Registry::defaults().as_slice());
    assert!(client.registry(RegistryId::Pypi).is_some());
}

#[test]
fn public_api_cache_round_trip_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResultCache::new(FileStore::new(dir.path().join("cache.json")));
    let results = vec![
        ProbeResult::new(RegistryId::Npm, "left-pad", Outcome::Available),
        ProbeResult::new(
            RegistryId::Cargo,
            "left-pad",
            Outcome::Errored {
                detail: "HTTP 503".to_string(),
            },
        ),
    ];
    cache.put("left-pad", &results);
    assert_eq!(cache.get("left-pad"), Some(results));
    assert!(cache.has(RegistryId::Cargo, "left-pad"));
    assert!(!cache.has(RegistryId::Pypi, "left-pad"));

    cache.clear();
    assert!(cache.get("left-pad").is_none());
}

#[test]
fn public_api_clear_keeps_unrelated_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.json");
    FileStore::new(&path)
        .set("unrelated", "keep me".to_string())
        .unwrap();

    let cache = ResultCache::new(FileStore::new(&path));
    cache.put(
        "vue",
        &[ProbeResult::new(RegistryId::Npm, "vue", Outcome::Available)],
    );
    cache.clear();
    assert!(cache.get("vue").is_none());

    let store = FileStore::new(&path);
    assert_eq!(store.keys().unwrap(), vec!["unrelated".to_string()]);
    assert_eq!(store.get("unrelated").unwrap().as_deref(), Some("keep me"));
}

#[test]
fn public_api_summary() {
    let results = vec![
        ProbeResult::new(RegistryId::Npm, "x", Outcome::Available),
        ProbeResult::new(
            RegistryId::Pypi,
            "x",
            Outcome::Errored {
                detail: "timeout".to_string(),
            },
        ),
    ];
    let summary = summarize(&results);
    assert_eq!((summary.total, summary.definitive), (2, 1));
    assert!((summary.success_rate - 50.0).abs() < f64::EPSILON);
    assert_eq!(results[0].status(), Status::Available);
}

#[test]
fn public_api_rules() {
    assert_eq!(canon_crate_name("Foo-Bar"), "foo_bar");
    assert_eq!(check_rules(RegistryId::Cargo, "std"), Err(RuleViolation::Reserved));
    assert_eq!(check_rules(RegistryId::Npm, "left-pad"), Ok(()));
}

#[test]
fn public_api_normalize_unknown_registry() {
    let metadata = normalize_by_id("rubygems", "rails", &serde_json::json!({ "version": "7" }));
    assert_eq!(metadata.name.as_deref(), Some("rails"));
    assert!(metadata.is_empty());
}

#[test]
#[ignore] // requires network access
fn public_api_taken_returns_taken() {
    let client = Client::new();
    let options = CheckOptions {
        registries: Some(vec![RegistryId::Cargo]),
        ..CheckOptions::default()
    };
    let results = check_name(&client, "serde", &options).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status(), Status::Taken);
    assert!(results[0].metadata().is_some());
}

#[test]
#[ignore] // requires network access
fn public_api_available_returns_available() {
    let client = Client::new();
    let results =
        check_name(&client, "zzzyyyxxxwww-not-a-real-package", &CheckOptions::default()).unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.status() == Status::Available));
}
