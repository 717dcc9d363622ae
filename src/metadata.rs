//! Normalizing each registry's package document into one metadata record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::RegistryId;
use crate::sanitize::strip_markup;

/// Best-effort description of a package that already exists.
///
/// Every field is optional: `None` means the registry did not provide it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Package name the metadata was requested for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Latest published version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// One-line summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Author, or the owners joined with `, `.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Current maintainer, when it differs from the author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,
    /// License expression as published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// When the latest version was published or the package last changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    /// When the package was first published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    /// Keywords, or npm dist-tag names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Runtime dependencies of the latest version, name to version range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeMap<String, String>>,
}

impl PackageMetadata {
    /// True when nothing beyond the package name is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self
            == Self {
                name: self.name.clone(),
                ..Self::default()
            }
    }
}

/// Extract metadata from the JSON document `registry` returned for `name`.
///
/// Missing or mistyped fields are left as `None`; this never fails.
#[must_use]
pub fn normalize(registry: RegistryId, name: &str, raw: &Value) -> PackageMetadata {
    let mut metadata = PackageMetadata {
        name: Some(name.to_string()),
        ..PackageMetadata::default()
    };
    match registry {
        RegistryId::Npm => npm(raw, &mut metadata),
        RegistryId::Pypi => pypi(raw, &mut metadata),
        RegistryId::Cargo => cargo(raw, &mut metadata),
    }
    metadata
}

/// Like [`normalize`], for a registry given by its string id.
///
/// Ids outside the directory get a record holding only the name.
#[must_use]
pub fn normalize_by_id(registry: &str, name: &str, raw: &Value) -> PackageMetadata {
    match registry.parse::<RegistryId>() {
        Ok(id) => normalize(id, name, raw),
        Err(_) => PackageMetadata {
            name: Some(name.to_string()),
            ..PackageMetadata::default()
        },
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    let cleaned = strip_markup(value?.as_str()?);
    let trimmed = cleaned.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    Some(items.iter().filter_map(|v| text(Some(v))).collect())
}

// npm author is either "Name <mail> (url)" or { "name": ..., "email": ... }
fn npm_author(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Object(person) => text(person.get("name")),
        other => text(Some(other)),
    }
}

fn npm(raw: &Value, metadata: &mut PackageMetadata) {
    let dist_tags = raw.get("dist-tags").and_then(Value::as_object);
    let latest = dist_tags.and_then(|tags| text(tags.get("latest")));

    if let Some(tags) = dist_tags {
        metadata.tags = Some(tags.keys().cloned().collect());
    }
    metadata.published_at = text(raw.pointer("/time/created"));

    let Some(latest) = latest else {
        return;
    };
    metadata.last_updated = text(raw.get("time").and_then(|t| t.get(&latest)));

    if let Some(manifest) = raw.get("versions").and_then(|v| v.get(&latest)) {
        metadata.description = text(manifest.get("description"));
        metadata.author = npm_author(manifest.get("author"));
        metadata.license = text(manifest.get("license"));
        metadata.dependencies = manifest
            .get("dependencies")
            .and_then(Value::as_object)
            .map(|deps| {
                deps.iter()
                    .filter_map(|(dep, range)| Some((dep.clone(), range.as_str()?.to_string())))
                    .collect()
            });
    }
    metadata.version = Some(latest);
}

fn pypi(raw: &Value, metadata: &mut PackageMetadata) {
    let Some(info) = raw.get("info") else {
        return;
    };
    metadata.version = text(info.get("version"));
    metadata.description = text(info.get("summary"));
    metadata.author = text(info.get("author"));
    metadata.maintainer = text(info.get("maintainer"));
    metadata.license = text(info.get("license"));
    metadata.last_updated = text(info.get("updated"));
    metadata.published_at = text(info.get("upload_time"));
    metadata.tags = text(info.get("keywords")).map(|keywords| {
        keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect()
    });
}

fn cargo(raw: &Value, metadata: &mut PackageMetadata) {
    let krate = raw.get("crate");
    metadata.version =
        text(raw.get("newest_version")).or_else(|| text(krate.and_then(|c| c.get("newest_version"))));

    let Some(krate) = krate else {
        return;
    };
    metadata.description = text(krate.get("description"));
    metadata.author = string_list(krate.get("owner_names"))
        .filter(|owners| !owners.is_empty())
        .map(|owners| owners.join(", "));
    metadata.last_updated = text(krate.get("updated_at"));
    metadata.published_at = text(krate.get("created_at"));
    metadata.tags = string_list(krate.get("keywords"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn react() -> Value {
        json!({
            "name": "react",
            "dist-tags": { "latest": "18.2.0", "next": "19.0.0-rc", "canary": "19.0.0-canary" },
            "versions": {
                "18.2.0": {
                    "description": "React is a JavaScript library for building user interfaces.",
                    "author": { "name": "Meta", "email": "opensource@fb.com" },
                    "license": "MIT",
                    "dependencies": { "loose-envify": "^1.1.0" }
                }
            },
            "time": {
                "created": "2011-10-26T17:46:21.942Z",
                "18.2.0": "2022-06-14T19:46:38.369Z"
            }
        })
    }

    #[test]
    fn npm_document() {
        let metadata = normalize(RegistryId::Npm, "react", &react());
        assert_eq!(metadata.name.as_deref(), Some("react"));
        assert_eq!(metadata.version.as_deref(), Some("18.2.0"));
        assert_eq!(metadata.author.as_deref(), Some("Meta"));
        assert_eq!(metadata.license.as_deref(), Some("MIT"));
        assert_eq!(metadata.last_updated.as_deref(), Some("2022-06-14T19:46:38.369Z"));
        assert_eq!(metadata.published_at.as_deref(), Some("2011-10-26T17:46:21.942Z"));
        assert_eq!(
            metadata.tags,
            Some(vec!["latest".to_string(), "next".to_string(), "canary".to_string()])
        );
        let deps = metadata.dependencies.unwrap();
        assert_eq!(deps.get("loose-envify").map(String::as_str), Some("^1.1.0"));
    }

    #[test]
    fn npm_string_author() {
        let raw = json!({
            "dist-tags": { "latest": "1.0.0" },
            "versions": { "1.0.0": { "author": "Jane Doe <jane@example.com>" } }
        });
        let metadata = normalize(RegistryId::Npm, "pkg", &raw);
        // the mail part looks like a tag and is stripped with the rest of the markup
        assert_eq!(metadata.author.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn npm_only_dist_tags() {
        let raw = json!({ "dist-tags": { "latest": "18.2.0" } });
        let metadata = normalize(RegistryId::Npm, "react", &raw);
        assert_eq!(metadata.version.as_deref(), Some("18.2.0"));
        assert!(metadata.description.is_none());
        // absent dependencies stay absent instead of becoming an empty map
        assert!(metadata.dependencies.is_none());
    }

    #[test]
    fn npm_without_latest_keeps_tags_only() {
        let raw = json!({ "dist-tags": { "beta": "0.1.0" }, "versions": {} });
        let metadata = normalize(RegistryId::Npm, "pkg", &raw);
        assert!(metadata.version.is_none());
        assert_eq!(metadata.tags, Some(vec!["beta".to_string()]));
    }

    #[test]
    fn pypi_document() {
        let raw = json!({
            "info": {
                "version": "2.31.0",
                "summary": "Python HTTP for Humans.",
                "author": "Kenneth Reitz",
                "maintainer": "",
                "license": "Apache 2.0",
                "keywords": "http, requests,,client"
            }
        });
        let metadata = normalize(RegistryId::Pypi, "requests", &raw);
        assert_eq!(metadata.version.as_deref(), Some("2.31.0"));
        assert_eq!(metadata.description.as_deref(), Some("Python HTTP for Humans."));
        assert_eq!(metadata.author.as_deref(), Some("Kenneth Reitz"));
        assert!(metadata.maintainer.is_none());
        assert_eq!(metadata.license.as_deref(), Some("Apache 2.0"));
        assert_eq!(
            metadata.tags,
            Some(vec!["http".to_string(), "requests".to_string(), "client".to_string()])
        );
        assert!(metadata.last_updated.is_none());
    }

    #[test]
    fn pypi_without_info() {
        let metadata = normalize(RegistryId::Pypi, "requests", &json!({ "releases": {} }));
        assert!(metadata.is_empty());
    }

    #[test]
    fn cargo_document() {
        let raw = json!({
            "crate": {
                "description": "A generic serialization/deserialization framework",
                "owner_names": ["dtolnay", "erickt"],
                "updated_at": "2024-01-01T00:00:00Z",
                "created_at": "2014-12-05T20:20:39Z",
                "keywords": ["serde", "serialization", "no_std"]
            },
            "newest_version": "1.0.195"
        });
        let metadata = normalize(RegistryId::Cargo, "serde", &raw);
        assert_eq!(metadata.version.as_deref(), Some("1.0.195"));
        assert_eq!(metadata.author.as_deref(), Some("dtolnay, erickt"));
        assert_eq!(metadata.published_at.as_deref(), Some("2014-12-05T20:20:39Z"));
        assert_eq!(metadata.tags.as_ref().map(Vec::len), Some(3));
        assert!(metadata.license.is_none());
    }

    #[test]
    fn cargo_newest_version_inside_crate() {
        let raw = json!({ "crate": { "newest_version": "0.3.1" } });
        let metadata = normalize(RegistryId::Cargo, "foo", &raw);
        assert_eq!(metadata.version.as_deref(), Some("0.3.1"));
    }

    #[test]
    fn mistyped_fields_are_absent() {
        let raw = json!({
            "dist-tags": { "latest": 7 },
            "versions": "nope",
            "time": null
        });
        let metadata = normalize(RegistryId::Npm, "pkg", &raw);
        assert!(metadata.version.is_none());
        assert!(metadata.last_updated.is_none());

        let metadata = normalize(RegistryId::Cargo, "pkg", &json!({ "crate": { "owner_names": "x" } }));
        assert!(metadata.author.is_none());
    }

    #[test]
    fn non_object_documents_yield_only_the_name() {
        for raw in [json!(null), json!([1, 2]), json!("text"), json!(42)] {
            for id in RegistryId::ALL {
                let metadata = normalize(id, "pkg", &raw);
                assert!(metadata.is_empty(), "{id}: {metadata:?}");
                assert_eq!(metadata.name.as_deref(), Some("pkg"));
            }
        }
    }

    #[test]
    fn unknown_registry_yields_only_the_name() {
        let metadata = normalize_by_id("maven", "junit", &react());
        assert_eq!(
            metadata,
            PackageMetadata {
                name: Some("junit".to_string()),
                ..PackageMetadata::default()
            }
        );
        assert_eq!(
            normalize_by_id("npm", "react", &react()).version.as_deref(),
            Some("18.2.0")
        );
    }

    #[test]
    fn markup_is_stripped_from_text_fields() {
        let raw = json!({ "info": { "summary": "<b>Fast</b> <script>x()</script>parser" } });
        let metadata = normalize(RegistryId::Pypi, "p", &raw);
        assert_eq!(metadata.description.as_deref(), Some("Fast parser"));
    }
}
