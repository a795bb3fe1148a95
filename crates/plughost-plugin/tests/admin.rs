// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use plughost_core::PluginError;
use plughost_plugin::{ArtifactFetcher, CodeBundle, InstallSource, ListOptions};
use plughost_test_utils::sample::GreeterModule;
use plughost_test_utils::{Descriptor, TestHost};

fn host_with(names: &[&str]) -> TestHost {
    let host = names
        .iter()
        .fold(TestHost::builder(), |b, name| {
            b.with_bundle(
                CodeBundle::new(*name).module("GreeterModule", GreeterModule::new(*name, *name)),
            )
        })
        .build()
        .unwrap();
    for name in names {
        host.write(
            &format!("{name}.plugin"),
            &Descriptor::new(*name).module("sys", "GreeterModule").render(),
        );
    }
    host.loader.start().unwrap();
    host
}

fn names(list: Vec<plughost_plugin::PluginInfo>) -> Vec<String> {
    list.into_iter().map(|p| p.name).collect()
}

#[test]
fn list_filters_and_pages() {
    let host = host_with(&["replication", "reviewers", "hooks", "Delete-Project"]);
    let admin = host.admin();

    let all = admin.list(&ListOptions::default()).unwrap();
    assert_eq!(names(all), vec!["Delete-Project", "hooks", "replication", "reviewers"]);

    let prefixed = admin
        .list(&ListOptions {
            prefix: Some("re".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(names(prefixed), vec!["replication", "reviewers"]);

    let substring = admin
        .list(&ListOptions {
            substring: Some("PROJ".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(names(substring), vec!["Delete-Project"]);

    let regex = admin
        .list(&ListOptions {
            regex: Some("re.*s".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(names(regex), vec!["reviewers"]);

    let page = admin
        .list(&ListOptions {
            start: 1,
            limit: Some(2),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(names(page), vec!["hooks", "replication"]);
}

#[test]
fn list_includes_disabled_only_when_asked() {
    let host = host_with(&["a", "b"]);
    let admin = host.admin();
    admin.disable(&["b".to_string()]).unwrap();

    assert_eq!(names(admin.list(&ListOptions::default()).unwrap()), vec!["a"]);
    let all = admin
        .list(&ListOptions {
            all: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(names(all.clone()), vec!["a", "b"]);
    assert!(all[1].disabled);
}

#[test]
fn status_of_unknown_plugin_is_not_found() {
    let host = host_with(&["a"]);
    let admin = host.admin();
    assert_eq!(admin.status("a").unwrap().name, "a");
    assert!(matches!(
        admin.status("zzz"),
        Err(PluginError::NotFound { name }) if name == "zzz"
    ));
}

#[test]
fn plugin_info_serializes() {
    let host = host_with(&["a"]);
    let info = host.admin().status("a").unwrap();
    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["name"], "a");
    assert_eq!(json["filename"], "a.plugin");
    assert_eq!(json["index_url"], "/plugins/a");
    assert_eq!(json["disabled"], false);
}

struct FakeFetcher(HashMap<String, Vec<u8>>);

#[async_trait]
impl ArtifactFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PluginError> {
        self.0
            .get(url)
            .cloned()
            .ok_or_else(|| PluginError::Fetch(format!("404 for {url}")))
    }
}

fn install_host() -> TestHost {
    let host = TestHost::builder()
        .with_bundle(CodeBundle::new("a").module("GreeterModule", GreeterModule::new("hello", "a")))
        .build()
        .unwrap();
    host.loader.start().unwrap();
    host
}

#[tokio::test(flavor = "multi_thread")]
async fn install_from_bytes() {
    let host = install_host();
    let bytes = Descriptor::new("a").module("sys", "GreeterModule").render().into_bytes();
    let info = host
        .admin()
        .install("a.plugin", InstallSource::Bytes(bytes))
        .await
        .unwrap();
    assert_eq!(info.name, "a");
    assert_eq!(host.greet("hello", "x").as_deref(), Some("a, x"));
}

#[tokio::test(flavor = "multi_thread")]
async fn install_from_url() {
    let host = install_host();
    let url = "https://plugins.example.com/a.plugin";
    let bytes = Descriptor::new("a").module("sys", "GreeterModule").render().into_bytes();
    let fetcher = FakeFetcher(HashMap::from([(url.to_string(), bytes)]));
    let admin = host.admin().with_fetcher(Arc::new(fetcher));

    admin.install("a", InstallSource::Url(url.into())).await.unwrap();
    assert!(host.exists("a.plugin"));

    let err = admin
        .install("b", InstallSource::Url("https://plugins.example.com/b.plugin".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::Fetch(_)));
    assert!(!host.exists("b.plugin"));
}

#[tokio::test(flavor = "multi_thread")]
async fn install_from_url_needs_a_fetcher() {
    let host = install_host();
    let err = host
        .admin()
        .install("a", InstallSource::Url("https://plugins.example.com/a.plugin".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::Config(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn admin_operations_respect_policy() {
    let host = TestHost::builder().with_remote_admin(false).build().unwrap();
    host.loader.start().unwrap();
    let admin = host.admin();
    let names = ["a".to_string()];

    assert!(matches!(admin.enable(&names), Err(PluginError::RemoteAdminDisabled)));
    assert!(matches!(admin.disable(&names), Err(PluginError::RemoteAdminDisabled)));
    assert!(matches!(admin.reload(&names), Err(PluginError::RemoteAdminDisabled)));
    let err = admin
        .install("a", InstallSource::Bytes(b"[plugin]\nname = \"a\"\n".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::RemoteAdminDisabled));
    // Reads stay available.
    assert!(admin.list(&ListOptions::default()).unwrap().is_empty());
}
