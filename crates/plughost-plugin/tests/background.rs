// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use plughost_plugin::{CodeBundle, PeriodicRescan, PluginCleaner};
use plughost_test_utils::sample::GreeterModule;
use plughost_test_utils::{Descriptor, TestHost};
use tokio_util::sync::CancellationToken;

fn host() -> TestHost {
    TestHost::builder()
        .with_bundle(CodeBundle::new("a").module("GreeterModule", GreeterModule::new("hello", "a")))
        .build()
        .unwrap()
}

fn plugin() -> String {
    Descriptor::new("a").module("sys", "GreeterModule").render()
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test(flavor = "multi_thread")]
async fn periodic_rescan_picks_up_new_artifacts() {
    let host = host();
    host.loader.start().unwrap();
    let rescan = PeriodicRescan::spawn(
        host.loader.clone(),
        Duration::from_millis(20),
        CancellationToken::new(),
    );

    host.write("a.plugin", &plugin());
    assert!(eventually(|| host.greet("hello", "x").is_some()).await);

    std::fs::remove_file(host.plugins_dir().join("a.plugin")).unwrap();
    assert!(eventually(|| host.loader.get("a").is_none()).await);
    rescan.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn cleaner_drains_after_unload() {
    let host = host();
    host.write("a.plugin", &plugin());
    host.loader.start().unwrap();
    let cleaner = PluginCleaner::spawn(
        host.loader.clone(),
        Duration::from_millis(5),
        3,
        CancellationToken::new(),
    );
    assert_eq!(host.temp_copies().len(), 1);

    std::fs::remove_file(host.plugins_dir().join("a.plugin")).unwrap();
    host.loader.rescan().unwrap();
    assert!(eventually(|| host.loader.pending_cleanups() == 0).await);
    assert!(host.temp_copies().is_empty());
    cleaner.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn cleaner_shutdown_drains_the_queue() {
    let host = host();
    host.write("a.plugin", &plugin());
    host.loader.start().unwrap();
    let cancel = CancellationToken::new();
    let cleaner = PluginCleaner::spawn(host.loader.clone(), Duration::from_secs(60), 1, cancel.clone());

    // Keep the copy undeletable until the cleaner has given up once.
    let copy = host
        .loader
        .with_running("a", |p| p.cleanup_path().map(|p| p.to_path_buf()))
        .flatten()
        .unwrap();
    std::fs::remove_file(&copy).unwrap();
    std::fs::create_dir(&copy).unwrap();
    std::fs::remove_file(host.plugins_dir().join("a.plugin")).unwrap();
    host.loader.rescan().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(host.loader.pending_cleanups(), 1);

    std::fs::remove_dir(&copy).unwrap();
    cleaner.shutdown().await;
    assert!(cancel.is_cancelled());
    assert_eq!(host.loader.pending_cleanups(), 0);
}
