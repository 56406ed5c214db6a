//! single_update returns the first accepted reading across concurrently active
//! sources and tears every listener down right after.

use std::sync::Arc;
use std::time::Duration;

use loc_runtime::{LocationOrchestrator, RuntimeSettings};
use loc_schemas::{LocationError, SourceKind, Tier, UpdateParameters};
use loc_testkit::{eventually, reading_with_accuracy, FakePlatform};

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn balanced_single_update_takes_first_delivery() {
    let p = FakePlatform::new();
    let o = Arc::new(LocationOrchestrator::from_platform(
        p.clone(),
        RuntimeSettings::default(),
    ));

    let task = {
        let o = o.clone();
        tokio::spawn(async move {
            o.single_update(Tier::BalancedPowerAccuracy, UpdateParameters::new().interval_ms(1_000))
                .await
        })
    };

    eventually(WAIT, || p.active_listeners() == 3).await.unwrap();

    let network = reading_with_accuracy(SourceKind::Network, 5_000, 40.0);
    let passive = reading_with_accuracy(SourceKind::Passive, 5_100, 10.0);
    p.emit(SourceKind::Network, network.clone());
    p.emit(SourceKind::Passive, passive);

    // first by delivery order, not the more accurate one
    let got = task.await.unwrap().unwrap();
    assert_eq!(got, network);

    assert_eq!(p.registrations(), 3);
    assert_eq!(p.unregistrations(), 3);
    assert_eq!(p.active_listeners(), 0);
}

#[tokio::test]
async fn single_update_with_every_source_missing_fails() {
    let p = FakePlatform::with_kinds(&[]);
    let o = LocationOrchestrator::from_platform(p.clone(), RuntimeSettings::default());

    let err = tokio::time::timeout(
        WAIT,
        o.single_update(Tier::HighAccuracy, UpdateParameters::new()),
    )
    .await
    .expect("must not hang")
    .unwrap_err();
    assert!(matches!(
        err,
        LocationError::SourceUnavailable {
            kind: SourceKind::Precise,
            ..
        }
    ));
}

#[tokio::test]
async fn caller_timeout_bounds_single_update_and_releases_listeners() {
    let p = FakePlatform::new();
    let o = LocationOrchestrator::from_platform(p.clone(), RuntimeSettings::default());

    let res = tokio::time::timeout(
        Duration::from_millis(50),
        o.single_update(Tier::LowPower, UpdateParameters::new()),
    )
    .await;
    assert!(res.is_err(), "no reading was ever emitted");

    // the dropped future dropped its stream, which cancels
    eventually(WAIT, || p.active_listeners() == 0).await.unwrap();
    assert_eq!(p.registrations(), p.unregistrations());
}

#[tokio::test]
async fn one_failed_source_does_not_end_single_update() {
    let p = FakePlatform::new();
    p.fail_registration(SourceKind::Network, "radio off");
    let o = Arc::new(LocationOrchestrator::from_platform(
        p.clone(),
        RuntimeSettings::default(),
    ));

    let task = {
        let o = o.clone();
        tokio::spawn(async move { o.single_update(Tier::LowPower, UpdateParameters::new()).await })
    };
    eventually(WAIT, || p.listener_count(SourceKind::Passive) == 1)
        .await
        .unwrap();

    let passive = reading_with_accuracy(SourceKind::Passive, 1_000, 80.0);
    p.emit(SourceKind::Passive, passive.clone());
    assert_eq!(task.await.unwrap().unwrap(), passive);
}
