//! End-to-end tests against an in-process fake JVM.

mod support;

use hotswap::{attach, redefine, HotSwapConfig, HotSwapError};
use hotswap::session::attach_with_timeout;
use jdwp_client::commands::class_status;
use jdwp_client::connector::SocketAttachingConnector;
use jdwp_client::protocol::error_codes;
use jdwp_client::{Connector, JdwpError};
use std::path::Path;
use support::{closed_port, silent_listener, FakeVm, FakeVmOptions};
use tempfile::TempDir;

const FOO: &str = "com.example.Foo";

fn socket() -> Connector {
    Connector::Socket(SocketAttachingConnector)
}

fn class_bytes(len: u8) -> Vec<u8> {
    let mut bytes = vec![0xca, 0xfe, 0xba, 0xbe];
    bytes.extend((4..len).map(|b| b.wrapping_mul(3)));
    bytes
}

fn write_class(base: &Path, relative: &str, bytes: &[u8]) {
    let path = base.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

#[tokio::test]
async fn attach_then_detach_disposes_once() {
    let vm = FakeVm::start(FakeVmOptions::default()).await;

    let mut session = attach("127.0.0.1", &vm.port.to_string(), &socket()).await.unwrap();
    assert!(session.is_attached());
    assert!(session.can_redefine_classes());
    assert!(session.capabilities().can_redefine_classes);
    assert!(session.capabilities().can_get_bytecodes);
    assert!(!session.capabilities().can_add_method);
    assert_eq!(session.version().vm_name, "Fake HotSpot");
    assert_eq!(session.target(), format!("127.0.0.1:{}", vm.port));

    assert!(session.detach().await.is_none());
    assert!(!session.is_attached());
    assert!(session.detach().await.is_none());

    let recorded = vm.recorded();
    assert!(recorded.disposed);
    assert_eq!(recorded.commands.iter().filter(|c| **c == (1, 6)).count(), 1);
}

#[tokio::test]
async fn attach_rejects_target_without_redefinition() {
    let vm = FakeVm::start(FakeVmOptions {
        can_redefine: false,
        ..FakeVmOptions::default()
    })
    .await;

    let result = attach("127.0.0.1", &vm.port.to_string(), &socket()).await;

    assert!(matches!(result, Err(HotSwapError::UnsupportedTarget { .. })));
    assert!(vm.recorded().disposed);
}

#[tokio::test]
async fn attach_treats_pre_1_4_target_as_unsupported() {
    let vm = FakeVm::start(FakeVmOptions {
        jdwp_version: (1, 3),
        ..FakeVmOptions::default()
    })
    .await;

    let result = attach("127.0.0.1", &vm.port.to_string(), &socket()).await;

    assert!(matches!(result, Err(HotSwapError::UnsupportedTarget { .. })));
    assert!(!vm.recorded().commands.contains(&(1, 17)));
}

#[tokio::test]
async fn attach_to_closed_port_fails() {
    let port = closed_port().await;

    match attach("127.0.0.1", &port.to_string(), &socket()).await {
        Err(HotSwapError::AttachFailed { target, source }) => {
            assert_eq!(target, format!("127.0.0.1:{}", port));
            assert!(matches!(source, JdwpError::Io(_)));
        }
        other => panic!("expected AttachFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn detach_reports_refused_dispose_as_warning() {
    let vm = FakeVm::start(FakeVmOptions {
        reject_dispose: Some(error_codes::VM_DEAD),
        ..FakeVmOptions::default()
    })
    .await;

    let mut session = attach("127.0.0.1", &vm.port.to_string(), &socket()).await.unwrap();
    let warning = session.detach().await.expect("dispose was refused");

    assert!(matches!(warning.source, JdwpError::Reply { code: 112, .. }));
    assert!(!session.is_attached());
    assert!(session.detach().await.is_none());
}

#[tokio::test]
async fn attach_times_out_when_version_is_unanswered() {
    let vm = FakeVm::start(FakeVmOptions {
        stall_on: Some((1, 1)),
        ..FakeVmOptions::default()
    })
    .await;

    let result = attach_with_timeout("127.0.0.1", &vm.port.to_string(), Some(200), &socket()).await;

    match result {
        Err(HotSwapError::AttachFailed { source, .. }) => {
            assert!(matches!(source, JdwpError::Timeout(_)));
        }
        other => panic!("expected AttachFailed, got {:?}", other),
    }
    let recorded = vm.recorded();
    assert_eq!(recorded.commands, vec![(1, 7), (1, 1)]);
    assert!(!recorded.disposed);
}

#[tokio::test]
async fn redefine_submits_image_for_single_handle() {
    let vm = FakeVm::start(FakeVmOptions::default().with_class(FOO, 0x1234)).await;
    let image = class_bytes(37);

    let mut session = attach("127.0.0.1", &vm.port.to_string(), &socket()).await.unwrap();
    let handles = redefine(&mut session, FOO, &image).await.unwrap();
    session.detach().await;

    assert_eq!(handles, 1);
    let recorded = vm.recorded();
    assert_eq!(recorded.lookups, vec!["Lcom/example/Foo;".to_string()]);
    assert_eq!(recorded.redefinitions, vec![vec![(0x1234, image)]]);
}

#[tokio::test]
async fn redefine_submits_once_per_loaded_copy() {
    let vm = FakeVm::start(
        FakeVmOptions::default()
            .with_class(FOO, 0x10)
            .with_class(FOO, 0x20),
    )
    .await;
    let image = class_bytes(12);

    let mut session = attach("127.0.0.1", &vm.port.to_string(), &socket()).await.unwrap();
    let handles = redefine(&mut session, FOO, &image).await.unwrap();
    session.detach().await;

    assert_eq!(handles, 2);
    assert_eq!(
        vm.recorded().redefinitions,
        vec![vec![(0x10, image.clone())], vec![(0x20, image)]]
    );
}

#[tokio::test]
async fn redefine_unknown_type_submits_nothing() {
    let vm = FakeVm::start(FakeVmOptions::default()).await;

    let mut session = attach("127.0.0.1", &vm.port.to_string(), &socket()).await.unwrap();
    let result = redefine(&mut session, FOO, &class_bytes(8)).await;
    session.detach().await;

    assert!(matches!(result, Err(HotSwapError::TypeNotLoaded(name)) if name == FOO));
    assert!(vm.recorded().redefinitions.is_empty());
}

#[tokio::test]
async fn redefine_treats_not_found_reply_as_not_loaded() {
    let vm = FakeVm::start(FakeVmOptions {
        not_found_error: true,
        ..FakeVmOptions::default()
    })
    .await;

    let mut session = attach("127.0.0.1", &vm.port.to_string(), &socket()).await.unwrap();
    let result = redefine(&mut session, FOO, &class_bytes(8)).await;
    session.detach().await;

    assert!(matches!(result, Err(HotSwapError::TypeNotLoaded(_))));
}

#[tokio::test]
async fn redefine_ignores_unprepared_types() {
    let mut options = FakeVmOptions::default();
    options
        .classes
        .insert("Lcom/example/Foo;".to_string(), vec![(0x99, class_status::VERIFIED)]);
    let vm = FakeVm::start(options).await;

    let mut session = attach("127.0.0.1", &vm.port.to_string(), &socket()).await.unwrap();
    let result = redefine(&mut session, FOO, &class_bytes(8)).await;
    session.detach().await;

    assert!(matches!(result, Err(HotSwapError::TypeNotLoaded(_))));
    assert!(vm.recorded().redefinitions.is_empty());
}

#[tokio::test]
async fn redefine_reports_target_rejection() {
    let vm = FakeVm::start(FakeVmOptions {
        reject_with: Some(error_codes::SCHEMA_CHANGE_NOT_IMPLEMENTED),
        ..FakeVmOptions::default()
            .with_class(FOO, 0x10)
            .with_class(FOO, 0x20)
    })
    .await;

    let mut session = attach("127.0.0.1", &vm.port.to_string(), &socket()).await.unwrap();
    let result = redefine(&mut session, FOO, &class_bytes(8)).await;
    session.detach().await;

    match result {
        Err(HotSwapError::RedefinitionRejected { type_name, reason }) => {
            assert_eq!(type_name, FOO);
            assert_eq!(reason, "SCHEMA_CHANGE_NOT_IMPLEMENTED (64)");
        }
        other => panic!("expected RedefinitionRejected, got {:?}", other),
    }
    // The first rejection stops the remaining copies
    assert_eq!(vm.recorded().redefinitions.len(), 1);
}

#[tokio::test]
async fn redefine_after_detach_is_an_error() {
    let vm = FakeVm::start(FakeVmOptions::default().with_class(FOO, 0x10)).await;

    let mut session = attach("127.0.0.1", &vm.port.to_string(), &socket()).await.unwrap();
    session.detach().await;

    let result = redefine(&mut session, FOO, &class_bytes(8)).await;
    assert!(matches!(result, Err(HotSwapError::SessionClosed)));
    assert!(vm.recorded().redefinitions.is_empty());
}

#[tokio::test]
async fn run_swaps_class_and_detaches() {
    let vm = FakeVm::start(FakeVmOptions::default().with_class(FOO, 0x42)).await;
    let dir = TempDir::new().unwrap();
    let image = class_bytes(37);
    write_class(dir.path(), "com/example/Foo.class", &image);

    let config = HotSwapConfig::new("127.0.0.1", vm.port.to_string(), dir.path());
    let report = hotswap::run(&config, &["com/example/Foo.class".to_string()])
        .await
        .unwrap();

    assert_eq!(report.swapped.len(), 1);
    assert_eq!(report.swapped[0].type_name, FOO);
    assert_eq!(report.swapped[0].bytes, 37);
    assert_eq!(report.swapped[0].handles, 1);
    assert!(report.detach_warning.is_none());

    let recorded = vm.recorded();
    assert_eq!(recorded.redefinitions, vec![vec![(0x42, image)]]);
    assert!(recorded.disposed);
}

#[tokio::test]
async fn run_reports_detach_failure_as_warning() {
    let vm = FakeVm::start(FakeVmOptions {
        reject_dispose: Some(error_codes::VM_DEAD),
        ..FakeVmOptions::default().with_class(FOO, 0x42)
    })
    .await;
    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "com/example/Foo.class", &class_bytes(37));

    let config = HotSwapConfig::new("127.0.0.1", vm.port.to_string(), dir.path());
    let report = hotswap::run(&config, &["com/example/Foo.class".to_string()])
        .await
        .unwrap();

    assert_eq!(report.swapped.len(), 1);
    let warning = report.detach_warning.expect("detach warning");
    assert_eq!(
        warning,
        format!(
            "unable to disconnect from 127.0.0.1:{}: JDWP error code 112: VM_DEAD",
            vm.port
        )
    );
    assert!(vm.recorded().disposed);
}

#[tokio::test]
async fn run_keeps_original_error_when_detach_fails() {
    let vm = FakeVm::start(FakeVmOptions {
        reject_dispose: Some(error_codes::VM_DEAD),
        ..FakeVmOptions::default()
    })
    .await;
    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "com/example/Foo.class", &class_bytes(37));

    let config = HotSwapConfig::new("127.0.0.1", vm.port.to_string(), dir.path());
    let result = hotswap::run(&config, &["com/example/Foo.class".to_string()]).await;

    assert!(matches!(result, Err(HotSwapError::TypeNotLoaded(name)) if name == FOO));
    assert!(vm.recorded().disposed);
}

#[tokio::test]
async fn run_detaches_when_type_is_not_loaded() {
    let vm = FakeVm::start(FakeVmOptions::default()).await;
    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "com/example/Foo.class", &class_bytes(37));

    let config = HotSwapConfig::new("127.0.0.1", vm.port.to_string(), dir.path());
    let result = hotswap::run(&config, &["com/example/Foo.class".to_string()]).await;

    let err = result.unwrap_err();
    assert!(matches!(err, HotSwapError::TypeNotLoaded(_)));
    assert_eq!(err.exit_code(), 7);
    assert!(vm.recorded().disposed);
}

#[tokio::test]
async fn run_stops_at_first_failure() {
    let vm = FakeVm::start(FakeVmOptions::default().with_class("com.example.Bar", 0x7)).await;
    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "com/example/Foo.class", &class_bytes(9));
    write_class(dir.path(), "com/example/Bar.class", &class_bytes(9));

    let config = HotSwapConfig::new("127.0.0.1", vm.port.to_string(), dir.path());
    let files = [
        "com/example/Foo.class".to_string(),
        "com/example/Bar.class".to_string(),
    ];
    let result = hotswap::run(&config, &files).await;

    assert!(matches!(result, Err(HotSwapError::TypeNotLoaded(_))));
    let recorded = vm.recorded();
    assert_eq!(recorded.lookups, vec!["Lcom/example/Foo;".to_string()]);
    assert!(recorded.redefinitions.is_empty());
    assert!(recorded.disposed);
}

#[tokio::test]
async fn run_detaches_when_class_file_is_missing() {
    let vm = FakeVm::start(FakeVmOptions::default().with_class(FOO, 0x42)).await;
    let dir = TempDir::new().unwrap();

    let config = HotSwapConfig::new("127.0.0.1", vm.port.to_string(), dir.path());
    let result = hotswap::run(&config, &["com/example/Foo.class".to_string()]).await;

    assert!(matches!(result, Err(HotSwapError::ImageUnreadable { .. })));
    assert!(vm.recorded().disposed);
}

#[tokio::test]
async fn run_fails_when_attach_times_out() {
    let port = silent_listener().await;
    let dir = TempDir::new().unwrap();

    // The class file does not exist: reaching the loader would fail differently
    let config = HotSwapConfig::new("127.0.0.1", port.to_string(), dir.path()).with_timeout_ms(200);
    let result = hotswap::run(&config, &["com/example/Foo.class".to_string()]).await;

    match result {
        Err(HotSwapError::AttachFailed { source, .. }) => {
            assert!(matches!(source, JdwpError::Timeout(_)));
        }
        other => panic!("expected AttachFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn run_fails_when_target_stalls_after_handshake() {
    let vm = FakeVm::start(FakeVmOptions {
        stall_on: Some((1, 7)),
        ..FakeVmOptions::default().with_class(FOO, 0x42)
    })
    .await;
    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "com/example/Foo.class", &class_bytes(37));

    let config = HotSwapConfig::new("127.0.0.1", vm.port.to_string(), dir.path()).with_timeout_ms(200);
    let result = hotswap::run(&config, &["com/example/Foo.class".to_string()]).await;

    match result {
        Err(HotSwapError::AttachFailed { source, .. }) => {
            assert!(matches!(source, JdwpError::Timeout(_)));
        }
        other => panic!("expected AttachFailed, got {:?}", other),
    }
    assert!(vm.recorded().redefinitions.is_empty());
}

#[tokio::test]
async fn run_rejects_bad_input_before_connecting() {
    let port = closed_port().await;
    let config = HotSwapConfig::new("127.0.0.1", port.to_string(), "classes");

    assert!(matches!(
        hotswap::run(&config, &[]).await,
        Err(HotSwapError::InvalidArgument(_))
    ));
    assert!(matches!(
        hotswap::run(&config, &["com/example/Foo.java".to_string()]).await,
        Err(HotSwapError::InvalidArgument(_))
    ));
}
