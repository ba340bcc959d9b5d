use bucket_backup_core::backup::{run_backup, TaskOutcome};
use bucket_backup_core::config::ProfileSet;
use bucket_backup_core::contract::{ExecuteError, MockSyncExecutor, TerminationStatus};
use bucket_backup_core::plan::{RunMode, SyncTask};
use chrono::{DateTime, TimeZone, Utc};
use mockall::Sequence;

fn march_15() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
}

fn two_profiles() -> ProfileSet {
    ProfileSet::from_yaml_str(
        r#"
first:
  paths:
    - remote: s3://first-bucket/
      local: /backup/first
second:
  paths:
    - remote: s3://second-bucket/
      local: /backup/second
"#,
    )
    .expect("config should load")
}

#[tokio::test]
async fn test_media_scenario_plans_date_filters() {
    let profiles = ProfileSet::from_yaml_str(
        r#"
media:
  paths:
    - remote: "s3://bucket/logs/"
      local: "/backup/logs"
      include-only:
        today: "%Y-%m-%d"
"#,
    )
    .unwrap();

    let mut executor = MockSyncExecutor::new();
    executor
        .expect_execute()
        .withf(|task: &SyncTask| {
            task.identity == "media"
                && task.source == "s3://bucket/logs/"
                && task.destination == "/backup/logs"
                && task.flag_strings() == vec!["--exclude '*'", "--include '2024-03-15'"]
        })
        .times(1)
        .returning(|_| Ok(TerminationStatus::from_code(0)));

    let report = run_backup(&profiles, RunMode::Live, &executor, march_15).await;

    assert_eq!(report.tasks.len(), 1);
    assert_eq!(report.failures(), 0);
}

#[tokio::test]
async fn test_profiles_run_in_declaration_order() {
    let profiles = two_profiles();
    let mut seq = Sequence::new();
    let mut executor = MockSyncExecutor::new();

    executor
        .expect_execute()
        .withf(|task: &SyncTask| task.identity == "first")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(TerminationStatus::from_code(0)));
    executor
        .expect_execute()
        .withf(|task: &SyncTask| task.identity == "second")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(TerminationStatus::from_code(0)));

    let report = run_backup(&profiles, RunMode::Live, &executor, march_15).await;

    let order: Vec<&str> = report.tasks.iter().map(|t| t.profile.as_str()).collect();
    assert_eq!(order, vec!["first", "second"]);
}

#[tokio::test]
async fn test_failed_sync_does_not_stop_the_run() {
    let profiles = two_profiles();
    let mut seq = Sequence::new();
    let mut executor = MockSyncExecutor::new();

    executor
        .expect_execute()
        .withf(|task: &SyncTask| task.identity == "first")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(TerminationStatus::from_code(1)));
    executor
        .expect_execute()
        .withf(|task: &SyncTask| task.identity == "second")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(TerminationStatus::from_code(0)));

    let report = run_backup(&profiles, RunMode::Live, &executor, march_15).await;

    assert_eq!(report.tasks.len(), 2);
    assert_eq!(report.failures(), 1);
    assert_eq!(
        report.tasks[0].outcome,
        TaskOutcome::Completed(TerminationStatus::from_code(1))
    );
    assert!(report.tasks[1].succeeded());
}

#[tokio::test]
async fn test_launch_failure_does_not_stop_the_run() {
    let profiles = two_profiles();
    let mut executor = MockSyncExecutor::new();

    executor
        .expect_execute()
        .withf(|task: &SyncTask| task.identity == "first")
        .times(1)
        .returning(|_| {
            Err(ExecuteError::Spawn {
                program: "aws".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            })
        });
    executor
        .expect_execute()
        .withf(|task: &SyncTask| task.identity == "second")
        .times(1)
        .returning(|_| Ok(TerminationStatus::from_code(0)));

    let report = run_backup(&profiles, RunMode::Live, &executor, march_15).await;

    match &report.tasks[0].outcome {
        TaskOutcome::LaunchFailed(msg) => {
            assert_eq!(msg, "Failed to launch `aws`: not found");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(report.tasks[1].succeeded());
}

#[tokio::test]
async fn test_dry_run_adds_exactly_one_dryrun_flag_per_task() {
    let profiles = ProfileSet::from_yaml_str(
        r#"
media:
  paths:
    - remote: s3://bucket/a/
      local: /backup/a
      delete: true
    - remote: s3://bucket/b/
      local: /backup/b
      include-only:
        today: "%Y%m%d"
        yesterday: "%Y%m%d"
"#,
    )
    .unwrap();

    let mut executor = MockSyncExecutor::new();
    executor
        .expect_execute()
        .withf(|task: &SyncTask| {
            let flags = task.flag_strings();
            flags.iter().filter(|f| *f == "--dryrun").count() == 1
                && flags.last().map(String::as_str) == Some("--dryrun")
        })
        .times(2)
        .returning(|_| Ok(TerminationStatus::from_code(0)));

    let report = run_backup(&profiles, RunMode::DryRun, &executor, march_15).await;
    assert_eq!(report.mode, RunMode::DryRun);
    assert_eq!(report.tasks.len(), 2);
}

#[tokio::test]
async fn test_live_run_keeps_delete_and_omits_dryrun() {
    let profiles = ProfileSet::from_yaml_str(
        "media:\n  paths:\n    - remote: s3://bucket/\n      local: /backup\n      delete: true\n",
    )
    .unwrap();

    let mut executor = MockSyncExecutor::new();
    executor
        .expect_execute()
        .withf(|task: &SyncTask| task.flag_strings() == vec!["--delete"])
        .times(1)
        .returning(|_| Ok(TerminationStatus::from_code(0)));

    run_backup(&profiles, RunMode::Live, &executor, march_15).await;
}

#[tokio::test]
async fn test_clock_is_sampled_per_task() {
    let profiles = ProfileSet::from_yaml_str(
        r#"
media:
  paths:
    - remote: s3://bucket/a/
      local: /backup/a
      include-only:
        today: "%Y-%m-%d"
    - remote: s3://bucket/b/
      local: /backup/b
      include-only:
        today: "%Y-%m-%d"
"#,
    )
    .unwrap();

    // The run crosses midnight between the two tasks.
    let ticks = std::sync::Mutex::new(vec![
        Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 1).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 15, 23, 59, 59).unwrap(),
    ]);
    let clock = || ticks.lock().unwrap().pop().expect("clock sampled too often");

    let mut seq = Sequence::new();
    let mut executor = MockSyncExecutor::new();
    executor
        .expect_execute()
        .withf(|task: &SyncTask| task.flag_strings()[1] == "--include '2024-03-15'")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(TerminationStatus::from_code(0)));
    executor
        .expect_execute()
        .withf(|task: &SyncTask| task.flag_strings()[1] == "--include '2024-03-16'")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(TerminationStatus::from_code(0)));

    let report = run_backup(&profiles, RunMode::Live, &executor, clock).await;
    assert_eq!(report.failures(), 0);
}
