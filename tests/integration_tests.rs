use std::env;
use std::fs;

use medipredict::auth::{CredentialStore, FileCredentialStore};
use medipredict::dataset::DatasetKind;
use medipredict::error::PipelineError;
use medipredict::pipeline::{self, DatasetInputs, DatasetSources, PipelineConfig, Section};
use medipredict::session::Session;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn core_sources() -> DatasetSources {
    DatasetSources {
        admissions: Some(fixture("admissions.csv")),
        demographics: Some(fixture("demographics.csv")),
        discharge: Some(fixture("discharge.csv")),
        icu: Some(fixture("icu.csv")),
        staff: Some(fixture("staff.csv")),
        emergency: None,
        departments: None,
    }
}

fn session(name: &str) -> Session {
    let path = env::temp_dir().join(format!("medipredict_it_{name}.json"));
    let _ = fs::remove_file(&path);
    let store = FileCredentialStore::new(&path).with_iterations(10);
    let (created, _) = store.register("admin", "letmein").unwrap();
    assert!(created);
    let session = Session::login(&store, "admin", "letmein").unwrap();
    fs::remove_file(&path).unwrap();
    session
}

#[tokio::test]
async fn test_full_pipeline() {
    let mut session = session("full");
    let sources = DatasetSources {
        emergency: Some(fixture("emergency.csv")),
        departments: Some(fixture("departments.csv")),
        ..core_sources()
    };
    let inputs = DatasetInputs::load(&sources, session.cache_mut()).await.unwrap();
    let report = pipeline::run(&session, &inputs, &PipelineConfig::default()).unwrap();

    assert_eq!(report.username, "admin");

    // 60 historical days + 30 forecast days
    assert_eq!(report.admissions.len(), 90);
    for row in report.admissions.future() {
        assert!((row.yhat - 10.0).abs() < 0.5);
    }

    assert_eq!(report.resources.len(), 30);
    for p in &report.resources {
        assert_eq!(p.beds_needed, 10);
        let expected_staff = (2.0 * p.predicted_admissions * report.staffing.value).ceil() as u64;
        assert_eq!(p.staff_needed, expected_staff);
    }

    let los = &report.length_of_stay;
    assert_eq!(los.training_rows, 8);
    assert_eq!(los.dropped_records, 1);
    assert_eq!(los.unrecognized_gender, 1);
    assert_eq!(los.features, vec!["age", "gender", "chronic_conditions"]);
    assert!(los.average_los >= 2.0 && los.average_los <= 8.0);

    assert_eq!(report.staffing.overlap_rows, 60);
    assert!(!report.staffing.defaulted);

    let icu = report.icu.ready().unwrap();
    assert_eq!(icu.len(), 2);
    assert!(icu.iter().all(|m| m.forecast.is_ready()));

    let emergency = report.emergency.as_ref().and_then(Section::ready).unwrap();
    assert_eq!(emergency.future().len(), 30);
}

#[tokio::test]
async fn test_departments_are_forecast_independently() {
    let mut session = session("departments");
    let sources = DatasetSources {
        departments: Some(fixture("departments.csv")),
        ..core_sources()
    };
    let inputs = DatasetInputs::load(&sources, session.cache_mut()).await.unwrap();
    let report = pipeline::run(&session, &inputs, &PipelineConfig::default()).unwrap();

    let departments = report.departments.as_ref().and_then(Section::ready).unwrap();
    assert_eq!(departments.len(), 2);

    let cardiology = departments[0].forecast.ready().unwrap();
    let orthopedics = departments[1].forecast.ready().unwrap();
    assert_eq!(departments[0].display_name, "Cardiology");
    assert_eq!(cardiology.len(), 70);
    assert_eq!(cardiology.future().len(), 30);
    assert_eq!(orthopedics.future().len(), 30);
    for (c, o) in cardiology.future().iter().zip(orthopedics.future()) {
        assert_eq!(c.date, o.date);
        assert!((c.yhat - 5.0).abs() < 0.5);
        assert!((o.yhat - 50.0).abs() < 0.5);
    }
}

#[tokio::test]
async fn test_missing_core_dataset_halts_run() {
    let mut session = session("missing_core");
    let sources = DatasetSources {
        staff: None,
        ..core_sources()
    };
    let err = DatasetInputs::load(&sources, session.cache_mut()).await.unwrap_err();
    assert!(matches!(err, PipelineError::MissingDataset(DatasetKind::Staff)));
    assert!(err.to_string().contains("Please upload all five core CSV files"));
}

#[tokio::test]
async fn test_bad_core_columns_halt_run() {
    let mut session = session("bad_core");
    // Staff roster passed where admissions are expected.
    let sources = DatasetSources {
        admissions: Some(fixture("staff.csv")),
        ..core_sources()
    };
    let inputs = DatasetInputs::load(&sources, session.cache_mut()).await.unwrap();
    let err = pipeline::run(&session, &inputs, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::MissingColumns {
            kind: DatasetKind::Admissions,
            ..
        }
    ));
    // Both admissions and staff point at the same file.
    assert_eq!(session.cache().hits(), 1);
}

#[tokio::test]
async fn test_bad_optional_columns_only_fail_their_section() {
    let mut session = session("bad_optional");
    let sources = DatasetSources {
        emergency: Some(fixture("staff.csv")),
        ..core_sources()
    };
    let inputs = DatasetInputs::load(&sources, session.cache_mut()).await.unwrap();
    let report = pipeline::run(&session, &inputs, &PipelineConfig::default()).unwrap();

    match report.emergency {
        Some(Section::Failed { message }) => {
            assert!(message.contains("Emergency CSV must have date, emergency_cases"));
        }
        other => panic!("expected failed emergency section, got {other:?}"),
    }
    assert!(report.departments.is_none());
    assert_eq!(report.resources.len(), 30);
}

#[tokio::test]
async fn test_unmatched_patients_are_a_hard_error() {
    let mut session = session("empty_join");
    let demographics = env::temp_dir().join("medipredict_it_unmatched_demographics.csv");
    fs::write(&demographics, "patient_id,age,gender\nZ1,40,M\nZ2,50,F\n").unwrap();

    let sources = DatasetSources {
        demographics: Some(demographics.to_string_lossy().into_owned()),
        ..core_sources()
    };
    let inputs = DatasetInputs::load(&sources, session.cache_mut()).await.unwrap();
    let err = pipeline::run(&session, &inputs, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyJoin));

    fs::remove_file(&demographics).unwrap();
}
