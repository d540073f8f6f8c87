//! Registration flow against a SQLite registry.

use cadastro_core::audit::AuditLog;
use cadastro_core::registration::{Registrar, RegistrationError, RegistrationOutcome};
use cadastro_core::store::{PatientStore, SearchField, SearchQuery};
use cadastro_core::validation::{CandidateForm, Validator};
use cadastro_core::{
    open_database_in_memory, CadastroError, Database, FfiAlertKind, FfiCandidateForm,
    FfiRegistrationStatus, FfiSearchField, FfiSeverity,
};
use chrono::NaiveDate;

fn now() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

fn form(name: &str, cpf: Option<&str>) -> CandidateForm {
    CandidateForm {
        full_name: name.into(),
        birth_date: Some("15/05/1990".into()),
        mother_name: Some("Ana da Silva".into()),
        cpf: cpf.map(str::to_string),
        ..Default::default()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("cadastro_core=debug")
        .with_test_writer()
        .try_init();
}

#[test]
fn test_register_then_duplicate_flow() {
    init_tracing();
    let db = Database::open_in_memory().unwrap();
    let registrar = Registrar::for_database(&db, Validator::default());

    // First registration is clean
    let first = registrar
        .register(&form("Maria da Silva", Some("111.444.777-35")), None, now())
        .unwrap();
    let first_id = first.patient().unwrap().id.clone();
    assert!(first.validation().alerts.is_empty());

    // Same person again: needs an acknowledgement
    let second_form = form("maria da silva", Some("935.411.347-80"));
    let pending = registrar.register(&second_form, None, now()).unwrap();
    match &pending {
        RegistrationOutcome::NeedsAcknowledgement(result) => {
            assert_eq!(result.duplicate_ids(), vec![first_id.as_str()]);
        }
        other => panic!("expected NeedsAcknowledgement, got {:?}", other),
    }
    assert_eq!(db.count_patients().unwrap(), 1);

    // Acknowledged: created and audited
    let registered = registrar
        .register(&second_form, Some("recepcao.ana"), now())
        .unwrap();
    assert!(registered.patient().is_some());
    assert_eq!(db.count_patients().unwrap(), 2);

    let log = AuditLog::new(&db);
    let entries = log.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].body.matched_patient_ids, vec![first_id]);
    assert_eq!(entries[0].body.acknowledged_by, "recepcao.ana");
    assert!(log.verify_chain().unwrap().is_valid());
}

#[test]
fn test_failed_acknowledgement_leaves_registry_unchanged() {
    init_tracing();
    let db = Database::open_in_memory().unwrap();
    let registrar = Registrar::for_database(&db, Validator::default());
    registrar
        .register(&form("Maria da Silva", Some("111.444.777-35")), None, now())
        .unwrap();

    db.conn()
        .execute_batch("DROP TABLE duplicate_acknowledgements")
        .unwrap();
    let second_form = form("Maria da Silva", Some("935.411.347-80"));
    assert!(matches!(
        registrar.register(&second_form, Some("recepcao.ana"), now()),
        Err(RegistrationError::Audit(_))
    ));
    assert_eq!(db.count_patients().unwrap(), 1);
}

#[test]
fn test_search_after_registration() {
    let db = Database::open_in_memory().unwrap();
    let registrar = Registrar::new(&db, Validator::default());

    registrar
        .register(&form("Maria da Silva", Some("111.444.777-35")), None, now())
        .unwrap();
    registrar
        .register(&form("Ana Maria Souza", Some("529.982.247-25")), None, now())
        .unwrap();

    let by_name = db
        .search(&SearchQuery::new("maria", SearchField::Name))
        .unwrap();
    let names: Vec<_> = by_name.iter().map(|p| p.identity.full_name.as_str()).collect();
    assert_eq!(names, vec!["Maria da Silva", "Ana Maria Souza"]);

    let by_cpf = db
        .search(&SearchQuery::new("529.982", SearchField::Cpf))
        .unwrap();
    assert_eq!(by_cpf.len(), 1);
    assert_eq!(by_cpf[0].identity.full_name, "Ana Maria Souza");
}

#[test]
fn test_tampering_breaks_chain() {
    let db = Database::open_in_memory().unwrap();
    let registrar = Registrar::for_database(&db, Validator::default());

    registrar
        .register(&form("Maria da Silva", Some("111.444.777-35")), None, now())
        .unwrap();
    for (user, cpf) in [("recepcao.ana", "935.411.347-80"), ("recepcao.joao", "529.982.247-25")] {
        registrar
            .register(&form("Maria da Silva", Some(cpf)), Some(user), now())
            .unwrap();
    }
    assert_eq!(AuditLog::new(&db).verify_chain().unwrap().entries, 2);

    // Updates are refused while the trigger is in place
    assert!(db
        .conn()
        .execute(
            "UPDATE duplicate_acknowledgements SET payload = '{}' WHERE seq = 1",
            [],
        )
        .is_err());

    db.conn()
        .execute_batch(
            "DROP TRIGGER duplicate_acknowledgements_no_update;
             UPDATE duplicate_acknowledgements
                SET payload = replace(payload, 'recepcao.ana', 'outra.pessoa')
              WHERE seq = 1;",
        )
        .unwrap();

    let verification = AuditLog::new(&db).verify_chain().unwrap();
    assert!(!verification.is_valid());
    assert_eq!(verification.first_broken, Some(1));
}

#[test]
fn test_file_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cadastro.db");

    {
        let db = Database::open(&path).unwrap();
        Registrar::new(&db, Validator::default())
            .register(&form("Maria da Silva", Some("111.444.777-35")), None, now())
            .unwrap();
    }

    let db = Database::open(&path).unwrap();
    let snapshot = db.snapshot().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(
        snapshot[0].identity.cpf.as_ref().map(|c| c.formatted()),
        Some("111.444.777-35".to_string())
    );
}

#[test]
fn test_ffi_facade() {
    let core = open_database_in_memory().unwrap();
    let today = Some("2025-03-10".to_string());

    let ffi_form = |cpf: Option<&str>| FfiCandidateForm {
        full_name: "Maria da Silva".into(),
        birth_date: Some("1990-05-15".into()),
        mother_name: Some("Ana da Silva".into()),
        mother_cpf: None,
        cpf: cpf.map(str::to_string),
        cns: None,
        cpf_absence_justification: None,
    };

    let blocked = core
        .register_patient(ffi_form(None), None, today.clone())
        .unwrap();
    assert!(matches!(blocked.status, FfiRegistrationStatus::Blocked));
    assert!(!blocked.validation.can_submit);
    assert_eq!(blocked.validation.alerts[0].kind, FfiAlertKind::PolicyBlocked);
    assert_eq!(blocked.validation.alerts[0].severity, FfiSeverity::Blocking);

    let registered = core
        .register_patient(ffi_form(Some("11144477735")), None, today.clone())
        .unwrap();
    assert!(matches!(registered.status, FfiRegistrationStatus::Registered));
    let patient = registered.patient.unwrap();
    assert_eq!(patient.cpf.as_deref(), Some("111.444.777-35"));
    assert_eq!(core.get_patient(patient.id.clone()).unwrap().id, patient.id);
    assert!(matches!(
        core.get_patient("missing".into()),
        Err(CadastroError::NotFound(id)) if id == "missing"
    ));

    let check = core
        .validate_candidate(ffi_form(Some("935.411.347-80")), today.clone())
        .unwrap();
    assert!(check.can_submit);
    assert_eq!(check.alerts.len(), 1);
    assert_eq!(check.alerts[0].patient_id.as_deref(), Some(patient.id.as_str()));
    assert_eq!(check.alerts[0].kind, FfiAlertKind::PossibleDuplicate);
    assert_eq!(check.alerts[0].severity, FfiSeverity::Warning);

    let acknowledged = core
        .register_patient(
            ffi_form(Some("935.411.347-80")),
            Some("recepcao.ana".into()),
            today.clone(),
        )
        .unwrap();
    assert!(acknowledged.acknowledgement_hash.is_some());
    assert!(acknowledged.acknowledgement_error.is_none());
    assert!(core.verify_acknowledgements().unwrap().valid);

    let found = core
        .search_patients("maria".into(), FfiSearchField::Name, 10)
        .unwrap();
    assert_eq!(found.len(), 2);

    let window = core
        .update_window("2025-02-22".into(), today.clone())
        .unwrap();
    assert!(window.is_newborn);
    assert!(window.is_expired);

    assert_eq!(
        core.describe_age("2022-12-10".into(), today).unwrap(),
        "2 anos e 3 meses"
    );
}
