//! `PgRemoteStore` against a real database, directly and through the
//! coordinator.

use std::sync::Arc;
use std::time::Duration;

use semplan_core::plan::{PlanMutation, PlannedCourse};
use semplan_core::session::{IdentityEvent, UserId};
use semplan_core::sync::{
    PgRemoteStore, PlanSource, RemoteStore, SemesterPayload, SyncConfig, SyncCoordinator,
};
use semplan_core::term::Term;
use semplan_core::{CourseStatus, Grade, Season};
use semplan_test_utils::TestDb;
use uuid::Uuid;

fn payload(year: i32, season: Season, codes: &[&str]) -> SemesterPayload {
    SemesterPayload {
        id: Uuid::new_v4(),
        term: Term::new(year, season),
        courses: codes
            .iter()
            .map(|code| PlannedCourse::new(*code, format!("{code} title"), 3))
            .collect(),
    }
}

#[tokio::test]
async fn round_trip_preserves_order_and_grades() {
    let db = TestDb::create().await;
    let pool = &db.pool;
    let remote = PgRemoteStore::new(pool.clone());
    let alice = UserId::new("alice");

    let mut fall = payload(2024, Season::Fall, &["CS 1301", "MATH 1551"]);
    fall.courses[0].status = CourseStatus::Completed;
    fall.courses[0].grade = Some(Grade::B);
    let spring = payload(2025, Season::Spring, &["CS 1331"]);

    remote.create_or_update_semester(&alice, &spring).await.unwrap();
    remote.create_or_update_semester(&alice, &fall).await.unwrap();

    let plan = remote.load_plan(&alice).await.unwrap();
    let terms: Vec<Term> = plan.iter().map(|s| s.term).collect();
    assert!(terms.contains(&Term::new(2024, Season::Fall)));
    assert!(terms.contains(&Term::new(2025, Season::Spring)));

    let loaded_fall = plan.iter().find(|s| s.id == fall.id).unwrap();
    let codes: Vec<&str> = loaded_fall.courses().iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, vec!["CS 1301", "MATH 1551"]);
    assert_eq!(loaded_fall.courses()[0].grade, Some(Grade::B));
    assert_eq!(loaded_fall.total_credits(), 6);
    assert_eq!(loaded_fall.gpa(), 3.0);

    db.teardown().await;
}

#[tokio::test]
async fn plans_are_scoped_to_their_owner() {
    let db = TestDb::create().await;
    let pool = &db.pool;
    let remote = PgRemoteStore::new(pool.clone());
    let alice = UserId::new("alice");
    let bob = UserId::new("bob");

    let fall = payload(2024, Season::Fall, &["CS 1301"]);
    remote.create_or_update_semester(&alice, &fall).await.unwrap();

    assert!(remote.load_plan(&bob).await.unwrap().is_empty());

    // Bob cannot delete Alice's rows.
    remote.delete_semester(&bob, fall.id).await.unwrap();
    remote
        .delete_courses(&bob, &[fall.courses[0].id])
        .await
        .unwrap();
    let plan = remote.load_plan(&alice).await.unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].courses().len(), 1);

    db.teardown().await;
}

#[tokio::test]
async fn upsert_reparents_moved_course() {
    let db = TestDb::create().await;
    let pool = &db.pool;
    let remote = PgRemoteStore::new(pool.clone());
    let alice = UserId::new("alice");

    let mut fall = payload(2024, Season::Fall, &["CS 1331"]);
    let mut spring = payload(2025, Season::Spring, &[]);
    remote.create_or_update_semester(&alice, &fall).await.unwrap();
    remote.create_or_update_semester(&alice, &spring).await.unwrap();

    let moved = fall.courses.remove(0);
    spring.courses.push(moved.clone());
    remote.create_or_update_semester(&alice, &fall).await.unwrap();
    remote.create_or_update_semester(&alice, &spring).await.unwrap();

    let plan = remote.load_plan(&alice).await.unwrap();
    let loaded_spring = plan.iter().find(|s| s.id == spring.id).unwrap();
    let loaded_fall = plan.iter().find(|s| s.id == fall.id).unwrap();
    assert!(loaded_fall.courses().is_empty());
    assert_eq!(loaded_spring.courses()[0].id, moved.id);
    assert_eq!(loaded_spring.courses()[0].semester_id, spring.id);

    db.teardown().await;
}

#[tokio::test]
async fn coordinator_persists_and_reloads() {
    let db = TestDb::create().await;
    let pool = &db.pool;
    let config = SyncConfig {
        debounce: Duration::from_millis(20),
    };
    let alice = UserId::new("alice");

    let writer = SyncCoordinator::new(
        Arc::new(PgRemoteStore::new(pool.clone())),
        None,
        config.clone(),
    );
    writer.handle_identity_event(&IdentityEvent::signed_in(alice.clone()));

    let add_fall = PlanMutation::add_semester(Term::new(2024, Season::Fall));
    let PlanMutation::AddSemester { id: fall, .. } = add_fall else {
        unreachable!()
    };
    writer.apply_optimistic(add_fall).unwrap();
    let intro = PlannedCourse::new("CS 1301", "Intro to Computing", 3);
    let intro_id = intro.id;
    writer
        .apply_optimistic(PlanMutation::AddCourse {
            semester_id: fall,
            course: intro,
        })
        .unwrap();
    writer
        .apply_optimistic(PlanMutation::AddCourse {
            semester_id: fall,
            course: PlannedCourse::new("MATH 1551", "Differential Calculus", 2),
        })
        .unwrap();
    writer.wait_idle().await;

    writer
        .apply_optimistic(PlanMutation::RemoveCourse {
            semester_id: fall,
            course_id: intro_id,
        })
        .unwrap();
    writer.wait_idle().await;

    let reader = SyncCoordinator::new(Arc::new(PgRemoteStore::new(pool.clone())), None, config);
    reader.handle_identity_event(&IdentityEvent::signed_in(alice));
    assert_eq!(reader.load_plan().await.unwrap(), PlanSource::Remote);

    let codes = reader
        .with_store(|s| {
            s.all_courses()
                .iter()
                .map(|c| c.code.clone())
                .collect::<Vec<_>>()
        })
        .unwrap();
    assert_eq!(codes, vec!["MATH 1551"]);

    db.teardown().await;
}
