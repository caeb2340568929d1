//! Integration tests for semester and planned-course persistence.
//!
//! These tests run against the shared PostgreSQL instance from
//! `semplan-test-utils`; each test gets its own migrated database.

use uuid::Uuid;

use semplan_db::models::{CourseStatus, Grade, Season};
use semplan_db::queries::batches::{self, PlanBatch};
use semplan_db::queries::courses;
use semplan_db::queries::semesters::{self, CourseUpsert, SemesterUpsert};
use semplan_test_utils::TestDb;

fn course(code: &str, credits: i32) -> CourseUpsert {
    CourseUpsert {
        id: Uuid::new_v4(),
        code: code.to_owned(),
        title: format!("{code} title"),
        credits,
        status: CourseStatus::Planned,
        grade: None,
    }
}

fn semester(year: i32, season: Season, courses: Vec<CourseUpsert>) -> SemesterUpsert {
    SemesterUpsert {
        id: Uuid::new_v4(),
        year,
        season,
        courses,
    }
}

#[tokio::test]
async fn upsert_inserts_semester_and_courses() {
    let db = TestDb::create().await;
    let pool = &db.pool;

    let payload = semester(2024, Season::Fall, vec![course("CS 1301", 3), course("MATH 1551", 2)]);
    let row = semesters::upsert_semester(pool, "alice", &payload)
        .await
        .expect("upsert should succeed");

    assert_eq!(row.id, payload.id);
    assert_eq!(row.user_id, "alice");
    assert_eq!(row.season, Season::Fall);

    let stored = courses::list_courses_for_semester(pool, "alice", payload.id)
        .await
        .unwrap();
    let codes: Vec<&str> = stored.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, vec!["CS 1301", "MATH 1551"]);
    assert_eq!(stored[1].position, 1);

    db.teardown().await;
}

#[tokio::test]
async fn upsert_replaces_course_list() {
    let db = TestDb::create().await;
    let pool = &db.pool;

    let mut payload = semester(2025, Season::Spring, vec![course("CS 1331", 3), course("CS 1332", 3)]);
    semesters::upsert_semester(pool, "alice", &payload).await.unwrap();

    // Drop the first course, grade the second, add a third.
    payload.courses.remove(0);
    payload.courses[0].status = CourseStatus::Completed;
    payload.courses[0].grade = Some(Grade::A);
    payload.courses.push(course("CS 2110", 4));
    semesters::upsert_semester(pool, "alice", &payload).await.unwrap();

    let stored = courses::list_courses_for_semester(pool, "alice", payload.id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].code, "CS 1332");
    assert_eq!(stored[0].grade, Some(Grade::A));
    assert_eq!(stored[0].status, CourseStatus::Completed);
    assert_eq!(stored[1].code, "CS 2110");

    db.teardown().await;
}

#[tokio::test]
async fn upsert_reparents_moved_course() {
    let db = TestDb::create().await;
    let pool = &db.pool;

    let moving = course("CS 2340", 3);
    let mut fall = semester(2024, Season::Fall, vec![moving.clone()]);
    let mut spring = semester(2025, Season::Spring, vec![]);
    semesters::upsert_semester(pool, "alice", &fall).await.unwrap();
    semesters::upsert_semester(pool, "alice", &spring).await.unwrap();

    fall.courses.clear();
    spring.courses.push(moving.clone());
    semesters::upsert_semester(pool, "alice", &spring).await.unwrap();
    semesters::upsert_semester(pool, "alice", &fall).await.unwrap();

    let all = courses::list_courses_for_user(pool, "alice").await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, moving.id);
    assert_eq!(all[0].semester_id, spring.id);

    db.teardown().await;
}

#[tokio::test]
async fn upsert_refuses_semester_owned_by_another_user() {
    let db = TestDb::create().await;
    let pool = &db.pool;

    let payload = semester(2024, Season::Fall, vec![course("CS 1301", 3)]);
    semesters::upsert_semester(pool, "alice", &payload).await.unwrap();

    let err = semesters::upsert_semester(pool, "mallory", &payload)
        .await
        .unwrap_err();
    assert!(
        err.to_string().contains("belongs to another user"),
        "unexpected error: {err:#}"
    );

    // Alice's data is untouched.
    let stored = courses::list_courses_for_user(pool, "alice").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(courses::list_courses_for_user(pool, "mallory").await.unwrap().is_empty());

    db.teardown().await;
}

#[tokio::test]
async fn list_semesters_is_chronological_and_user_scoped() {
    let db = TestDb::create().await;
    let pool = &db.pool;

    for (year, season) in [(2025, Season::Fall), (2025, Season::Spring), (2024, Season::Fall)] {
        semesters::upsert_semester(pool, "alice", &semester(year, season, vec![]))
            .await
            .unwrap();
    }
    semesters::upsert_semester(pool, "bob", &semester(2023, Season::Summer, vec![]))
        .await
        .unwrap();

    let rows = semesters::list_semesters(pool, "alice").await.unwrap();
    let terms: Vec<(i32, Season)> = rows.iter().map(|r| (r.year, r.season)).collect();
    assert_eq!(
        terms,
        vec![(2024, Season::Fall), (2025, Season::Spring), (2025, Season::Fall)]
    );

    db.teardown().await;
}

#[tokio::test]
async fn delete_courses_only_touches_owner_rows() {
    let db = TestDb::create().await;
    let pool = &db.pool;

    let a = semester(2024, Season::Fall, vec![course("CS 1301", 3), course("CS 1331", 3)]);
    let b = semester(2024, Season::Fall, vec![course("CS 1301", 3)]);
    semesters::upsert_semester(pool, "alice", &a).await.unwrap();
    semesters::upsert_semester(pool, "bob", &b).await.unwrap();

    let ids = vec![a.courses[0].id, b.courses[0].id];
    let removed = courses::delete_courses(pool, "alice", &ids).await.unwrap();
    assert_eq!(removed, 1);

    assert_eq!(courses::list_courses_for_user(pool, "alice").await.unwrap().len(), 1);
    assert_eq!(courses::list_courses_for_user(pool, "bob").await.unwrap().len(), 1);

    assert_eq!(courses::delete_courses(pool, "alice", &[]).await.unwrap(), 0);

    db.teardown().await;
}

#[tokio::test]
async fn delete_semester_cascades_courses() {
    let db = TestDb::create().await;
    let pool = &db.pool;

    let summer = db
        .seed_semester("alice", 2026, Season::Summer, &["PHYS 2211", "MATH 2551"])
        .await;
    assert_eq!(courses::list_courses_for_user(pool, "alice").await.unwrap().len(), 2);

    assert_eq!(semesters::delete_semester(pool, "bob", summer.id).await.unwrap(), 0);
    assert_eq!(semesters::delete_semester(pool, "alice", summer.id).await.unwrap(), 1);

    assert!(semesters::get_semester(pool, "alice", summer.id).await.unwrap().is_none());
    assert!(courses::list_courses_for_user(pool, "alice").await.unwrap().is_empty());

    db.teardown().await;
}

#[tokio::test]
async fn batch_failure_rolls_back_every_semester() {
    let db = TestDb::create().await;
    let pool = &db.pool;

    let bobs = semester(2024, Season::Fall, vec![course("CS 1301", 3)]);
    semesters::upsert_semester(pool, "bob", &bobs).await.unwrap();

    // The second semester reuses a course id that belongs to bob.
    let fall = semester(2024, Season::Fall, vec![course("CS 1301", 3)]);
    let spring = semester(2025, Season::Spring, vec![bobs.courses[0].clone()]);
    let batch = PlanBatch {
        upserts: vec![fall.clone(), spring],
        ..PlanBatch::default()
    };

    let err = batches::apply_batch(pool, "alice", &batch).await.unwrap_err();
    assert!(
        err.to_string().contains("belongs to another user"),
        "unexpected error: {err:#}"
    );

    assert!(semesters::get_semester(pool, "alice", fall.id).await.unwrap().is_none());
    assert!(courses::list_courses_for_user(pool, "alice").await.unwrap().is_empty());

    db.teardown().await;
}

#[tokio::test]
async fn batch_can_replace_a_removed_term() {
    let db = TestDb::create().await;
    let pool = &db.pool;

    let old = semester(2024, Season::Fall, vec![course("CS 1301", 3)]);
    semesters::upsert_semester(pool, "alice", &old).await.unwrap();

    let new = semester(2024, Season::Fall, vec![course("CS 1331", 3)]);
    let batch = PlanBatch {
        removed_semesters: vec![old.id],
        upserts: vec![new.clone()],
        removed_courses: vec![],
    };
    batches::apply_batch(pool, "alice", &batch).await.unwrap();

    let rows = semesters::list_semesters(pool, "alice").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, new.id);
    let stored = courses::list_courses_for_user(pool, "alice").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].code, "CS 1331");

    db.teardown().await;
}
