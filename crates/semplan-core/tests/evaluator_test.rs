//! Prerequisite evaluation scenarios against realistic trees.

use std::collections::{HashMap, HashSet};

use semplan_core::requirement::{RequirementNode, Verdict, evaluate};
use semplan_core::{CourseCode, Grade};

fn set(codes: &[&str]) -> HashSet<CourseCode> {
    codes.iter().map(|c| (*c).to_owned()).collect()
}

fn cs1331_tree() -> RequirementNode {
    RequirementNode::all(vec![RequirementNode::course("CS 1301")]).unwrap()
}

#[test]
fn cs1331_with_completed_prerequisite() {
    let result = evaluate(Some(&cs1331_tree()), &set(&["CS 1301"]), &set(&[]));
    assert!(result.satisfied);
    assert!(result.hard_satisfied);
    assert!(result.missing.is_empty());
    assert!(result.soft_satisfied_via.is_empty());
}

#[test]
fn cs1331_with_planned_prerequisite() {
    let result = evaluate(Some(&cs1331_tree()), &set(&[]), &set(&["CS 1301"]));
    assert!(result.satisfied);
    assert!(!result.hard_satisfied);
    assert!(result.missing.is_empty());
    assert_eq!(result.soft_satisfied_via, vec!["CS 1301"]);
    assert_eq!(result.verdict(), Verdict::Pending);
}

#[test]
fn or_prefers_singleton_branch() {
    let tree = RequirementNode::any(vec![
        RequirementNode::course("A"),
        RequirementNode::all(vec![RequirementNode::course("B"), RequirementNode::course("C")])
            .unwrap(),
    ])
    .unwrap();
    let result = evaluate(Some(&tree), &set(&[]), &set(&[]));
    assert_eq!(result.missing, vec!["A"]);
    assert!(!result.satisfied);
}

#[test]
fn empty_constructors_are_rejected() {
    assert!(RequirementNode::all(vec![]).is_err());
    assert!(RequirementNode::any(vec![]).is_err());
}

#[test]
fn evaluation_is_deterministic() {
    let tree = RequirementNode::all(vec![
        RequirementNode::course_with_min("CS 1331", Grade::C),
        RequirementNode::any(vec![
            RequirementNode::course("MATH 1551"),
            RequirementNode::course("MATH 1712"),
            RequirementNode::all(vec![
                RequirementNode::course("MATH 1501"),
                RequirementNode::course("MATH 1502"),
            ])
            .unwrap(),
        ])
        .unwrap(),
        RequirementNode::course("CS 1332"),
    ])
    .unwrap();

    let completed: HashMap<CourseCode, Grade> = [
        ("CS 1331".to_owned(), Grade::D),
        ("MATH 1501".to_owned(), Grade::A),
    ]
    .into();
    let planned = set(&["CS 1332", "MATH 1712"]);

    let first = evaluate(Some(&tree), &completed, &planned);
    for _ in 0..20 {
        assert_eq!(evaluate(Some(&tree), &completed, &planned), first);
    }
    assert_eq!(first.missing, vec!["CS 1331"]);
    assert_eq!(first.soft_satisfied_via, vec!["MATH 1712", "CS 1332"]);
}

#[test]
fn grade_map_and_bare_set_disagree_on_low_grade() {
    let tree = RequirementNode::course_with_min("CS 1301", Grade::C);

    let bare = evaluate(Some(&tree), &set(&["CS 1301"]), &set(&[]));
    assert_eq!(bare.verdict(), Verdict::Satisfied);

    let graded: HashMap<CourseCode, Grade> = [("CS 1301".to_owned(), Grade::D)].into();
    let graded = evaluate(Some(&tree), &graded, &set(&[]));
    assert_eq!(graded.verdict(), Verdict::Blocked);
}

#[test]
fn tree_from_json_feed() {
    let json = r#"{"any":[{"all":[{"course":"PHYS 2211"},{"course":"MATH 1552"}]},{"course":"PHYS 2231","min_grade":"B"}]}"#;
    let tree: RequirementNode = serde_json::from_str(json).unwrap();
    assert!(tree.validate().is_ok());

    let completed: HashMap<CourseCode, Grade> = [("PHYS 2231".to_owned(), Grade::A)].into();
    let result = evaluate(Some(&tree), &completed, &set(&[]));
    assert!(result.hard_satisfied);
}
