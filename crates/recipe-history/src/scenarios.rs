//! End-to-end scenarios over in-memory backends.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use recipe_actions::{StaticActionRegistry, MAX_REPEATED_COLUMNS};
use recipe_chain::{StepChain, StepId, ROOT_STEP};
use recipe_refs::{
    InMemoryPreparationLocker, InMemoryPreparationRepository, NewPreparation, PreparationId,
    PreparationLocker,
};
use recipe_store::{
    ContentStore, InMemoryContentStore, ObjectKind, StoreError, StoreResult, StoredObject,
};
use recipe_types::{Action, ColumnId, ColumnMetadata, ObjectId, RowMetadata};

use crate::config::HistoryConfig;
use crate::details::PreparationDetails;
use crate::error::{ErrorKind, HistoryError};
use crate::mutator::HistoryMutator;

fn three_columns() -> RowMetadata {
    RowMetadata::new(vec![
        ColumnMetadata::new(ColumnId::new(1), "firstname"),
        ColumnMetadata::new(ColumnId::new(2), "lastname"),
        ColumnMetadata::new(ColumnId::new(3), "city"),
    ])
}

fn new_preparation(name: &str) -> NewPreparation {
    NewPreparation {
        dataset_id: "dataset-1".into(),
        name: name.into(),
        author: "tester".into(),
        row_metadata: three_columns(),
    }
}

fn setup_with(config: HistoryConfig) -> (HistoryMutator, PreparationId) {
    let mutator = HistoryMutator::in_memory(config);
    let prep = mutator.create_preparation(new_preparation("customers")).unwrap();
    (mutator, prep.id)
}

fn setup() -> (HistoryMutator, PreparationId) {
    setup_with(HistoryConfig::default())
}

fn on(name: &str, column: &str) -> Action {
    Action::new(name)
        .with_parameter("scope", "column")
        .with_parameter("column_id", column)
}

fn rename(column: &str, to: &str) -> Action {
    on("rename_column", column).with_parameter("new_column_name", to)
}

fn append(m: &HistoryMutator, id: &PreparationId, action: Action) -> StepId {
    m.append_step(id, vec![action]).unwrap()
}

fn details(m: &HistoryMutator, id: &PreparationId) -> PreparationDetails {
    m.get_details(id, None).unwrap()
}

/// Name of the first action of every non-root step.
fn names(details: &PreparationDetails) -> Vec<String> {
    details.steps[1..]
        .iter()
        .map(|s| s.actions[0].name.clone())
        .collect()
}

fn created(details: &PreparationDetails, position: usize) -> Vec<ColumnId> {
    details.steps[position].diff.created_columns.clone()
}

fn column_param(details: &PreparationDetails, position: usize) -> String {
    details.steps[position].actions[0]
        .parameter("column_id")
        .unwrap_or_default()
        .to_string()
}

fn ids(values: &[u32]) -> Vec<ColumnId> {
    values.iter().copied().map(ColumnId::new).collect()
}

/// Store whose puts start failing once a budget is spent.
struct FailingStore {
    inner: InMemoryContentStore,
    budget: AtomicUsize,
}

impl FailingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryContentStore::new(),
            budget: AtomicUsize::new(usize::MAX),
        }
    }

    fn allow_puts(&self, n: usize) {
        self.budget.store(n, Ordering::SeqCst);
    }
}

impl ContentStore for FailingStore {
    fn get(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        self.inner.get(id)
    }
    fn put(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let left = self.budget.load(Ordering::SeqCst);
        if left == 0 {
            return Err(StoreError::Unavailable("quota exceeded".into()));
        }
        self.budget.store(left - 1, Ordering::SeqCst);
        self.inner.put(object)
    }
    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        self.inner.exists(id)
    }
    fn remove(&self, id: &ObjectId) -> StoreResult<bool> {
        self.inner.remove(id)
    }
    fn list(&self, kind: ObjectKind) -> StoreResult<Vec<ObjectId>> {
        self.inner.list(kind)
    }
}

/// Store that fails the next step-record put, running a callback first.
struct InterleavingStore {
    inner: InMemoryContentStore,
    fail_next_step: AtomicBool,
    before_failing: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl InterleavingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryContentStore::new(),
            fail_next_step: AtomicBool::new(false),
            before_failing: Mutex::new(None),
        }
    }

    fn fail_next_step_after(&self, callback: impl FnOnce() + Send + 'static) {
        *self.before_failing.lock().unwrap() = Some(Box::new(callback));
        self.fail_next_step.store(true, Ordering::SeqCst);
    }
}

impl ContentStore for InterleavingStore {
    fn get(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        self.inner.get(id)
    }
    fn put(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        if object.kind == ObjectKind::Step && self.fail_next_step.swap(false, Ordering::SeqCst) {
            let callback = self.before_failing.lock().unwrap().take();
            if let Some(callback) = callback {
                callback();
            }
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        self.inner.put(object)
    }
    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        self.inner.exists(id)
    }
    fn remove(&self, id: &ObjectId) -> StoreResult<bool> {
        self.inner.remove(id)
    }
    fn list(&self, kind: ObjectKind) -> StoreResult<Vec<ObjectId>> {
        self.inner.list(kind)
    }
}

// ---------------------------------------------------------------------------
// Append
// ---------------------------------------------------------------------------

#[test]
fn append_grows_chain_by_one_with_prior_head_as_parent() {
    let (m, id) = setup();
    let before = details(&m, &id);
    let prior_head = before.head_id;

    let head = append(&m, &id, on("uppercase", "0001"));
    let after = details(&m, &id);
    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(after.head_id, head);
    assert_eq!(after.steps.last().unwrap().parent, Some(prior_head));
    assert_eq!(m.get_preparation(&id).unwrap().head_id, head);
}

#[test]
fn append_without_scope_is_rejected_and_changes_nothing() {
    let (m, id) = setup();
    let before = m.get_preparation(&id).unwrap();
    let err = m
        .append_step(&id, vec![Action::new("uppercase").with_parameter("column_id", "0001")])
        .unwrap_err();
    assert!(matches!(err, HistoryError::MissingActionScope(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(m.get_preparation(&id).unwrap(), before);
}

#[test]
fn append_on_unknown_column_is_invalid() {
    let (m, id) = setup();
    let err = m.append_step(&id, vec![on("uppercase", "0009")]).unwrap_err();
    assert!(matches!(err, HistoryError::UnknownColumn { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[test]
fn append_empty_action_list_is_invalid() {
    let (m, id) = setup();
    assert!(matches!(
        m.append_step(&id, Vec::new()),
        Err(HistoryError::EmptyActionList)
    ));
}

#[test]
fn append_to_missing_preparation() {
    let (m, _) = setup();
    let err = m
        .append_step(&PreparationId::new("ghost"), vec![on("uppercase", "0001")])
        .unwrap_err();
    assert!(matches!(err, HistoryError::PreparationNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn append_can_use_column_created_in_same_step() {
    let (m, id) = setup();
    m.append_step(&id, vec![on("copy", "0001"), on("uppercase", "0004")])
        .unwrap();
    let d = details(&m, &id);
    assert_eq!(created(&d, 1), ids(&[4]));
    assert_eq!(d.actions.len(), 2);
}

#[test]
fn append_respects_max_steps() {
    let (m, id) = setup_with(HistoryConfig {
        max_steps: 2,
        ..HistoryConfig::default()
    });
    append(&m, &id, on("uppercase", "0001"));
    append(&m, &id, on("lowercase", "0001"));
    let err = m.append_step(&id, vec![on("trim", "0001")]).unwrap_err();
    assert!(matches!(err, HistoryError::TooManySteps { limit: 2 }));
}

#[test]
fn split_with_huge_limit_is_invalid() {
    let (m, id) = setup();
    let before = m.get_preparation(&id).unwrap();
    let err = m
        .append_step(&id, vec![on("split", "0001").with_parameter("limit", "1000000")])
        .unwrap_err();
    assert!(matches!(err, HistoryError::InvalidAction(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(m.get_preparation(&id).unwrap(), before);

    let limit = MAX_REPEATED_COLUMNS.to_string();
    m.append_step(&id, vec![on("split", "0001").with_parameter("limit", limit)])
        .unwrap();
    assert_eq!(created(&details(&m, &id), 1).len(), MAX_REPEATED_COLUMNS as usize);
}

#[test]
fn copy_without_free_column_id_is_invalid() {
    let m = HistoryMutator::in_memory(HistoryConfig::default());
    let last = ColumnId::new(u32::MAX);
    let id = m
        .create_preparation(NewPreparation {
            row_metadata: RowMetadata::new(vec![ColumnMetadata::new(last, "last")]),
            ..new_preparation("full")
        })
        .unwrap()
        .id;
    let err = m
        .append_step(&id, vec![on("copy", &last.to_string())])
        .unwrap_err();
    assert!(matches!(err, HistoryError::InvalidAction(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(details(&m, &id).len(), 1);
}

#[test]
fn modification_date_only_moves_forward() {
    let (m, id) = setup();
    let created_at = m.get_preparation(&id).unwrap().last_modification_date;
    append(&m, &id, on("uppercase", "0001"));
    let first = m.get_preparation(&id).unwrap().last_modification_date;
    append(&m, &id, on("lowercase", "0001"));
    let second = m.get_preparation(&id).unwrap().last_modification_date;
    assert!(first > created_at);
    assert!(second > first);
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

#[test]
fn growing_an_upstream_step_shifts_later_created_ids() {
    let (m, id) = setup();
    let first = append(&m, &id, on("copy", "0003"));
    append(&m, &id, on("split", "0001"));
    let d = details(&m, &id);
    assert_eq!(created(&d, 1), ids(&[4]));
    assert_eq!(created(&d, 2), ids(&[5, 6]));

    m.update_step(&id, &first, vec![on("split", "0003")]).unwrap();
    let d = details(&m, &id);
    assert_eq!(created(&d, 1), ids(&[4, 5]));
    assert_eq!(created(&d, 2), ids(&[6, 7]));
}

#[test]
fn update_to_three_columns_moves_next_step_by_two() {
    let (m, id) = setup();
    let first = append(&m, &id, on("copy", "0003"));
    append(&m, &id, on("split", "0001"));
    append(&m, &id, on("uppercase", "0006"));

    m.update_step(
        &id,
        &first,
        vec![on("split", "0003").with_parameter("limit", "3")],
    )
    .unwrap();
    let d = details(&m, &id);
    assert_eq!(created(&d, 1), ids(&[4, 5, 6]));
    assert_eq!(created(&d, 2), ids(&[7, 8]));
    assert_eq!(column_param(&d, 3), "0008");
}

#[test]
fn update_rewrites_every_later_step_id() {
    let (m, id) = setup();
    let first = append(&m, &id, on("uppercase", "0001"));
    let second = append(&m, &id, on("lowercase", "0002"));
    m.update_step(&id, &first, vec![on("trim", "0001")]).unwrap();
    let d = details(&m, &id);
    assert!(!d.step_ids().contains(&first));
    assert!(!d.step_ids().contains(&second));
    assert_eq!(names(&d), vec!["trim", "lowercase"]);
}

#[test]
fn shrinking_update_conflicts_when_dropped_column_is_used() {
    let (m, id) = setup();
    let first = append(&m, &id, on("split", "0001"));
    append(&m, &id, on("uppercase", "0005"));
    let before = m.get_preparation(&id).unwrap();

    let err = m
        .update_step(&id, &first, vec![on("copy", "0001")])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(m.get_preparation(&id).unwrap(), before);
}

#[test]
fn update_that_deletes_a_used_column_conflicts() {
    let (m, id) = setup();
    let first = append(&m, &id, on("uppercase", "0002"));
    append(&m, &id, on("lowercase", "0002"));
    let err = m
        .update_step(&id, &first, vec![on("delete_column", "0002")])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn update_with_same_actions_keeps_head() {
    let (m, id) = setup();
    let first = append(&m, &id, on("copy", "0001"));
    let head = append(&m, &id, on("uppercase", "0004"));
    let date = m.get_preparation(&id).unwrap().last_modification_date;

    let new_head = m.update_step(&id, &first, vec![on("copy", "0001")]).unwrap();
    assert_eq!(new_head, head);
    assert_eq!(m.get_preparation(&id).unwrap().last_modification_date, date);
}

#[test]
fn update_root_or_unknown_step() {
    let (m, id) = setup();
    append(&m, &id, on("uppercase", "0001"));
    let err = m
        .update_step(&id, &ROOT_STEP.id(), vec![on("uppercase", "0001")])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = m
        .update_step(&id, &ObjectId::from_bytes(b"nope"), vec![on("uppercase", "0001")])
        .unwrap_err();
    assert!(matches!(err, HistoryError::StepNotFound(_)));
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[test]
fn deleting_unused_creator_shrinks_chain_and_shifts_references() {
    let (m, id) = setup();
    let first = append(&m, &id, on("copy", "0001"));
    append(&m, &id, on("copy", "0002"));
    append(&m, &id, on("uppercase", "0005"));
    let before = details(&m, &id);

    m.delete_step(&id, &first).unwrap();
    let d = details(&m, &id);
    assert_eq!(d.len(), before.len() - 1);
    assert_eq!(names(&d), vec!["copy", "uppercase"]);
    assert_eq!(created(&d, 1), ids(&[4]));
    assert_eq!(column_param(&d, 2), "0004");
}

#[test]
fn deleting_used_creator_conflicts_and_leaves_chain() {
    let (m, id) = setup();
    let first = append(&m, &id, on("copy", "0001"));
    append(&m, &id, on("uppercase", "0004"));
    let before = details(&m, &id);
    let objects = m.store().list(ObjectKind::Step).unwrap();

    let err = m.delete_step(&id, &first).unwrap_err();
    assert!(matches!(err, HistoryError::Conflict(_)));
    assert_eq!(details(&m, &id), before);
    assert_eq!(m.store().list(ObjectKind::Step).unwrap(), objects);
}

#[test]
fn deleting_head_moves_head_to_parent() {
    let (m, id) = setup();
    let first = append(&m, &id, on("uppercase", "0001"));
    let second = append(&m, &id, on("lowercase", "0001"));
    let head = m.delete_step(&id, &second).unwrap();
    assert_eq!(head, first);
}

#[test]
fn root_can_never_be_deleted() {
    let (m, id) = setup();
    for column in ["0001", "0002", "0003", "0001"] {
        let err = m.delete_step(&id, &ROOT_STEP.id()).unwrap_err();
        assert!(matches!(err, HistoryError::RootStepCannotBeDeleted));
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        append(&m, &id, on("uppercase", column));
    }
}

#[test]
fn deleting_unknown_step() {
    let (m, id) = setup();
    append(&m, &id, on("uppercase", "0001"));
    let err = m
        .delete_step(&id, &ObjectId::from_bytes(b"missing"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn cascading_delete_removes_dependents() {
    let (m, id) = setup();
    let copy = append(&m, &id, on("copy", "0001"));
    let upper = append(&m, &id, on("uppercase", "0004"));
    append(&m, &id, on("lowercase", "0001"));

    let outcome = m.delete_step_with_dependents(&id, &copy).unwrap();
    assert_eq!(outcome.removed, vec![copy, upper]);
    let d = details(&m, &id);
    assert_eq!(outcome.head_id, d.head_id);
    assert_eq!(names(&d), vec!["lowercase"]);
}

#[test]
fn cascading_delete_renumbers_survivors() {
    let (m, id) = setup();
    let copy = append(&m, &id, on("copy", "0001"));
    append(&m, &id, on("uppercase", "0004"));
    append(&m, &id, on("copy", "0002"));
    append(&m, &id, on("lowercase", "0005"));

    m.delete_step_with_dependents(&id, &copy).unwrap();
    let d = details(&m, &id);
    assert_eq!(names(&d), vec!["copy", "lowercase"]);
    assert_eq!(created(&d, 1), ids(&[4]));
    assert_eq!(column_param(&d, 2), "0004");
}

// ---------------------------------------------------------------------------
// Reorder
// ---------------------------------------------------------------------------

fn four_step_recipe(m: &HistoryMutator, id: &PreparationId) -> [StepId; 4] {
    [
        append(m, id, on("uppercase", "0001")),
        append(m, id, on("copy", "0002")),
        append(m, id, rename("0003", "town")),
        append(m, id, on("lowercase", "0001")),
    ]
}

#[test]
fn reorder_to_root_position() {
    let (m, id) = setup();
    let [_, copy, _, _] = four_step_recipe(&m, &id);
    m.reorder_step(&id, &copy, &ROOT_STEP.id()).unwrap();
    let d = details(&m, &id);
    assert_eq!(names(&d), vec!["copy", "uppercase", "rename_column", "lowercase"]);
    assert_eq!(created(&d, 1), ids(&[4]));
}

#[test]
fn reorder_after_head() {
    let (m, id) = setup();
    let [upper, _, _, lower] = four_step_recipe(&m, &id);
    m.reorder_step(&id, &upper, &lower).unwrap();
    let d = details(&m, &id);
    assert_eq!(names(&d), vec!["copy", "rename_column", "lowercase", "uppercase"]);
}

#[test]
fn reorder_after_later_step() {
    let (m, id) = setup();
    let [upper, copy, _, _] = four_step_recipe(&m, &id);
    m.reorder_step(&id, &upper, &copy).unwrap();
    let d = details(&m, &id);
    assert_eq!(names(&d), vec!["copy", "uppercase", "rename_column", "lowercase"]);
}

#[test]
fn reorder_preserves_action_multiset() {
    let (m, id) = setup();
    let [_, _, rename_step, _] = four_step_recipe(&m, &id);
    let mut before = names(&details(&m, &id));
    m.reorder_step(&id, &rename_step, &ROOT_STEP.id()).unwrap();
    let mut after = names(&details(&m, &id));
    before.sort();
    after.sort();
    assert_eq!(before, after);
}

#[test]
fn reorder_before_creator_conflicts() {
    let (m, id) = setup();
    append(&m, &id, on("copy", "0001"));
    let user = append(&m, &id, on("uppercase", "0004"));
    let before = details(&m, &id);

    let err = m.reorder_step(&id, &user, &ROOT_STEP.id()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(details(&m, &id), before);
}

#[test]
fn reorder_delete_before_user_conflicts() {
    let (m, id) = setup();
    append(&m, &id, on("uppercase", "0001"));
    let delete = append(&m, &id, on("delete_column", "0001"));
    let err = m.reorder_step(&id, &delete, &ROOT_STEP.id()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn reorder_in_place_is_a_no_op() {
    let (m, id) = setup();
    let [upper, copy, _, _] = four_step_recipe(&m, &id);
    let prep = m.get_preparation(&id).unwrap();
    assert_eq!(m.reorder_step(&id, &copy, &upper).unwrap(), prep.head_id);
    assert_eq!(m.reorder_step(&id, &copy, &copy).unwrap(), prep.head_id);
    assert_eq!(m.get_preparation(&id).unwrap(), prep);
}

#[test]
fn reorder_with_unknown_ids() {
    let (m, id) = setup();
    let [upper, ..] = four_step_recipe(&m, &id);
    let ghost = ObjectId::from_bytes(b"ghost");
    assert!(matches!(
        m.reorder_step(&id, &upper, &ghost),
        Err(HistoryError::StepNotFound(s)) if s == ghost
    ));
    assert!(matches!(
        m.reorder_step(&id, &ghost, &upper),
        Err(HistoryError::StepNotFound(s)) if s == ghost
    ));
    assert_eq!(
        m.reorder_step(&id, &ROOT_STEP.id(), &upper).unwrap_err().kind(),
        ErrorKind::Forbidden
    );
}

// ---------------------------------------------------------------------------
// Head and details
// ---------------------------------------------------------------------------

#[test]
fn set_head_to_earlier_step() {
    let (m, id) = setup();
    let first = append(&m, &id, on("copy", "0001"));
    append(&m, &id, on("uppercase", "0004"));
    m.set_head(&id, &first).unwrap();
    let d = details(&m, &id);
    assert_eq!(d.head_id, first);
    assert_eq!(d.len(), 2);
}

#[test]
fn set_head_to_unknown_step() {
    let (m, id) = setup();
    let err = m
        .set_head(&id, &ObjectId::from_bytes(b"elsewhere"))
        .unwrap_err();
    assert!(matches!(err, HistoryError::StepNotFound(_)));
}

#[test]
fn details_up_to_a_step() {
    let (m, id) = setup();
    let first = append(&m, &id, on("copy", "0001"));
    append(&m, &id, on("delete_column", "0002"));

    let partial = m.get_details(&id, Some(&first)).unwrap();
    assert_eq!(partial.len(), 2);
    assert_eq!(partial.step_ids()[0], ROOT_STEP.id());
    assert_eq!(partial.row_metadata.ids(), ids(&[1, 4, 2, 3]));
    assert_eq!(partial.actions.len(), 1);

    let full = details(&m, &id);
    assert_eq!(full.row_metadata.ids(), ids(&[1, 4, 3]));
    assert_eq!(full.diffs()[2].deleted_columns, ids(&[2]));

    let err = m
        .get_details(&id, Some(&ObjectId::from_bytes(b"x")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn stored_diffs_match_replay() {
    let (m, id) = setup();
    append(&m, &id, on("extract_url_tokens", "0002"));
    append(&m, &id, on("split", "0005"));
    append(&m, &id, on("delete_column", "0004"));
    let d = details(&m, &id);
    assert_eq!(created(&d, 1), ids(&[4, 5, 6]));
    assert_eq!(created(&d, 2), ids(&[7, 8]));
    assert_eq!(d.steps[3].diff.deleted_columns, ids(&[4]));
}

// ---------------------------------------------------------------------------
// Self-healing
// ---------------------------------------------------------------------------

fn broken_recipe(m: &HistoryMutator, id: &PreparationId) -> [StepId; 4] {
    let steps = [
        append(m, id, on("uppercase", "0001")),
        append(m, id, on("uppercase", "0002")),
        append(m, id, on("lowercase", "0001")),
        append(m, id, on("lowercase", "0002")),
    ];
    let chain = StepChain::new(m.store());
    for step in &steps[2..] {
        let content = chain.load_step(step).unwrap().unwrap().content();
        m.store().remove(&content).unwrap();
    }
    steps
}

#[test]
fn inconsistent_preparation_heals_to_last_intact_step() {
    let (m, id) = setup();
    let steps = broken_recipe(&m, &id);

    let d = details(&m, &id);
    assert_eq!(d.head_id, steps[1]);
    assert_eq!(d.len(), 3);
    assert_eq!(m.get_preparation(&id).unwrap().head_id, steps[1]);

    // Healing is stable and the preparation accepts new steps again.
    assert_eq!(details(&m, &id), d);
    append(&m, &id, on("trim", "0003"));
    assert_eq!(details(&m, &id).len(), 4);
}

#[test]
fn healing_can_be_left_unpersisted() {
    let (m, id) = setup_with(HistoryConfig {
        heal_broken_chains: false,
        ..HistoryConfig::default()
    });
    let steps = broken_recipe(&m, &id);
    let d = details(&m, &id);
    assert_eq!(d.head_id, steps[1]);
    assert_eq!(m.get_preparation(&id).unwrap().head_id, steps[3]);
}

// ---------------------------------------------------------------------------
// Copy, deletion and garbage collection
// ---------------------------------------------------------------------------

#[test]
fn copy_from_missing_reference_is_accepted_without_change() {
    let (m, id) = setup();
    let before = m.get_preparation(&id).unwrap();
    let head = m.copy_steps(&id, &PreparationId::new("missing")).unwrap();
    assert_eq!(head, before.head_id);
    assert_eq!(m.get_preparation(&id).unwrap(), before);
}

#[test]
fn copy_into_non_empty_preparation_conflicts() {
    let (m, id) = setup();
    let other = m.create_preparation(new_preparation("other")).unwrap();
    append(&m, &other.id, on("uppercase", "0001"));
    append(&m, &id, on("lowercase", "0001"));
    let err = m.copy_steps(&id, &other.id).unwrap_err();
    assert!(matches!(err, HistoryError::PreparationNotEmpty(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn copy_shares_steps_when_schemas_match() {
    let (m, source) = setup();
    append(&m, &source, on("copy", "0001"));
    append(&m, &source, on("uppercase", "0004"));
    let target = m.create_preparation(new_preparation("copy")).unwrap();

    m.copy_steps(&target.id, &source).unwrap();
    assert_eq!(
        details(&m, &target.id).step_ids(),
        details(&m, &source).step_ids()
    );
}

#[test]
fn copy_renumbers_for_a_wider_schema() {
    let (m, source) = setup();
    append(&m, &source, on("copy", "0001"));
    append(&m, &source, on("uppercase", "0004"));
    let mut wide = new_preparation("wide");
    wide.row_metadata = RowMetadata::new(
        (1..=5)
            .map(|i| ColumnMetadata::new(ColumnId::new(i), format!("c{i}")))
            .collect(),
    );
    let target = m.create_preparation(wide).unwrap();

    m.copy_steps(&target.id, &source).unwrap();
    let d = details(&m, &target.id);
    assert_eq!(created(&d, 1), ids(&[6]));
    assert_eq!(column_param(&d, 2), "0006");
}

#[test]
fn copy_into_missing_target() {
    let (m, source) = setup();
    let err = m
        .copy_steps(&PreparationId::new("nobody"), &source)
        .unwrap_err();
    assert!(matches!(err, HistoryError::PreparationNotFound(_)));
}

#[test]
fn garbage_collection_keeps_shared_and_sweeps_orphans() {
    let (m, first) = setup();
    let upper = append(&m, &first, on("uppercase", "0001"));
    append(&m, &first, on("copy", "0002"));
    let second = m.create_preparation(new_preparation("second")).unwrap();
    m.copy_steps(&second.id, &first).unwrap();

    m.delete_preparation(&first).unwrap();
    let report = m.collect_garbage().unwrap();
    assert_eq!(report.steps_removed, 0);
    assert_eq!(report.steps_retained, 2);

    m.update_step(&second.id, &upper, vec![on("lowercase", "0001")])
        .unwrap();
    let report = m.collect_garbage().unwrap();
    assert_eq!(report.steps_removed, 2);
    assert_eq!(report.actions_removed, 1);
    assert_eq!(report.actions_retained, 2);
    assert_eq!(names(&details(&m, &second.id)), vec!["lowercase", "copy"]);
}

#[test]
fn deleting_missing_preparation() {
    let (m, _) = setup();
    let err = m.delete_preparation(&PreparationId::new("gone")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn preparations_are_listed() {
    let (m, id) = setup();
    let other = m.create_preparation(new_preparation("other")).unwrap();
    let listed: Vec<_> = m
        .list_preparations()
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(listed.len(), 2);
    assert!(listed.contains(&id) && listed.contains(&other.id));
}

// ---------------------------------------------------------------------------
// Atomicity and locking
// ---------------------------------------------------------------------------

#[test]
fn failed_persist_leaves_head_untouched_and_orphans_to_gc() {
    let store = Arc::new(FailingStore::new());
    let m = HistoryMutator::new(
        store.clone(),
        Arc::new(StaticActionRegistry::with_defaults()),
        Arc::new(InMemoryPreparationRepository::new()),
        Arc::new(InMemoryPreparationLocker::new()),
        HistoryConfig::default(),
    );
    let id = m.create_preparation(new_preparation("p")).unwrap().id;
    append(&m, &id, on("uppercase", "0001"));
    let before = m.get_preparation(&id).unwrap();
    let objects = store.inner.len();

    store.allow_puts(1);
    let err = m.append_step(&id, vec![on("copy", "0002")]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(m.get_preparation(&id).unwrap(), before);
    // The action list went through before the step record failed.
    assert_eq!(store.inner.len(), objects + 1);

    store.allow_puts(usize::MAX);
    let report = m.collect_garbage().unwrap();
    assert_eq!(report.actions_removed, 1);
    assert_eq!(report.steps_removed, 0);
    assert_eq!(store.inner.len(), objects);
}

#[test]
fn failed_write_keeps_content_committed_meanwhile_by_another_preparation() {
    let store = Arc::new(InterleavingStore::new());
    let m = Arc::new(HistoryMutator::new(
        store.clone(),
        Arc::new(StaticActionRegistry::with_defaults()),
        Arc::new(InMemoryPreparationRepository::new()),
        Arc::new(InMemoryPreparationLocker::new()),
        HistoryConfig::default(),
    ));
    let failing = m.create_preparation(new_preparation("a")).unwrap().id;
    let other = m.create_preparation(new_preparation("b")).unwrap().id;
    let before = m.get_preparation(&failing).unwrap();

    // While the first append is writing, the second preparation commits
    // the very same step and so reuses the action list just stored.
    let (m2, target) = (m.clone(), other.clone());
    store.fail_next_step_after(move || {
        std::thread::spawn(move || m2.append_step(&target, vec![on("uppercase", "0001")]))
            .join()
            .expect("thread should not panic")
            .unwrap();
    });
    let err = m
        .append_step(&failing, vec![on("uppercase", "0001")])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(m.get_preparation(&failing).unwrap(), before);

    let committed = details(&m, &other);
    assert_eq!(names(&committed), vec!["uppercase"]);
    assert_eq!(m.get_preparation(&other).unwrap().head_id, committed.head_id);
    let report = m.collect_garbage().unwrap();
    assert_eq!(report.actions_removed, 0);
    assert_eq!(report.steps_removed, 0);
    assert_eq!(names(&details(&m, &other)), vec!["uppercase"]);
}

#[test]
fn lock_taken_by_the_client_outlives_a_mutation() {
    let locker = Arc::new(InMemoryPreparationLocker::new());
    let config = HistoryConfig::default();
    let owner = config.lock_owner.clone();
    let m = HistoryMutator::new(
        Arc::new(InMemoryContentStore::new()),
        Arc::new(StaticActionRegistry::with_defaults()),
        Arc::new(InMemoryPreparationRepository::new()),
        locker.clone(),
        config,
    );
    let id = m.create_preparation(new_preparation("p")).unwrap().id;
    locker.lock(&id, &owner).unwrap();

    append(&m, &id, on("uppercase", "0001"));
    assert_eq!(locker.holder(&id).unwrap(), Some(owner));
}

#[test]
fn foreign_lock_blocks_mutations() {
    let locker = Arc::new(InMemoryPreparationLocker::new());
    let m = HistoryMutator::new(
        Arc::new(InMemoryContentStore::new()),
        Arc::new(StaticActionRegistry::with_defaults()),
        Arc::new(InMemoryPreparationRepository::new()),
        locker.clone(),
        HistoryConfig::default(),
    );
    let id = m.create_preparation(new_preparation("p")).unwrap().id;
    locker.lock(&id, "another-node").unwrap();

    let err = m.append_step(&id, vec![on("uppercase", "0001")]).unwrap_err();
    assert!(matches!(err, HistoryError::Locked { .. }));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    locker.unlock(&id, "another-node").unwrap();
    append(&m, &id, on("uppercase", "0001"));
    assert_eq!(locker.holder(&id).unwrap(), None);
}

#[test]
fn concurrent_appends_are_all_kept() {
    let (m, id) = setup();
    let m = Arc::new(m);
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let (m, id) = (m.clone(), id.clone());
            std::thread::spawn(move || {
                m.append_step(&id, vec![on("copy", &format!("000{}", i % 3 + 1))])
                    .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().expect("thread should not panic");
    }
    let d = details(&m, &id);
    assert_eq!(d.len(), 5);
    let mut all_created: Vec<_> = d.steps.iter().flat_map(|s| s.diff.created_columns.clone()).collect();
    all_created.sort();
    assert_eq!(all_created, ids(&[4, 5, 6, 7]));
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_append_adds_exactly_one_step(picks in prop::collection::vec((0usize..4, 1u32..4), 1..8)) {
        let (m, id) = setup();
        for (kind, column) in picks {
            let before = details(&m, &id);
            let column = format!("{column:04}");
            let action = match kind {
                0 => on("uppercase", &column),
                1 => on("lowercase", &column),
                2 => on("copy", &column),
                _ => on("split", &column),
            };
            let head = m.append_step(&id, vec![action]).unwrap();
            let after = details(&m, &id);
            prop_assert_eq!(after.len(), before.len() + 1);
            prop_assert_eq!(after.head_id, head);
            prop_assert_eq!(after.steps[after.len() - 1].parent, Some(before.head_id));
        }
    }
}
