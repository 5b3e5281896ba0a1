use hotcall::models::{Function, Models, Module};
use hotcall::observable::CollectionObserver;
use hotcall::parser::{ModuleObservation, TraceSummary};
use hotcall::store::Database;
use hotcall::utils::error::{ModelError, StoreError};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct Events(RefCell<Vec<String>>);

impl CollectionObserver<Function> for Events {
    fn on_reset(&self, items: &[Function]) {
        self.0.borrow_mut().push(format!("reset {}", items.len()));
    }

    fn on_add(&self, items: &[Function], index: usize) {
        self.0
            .borrow_mut()
            .push(format!("add {} {}", index, items[index].name));
    }

    fn on_move(&self, _items: &[Function], from: usize, to: usize) {
        self.0.borrow_mut().push(format!("move {} {}", from, to));
    }

    fn on_update(&self, _items: &[Function], index: usize, calls: u64) {
        self.0.borrow_mut().push(format!("update {} {}", index, calls));
    }
}

fn open_models() -> Models {
    let models = Models::default();
    models.open(Database::open_in_memory().unwrap()).unwrap();
    models
}

fn libfoo() -> ModuleObservation {
    ModuleObservation {
        name: "libfoo.so".to_string(),
        path: "/usr/lib/libfoo.so".to_string(),
        base: 0x7f00_0000_0000,
        main: false,
    }
}

fn sample(count: u64) -> TraceSummary {
    TraceSummary::new().with_symbol("0x1000", "libfoo.so", 0x20, count)
}

fn stored_function(models: &Models, name: &str) -> Option<Function> {
    let database = models.store().get().unwrap();
    database.transaction(|tx| tx.function_by_name(name)).unwrap()
}

fn stored_function_count(models: &Models) -> u64 {
    let database = models.store().get().unwrap();
    database.transaction(|tx| tx.function_count()).unwrap()
}

fn assert_sorted(items: &[Function]) {
    for pair in items.windows(2) {
        assert!(
            pair[0].calls >= pair[1].calls,
            "{} ({}) ranked above {} ({})",
            pair[0].name,
            pair[0].calls,
            pair[1].name,
            pair[1].calls
        );
    }
}

#[test]
fn test_first_summary_creates_module_and_function() {
    let models = open_models();

    let report = models.apply(&sample(5)).unwrap();
    assert_eq!(report.resolved, 1);
    assert_eq!(report.modules, 1);

    let module = models.module("libfoo.so").unwrap();
    assert!(!module.main);
    assert_eq!(module.calls, 5);

    let functions = models.functions().all_in_module(&module).unwrap();
    let items = functions.snapshot();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "foo_20");
    assert_eq!(items[0].calls, 5);

    models.scheduler().drain().unwrap();
    let stored = stored_function(&models, "foo_20").unwrap();
    assert_eq!(stored.calls, 5);
    assert_eq!(stored.module, module.id);
}

#[test]
fn test_subscriber_sees_reset_then_add() {
    let models = open_models();
    models.update_modules(&[libfoo()]).unwrap();
    let module = models.module("libfoo.so").unwrap();

    let events = Rc::new(Events::default());
    models
        .functions()
        .all_in_module(&module)
        .unwrap()
        .add_observer(events.clone());

    models.apply(&sample(5)).unwrap();

    assert_eq!(*events.0.borrow(), vec!["reset 0", "add 0 foo_20"]);
}

#[test]
fn test_second_summary_increments_without_move() {
    let models = open_models();
    models.update_modules(&[libfoo()]).unwrap();
    let module = models.module("libfoo.so").unwrap();
    let events = Rc::new(Events::default());
    let view = models.functions().all_in_module(&module).unwrap();
    view.add_observer(events.clone());

    models.apply(&sample(5)).unwrap();
    models.apply(&sample(3)).unwrap();

    assert_eq!(
        *events.0.borrow(),
        vec!["reset 0", "add 0 foo_20", "update 0 8"]
    );
    assert_eq!(view.len(), 1);
    assert_eq!(view.items()[0].calls, 8);

    models.scheduler().drain().unwrap();
    assert_eq!(stored_function_count(&models), 1);
    assert_eq!(stored_function(&models, "foo_20").unwrap().calls, 8);
    assert_eq!(models.module("libfoo.so").unwrap().calls, 8);
}

#[test]
fn test_live_view_stays_sorted_across_updates() {
    let models = open_models();
    let counts = [
        (0x10u64, 3u64),
        (0x20, 1),
        (0x30, 7),
        (0x20, 9),
        (0x10, 2),
        (0x40, 4),
        (0x30, 1),
        (0x50, 6),
        (0x40, 8),
    ];

    let mut view = None;
    for (round, chunk) in counts.chunks(2).enumerate() {
        let mut summary = TraceSummary::new();
        for (i, &(offset, count)) in chunk.iter().enumerate() {
            let address = format!("0x{:x}", 0x1000 * (round + 1) + i);
            summary = summary.with_symbol(&address, "libbar.so", offset, count);
        }
        models.apply(&summary).unwrap();

        let module = models.module("libbar.so").unwrap();
        let functions = view.get_or_insert_with(|| models.functions().all_in_module(&module).unwrap());
        assert_sorted(&functions.items());
    }

    let functions = view.unwrap();
    let ranked: Vec<(String, u64)> = functions
        .items()
        .iter()
        .map(|f| (f.name.clone(), f.calls))
        .collect();
    assert_eq!(
        ranked,
        vec![
            ("bar_40".to_string(), 12),
            ("bar_20".to_string(), 10),
            ("bar_30".to_string(), 8),
            ("bar_50".to_string(), 6),
            ("bar_10".to_string(), 5),
        ]
    );
}

#[test]
fn test_module_totals_and_hottest_modules_view() {
    let models = open_models();
    let summary = TraceSummary::new()
        .with_symbol("0x1000", "liba.so", 0x10, 2)
        .with_symbol("0x1004", "liba.so", 0x14, 3)
        .with_symbol("0x2000", "libb.so", 0x10, 9)
        .with_unresolved("0x3000", 100);

    let report = models.apply(&summary).unwrap();
    assert_eq!(report.resolved, 3);
    assert_eq!(report.unresolved, 1);
    assert_eq!(report.modules, 2);
    assert_eq!(report.calls, 14);

    let hottest: Vec<(String, u64)> = models
        .modules()
        .all_with_calls()
        .items()
        .iter()
        .map(|m: &Module| (m.name.clone(), m.calls))
        .collect();
    assert_eq!(
        hottest,
        vec![("libb.so".to_string(), 9), ("liba.so".to_string(), 5)]
    );
}

#[test]
fn test_unresolved_only_summary_touches_nothing() {
    let models = open_models();
    let report = models
        .apply(&TraceSummary::new().with_unresolved("0xdead", 4))
        .unwrap();

    assert_eq!(report.unresolved, 1);
    assert_eq!(report.modules, 0);
    assert!(models.modules().all_with_calls().is_empty());
    assert!(!models.scheduler().is_active());
}

#[test]
fn test_interrupted_flush_resumes_until_all_rows_stored() {
    let models = open_models();
    let mut summary = TraceSummary::new();
    for i in 0..23u64 {
        summary = summary.with_symbol(&format!("0x{:x}", 0x1000 + i * 16), "libfoo.so", i * 16, i + 1);
    }
    models.apply(&summary).unwrap();

    let module = models.module("libfoo.so").unwrap();
    let collection = models.functions().collection(&module).unwrap();
    assert_eq!(collection.dirty_len(), 23);

    assert!(!collection.flush(&|| true).unwrap());
    assert_eq!(collection.dirty_len(), 13);
    assert_eq!(stored_function_count(&models), 10);

    assert!(collection.flush(&|| false).unwrap());
    assert_eq!(collection.dirty_len(), 0);
    assert_eq!(stored_function_count(&models), 23);
    assert!(collection
        .observable()
        .items()
        .iter()
        .all(|f| f.is_persisted()));
}

#[test]
fn test_persisted_view_round_trips_through_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hot.db");

    let models = Models::default();
    models.open_path(&path).unwrap();
    models.update_modules(&[libfoo()]).unwrap();
    models
        .apply(
            &TraceSummary::new()
                .with_symbol("0x1000", "libfoo.so", 0x20, 5)
                .with_symbol("0x1010", "libfoo.so", 0x30, 11)
                .with_symbol("0x1020", "libfoo.so", 0x40, 2),
        )
        .unwrap();
    models.apply(&sample(9)).unwrap();

    let module = models.module("libfoo.so").unwrap();
    let mut before: Vec<(String, u64, u64)> = models
        .functions()
        .all_in_module(&module)
        .unwrap()
        .items()
        .iter()
        .map(|f| (f.name.clone(), f.offset, f.calls))
        .collect();

    // Closing writes whatever is still dirty
    models.close().unwrap();
    assert!(!models.is_open());

    models.open_path(&path).unwrap();
    let module = models.module("libfoo.so").unwrap();
    let mut after: Vec<(String, u64, u64)> = models
        .functions()
        .all_in_module(&module)
        .unwrap()
        .items()
        .iter()
        .map(|f| (f.name.clone(), f.offset, f.calls))
        .collect();

    before.sort();
    after.sort();
    assert_eq!(after, before);
    assert_eq!(module.calls, 27);
}

#[test]
fn test_close_empties_live_views() {
    let models = open_models();
    models.apply(&sample(5)).unwrap();
    let module = models.module("libfoo.so").unwrap();
    let view = models.functions().all_in_module(&module).unwrap();
    let modules = models.modules().all_with_calls();

    models.close().unwrap();

    assert!(view.is_empty());
    assert!(modules.is_empty());
    assert!(!models.scheduler().is_active());
    assert!(matches!(
        models.apply(&sample(1)),
        Err(ModelError::Store(StoreError::Detached))
    ));
}

#[test]
fn test_name_collision_keeps_entries_dirty() {
    let models = open_models();
    // Both modules derive the prefix "foo"
    models
        .apply(
            &TraceSummary::new()
                .with_symbol("0x1000", "libfoo.so", 0x20, 1)
                .with_symbol("0x2000", "foo.dylib", 0x20, 1),
        )
        .unwrap();

    let first = models.module("libfoo.so").unwrap();
    let second = models.module("foo.dylib").unwrap();
    let a = models.functions().collection(&first).unwrap();
    let b = models.functions().collection(&second).unwrap();

    assert!(a.flush(&|| false).unwrap());
    assert!(b.flush(&|| false).is_err());
    assert_eq!(b.dirty_len(), 1);
    assert_eq!(stored_function_count(&models), 1);
}

#[test]
fn test_upsert_refreshes_placeholder_module() {
    let models = open_models();
    models.apply(&sample(5)).unwrap();
    assert_eq!(models.module("libfoo.so").unwrap().path, "libfoo.so");

    models.update_modules(&[libfoo()]).unwrap();

    let module = models.module("libfoo.so").unwrap();
    assert_eq!(module.path, "/usr/lib/libfoo.so");
    assert_eq!(module.base, 0x7f00_0000_0000);
    assert_eq!(module.calls, 5);
}

#[test]
fn test_views_survive_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hot.db");
    let models = Models::default();
    models.open_path(&path).unwrap();
    models.apply(&sample(5)).unwrap();

    let module = models.module("libfoo.so").unwrap();
    let view = models.functions().all_in_module(&module).unwrap();
    let events = Rc::new(Events::default());
    view.add_observer(events.clone());

    models.close().unwrap();
    assert!(view.is_empty());
    models.open_path(&path).unwrap();
    assert_eq!(view.len(), 1);

    models.apply(&sample(3)).unwrap();
    assert_eq!(view.items()[0].calls, 8);
    assert_eq!(
        *events.0.borrow(),
        vec!["reset 1", "reset 0", "reset 1", "update 0 8"]
    );
}

#[test]
fn test_views_follow_a_different_database() {
    let models = open_models();
    models.apply(&sample(5)).unwrap();
    let module = models.module("libfoo.so").unwrap();
    let view = models.functions().all_in_module(&module).unwrap();

    // Another store: libbar.so takes the first id, libfoo.so gets the second
    models.open(Database::open_in_memory().unwrap()).unwrap();
    assert!(view.is_empty());
    models
        .apply(
            &TraceSummary::new()
                .with_symbol("0x1000", "libbar.so", 0x10, 1)
                .with_symbol("0x2000", "libfoo.so", 0x20, 2),
        )
        .unwrap();

    let module = models.module("libfoo.so").unwrap();
    assert_eq!(view.len(), 1);
    assert_eq!(view.items()[0].calls, 2);
    assert_eq!(view.items()[0].module, module.id);

    models.scheduler().drain().unwrap();
    let stored = stored_function(&models, "foo_20").unwrap();
    assert_eq!(stored.module, module.id);
}

#[test]
fn test_main_flag_arrives_after_first_summary() {
    let models = open_models();
    models
        .apply(&TraceSummary::new().with_symbol("0x401000", "app", 0x1000, 1))
        .unwrap();
    assert!(!models.module("app").unwrap().main);

    models
        .update_modules(&[ModuleObservation {
            name: "app".to_string(),
            path: "/usr/bin/app".to_string(),
            base: 0x40_0000,
            main: true,
        }])
        .unwrap();
    models
        .apply(
            &TraceSummary::new()
                .with_symbol("0x401000", "app", 0x1000, 1)
                .with_symbol("0x402000", "app", 0x2000, 1),
        )
        .unwrap();

    let module = models.module("app").unwrap();
    assert!(module.main);
    let mut names: Vec<String> = models
        .functions()
        .all_in_module(&module)
        .unwrap()
        .items()
        .iter()
        .map(|f| f.name.clone())
        .collect();
    names.sort();
    // Names are fixed on first sight
    assert_eq!(names, vec!["app_1000".to_string(), "sub_2000".to_string()]);
}
