//! Scenario D (spec §8): prepopulate `1→10, 2→20`, start reader `r`, then
//! commit `w1: update(1,11)` and `w2: update(2,22)`. Under `r`'s snapshot
//! the old values must still be visible; a fresh reader `r'` must see the
//! new ones.

use pipefabric::{MVCCTable, TxManager};

#[test]
fn reader_snapshot_is_unaffected_by_later_commits() {
    let mgr = TxManager::new();
    let table = MVCCTable::<u32, i64>::new("accounts", mgr);
    table.seed(1, 10);
    table.seed(2, 20);

    let r = table.new_tx();

    let w1 = table.new_tx();
    table.update(w1, 1, 11).unwrap();
    table.transaction_commit(w1).unwrap();

    let w2 = table.new_tx();
    table.update(w2, 2, 22).unwrap();
    table.transaction_commit(w2).unwrap();

    assert_eq!(table.get_by_key(r, &1).unwrap(), 10);
    assert_eq!(table.get_by_key(r, &2).unwrap(), 20);

    let r2 = table.new_tx();
    assert_eq!(table.get_by_key(r2, &1).unwrap(), 11);
    assert_eq!(table.get_by_key(r2, &2).unwrap(), 22);
}
